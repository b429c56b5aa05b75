pub mod symbol;
pub mod token;
pub mod types;

pub use symbol::{Array, Direction, Procedure, Symbol, SymbolId, Variable};
pub use token::{TokenFrame, TokenKind};
pub use types::DataType;
