use super::{ParseError, Parser, PResult};
use emit::field;
use lang::{DataType, TokenKind};

/// A computed value: which register holds it and what type it carries.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Operand {
    pub reg: usize,
    pub ty: DataType,
}

/// A resolved (possibly subscripted) name, usable as a load source or a
/// store destination.
pub(crate) struct NameRef {
    pub ty: DataType,
    pub cell: String,
}

impl NameRef {
    pub(crate) fn invalid() -> Self {
        Self {
            ty: DataType::Invalid,
            cell: String::new(),
        }
    }
}

const RELATIONAL: [&str; 6] = ["<", "<=", ">", ">=", "==", "!="];

impl Parser<'_> {
    pub(super) fn expression(&mut self) -> PResult<Operand> {
        if self.at("not") {
            self.advance()?;
            let operand = self.arith_op()?;
            if !operand.ty.logical() {
                self.error("Operand of 'not' must be a boolean or an integer");
            }
            let reg = self.emit.alloc_reg();
            let op = if operand.ty == DataType::Bool { "!" } else { "~" };
            self.emit.stmt(format_args!(
                "R[{reg}].intVal = {op}R[{}].intVal;",
                operand.reg
            ));
            return Ok(Operand {
                reg,
                ty: operand.ty,
            });
        }

        let mut acc = self.arith_op()?;
        loop {
            let op = if self.at("&") {
                "&"
            } else if self.at("|") {
                "|"
            } else {
                break;
            };
            if !acc.ty.logical() {
                self.error(format!("Operand of '{op}' must be a boolean or an integer"));
            }
            self.advance()?;
            let rhs = self.arith_op()?;
            if !rhs.ty.logical() {
                self.error(format!("Operand of '{op}' must be a boolean or an integer"));
            }
            let reg = self.emit.alloc_reg();
            self.emit.stmt(format_args!(
                "R[{reg}].intVal = R[{}].intVal {op} R[{}].intVal;",
                acc.reg, rhs.reg
            ));
            acc = Operand {
                reg,
                ty: acc.ty.promote(rhs.ty),
            };
        }
        Ok(acc)
    }

    fn arith_op(&mut self) -> PResult<Operand> {
        let mut acc = self.relation()?;
        loop {
            let op = if self.at("+") {
                "+"
            } else if self.at("-") {
                "-"
            } else {
                break;
            };
            if !acc.ty.numeric() {
                self.error(format!("Operand of '{op}' must be an integer or a float"));
            }
            self.advance()?;
            let rhs = self.relation()?;
            if !rhs.ty.numeric() {
                self.error(format!("Operand of '{op}' must be an integer or a float"));
            }
            acc = self.emit_arith(acc, rhs, op);
        }
        Ok(acc)
    }

    fn relation(&mut self) -> PResult<Operand> {
        let mut acc = self.term()?;
        loop {
            let Some(op) = RELATIONAL.iter().copied().find(|op| self.at(op)) else {
                break;
            };
            if !acc.ty.logical() {
                self.error(format!("Operand of '{op}' must be a boolean or an integer"));
            }
            self.advance()?;
            let rhs = self.term()?;
            if !rhs.ty.logical() {
                self.error(format!("Operand of '{op}' must be a boolean or an integer"));
            }
            let reg = self.emit.alloc_reg();
            self.emit.stmt(format_args!(
                "R[{reg}].intVal = R[{}].intVal {op} R[{}].intVal;",
                acc.reg, rhs.reg
            ));
            // comparisons always produce a boolean
            acc = Operand {
                reg,
                ty: DataType::Bool,
            };
        }
        Ok(acc)
    }

    fn term(&mut self) -> PResult<Operand> {
        let mut acc = self.factor()?;
        loop {
            let op = if self.at("*") {
                "*"
            } else if self.at("/") {
                "/"
            } else {
                break;
            };
            if !acc.ty.numeric() {
                self.error(format!("Operand of '{op}' must be a float or an integer"));
            }
            self.advance()?;
            let rhs = self.factor()?;
            if !rhs.ty.numeric() {
                self.error(format!("Operand of '{op}' must be a float or an integer"));
            }
            acc = self.emit_arith(acc, rhs, op);
        }
        Ok(acc)
    }

    /// Mixed int/float arithmetic becomes a float operation with each side
    /// read through its own field.
    fn emit_arith(&mut self, a: Operand, b: Operand, op: &str) -> Operand {
        let ty = a.ty.promote(b.ty);
        let reg = self.emit.alloc_reg();
        if ty == DataType::Float {
            self.emit.stmt(format_args!(
                "R[{reg}].floatVal = R[{}].{} {op} R[{}].{};",
                a.reg,
                field(a.ty),
                b.reg,
                field(b.ty)
            ));
        } else {
            self.emit.stmt(format_args!(
                "R[{reg}].intVal = R[{}].intVal {op} R[{}].intVal;",
                a.reg, b.reg
            ));
        }
        Operand { reg, ty }
    }

    fn factor(&mut self) -> PResult<Operand> {
        if self.at("(") {
            self.advance()?;
            let inner = self.expression()?;
            if self.at(")") {
                self.advance()?;
                Ok(inner)
            } else {
                Err(ParseError::FactorParentheses)
            }
        } else if self.at("-") {
            self.advance()?;
            if self.kind() == TokenKind::Identifier {
                let name = self.load_name()?;
                let reg = self.emit.alloc_reg();
                let f = field(name.ty);
                self.emit
                    .stmt(format_args!("R[{reg}].{f} = -R[{}].{f};", name.reg));
                Ok(Operand { reg, ty: name.ty })
            } else if self.kind() == TokenKind::Number {
                self.load_number(true)
            } else {
                Err(ParseError::NegationOperand(self.cur.lexeme.clone()))
            }
        } else if self.kind() == TokenKind::Identifier {
            self.load_name()
        } else if self.kind() == TokenKind::Number {
            self.load_number(false)
        } else if self.kind() == TokenKind::StringLit {
            self.load_string()
        } else if self.at("true") || self.at("false") {
            let value = if self.at("true") { 1 } else { 0 };
            let reg = self.emit.alloc_reg();
            self.emit.stmt(format_args!("R[{reg}].intVal = {value};"));
            self.advance()?;
            Ok(Operand {
                reg,
                ty: DataType::Bool,
            })
        } else {
            Err(ParseError::InvalidFactor(self.cur.lexeme.clone()))
        }
    }

    fn load_name(&mut self) -> PResult<Operand> {
        let name = self.name_reference()?;
        let reg = self.emit.alloc_reg();
        self.emit.stmt(format_args!("R[{reg}] = {};", name.cell));
        Ok(Operand { reg, ty: name.ty })
    }

    /// A decimal point anywhere in the lexeme makes the literal a float.
    fn load_number(&mut self, negated: bool) -> PResult<Operand> {
        let lexeme = self.cur.lexeme.clone();
        let ty = if lexeme.contains('.') {
            DataType::Float
        } else {
            DataType::Integer
        };
        let reg = self.emit.alloc_reg();
        let sign = if negated { "-" } else { "" };
        self.emit
            .stmt(format_args!("R[{reg}].{} = {sign}{lexeme};", field(ty)));
        self.advance()?;
        Ok(Operand { reg, ty })
    }

    /// First sighting of a literal interns its cells and a global pseudo-
    /// variable; later sightings reuse the same address.
    fn load_string(&mut self) -> PResult<Operand> {
        let lexeme = self.cur.lexeme.clone();
        let address = match self.table.lookup_in(&lexeme, true) {
            Some(id) => self.table.get(id).address().unwrap_or(0),
            None => {
                let text = lexeme.trim_matches('"').to_owned();
                let address = self.emit.store_string(&text);
                self.table.define(lang::Symbol::Variable(lang::Variable {
                    name: lexeme.clone(),
                    ty: DataType::Str,
                    address,
                    is_global: true,
                    is_parameter: false,
                }));
                address
            }
        };
        let reg = self.emit.alloc_reg();
        self.emit
            .stmt(format_args!("R[{reg}].stringPointer = {address};"));
        self.advance()?;
        Ok(Operand {
            reg,
            ty: DataType::Str,
        })
    }

    pub(super) fn destination(&mut self) -> PResult<NameRef> {
        self.name_reference()
    }

    fn name_reference(&mut self) -> PResult<NameRef> {
        let name = self.cur.lexeme.clone();
        let Some(id) = self.table.lookup_in(&name, self.cur.is_global) else {
            return Err(ParseError::MissingSymbol(name));
        };
        let ty = self.table.get(id).data_type().unwrap_or(DataType::Invalid);
        if ty == DataType::Invalid {
            self.error(format!("'{name}' is not a valid variable"));
        }
        self.advance()?;

        let mut index = None;
        if self.at("[") {
            if self.table.get(id).array_length().unwrap_or(0) < 1 {
                self.error(format!("'{name}' is not an array"));
            }
            self.advance()?;
            let subscript = self.expression()?;
            if subscript.ty != DataType::Integer {
                self.error("Array index must evaluate to an integer");
            }
            if self.at("]") {
                self.advance()?;
            } else {
                return Err(ParseError::SubscriptClose);
            }
            index = Some(subscript.reg);
        }

        Ok(NameRef {
            ty,
            cell: self.mm_cell(id, index),
        })
    }
}
