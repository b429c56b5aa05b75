use lang::{DataType, Direction, Procedure, Symbol, SymbolId, TokenKind, Variable};
use rustc_hash::FxHashMap;
use thiserror::Error;

pub const RESERVED_WORDS: &[&str] = &[
    "and", "begin", "bool", "case", "else", "end", "false", "float", "for", "global", "if", "in",
    "integer", "is", "not", "or", "out", "procedure", "program", "return", "string", "then",
    "true",
];

pub const OPERATORS: &[&str] = &[
    ":", ";", ",", "+", "-", "*", "/", "(", ")", "<", "<=", ">", ">=", "!=", "=", ":=", "{", "}",
    "&", "|", "[", "]",
];

const RUNTIME_PROCEDURES: &[(&str, &str, DataType, Direction)] = &[
    ("getBool", "newBool", DataType::Bool, Direction::Out),
    ("getInteger", "newInteger", DataType::Integer, Direction::Out),
    ("getFloat", "newFloat", DataType::Float, Direction::Out),
    ("getString", "newString", DataType::Str, Direction::Out),
    ("putBool", "oldBool", DataType::Bool, Direction::In),
    ("putInteger", "oldInteger", DataType::Integer, Direction::In),
    ("putFloat", "oldFloat", DataType::Float, Direction::In),
    ("putString", "oldString", DataType::Str, Direction::In),
];

#[derive(Debug, Error)]
#[error("Unable to remove scope")]
pub struct ScopeUnderflow;

/// One global mapping plus a stack of local mappings, indexed by scope depth.
///
/// Symbols live in an arena and the maps hold ids, so retiring a scope never
/// invalidates a handle that an outer scope (or a procedure's parameter list)
/// still carries.
pub struct SymbolTable {
    arena: Vec<Symbol>,
    global: FxHashMap<String, SymbolId>,
    scopes: Vec<FxHashMap<String, SymbolId>>,
}

impl SymbolTable {
    /// A table primed with the reserved words, the operators, and the eight
    /// runtime procedure signatures.
    pub fn new() -> Self {
        let mut table = Self {
            arena: Vec::new(),
            global: FxHashMap::default(),
            scopes: vec![FxHashMap::default()],
        };
        for word in RESERVED_WORDS {
            table.define(Symbol::Reserved((*word).into()));
        }
        for op in OPERATORS {
            table.define(Symbol::Operator((*op).into()));
        }
        for &(name, param, ty, direction) in RUNTIME_PROCEDURES {
            let mut proc = Procedure::new(name, true);
            proc.builtin = true;
            let address = proc.param_cursor;
            proc.param_cursor += 1;
            let param = table.intern(Symbol::Variable(Variable {
                name: param.into(),
                ty,
                address,
                is_global: false,
                is_parameter: true,
            }));
            proc.params.push(param);
            proc.directions.push(direction);
            table.define(Symbol::Procedure(proc));
        }
        table
    }

    /// Depth of the innermost scope; 0 is the top level.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn exit_scope(&mut self) -> Result<(), ScopeUnderflow> {
        if self.scopes.len() > 1 {
            self.scopes.pop();
            Ok(())
        } else {
            Err(ScopeUnderflow)
        }
    }

    /// Adds a symbol to the arena without making it visible to lookup.
    /// Parameter records of the runtime procedures are held this way.
    pub fn intern(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId::new(self.arena.len());
        self.arena.push(symbol);
        id
    }

    /// Inserts a symbol, routed by its own `is_global` flag: global symbols
    /// go to the global map, everything else to the innermost scope.
    pub fn define(&mut self, symbol: Symbol) -> SymbolId {
        let name = symbol.name().to_owned();
        let global = symbol.is_global();
        let id = self.intern(symbol);
        if global {
            self.global.insert(name, id);
        } else if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, id);
        }
        id
    }

    /// Makes a local procedure resolvable from the scope that declared it.
    /// Global procedures already live in the global map, so this is a no-op
    /// for them.
    pub fn alias_into_parent(&mut self, id: SymbolId) {
        let symbol = self.get(id);
        if symbol.is_global() {
            return;
        }
        let name = symbol.name().to_owned();
        let depth = self.scopes.len();
        if depth >= 2 {
            self.scopes[depth - 2].insert(name, id);
        }
    }

    /// Two-tier classification for the scanner: innermost scope first, then
    /// global. `None` means the name is unbound.
    pub fn classify(&self, name: &str) -> Option<(TokenKind, bool)> {
        if let Some(scope) = self.scopes.last() {
            if let Some(&id) = scope.get(name) {
                return Some((self.get(id).kind(), false));
            }
        }
        self.global
            .get(name)
            .map(|&id| (self.get(id).kind(), true))
    }

    /// Two-tier resolution returning the symbol handle and its tier.
    pub fn resolve(&self, name: &str) -> Option<(SymbolId, bool)> {
        if let Some(scope) = self.scopes.last() {
            if let Some(&id) = scope.get(name) {
                return Some((id, false));
            }
        }
        self.global.get(name).map(|&id| (id, true))
    }

    /// Direct fetch from the tier a token's scope hint names.
    pub fn lookup_in(&self, name: &str, is_global: bool) -> Option<SymbolId> {
        if is_global {
            self.global.get(name).copied()
        } else {
            self.scopes.last().and_then(|scope| scope.get(name).copied())
        }
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.arena[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.arena[id.index()]
    }

    pub fn procedure(&self, id: SymbolId) -> Option<&Procedure> {
        match self.get(id) {
            Symbol::Procedure(p) => Some(p),
            _ => None,
        }
    }

    pub fn procedure_mut(&mut self, id: SymbolId) -> Option<&mut Procedure> {
        match self.get_mut(id) {
            Symbol::Procedure(p) => Some(p),
            _ => None,
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_int(name: &str, address: usize) -> Symbol {
        Symbol::Variable(Variable {
            name: name.into(),
            ty: DataType::Integer,
            address,
            is_global: false,
            is_parameter: false,
        })
    }

    #[test]
    fn reserved_words_classify_at_any_depth() {
        let mut table = SymbolTable::new();
        for word in RESERVED_WORDS {
            assert_eq!(table.classify(word), Some((TokenKind::Reserved, true)));
        }
        table.enter_scope();
        for word in RESERVED_WORDS {
            assert_eq!(table.classify(word), Some((TokenKind::Reserved, true)));
        }
    }

    #[test]
    fn runtime_procedures_are_prebound() {
        let table = SymbolTable::new();
        for (name, _, ty, direction) in RUNTIME_PROCEDURES {
            let (id, global) = table.resolve(name).unwrap();
            assert!(global);
            let proc = table.procedure(id).unwrap();
            assert!(proc.builtin);
            assert_eq!(proc.arity(), 1);
            assert_eq!(proc.directions[0], *direction);
            assert_eq!(table.get(proc.params[0]).data_type(), Some(*ty));
        }
    }

    #[test]
    fn scope_exit_restores_visibility() {
        let mut table = SymbolTable::new();
        table.define(local_int("x", 0));
        let before = table.classify("x");
        let depth = table.depth();

        table.enter_scope();
        assert_eq!(table.classify("x"), None, "outer locals are not visible");
        table.define(local_int("x", 0));
        assert_eq!(table.classify("x"), Some((TokenKind::Identifier, false)));
        table.exit_scope().unwrap();

        assert_eq!(table.depth(), depth);
        assert_eq!(table.classify("x"), before);
    }

    #[test]
    fn local_shadows_global() {
        let mut table = SymbolTable::new();
        table.define(Symbol::Variable(Variable {
            name: "x".into(),
            ty: DataType::Float,
            address: 1,
            is_global: true,
            is_parameter: false,
        }));
        table.enter_scope();
        assert_eq!(table.classify("x"), Some((TokenKind::Identifier, true)));
        let (_, global) = table.resolve("x").unwrap();
        assert!(global);
        table.define(local_int("x", 0));
        let (id, global) = table.resolve("x").unwrap();
        assert!(!global);
        assert_eq!(table.get(id).data_type(), Some(DataType::Integer));
    }

    #[test]
    fn procedure_alias_survives_scope_exit() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        let id = table.define(Symbol::Procedure(Procedure::new("helper", false)));
        table.alias_into_parent(id);
        table.define(local_int("scratch", 0));
        table.exit_scope().unwrap();

        let (found, global) = table.resolve("helper").unwrap();
        assert_eq!(found, id);
        assert!(!global);
        assert_eq!(table.procedure(found).unwrap().name, "helper");
        assert_eq!(table.classify("scratch"), None);
    }

    #[test]
    fn global_procedure_visible_inside_its_own_scope() {
        let mut table = SymbolTable::new();
        table.define(Symbol::Procedure(Procedure::new("main_helper", true)));
        table.enter_scope();
        let (_, global) = table.resolve("main_helper").unwrap();
        assert!(global);
    }

    #[test]
    fn top_level_scope_cannot_be_removed() {
        let mut table = SymbolTable::new();
        assert!(table.exit_scope().is_err());
        table.enter_scope();
        assert!(table.exit_scope().is_ok());
        assert!(table.exit_scope().is_err());
    }
}
