mod expr;

use crate::diag::Diagnostics;
use crate::scan::Scanner;
use crate::Outcome;
use emit::{Emitter, RuntimeProc, ARG_BASE};
use self::expr::NameRef;
use lang::{Array, DataType, Direction, Procedure, Symbol, SymbolId, TokenFrame, TokenKind, Variable};
use symtab::SymbolTable;
use thiserror::Error;

pub(crate) type PResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, Error)]
pub(crate) enum ParseError {
    #[error("Unexpected end of file")]
    Eof,
    #[error("Incorrect or missing program header")]
    ProgramHeader,
    #[error("Illegal program identifier: {0}")]
    ProgramIdentifier(String),
    #[error("Program header must end with keyword \"is\"")]
    ProgramIs,
    #[error("Expected 'begin'")]
    ExpectedBegin,
    #[error("Incorrect end of program body")]
    ProgramEnd,
    #[error("Unrecognized declaration")]
    UnknownDeclaration,
    #[error("Expected ';' before '{0}'. Not found")]
    ExpectedSemicolon(String),
    #[error("Identifier '{0}' has already been declared.")]
    Redeclared(String),
    #[error("Invalid procedure identifier. '{0}' is a reserve word.")]
    ProcedureReserved(String),
    #[error("Invalid procedure identifier '{0}'")]
    ProcedureIdentifier(String),
    #[error("Invalid or missing parameter list")]
    ParameterList,
    #[error("Expected ')' or ',' before '{0}'. Not found")]
    ParameterClose(String),
    #[error("Invalid parameter direction: {0}")]
    ParameterDirection(String),
    #[error("Incorrect end of procedure body")]
    ProcedureEnd,
    #[error("Invalid data type: {0}")]
    InvalidType(String),
    #[error("Invalid variable identifier. '{0}' is a reserve word.")]
    VariableReserved(String),
    #[error("Invalid variable identifier: {0}")]
    VariableIdentifier(String),
    #[error("Invalid array size: {0}")]
    ArraySize(String),
    #[error("Unexpected end of array declaration. Expected ']'")]
    ArrayClose,
    #[error("Unrecognized statement")]
    UnknownStatement,
    #[error("Undeclared identifier '{0}'")]
    Undeclared(String),
    #[error("Procedure '{0}' not found")]
    ProcedureNotFound(String),
    #[error("'{0}' is not a procedure")]
    NotProcedure(String),
    #[error("Too many arguments in procedure call")]
    TooManyArguments,
    #[error("Mismatched Parentheses")]
    Parentheses,
    #[error("Invalid statement")]
    InvalidStatement,
    #[error("'(' is required before conditional expression")]
    IfOpen,
    #[error("')' is required after conditional expression")]
    IfClose,
    #[error("keyword 'then' is required after ')' of conditional expression")]
    IfThen,
    #[error("Incorrect end of if statement")]
    IfEnd,
    #[error("'(' is required before assignment statement")]
    LoopOpen,
    #[error("Missing ';' after assignment statement")]
    LoopSemicolon,
    #[error("Missing ')' after conditional expression")]
    LoopClose,
    #[error("Incorrect end of for loop")]
    LoopEnd,
    #[error("Invalid operand for '-': {0}")]
    NegationOperand(String),
    #[error("Invalid factor: {0}")]
    InvalidFactor(String),
    #[error("Mismatched parentheses")]
    FactorParentheses,
    #[error("Mismatched square brackets for array subscript")]
    SubscriptClose,
    #[error("Unable to locate symbol '{0}'")]
    MissingSymbol(String),
}

/// Splits the fatal end-of-file condition from errors the enclosing
/// nonterminal can resync past.
fn recoverable(error: ParseError) -> PResult<ParseError> {
    match error {
        ParseError::Eof => Err(ParseError::Eof),
        other => Ok(other),
    }
}

/// The single-pass core: syntax checking, type checking, and code emission
/// interleaved in one descent over the token stream.
pub(crate) struct Parser<'a> {
    scan: Scanner<'a>,
    table: SymbolTable,
    diag: Diagnostics,
    emit: Emitter,
    cur: TokenFrame,
    next: Option<TokenFrame>,
    is_global: bool,
    is_parameter: bool,
    current_procedure: Option<SymbolId>,
    main_locals: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a [u8]) -> Self {
        Self {
            scan: Scanner::new(source),
            table: SymbolTable::new(),
            diag: Diagnostics::new(),
            emit: Emitter::new(),
            cur: TokenFrame::default(),
            next: None,
            is_global: false,
            is_parameter: false,
            current_procedure: None,
            main_locals: 0,
        }
    }

    pub(crate) fn run(&mut self) {
        if let Err(error) = self.program() {
            // end of file, or an error no resync point could absorb
            self.error(&error);
        }
    }

    pub(crate) fn into_outcome(self) -> Outcome {
        let errors = self.diag.errors();
        let warnings = self.diag.warnings();
        let lines = self.scan.line();
        let code = if errors == 0 {
            Some(self.emit.finalize(self.main_locals))
        } else {
            None
        };
        Outcome {
            code,
            lines,
            errors,
            warnings,
            diagnostics: self.diag.into_log(),
        }
    }

    // ------------------------------------------------------------------
    // token window

    fn fetch(&mut self) -> Option<TokenFrame> {
        self.scan.next_token(&self.table, &mut self.diag)
    }

    fn advance(&mut self) -> PResult<()> {
        let next = self.next.take().ok_or(ParseError::Eof)?;
        self.cur = next;
        self.next = self.fetch();
        Ok(())
    }

    fn at(&self, text: &str) -> bool {
        self.cur.is(text)
    }

    fn kind(&self) -> TokenKind {
        self.cur.kind
    }

    fn error(&mut self, message: impl std::fmt::Display) {
        self.diag.error(self.scan.line(), message);
        self.emit.disable();
    }

    fn warning(&mut self, message: impl std::fmt::Display) {
        self.diag.warning(self.scan.line(), message);
    }

    // ------------------------------------------------------------------
    // program structure

    fn program(&mut self) -> PResult<()> {
        self.program_header()?;
        self.program_body()
    }

    fn program_header(&mut self) -> PResult<()> {
        if let Err(error) = self.program_header_inner() {
            let error = recoverable(error)?;
            self.error(&error);
            // resync to the first-set of the program body
            loop {
                if self.cur.starts_declaration() || self.at("begin") {
                    break;
                }
                self.advance()?;
            }
        }
        Ok(())
    }

    fn program_header_inner(&mut self) -> PResult<()> {
        self.cur = self.fetch().ok_or(ParseError::Eof)?;
        self.next = self.fetch();

        if self.at("program") {
            self.advance()?;
        } else {
            return Err(ParseError::ProgramHeader);
        }

        if self.kind() == TokenKind::Unbound {
            // the program name becomes a reserved word
            let name = self.cur.lexeme.clone();
            self.table.define(Symbol::Reserved(name));
            self.advance()?;
        } else {
            return Err(ParseError::ProgramIdentifier(self.cur.lexeme.clone()));
        }

        if self.at("is") {
            self.advance()?;
        } else {
            return Err(ParseError::ProgramIs);
        }
        Ok(())
    }

    fn program_body(&mut self) -> PResult<()> {
        if self.cur.starts_declaration() {
            self.declarations()?;
        }

        if self.at("begin") {
            self.emit.label(format_args!("programbody"));
            self.advance()?;
        } else {
            return Err(ParseError::ExpectedBegin);
        }

        if self.kind() == TokenKind::Identifier
            || self.kind() == TokenKind::Unbound
            || self.at("if")
            || self.at("for")
            || self.at("return")
        {
            self.statements()?;
        }

        if self.cur.starts_declaration() {
            self.error("Incorrect Program Body: Declarations must be before 'begin'");
            // nothing to salvage here; scan forward to the program's end
            loop {
                if self.at("end") {
                    self.advance()?;
                    if self.at("program") {
                        return Ok(());
                    }
                }
                self.advance()?;
            }
        }

        if self.at("end") {
            self.advance()?;
            if !self.at("program") {
                return Err(ParseError::ProgramEnd);
            }
        } else {
            return Err(ParseError::ProgramEnd);
        }
        self.emit.stmt(format_args!("return 0;"));
        Ok(())
    }

    // ------------------------------------------------------------------
    // declarations

    fn declarations(&mut self) -> PResult<()> {
        loop {
            if self.at("global") {
                self.is_global = true;
                self.advance()?;
            }

            if self.at("procedure") {
                self.procedure_declaration()?;
                self.is_global = false;
            } else if self.cur.is_type_mark() {
                self.is_parameter = false;
                self.variable_declaration()?;
                self.is_global = false;
            } else {
                return Err(ParseError::UnknownDeclaration);
            }

            if self.at(";") {
                self.advance()?;
            } else {
                let error = ParseError::ExpectedSemicolon(self.cur.lexeme.clone());
                self.error(&error);
            }

            if !self.cur.starts_declaration() {
                break;
            }
        }
        Ok(())
    }

    fn procedure_declaration(&mut self) -> PResult<()> {
        let outer = self.current_procedure.take();
        self.table.enter_scope();

        let parsed = self
            .procedure_header()
            .and_then(|()| self.procedure_body());
        if let Err(error) = parsed {
            let error = recoverable(error)?;
            self.error(&error);
            self.warning(
                "Encountered error in procedure declaration. Remainder of procedure has not been checked.",
            );
            self.resync_block("procedure")?;
        }

        if let Err(underflow) = self.table.exit_scope() {
            self.error(underflow);
        }
        self.current_procedure = outer;
        Ok(())
    }

    fn procedure_header(&mut self) -> PResult<()> {
        let location = self.is_global;
        self.is_global = false;

        self.advance()?; // past "procedure"

        match self.kind() {
            TokenKind::Unbound => {
                let name = self.cur.lexeme.clone();
                let id = self
                    .table
                    .define(Symbol::Procedure(Procedure::new(name.clone(), location)));
                self.current_procedure = Some(id);
                self.emit.label(format_args!("{name}_start"));
                self.advance()?;
            }
            TokenKind::Identifier => {
                return Err(ParseError::Redeclared(self.cur.lexeme.clone()))
            }
            TokenKind::Reserved => {
                return Err(ParseError::ProcedureReserved(self.cur.lexeme.clone()))
            }
            _ => return Err(ParseError::ProcedureIdentifier(self.cur.lexeme.clone())),
        }

        if self.at("(") {
            self.advance()?;
        } else {
            return Err(ParseError::ParameterList);
        }

        if self.cur.is_type_mark() {
            self.parameter_list()?;
        }

        if self.at(")") {
            self.advance()?;
        } else {
            return Err(ParseError::ParameterClose(self.cur.lexeme.clone()));
        }

        if let Some(id) = self.current_procedure {
            // entry transport: stage each `in` parameter into its stack slot
            let copies: Vec<(usize, usize)> = {
                let Some(proc) = self.table.procedure(id) else {
                    return Ok(());
                };
                proc.params
                    .iter()
                    .zip(proc.directions.iter())
                    .enumerate()
                    .filter(|(_, (_, direction))| **direction == Direction::In)
                    .map(|(k, (pid, _))| (k, self.table.get(*pid).address().unwrap_or(0)))
                    .collect()
            };
            for (k, address) in copies {
                self.emit.stmt(format_args!(
                    "MM[ R[0].intVal + {address} ] = R[{}];",
                    ARG_BASE + k
                ));
            }
            self.table.alias_into_parent(id);
        }
        Ok(())
    }

    fn parameter_list(&mut self) -> PResult<()> {
        self.parameter()?;
        if self.at(",") {
            self.advance()?;
            self.parameter_list()?;
        }
        Ok(())
    }

    fn parameter(&mut self) -> PResult<()> {
        let before = self
            .current_procedure
            .and_then(|id| self.table.procedure(id))
            .map_or(0, |p| p.arity());

        self.is_parameter = true;
        self.variable_declaration()?;
        self.is_parameter = false;

        if self.at("in") || self.at("out") {
            let direction = if self.at("in") {
                Direction::In
            } else {
                Direction::Out
            };
            if let Some(proc) = self
                .current_procedure
                .and_then(|id| self.table.procedure_mut(id))
            {
                // a malformed parameter may have registered nothing
                if proc.arity() > before {
                    proc.directions.push(direction);
                }
            }
            self.advance()?;
        } else {
            return Err(ParseError::ParameterDirection(self.cur.lexeme.clone()));
        }
        Ok(())
    }

    fn procedure_body(&mut self) -> PResult<()> {
        if self.cur.starts_declaration() {
            self.declarations()?;
        }

        if self.at("begin") {
            let locals = self.frame_locals();
            self.emit
                .stmt(format_args!("R[0].intVal = R[0].intVal - {locals};"));
            self.advance()?;
        } else {
            return Err(ParseError::ExpectedBegin);
        }

        if self.kind() == TokenKind::Identifier
            || self.kind() == TokenKind::Unbound
            || self.at("if")
            || self.at("for")
            || self.at("return")
        {
            self.statements()?;
        }

        if self.cur.starts_declaration() {
            self.error("Incorrect Procedure Body: Declarations must be before 'begin'");
            return self.resync_block("procedure");
        }

        if self.at("end") {
            self.advance()?;
            if self.at("procedure") {
                self.emit_procedure_epilogue();
                self.advance()?;
            } else {
                return Err(ParseError::ProcedureEnd);
            }
        } else {
            return Err(ParseError::ProcedureEnd);
        }
        Ok(())
    }

    fn variable_declaration(&mut self) -> PResult<()> {
        if let Err(error) = self.variable_declaration_inner() {
            let error = recoverable(error)?;
            self.error(&error);
            if self.is_parameter {
                loop {
                    if self.at("in") || self.at("out") {
                        return Ok(());
                    }
                    if self.at(",") || self.at(")") {
                        let at = self.cur.lexeme.clone();
                        self.error(format!(
                            "Expected parameter direction before '{at}'. Not found."
                        ));
                        return Ok(());
                    }
                    self.advance()?;
                }
            } else {
                loop {
                    if self.at(";") {
                        return Ok(());
                    }
                    if self.at("global") || self.cur.is_type_mark() || self.at("begin") {
                        let at = self.cur.lexeme.clone();
                        self.error(format!("Expected ';' before '{at}'. Not found."));
                        return Ok(());
                    }
                    self.advance()?;
                }
            }
        }
        Ok(())
    }

    fn variable_declaration_inner(&mut self) -> PResult<()> {
        let ty = DataType::from_type_mark(&self.cur.lexeme)
            .ok_or_else(|| ParseError::InvalidType(self.cur.lexeme.clone()))?;
        self.advance()?;

        let name = match self.kind() {
            TokenKind::Unbound => {
                let name = self.cur.lexeme.clone();
                self.advance()?;
                name
            }
            TokenKind::Identifier => {
                return Err(ParseError::Redeclared(self.cur.lexeme.clone()))
            }
            TokenKind::Reserved => {
                return Err(ParseError::VariableReserved(self.cur.lexeme.clone()))
            }
            _ => return Err(ParseError::VariableIdentifier(self.cur.lexeme.clone())),
        };

        let mut length = None;
        if self.at("[") {
            self.advance()?;
            if self.kind() == TokenKind::Number {
                if self.cur.lexeme.contains('.') {
                    self.warning("Array size is of type 'float'. Decimal will be truncated.");
                }
                let digits = self
                    .cur
                    .lexeme
                    .split('.')
                    .next()
                    .unwrap_or("");
                length = Some(digits.parse::<usize>().unwrap_or(0));
                self.advance()?;
            } else {
                return Err(ParseError::ArraySize(self.cur.lexeme.clone()));
            }
            if self.at("]") {
                self.advance()?;
            } else {
                return Err(ParseError::ArrayClose);
            }
        }

        let slots = length.unwrap_or(1);
        let address = self.allocate_storage(slots);

        let symbol = match length {
            Some(length) => Symbol::Array(Array {
                name,
                ty,
                address,
                length,
                is_global: self.is_global,
                is_parameter: self.is_parameter,
            }),
            None => Symbol::Variable(Variable {
                name,
                ty,
                address,
                is_global: self.is_global,
                is_parameter: self.is_parameter,
            }),
        };
        let id = self.table.define(symbol);

        if self.is_parameter {
            if let Some(proc) = self
                .current_procedure
                .and_then(|id| self.table.procedure_mut(id))
            {
                proc.params.push(id);
            }
        }
        Ok(())
    }

    /// Picks the storage region a fresh declaration lands in: the global
    /// image, the enclosing procedure's frame, or the top-level frame.
    fn allocate_storage(&mut self, slots: usize) -> usize {
        if self.is_parameter {
            if let Some(proc) = self
                .current_procedure
                .and_then(|id| self.table.procedure_mut(id))
            {
                let address = proc.param_cursor;
                proc.param_cursor += slots;
                return address;
            }
            0
        } else if self.is_global {
            self.emit.alloc_memory(slots)
        } else if let Some(proc) = self
            .current_procedure
            .and_then(|id| self.table.procedure_mut(id))
        {
            let address = proc.local_cursor;
            proc.local_cursor += slots;
            address
        } else {
            let address = self.main_locals;
            self.main_locals += slots;
            address
        }
    }

    // ------------------------------------------------------------------
    // statements

    fn statements(&mut self) -> PResult<()> {
        loop {
            self.emit.reset_regs();
            if let Err(error) = self.statement_dispatch() {
                let error = recoverable(error)?;
                self.error(&error);
                loop {
                    if self.at(";") {
                        break;
                    }
                    self.advance()?;
                }
            }

            if self.at(";") {
                self.advance()?;
            } else {
                return Err(ParseError::ExpectedSemicolon(self.cur.lexeme.clone()));
            }

            if !(self.kind() == TokenKind::Identifier
                || self.at("if")
                || self.at("for")
                || self.at("return"))
            {
                break;
            }
        }
        Ok(())
    }

    fn statement_dispatch(&mut self) -> PResult<()> {
        if self.kind() == TokenKind::Identifier {
            // one token of lookahead splits call from assignment
            match &self.next {
                Some(next) if next.is("(") => self.procedure_call(),
                Some(next) if next.is(":=") || next.is("[") => self.assignment(),
                _ => Err(ParseError::UnknownStatement),
            }
        } else if self.at("if") {
            self.advance()?;
            self.if_statement()
        } else if self.at("for") {
            self.advance()?;
            self.loop_statement()
        } else if self.at("return") {
            self.advance()?;
            self.emit_return();
            Ok(())
        } else if self.kind() == TokenKind::Unbound {
            Err(ParseError::Undeclared(self.cur.lexeme.clone()))
        } else {
            Err(ParseError::UnknownStatement)
        }
    }

    fn emit_return(&mut self) {
        if self.current_procedure.is_some() {
            self.emit_procedure_epilogue();
        } else {
            self.emit.stmt(format_args!("return 0;"));
        }
    }

    fn emit_procedure_epilogue(&mut self) {
        let Some(id) = self.current_procedure else {
            return;
        };
        let (locals, slots, outs) = {
            let Some(proc) = self.table.procedure(id) else {
                return;
            };
            let outs: Vec<(usize, usize)> = proc
                .params
                .iter()
                .zip(proc.directions.iter())
                .enumerate()
                .filter(|(_, (_, direction))| **direction == Direction::Out)
                .map(|(k, (pid, _))| (k, self.table.get(*pid).address().unwrap_or(0)))
                .collect();
            (proc.local_cursor, proc.param_slots(), outs)
        };
        self.emit
            .stmt(format_args!("R[0].intVal = R[0].intVal + {locals};"));
        for (k, address) in outs {
            self.emit.stmt(format_args!(
                "R[{}] = MM[ R[0].intVal + {address} ];",
                ARG_BASE + k
            ));
        }
        self.emit.stmt(format_args!(
            "jumpRegister = MM[ R[0].intVal + {slots} ].jumpTarget;"
        ));
        self.emit.stmt(format_args!("goto *jumpRegister;"));
    }

    fn procedure_call(&mut self) -> PResult<()> {
        let callee = self.cur.lexeme.clone();
        let Some((id, _)) = self.table.resolve(&callee) else {
            return Err(ParseError::ProcedureNotFound(callee));
        };
        let Some(proc) = self.table.procedure(id) else {
            return Err(ParseError::NotProcedure(callee));
        };
        if proc.builtin {
            if let Some(runtime) = RuntimeProc::from_name(&callee) {
                self.emit.mark_runtime(runtime);
            }
        }

        // past the identifier and the "(" the lookahead already confirmed
        self.advance()?;
        self.advance()?;

        let mut count = 0;
        let mut copy_back = String::new();
        if self.cur.starts_expression() {
            self.argument_list(id, 0, &mut count, &mut copy_back)?;
        }

        let (arity, slots) = {
            let Some(proc) = self.table.procedure(id) else {
                return Err(ParseError::NotProcedure(callee));
            };
            (proc.arity(), proc.param_slots())
        };
        if count < arity {
            self.error("Too few arguments in procedure call");
        }

        if self.at(")") {
            self.advance()?;
        } else {
            return Err(ParseError::Parentheses);
        }

        let site = self
            .table
            .procedure_mut(id)
            .map_or(0, Procedure::next_return_site);
        self.emit
            .stmt(format_args!("R[0].intVal = R[0].intVal - 1;"));
        self.emit.stmt(format_args!(
            "MM[ R[0].intVal ].jumpTarget = &&{callee}_return{site};"
        ));
        self.emit
            .stmt(format_args!("R[0].intVal = R[0].intVal - {slots};"));
        self.emit.stmt(format_args!("goto {callee}_start;"));
        self.emit.label(format_args!("{callee}_return{site}"));
        self.emit
            .stmt(format_args!("R[0].intVal = R[0].intVal + {};", slots + 1));
        self.emit.raw(&copy_back);
        Ok(())
    }

    fn argument_list(
        &mut self,
        proc: SymbolId,
        k: usize,
        count: &mut usize,
        copy_back: &mut String,
    ) -> PResult<()> {
        use std::fmt::Write;

        let (formal_ty, direction) = {
            let Some(record) = self.table.procedure(proc) else {
                return Err(ParseError::NotProcedure(self.cur.lexeme.clone()));
            };
            if k >= record.arity() {
                return Err(ParseError::TooManyArguments);
            }
            let formal_ty = self
                .table
                .get(record.params[k])
                .data_type()
                .unwrap_or(DataType::Invalid);
            let direction = record.directions.get(k).copied().unwrap_or(Direction::In);
            (formal_ty, direction)
        };

        // a bare name can receive an out result; anything fancier would need
        // registers the callee is free to clobber
        let plain_name = self.kind() == TokenKind::Identifier
            && matches!(&self.next, Some(next) if next.is(",") || next.is(")"));
        let destination = plain_name.then(|| (self.cur.lexeme.clone(), self.cur.is_global));

        let argument = self.expression()?;
        if argument.ty != formal_ty {
            self.error(format!("Incompatible data type in argument {k}"));
        }
        self.emit.stmt(format_args!(
            "R[{}] = R[{}];",
            ARG_BASE + k,
            argument.reg
        ));

        if direction == Direction::Out {
            if let Some((name, is_global)) = destination {
                if let Some(id) = self.table.lookup_in(&name, is_global) {
                    let cell = self.mm_cell(id, None);
                    let _ = writeln!(copy_back, "\t{cell} = R[{}];", ARG_BASE + k);
                }
            }
        }

        *count += 1;
        if self.at(",") {
            self.advance()?;
            self.argument_list(proc, k + 1, count, copy_back)?;
        }
        Ok(())
    }

    fn assignment(&mut self) -> PResult<()> {
        let destination = match self.destination() {
            Ok(destination) => destination,
            Err(error) => {
                let error = recoverable(error)?;
                self.error(&error);
                loop {
                    if self.at(":=") {
                        break;
                    }
                    if self.at(";") {
                        return Err(error);
                    }
                    self.advance()?;
                }
                NameRef::invalid()
            }
        };

        if self.at(":=") {
            self.advance()?;
        } else {
            return Err(ParseError::InvalidStatement);
        }

        let source = self.expression()?;
        self.check_and_store(&destination, source);
        Ok(())
    }

    fn check_and_store(&mut self, destination: &NameRef, source: expr::Operand) {
        let cell = &destination.cell;
        let reg = source.reg;
        match destination.ty {
            DataType::Bool => match source.ty {
                DataType::Bool => {
                    self.emit
                        .stmt(format_args!("{cell}.intVal = R[{reg}].intVal;"));
                }
                DataType::Integer => {
                    self.emit.stmt(format_args!(
                        "if( R[{reg}].intVal < 0 || R[{reg}].intVal > 1 ) goto runtimeerror;"
                    ));
                    self.emit
                        .stmt(format_args!("{cell}.intVal = R[{reg}].intVal;"));
                }
                _ => self.error("Incompatible data types in assignment statement"),
            },
            DataType::Integer => match source.ty {
                DataType::Bool | DataType::Integer => {
                    self.emit
                        .stmt(format_args!("{cell}.intVal = R[{reg}].intVal;"));
                }
                DataType::Float => {
                    // C truncates on the int store
                    self.emit
                        .stmt(format_args!("{cell}.intVal = R[{reg}].floatVal;"));
                }
                _ => self.error("Incompatible data types in assignment statement"),
            },
            DataType::Float => match source.ty {
                DataType::Float => {
                    self.emit
                        .stmt(format_args!("{cell}.floatVal = R[{reg}].floatVal;"));
                }
                DataType::Integer => {
                    self.emit
                        .stmt(format_args!("{cell}.floatVal = R[{reg}].intVal;"));
                }
                _ => self.error("Incompatible data types in assignment statement"),
            },
            DataType::Str => {
                if source.ty == DataType::Str {
                    self.emit.stmt(format_args!(
                        "{cell}.stringPointer = R[{reg}].stringPointer;"
                    ));
                } else {
                    self.error("Incompatible data types in assignment statement");
                }
            }
            DataType::Invalid => {
                self.error("Unknown data type in destination of assignment statement");
            }
        }
    }

    fn if_statement(&mut self) -> PResult<()> {
        if let Err(error) = self.if_inner() {
            let error = recoverable(error)?;
            self.error(&error);
            self.resync_block("if")?;
        }
        Ok(())
    }

    fn if_inner(&mut self) -> PResult<()> {
        if self.at("(") {
            self.advance()?;
        } else {
            return Err(ParseError::IfOpen);
        }

        let condition = self.expression()?;
        if !condition.ty.logical() {
            self.error("Conditional expression must evaluate to boolean data type");
        }
        let id = self.emit.next_if_id();
        self.emit.stmt(format_args!(
            "if( R[{}].intVal == 1 ) goto if{id}_start;",
            condition.reg
        ));
        self.emit.stmt(format_args!("goto else{id}_start;"));
        self.emit.label(format_args!("if{id}_start"));

        if self.at(")") {
            self.advance()?;
        } else {
            return Err(ParseError::IfClose);
        }
        if self.at("then") {
            self.advance()?;
        } else {
            return Err(ParseError::IfThen);
        }

        self.statements()?;
        self.emit.stmt(format_args!("goto endif{id};"));
        self.emit.label(format_args!("else{id}_start"));

        if self.at("else") {
            self.advance()?;
            self.statements()?;
        }
        self.emit.label(format_args!("endif{id}"));

        if self.at("end") {
            self.advance()?;
            if self.at("if") {
                self.advance()?;
            } else {
                return Err(ParseError::IfEnd);
            }
        } else {
            return Err(ParseError::IfEnd);
        }
        Ok(())
    }

    fn loop_statement(&mut self) -> PResult<()> {
        if let Err(error) = self.loop_inner() {
            let error = recoverable(error)?;
            self.error(&error);
            self.resync_block("for")?;
        }
        Ok(())
    }

    fn loop_inner(&mut self) -> PResult<()> {
        if self.at("(") {
            self.advance()?;
        } else {
            return Err(ParseError::LoopOpen);
        }

        if let Err(error) = self.assignment() {
            let error = recoverable(error)?;
            self.error(&error);
            loop {
                if self.at(";") {
                    break;
                }
                self.advance()?;
            }
        }

        if self.at(";") {
            self.advance()?;
        } else {
            return Err(ParseError::LoopSemicolon);
        }

        let id = self.emit.next_loop_id();
        self.emit.label(format_args!("loop{id}_check"));

        let condition = self.expression()?;
        if !condition.ty.logical() {
            self.error("Conditional expression must evaluate to boolean data type");
        }
        self.emit.stmt(format_args!(
            "if( R[{}].intVal == 1 ) goto loop{id}_start;",
            condition.reg
        ));
        self.emit.stmt(format_args!("goto endloop{id};"));
        self.emit.label(format_args!("loop{id}_start"));

        if self.at(")") {
            self.advance()?;
        } else {
            return Err(ParseError::LoopClose);
        }

        if self.kind() == TokenKind::Identifier || self.at("if") || self.at("for") || self.at("return")
        {
            self.statements()?;
        }
        self.emit.stmt(format_args!("goto loop{id}_check;"));
        self.emit.label(format_args!("endloop{id}"));

        if self.at("end") {
            self.advance()?;
            if self.at("for") {
                self.advance()?;
            } else {
                return Err(ParseError::LoopEnd);
            }
        } else {
            return Err(ParseError::LoopEnd);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // recovery

    /// Panic-mode resync past the matching `end <keyword>`, tracking nested
    /// openers so an inner block's terminator is not mistaken for ours.
    fn resync_block(&mut self, keyword: &str) -> PResult<()> {
        let mut nested = 0usize;
        loop {
            if self.at(keyword) {
                nested += 1;
            } else if self.at("end") {
                self.advance()?;
                if self.at(keyword) {
                    self.advance()?;
                    if nested == 0 {
                        return Ok(());
                    }
                    nested -= 1;
                    continue;
                }
            }
            self.advance()?;
        }
    }

    // ------------------------------------------------------------------
    // addressing

    /// Slot count of the enclosing procedure's locals; 0 at top level.
    fn frame_locals(&self) -> usize {
        self.current_procedure
            .and_then(|id| self.table.procedure(id))
            .map_or(0, |proc| proc.local_cursor)
    }

    /// The C lvalue for a symbol's memory cell, optionally subscripted by an
    /// index register.
    fn mm_cell(&self, id: SymbolId, index: Option<usize>) -> String {
        let symbol = self.table.get(id);
        let address = symbol.address().unwrap_or(0);
        let base = if symbol.is_global() {
            address.to_string()
        } else if symbol.is_parameter() {
            // parameters sit above the locals in the frame
            format!("R[0].intVal + {}", address + self.frame_locals())
        } else {
            format!("R[0].intVal + {address}")
        };
        match index {
            Some(reg) => format!("MM[ {base} + R[{reg}].intVal ]"),
            None => format!("MM[ {base} ]"),
        }
    }
}
