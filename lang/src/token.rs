use derive_more::Display;

/// Classification of a scanned token.
///
/// Identifier-shaped lexemes are classified by symbol-table lookup; `Unbound`
/// means the name is not declared in any visible scope, and `Unknown` is the
/// scanner's pre-classification sentinel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum TokenKind {
    #[display("reserved word")]
    Reserved,
    #[display("operator")]
    Operator,
    #[display("identifier")]
    Identifier,
    #[display("number")]
    Number,
    #[display("string literal")]
    StringLit,
    #[display("unbound name")]
    Unbound,
    #[display("unknown")]
    Unknown,
}

/// One token as handed from the scanner to the parser.
///
/// `is_global` is a scope hint filled in by symbol lookup, never by the
/// lexer itself.
#[derive(Clone, Debug)]
pub struct TokenFrame {
    pub kind: TokenKind,
    pub lexeme: String,
    pub is_global: bool,
}

impl TokenFrame {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            is_global: false,
        }
    }

    pub fn is(&self, text: &str) -> bool {
        self.lexeme == text
    }

    pub fn is_type_mark(&self) -> bool {
        matches!(self.lexeme.as_str(), "integer" | "float" | "bool" | "string")
    }

    pub fn starts_declaration(&self) -> bool {
        self.is("global") || self.is("procedure") || self.is_type_mark()
    }

    pub fn starts_expression(&self) -> bool {
        self.is("(")
            || self.is("-")
            || self.is("true")
            || self.is("false")
            || matches!(
                self.kind,
                TokenKind::Identifier | TokenKind::Number | TokenKind::StringLit
            )
    }
}

impl Default for TokenFrame {
    fn default() -> Self {
        Self::new(TokenKind::Unknown, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_marks() {
        for word in ["integer", "float", "bool", "string"] {
            assert!(TokenFrame::new(TokenKind::Reserved, word).is_type_mark());
            assert!(TokenFrame::new(TokenKind::Reserved, word).starts_declaration());
        }
        assert!(!TokenFrame::new(TokenKind::Reserved, "begin").is_type_mark());
    }

    #[test]
    fn expression_starters() {
        assert!(TokenFrame::new(TokenKind::Number, "42").starts_expression());
        assert!(TokenFrame::new(TokenKind::Operator, "(").starts_expression());
        assert!(TokenFrame::new(TokenKind::Operator, "-").starts_expression());
        assert!(TokenFrame::new(TokenKind::Reserved, "true").starts_expression());
        // an undeclared name is not a legal expression start
        assert!(!TokenFrame::new(TokenKind::Unbound, "y").starts_expression());
        assert!(!TokenFrame::new(TokenKind::Operator, ")").starts_expression());
    }
}
