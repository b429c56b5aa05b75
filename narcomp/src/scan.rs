use crate::diag::Diagnostics;
use lang::{TokenFrame, TokenKind};
use symtab::SymbolTable;
use util::SliceIter;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CharClass {
    Letter,
    Digit,
    Punctuation,
    Illegal,
}

fn class_of(byte: u8) -> CharClass {
    match byte {
        b if b.is_ascii_alphabetic() => CharClass::Letter,
        b'0'..=b'9' => CharClass::Digit,
        b':' | b';' | b',' | b'+' | b'-' | b'*' | b'/' | b'(' | b')' | b'<' | b'>' | b'!'
        | b'=' | b'{' | b'}' | b'"' | b'&' | b'|' | b'[' | b']' => CharClass::Punctuation,
        _ => CharClass::Illegal,
    }
}

const fn string_character(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b' ' | b'_' | b',' | b';' | b':' | b'.' | b'\'')
}

/// On-demand tokenizer over the raw source bytes.
///
/// Identifier-shaped lexemes are classified against the symbol table at scan
/// time, so the token a caller receives already knows whether its name is a
/// reserved word, a declared identifier, or unbound. Lexical trouble is
/// always a warning; only exhausting the input ends the token stream.
pub struct Scanner<'a> {
    chars: SliceIter<'a, u8>,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            chars: SliceIter::new(source),
            line: 1,
        }
    }

    /// Current 1-based source line; monotonically non-decreasing.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Produces the next token, or `None` at end of input.
    pub fn next_token(
        &mut self,
        table: &SymbolTable,
        diag: &mut Diagnostics,
    ) -> Option<TokenFrame> {
        loop {
            self.skip_whitespace();
            let next = self.chars.peek()?;
            match class_of(next) {
                CharClass::Letter => return Some(self.identifier(table)),
                CharClass::Digit => return Some(self.number()),
                CharClass::Punctuation => match next {
                    b'/' => {
                        self.chars.next();
                        if self.chars.peek() == Some(b'/') {
                            self.skip_line_comment();
                            continue;
                        }
                        return Some(operator("/"));
                    }
                    b'<' | b'>' | b'!' | b':' => {
                        self.chars.next();
                        if self.chars.next_if_eq(b'=').is_some() {
                            return Some(operator(format!("{}=", next as char)));
                        }
                        if next == b'!' {
                            diag.warning(self.line, "Illegal character: '!'. Assuming whitespace.");
                            continue;
                        }
                        return Some(operator(next as char));
                    }
                    b'"' => return Some(self.string_literal(diag)),
                    _ => {
                        self.chars.next();
                        return Some(operator(next as char));
                    }
                },
                CharClass::Illegal => {
                    self.chars.next();
                    diag.warning(self.line, "Illegal character found. Assuming whitespace.");
                }
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(byte) = self.chars.next_if(|b| b.is_ascii_whitespace()) {
            if byte == b'\n' {
                self.line += 1;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        // the second '/' and the rest of the line, newline included
        for byte in self.chars.by_ref() {
            if byte == b'\n' {
                self.line += 1;
                break;
            }
        }
    }

    fn identifier(&mut self, table: &SymbolTable) -> TokenFrame {
        let mut lexeme = String::new();
        while let Some(byte) = self
            .chars
            .next_if(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            lexeme.push(byte as char);
        }
        match table.classify(&lexeme) {
            Some((kind, is_global)) => {
                let mut token = TokenFrame::new(kind, lexeme);
                token.is_global = is_global;
                token
            }
            None => TokenFrame::new(TokenKind::Unbound, lexeme),
        }
    }

    /// Digits with elided underscores, optionally one fractional part.
    fn number(&mut self) -> TokenFrame {
        let mut lexeme = String::new();
        while let Some(byte) = self.chars.next_if(|b| b.is_ascii_digit() || b == b'_') {
            if byte != b'_' {
                lexeme.push(byte as char);
            }
        }
        if self.chars.next_if_eq(b'.').is_some() {
            lexeme.push('.');
            while let Some(byte) = self.chars.next_if(|b| b.is_ascii_digit() || b == b'_') {
                if byte != b'_' {
                    lexeme.push(byte as char);
                }
            }
        }
        TokenFrame::new(TokenKind::Number, lexeme)
    }

    /// Quoted string. Illegal interiors synthesize a close quote; the
    /// offending byte stays in the stream and is re-reported on its own.
    fn string_literal(&mut self, diag: &mut Diagnostics) -> TokenFrame {
        let mut lexeme = String::from('"');
        self.chars.next();
        loop {
            match self.chars.peek() {
                Some(b'"') => {
                    self.chars.next();
                    lexeme.push('"');
                    break;
                }
                Some(b'\n') => {
                    diag.warning(
                        self.line,
                        "Unexpected end of line in string literal. Assuming end of string literal.",
                    );
                    self.chars.next();
                    self.line += 1;
                    lexeme.push('"');
                    break;
                }
                Some(byte) if string_character(byte) => {
                    self.chars.next();
                    lexeme.push(byte as char);
                }
                Some(_) => {
                    diag.warning(
                        self.line,
                        "Encountered illegal character in string literal. Assuming end of string literal.",
                    );
                    lexeme.push('"');
                    break;
                }
                None => {
                    diag.warning(
                        self.line,
                        "Unexpected end of line in string literal. Assuming end of string literal.",
                    );
                    lexeme.push('"');
                    break;
                }
            }
        }
        TokenFrame::new(TokenKind::StringLit, lexeme)
    }
}

fn operator(lexeme: impl ToString) -> TokenFrame {
    TokenFrame::new(TokenKind::Operator, lexeme.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &[u8]) -> (Vec<TokenFrame>, usize, usize) {
        let table = SymbolTable::new();
        let mut diag = Diagnostics::new();
        let mut scanner = Scanner::new(source);
        let mut tokens = Vec::new();
        while let Some(token) = scanner.next_token(&table, &mut diag) {
            tokens.push(token);
        }
        (tokens, scanner.line(), diag.warnings())
    }

    fn lexemes(source: &[u8]) -> Vec<String> {
        scan_all(source).0.into_iter().map(|t| t.lexeme).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        let (tokens, _, warnings) = scan_all(b"program demo is");
        assert_eq!(warnings, 0);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].kind, TokenKind::Reserved);
        assert!(tokens[0].is_global);
        assert_eq!(tokens[1].kind, TokenKind::Unbound);
        assert_eq!(tokens[1].lexeme, "demo");
        assert_eq!(tokens[2].kind, TokenKind::Reserved);
    }

    #[test]
    fn every_token_has_a_lexeme() {
        let (tokens, _, _) = scan_all(b"integer a_1; a_1 := 2_000 + 3.1_4;");
        assert!(!tokens.is_empty());
        assert!(tokens.iter().all(|t| !t.lexeme.is_empty()));
    }

    #[test]
    fn numbers_elide_underscores() {
        let (tokens, _, _) = scan_all(b"1_000 3._1_4 7.");
        assert_eq!(tokens[0].lexeme, "1000");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[1].lexeme, "3.14");
        assert_eq!(tokens[2].lexeme, "7.");
    }

    #[test]
    fn two_character_operators() {
        assert_eq!(
            lexemes(b"<= >= != := < > : ="),
            ["<=", ">=", "!=", ":=", "<", ">", ":", "="]
        );
    }

    #[test]
    fn bare_bang_is_a_warning() {
        let (tokens, _, warnings) = scan_all(b"a ! b");
        assert_eq!(warnings, 1);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn comments_are_skipped_and_lines_counted() {
        let (tokens, line, warnings) = scan_all(b"begin // trailing words\nend");
        assert_eq!(warnings, 0);
        assert_eq!(tokens.len(), 2);
        assert_eq!(line, 2);
    }

    #[test]
    fn string_literal_keeps_quotes() {
        let (tokens, _, warnings) = scan_all(b"\"hello, world.\"");
        assert_eq!(warnings, 0);
        assert_eq!(tokens[0].kind, TokenKind::StringLit);
        assert_eq!(tokens[0].lexeme, "\"hello, world.\"");
    }

    #[test]
    fn unterminated_string_synthesizes_close() {
        let (tokens, line, warnings) = scan_all(b"\"oops\nbegin");
        assert_eq!(warnings, 1);
        assert_eq!(tokens[0].lexeme, "\"oops\"");
        assert_eq!(tokens[1].lexeme, "begin");
        assert_eq!(line, 2);
    }

    #[test]
    fn illegal_character_in_string_is_left_in_the_stream() {
        // warned once for the string, once when '%' comes back around as a
        // token, and once more for the re-opened string hitting end of input
        let (tokens, _, warnings) = scan_all(b"\"ab%cd\"");
        assert_eq!(tokens[0].lexeme, "\"ab\"");
        assert_eq!(tokens[1].lexeme, "cd");
        assert_eq!(tokens[2].lexeme, "\"\"");
        assert_eq!(warnings, 3);
    }

    #[test]
    fn illegal_characters_are_whitespace() {
        let (tokens, _, warnings) = scan_all(b"a @ b # c");
        assert_eq!(warnings, 2);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn line_numbers_never_decrease() {
        let table = SymbolTable::new();
        let mut diag = Diagnostics::new();
        let mut scanner = Scanner::new(b"a\nb\n\nc d\ne");
        let mut last = scanner.line();
        while scanner.next_token(&table, &mut diag).is_some() {
            assert!(scanner.line() >= last);
            last = scanner.line();
        }
        assert_eq!(last, 5);
    }
}
