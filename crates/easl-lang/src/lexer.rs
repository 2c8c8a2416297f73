use std::fmt;

use easl_core::EaslError;

/// Source location for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        if other.end <= self.start {
            return Span::new(other.start, self.end, other.line, other.column);
        }
        Span::new(self.start, self.end.max(other.end), self.line, self.column)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Suffix attached to a numeric literal. Only the shape is recorded here,
/// the checker decides whether it fits the literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberSuffix {
    I32,
    U32,
    F32,
}

impl fmt::Display for NumberSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberSuffix::I32 => write!(f, "i32"),
            NumberSuffix::U32 => write!(f, "u32"),
            NumberSuffix::F32 => write!(f, "f32"),
        }
    }
}

/// A numeric literal as written in source.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    /// Digits, sign, fraction and exponent, without the suffix.
    pub text: String,
    /// True when the literal has a fraction or an exponent.
    pub is_float: bool,
    pub suffix: Option<NumberSuffix>,
    /// Suffix spelling as written (`u`, `u32`, ...), kept for the formatter.
    pub suffix_text: String,
}

impl fmt::Display for NumberLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.text, self.suffix_text)
    }
}

/// Token kinds in EASL.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Def,
    Defn,
    Struct,
    Let,
    If,
    True,
    False,
    Vertex,
    Fragment,

    // Literals
    Identifier(String),
    Number(NumberLiteral),
    StringLiteral(String),
    /// `.name`, field access or swizzle.
    Accessor(String),

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Colon,

    Eof,
}

impl TokenKind {
    pub fn is_open(&self) -> bool {
        matches!(self, TokenKind::LeftParen | TokenKind::LeftBracket)
    }

    pub fn is_close(&self) -> bool {
        matches!(self, TokenKind::RightParen | TokenKind::RightBracket)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Def => write!(f, "def"),
            TokenKind::Defn => write!(f, "defn"),
            TokenKind::Struct => write!(f, "struct"),
            TokenKind::Let => write!(f, "let"),
            TokenKind::If => write!(f, "if"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Vertex => write!(f, "vertex"),
            TokenKind::Fragment => write!(f, "fragment"),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::StringLiteral(s) => write!(f, "\"{}\"", s),
            TokenKind::Accessor(s) => write!(f, ".{}", s),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBracket => write!(f, "["),
            TokenKind::RightBracket => write!(f, "]"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// A comment skipped by the lexer. Kept aside so the formatter can put it back.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

/// Unrecoverable lexing failure. Aborts the whole compilation unit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at {}:{}", span.line, span.column)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl From<LexError> for EaslError {
    fn from(err: LexError) -> Self {
        EaslError::lex(err.message, err.span.line, err.span.column)
    }
}

fn is_symbol_char(c: char) -> bool {
    matches!(c, '_' | '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '?' | '&' | '|')
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | ';' | ':' | '"')
}

/// The EASL lexer. Produces tokens lazily through its `Iterator` impl;
/// whitespace and comments are skipped but still advance line/column.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    comments: Vec<Comment>,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            comments: Vec::new(),
            finished: false,
        }
    }

    /// Tokenize the entire source into a Vec of tokens ending with `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    /// Comments seen so far, in source order.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn into_comments(self) -> Vec<Comment> {
        self.comments
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>, start: usize, line: usize, column: usize) -> LexError {
        LexError {
            message: message.into(),
            span: Span::new(start, self.pos.max(start), line, column),
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                let (start, line, column) = (self.pos, self.line, self.column);
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                self.push_comment(start, line, column);
            } else if ch == '#' && self.peek_next() == Some('|') {
                let (start, line, column) = (self.pos, self.line, self.column);
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('|') if self.peek() == Some('#') => {
                            self.advance();
                            break;
                        }
                        Some(_) => {}
                        None => {
                            return Err(self.error("unterminated block comment", start, line, column));
                        }
                    }
                }
                self.push_comment(start, line, column);
            } else {
                break;
            }
        }
        Ok(())
    }

    fn push_comment(&mut self, start: usize, line: usize, column: usize) {
        let text = self.source[start..self.pos].trim_end().to_string();
        self.comments.push(Comment {
            text,
            span: Span::new(start, self.pos, line, column),
        });
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments()?;

        let start = self.pos;
        let line = self.line;
        let column = self.column;

        let ch = match self.peek() {
            Some(ch) => ch,
            None => {
                return Ok(Token::new(
                    TokenKind::Eof,
                    Span::new(start, start, line, column),
                ));
            }
        };

        let kind = match ch {
            '(' => {
                self.advance();
                TokenKind::LeftParen
            }
            ')' => {
                self.advance();
                TokenKind::RightParen
            }
            '[' => {
                self.advance();
                TokenKind::LeftBracket
            }
            ']' => {
                self.advance();
                TokenKind::RightBracket
            }
            ':' => {
                self.advance();
                TokenKind::Colon
            }
            '"' => self.read_string(start, line, column)?,
            '.' if self.peek_next().is_some_and(|c| c.is_alphabetic() || c == '_') => {
                self.advance();
                let name = self.read_while(|c| c.is_alphanumeric() || c == '_');
                TokenKind::Accessor(name)
            }
            c if c.is_ascii_digit() => self.read_number(start, line, column)?,
            '-' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number(start, line, column)?
            }
            c if c.is_alphabetic() || is_symbol_char(c) => {
                let ident = self.read_while(|c| c.is_alphanumeric() || is_symbol_char(c));
                match ident.as_str() {
                    "def" => TokenKind::Def,
                    "defn" => TokenKind::Defn,
                    "struct" => TokenKind::Struct,
                    "let" => TokenKind::Let,
                    "if" => TokenKind::If,
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "vertex" => TokenKind::Vertex,
                    "fragment" => TokenKind::Fragment,
                    _ => TokenKind::Identifier(ident),
                }
            }
            _ => {
                self.advance();
                return Err(self.error(format!("unexpected character '{}'", ch), start, line, column));
            }
        };

        Ok(Token::new(kind, Span::new(start, self.pos, line, column)))
    }

    fn read_string(&mut self, start: usize, line: usize, column: usize) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('"') => s.push('"'),
                        Some('\\') => s.push('\\'),
                        Some(c) => s.push(c),
                        None => {
                            return Err(self.error("unterminated string literal", start, line, column));
                        }
                    }
                }
                Some(c) => {
                    self.advance();
                    s.push(c);
                }
                None => {
                    return Err(self.error("unterminated string literal", start, line, column));
                }
            }
        }
        Ok(TokenKind::StringLiteral(s))
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            self.advance();
            text.push('-');
        }
        text.push_str(&self.read_while(|c| c.is_ascii_digit()));

        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            text.push('.');
            text.push_str(&self.read_while(|c| c.is_ascii_digit()));
            is_float = true;
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = self.source[self.pos..].chars().skip(1);
            let next = lookahead.next();
            let exponent_follows = match next {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => lookahead.next().is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if exponent_follows {
                text.push(self.advance().unwrap_or('e'));
                if matches!(self.peek(), Some('+') | Some('-')) {
                    text.push(self.advance().unwrap_or('+'));
                }
                text.push_str(&self.read_while(|c| c.is_ascii_digit()));
                is_float = true;
            }
        }

        let suffix_text = self.read_while(|c| c.is_alphanumeric() || c == '_');
        let suffix = match suffix_text.as_str() {
            "" => None,
            "i" | "i32" => Some(NumberSuffix::I32),
            "u" | "u32" => Some(NumberSuffix::U32),
            "f" | "f32" => Some(NumberSuffix::F32),
            other => {
                return Err(self.error(
                    format!("invalid numeric suffix '{}' on {}", other, text),
                    start,
                    line,
                    column,
                ));
            }
        };

        if let Some(c) = self.peek() {
            if !is_delimiter(c) {
                return Err(self.error(format!("invalid character '{}' in number", c), start, line, column));
            }
        }

        Ok(TokenKind::Number(NumberLiteral {
            text,
            is_float,
            suffix,
            suffix_text,
        }))
    }

    fn read_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut result = String::new();
        while let Some(ch) = self.peek() {
            if predicate(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        match &token {
            Ok(t) if t.kind == TokenKind::Eof => self.finished = true,
            Err(_) => self.finished = true,
            _ => {}
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let tokens = lexer.tokenize().unwrap();
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn number(text: &str, is_float: bool, suffix: Option<NumberSuffix>, suffix_text: &str) -> TokenKind {
        TokenKind::Number(NumberLiteral {
            text: text.into(),
            is_float,
            suffix,
            suffix_text: suffix_text.into(),
        })
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize("def defn struct let if vertex fragment");
        assert_eq!(tokens[0], TokenKind::Def);
        assert_eq!(tokens[1], TokenKind::Defn);
        assert_eq!(tokens[2], TokenKind::Struct);
        assert_eq!(tokens[3], TokenKind::Let);
        assert_eq!(tokens[4], TokenKind::If);
        assert_eq!(tokens[5], TokenKind::Vertex);
        assert_eq!(tokens[6], TokenKind::Fragment);
    }

    #[test]
    fn test_constant_form() {
        let tokens = tokenize("(def triangles: u32 5)");
        assert_eq!(tokens[0], TokenKind::LeftParen);
        assert_eq!(tokens[1], TokenKind::Def);
        assert_eq!(tokens[2], TokenKind::Identifier("triangles".into()));
        assert_eq!(tokens[3], TokenKind::Colon);
        assert_eq!(tokens[4], TokenKind::Identifier("u32".into()));
        assert_eq!(tokens[5], number("5", false, None, ""));
        assert_eq!(tokens[6], TokenKind::RightParen);
        assert_eq!(tokens[7], TokenKind::Eof);
    }

    #[test]
    fn test_number_suffixes() {
        let tokens = tokenize("5u32 5u 1.5f32 3i -2 2e3 1.5u32");
        assert_eq!(tokens[0], number("5", false, Some(NumberSuffix::U32), "u32"));
        assert_eq!(tokens[1], number("5", false, Some(NumberSuffix::U32), "u"));
        assert_eq!(tokens[2], number("1.5", true, Some(NumberSuffix::F32), "f32"));
        assert_eq!(tokens[3], number("3", false, Some(NumberSuffix::I32), "i"));
        assert_eq!(tokens[4], number("-2", false, None, ""));
        assert_eq!(tokens[5], number("2e3", true, None, ""));
        // shape only: a float with an integer suffix is the checker's problem
        assert_eq!(tokens[6], number("1.5", true, Some(NumberSuffix::U32), "u32"));
    }

    #[test]
    fn test_operators_are_identifiers() {
        let tokens = tokenize("(+ a b) (- x) (<= a b)");
        assert_eq!(tokens[1], TokenKind::Identifier("+".into()));
        assert_eq!(tokens[6], TokenKind::Identifier("-".into()));
        assert_eq!(tokens[10], TokenKind::Identifier("<=".into()));
    }

    #[test]
    fn test_accessor() {
        let tokens = tokenize("(.xy pos)");
        assert_eq!(tokens[1], TokenKind::Accessor("xy".into()));
        assert_eq!(tokens[2], TokenKind::Identifier("pos".into()));
    }

    #[test]
    fn test_comments_skipped_positions_kept() {
        let mut lexer = Lexer::new("; header\n#| block\n comment |# (def x: f32 1.0)");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::LeftParen);
        assert_eq!(tokens[0].span.line, 3);
        assert_eq!(tokens[0].span.column, 13);
        assert_eq!(lexer.comments().len(), 2);
        assert_eq!(lexer.comments()[0].text, "; header");
    }

    #[test]
    fn test_byte_offsets() {
        let mut lexer = Lexer::new("(a\n  bb)");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Identifier("bb".into()));
        assert_eq!(tokens[2].span.start, 5);
        assert_eq!(tokens[2].span.end, 7);
        assert_eq!(tokens[2].span.line, 2);
        assert_eq!(tokens[2].span.column, 3);
    }

    #[test]
    fn test_lazy_iteration_stops_after_eof() {
        let lexer = Lexer::new("a b");
        let kinds: Vec<_> = lexer.map(|t| t.unwrap().kind).collect();
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds[2], TokenKind::Eof);
    }

    #[test]
    fn test_invalid_char() {
        let mut lexer = Lexer::new("(def x: f32 §)");
        let err = lexer.tokenize().unwrap_err();
        assert!(err.message.contains("unexpected character"));
        assert_eq!(err.span.column, 13);
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"hello");
        assert!(lexer.tokenize().is_err());
    }

    #[test]
    fn test_unterminated_block_comment() {
        let mut lexer = Lexer::new("#| never closed");
        let err = lexer.tokenize().unwrap_err();
        assert!(err.message.contains("block comment"));
    }

    #[test]
    fn test_bad_suffix() {
        let mut lexer = Lexer::new("5q");
        assert!(lexer.tokenize().is_err());
    }

    #[test]
    fn test_escape_sequences() {
        let tokens = tokenize(r#""hello\nworld""#);
        assert_eq!(tokens[0], TokenKind::StringLiteral("hello\nworld".into()));
    }
}
