use std::fmt::Display;

/// The enum variants are in SCREAMING_SNAKE_CASE as they technically
/// represent constants, but Rust does not allow const enum variants.
#[allow(nonstandard_style)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TokenKind {
    // Symbols
    LPAREN,
    RPAREN,
    LBRACE,
    RBRACE,
    LBRACKET,
    RBRACKET,
    COMMA,
    DOT,
    COLON,
    // Arithmetic
    PLUS,
    MINUS,
    STAR,
    SLASH,
    SLASH_SLASH,
    MODULO,
    STAR_STAR,
    INCREMENT,
    DECREMENT,
    // Logical
    BANG,
    AND_AND,
    OR_OR,
    CARET_CARET,
    // Comparisons
    BANG_EQUAL,
    EQUAL_EQUAL,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,
    // Assignment
    EQUAL,
    PLUS_EQUAL,
    MINUS_EQUAL,
    STAR_EQUAL,
    SLASH_EQUAL,
    SLASH_SLASH_EQUAL,
    MODULO_EQUAL,
    STAR_STAR_EQUAL,
    AND_AND_EQUAL,
    OR_OR_EQUAL,
    CARET_CARET_EQUAL,
    // Literals
    IDENT,
    STRING,
    BYTES,
    NUMBER,
    // Keywords
    AS,
    BREAK,
    CASE,
    CONST,
    CONTINUE,
    DEFAULT,
    DEFER,
    ELSE,
    FALLTHROUGH,
    FALSE,
    FOR,
    FUNC,
    IF,
    IN,
    NULL,
    RETURN,
    SWITCH,
    TRUE,
    VAR,
    WHILE,
    // Miscellaneous tokens
    EOL,
    EOF,
}

impl TokenKind {
    pub fn from_keyword(kw: &str) -> Option<Self> {
        let token = match kw {
            "as" => Self::AS,
            "break" => Self::BREAK,
            "case" => Self::CASE,
            "const" => Self::CONST,
            "continue" => Self::CONTINUE,
            "default" => Self::DEFAULT,
            "defer" => Self::DEFER,
            "else" => Self::ELSE,
            "fallthrough" => Self::FALLTHROUGH,
            "false" => Self::FALSE,
            "for" => Self::FOR,
            "func" => Self::FUNC,
            "if" => Self::IF,
            "in" => Self::IN,
            "null" => Self::NULL,
            "return" => Self::RETURN,
            "switch" => Self::SWITCH,
            "true" => Self::TRUE,
            "var" => Self::VAR,
            "while" => Self::WHILE,
            _ => return None,
        };
        Some(token)
    }

    /// Whether this token may close a statement.
    pub fn ends_statement(self) -> bool {
        matches!(self, Self::EOL | Self::EOF | Self::RBRACE)
    }
}

/// Operators and punctuation, matched first-match-wins. Longer
/// symbols must precede any symbol that is a prefix of them.
pub const SYMBOLS: &[(&str, TokenKind)] = &[
    ("//=", TokenKind::SLASH_SLASH_EQUAL),
    ("**=", TokenKind::STAR_STAR_EQUAL),
    ("&&=", TokenKind::AND_AND_EQUAL),
    ("||=", TokenKind::OR_OR_EQUAL),
    ("^^=", TokenKind::CARET_CARET_EQUAL),
    ("//", TokenKind::SLASH_SLASH),
    ("**", TokenKind::STAR_STAR),
    ("&&", TokenKind::AND_AND),
    ("||", TokenKind::OR_OR),
    ("^^", TokenKind::CARET_CARET),
    ("++", TokenKind::INCREMENT),
    ("--", TokenKind::DECREMENT),
    ("+=", TokenKind::PLUS_EQUAL),
    ("-=", TokenKind::MINUS_EQUAL),
    ("*=", TokenKind::STAR_EQUAL),
    ("/=", TokenKind::SLASH_EQUAL),
    ("%=", TokenKind::MODULO_EQUAL),
    ("==", TokenKind::EQUAL_EQUAL),
    ("!=", TokenKind::BANG_EQUAL),
    ("<=", TokenKind::LESS_EQUAL),
    (">=", TokenKind::GREATER_EQUAL),
    ("(", TokenKind::LPAREN),
    (")", TokenKind::RPAREN),
    ("{", TokenKind::LBRACE),
    ("}", TokenKind::RBRACE),
    ("[", TokenKind::LBRACKET),
    ("]", TokenKind::RBRACKET),
    (",", TokenKind::COMMA),
    (".", TokenKind::DOT),
    (":", TokenKind::COLON),
    ("+", TokenKind::PLUS),
    ("-", TokenKind::MINUS),
    ("*", TokenKind::STAR),
    ("/", TokenKind::SLASH),
    ("%", TokenKind::MODULO),
    ("!", TokenKind::BANG),
    ("=", TokenKind::EQUAL),
    ("<", TokenKind::LESS),
    (">", TokenKind::GREATER),
];

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::EOL => f.write_str("end of line"),
            TokenKind::EOF => f.write_str("end of file"),
            _ => f.write_str(&self.lexeme),
        }
    }
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, line: usize) -> Self {
        Self { kind, lexeme, line }
    }
}
