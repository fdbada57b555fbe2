use crate::{
    error::{ErrorMsg, SyntaxError},
    token::{Token, TokenKind, SYMBOLS},
};

#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    line: usize,
    start: usize,
    current: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            line: 0,
            start: 0,
            current: 0,
        }
    }

    /// Lex the whole source. The returned stream always ends with
    /// an `EOF` token; the first malformed sequence aborts lexing.
    pub fn lex_all(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens: Vec<Token> = Vec::default();
        loop {
            let token = self.lex()?;
            let done = token.kind == TokenKind::EOF;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    pub fn lex(&mut self) -> Result<Token, SyntaxError> {
        self.skip_blanks();
        self.start = self.current;
        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::EOF, String::default(), self.line));
        };
        if c == '\n' {
            self.advance();
            let token = self.make_token(TokenKind::EOL);
            // The newline itself belongs to the line it terminates
            self.line += 1;
            return Ok(token);
        }
        if self.rest().starts_with("0x") {
            return self.lex_bytes();
        }
        if c.is_ascii_digit() {
            return self.lex_number();
        }
        if c == '"' {
            return self.lex_string();
        }
        if c.is_alphabetic() || c == '_' {
            return Ok(self.lex_ident());
        }
        self.lex_symbol(c)
    }

    /// Spaces, tabs, carriage returns and `#` comments are dropped.
    fn skip_blanks(&mut self) {
        loop {
            self.advance_while(|c| matches!(c, ' ' | '\t' | '\r'));
            if self.peek() == Some('#') {
                self.advance_while(|c| c != '\n');
            } else {
                break;
            }
        }
    }

    fn lex_ident(&mut self) -> Token {
        self.advance_while(|c| c.is_alphanumeric() || c == '_');
        if let Some(t) = TokenKind::from_keyword(self.lexeme_from_range()) {
            self.make_token(t)
        } else {
            self.make_token(TokenKind::IDENT)
        }
    }

    fn lex_number(&mut self) -> Result<Token, SyntaxError> {
        self.advance_while(|c| c.is_ascii_digit());
        if self.advance_if(|c| c == 'u').is_none()
            && self.peek() == Some('.')
            && self.peek_next().filter(char::is_ascii_digit).is_some()
        {
            // Consume the dot and the fraction
            self.advance();
            self.advance_while(|c| c.is_ascii_digit());
        }
        Ok(self.make_token(TokenKind::NUMBER))
    }

    fn lex_bytes(&mut self) -> Result<Token, SyntaxError> {
        // Consume the `0x` prefix
        self.current += 2;
        let digits = self.advance_while(|c| c.is_ascii_hexdigit()).unwrap_or(0);
        if digits % 2 != 0 {
            return Err(self.error(ErrorMsg::OddHexDigits));
        }
        Ok(self.make_token(TokenKind::BYTES))
    }

    fn lex_string(&mut self) -> Result<Token, SyntaxError> {
        // Consume the opening quote
        self.advance();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => {
                    // Skip the escaped character so that `\"` does not close the string
                    if self.advance_if(|c| c != '\n').is_none() {
                        return Err(self.error(ErrorMsg::UnterminatedString));
                    }
                }
                Some('\n') | None => return Err(self.error(ErrorMsg::UnterminatedString)),
                Some(_) => (),
            }
        }
        // Escapes are resolved by the parser, the token keeps the raw text
        let raw = self.source[self.start + 1..self.current - 1].to_string();
        Ok(Token::new(TokenKind::STRING, raw, self.line))
    }

    fn lex_symbol(&mut self, c: char) -> Result<Token, SyntaxError> {
        let rest = self.rest();
        match SYMBOLS.iter().find(|(symbol, _)| rest.starts_with(symbol)) {
            Some(&(symbol, kind)) => {
                self.current += symbol.len();
                Ok(self.make_token(kind))
            }
            None => {
                self.current += c.len_utf8();
                Err(self.error(ErrorMsg::UnexpectedChar))
            }
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme_from_range().to_string(), self.line)
    }

    fn lexeme_from_range(&self) -> &'a str {
        &self.source[self.start..self.current]
    }

    fn rest(&self) -> &'a str {
        &self.source[self.current..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += c.len_utf8();
        Some(c)
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<char>
    where
        F: FnOnce(char) -> bool,
    {
        if self.peek().filter(|&c| cond(c)).is_some() {
            self.advance()
        } else {
            None
        }
    }

    fn advance_while<F>(&mut self, cond: F) -> Option<usize>
    where
        F: Fn(char) -> bool,
    {
        let mut count: usize = 0;
        while self.peek().filter(|&c| cond(c)).is_some() {
            count += 1;
            self.advance();
        }
        count.ne(&0).then_some(count)
    }

    fn error(&self, msg: ErrorMsg) -> SyntaxError {
        SyntaxError::new(msg, self.lexeme_from_range(), self.line + 1)
    }
}
