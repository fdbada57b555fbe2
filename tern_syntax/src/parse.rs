use std::{cmp::Ordering, iter::Peekable, rc::Rc, slice::Iter};

use crate::{
    ast::{BinOp, Case, Expr, FuncDecl, Item, Literal, Precedence, Source, UnaryOp, UpdateOp},
    error::{ErrorMsg, SyntaxError},
    token::{Token, TokenKind},
};

/// Null denotation: invoked when the token starts an expression.
type PrefixFn<'a> = fn(&mut Parser<'a>, &'a Token) -> Result<Expr, SyntaxError>;
/// Left denotation: invoked when the token follows a complete expression.
type InfixFn<'a> = fn(&mut Parser<'a>, Expr, &'a Token) -> Result<Expr, SyntaxError>;
/// Keyword-led statements, which can never appear mid-expression.
type StatementFn<'a> = fn(&mut Parser<'a>, &'a Token) -> Result<Item, SyntaxError>;

#[derive(Debug)]
pub struct Parser<'a> {
    stream: Peekable<Iter<'a, Token>>,
    line: usize,
}

impl<'a> Parser<'a> {
    pub fn new(stream: &'a [Token]) -> Self {
        Self {
            stream: stream.iter().peekable(),
            line: 0,
        }
    }

    pub fn parse(mut self) -> Result<Source, SyntaxError> {
        let mut items: Vec<Item> = Vec::default();
        loop {
            self.skip_newlines();
            if self.peek_kind() == TokenKind::EOF {
                break;
            }
            items.push(self.parse_item()?);
            self.end_statement()?;
        }
        Ok(Source { items })
    }

    fn statement_rule(kind: TokenKind) -> Option<StatementFn<'a>> {
        let rule: StatementFn<'a> = match kind {
            TokenKind::IF => Self::parse_if_stmt,
            TokenKind::FOR => Self::parse_for_stmt,
            TokenKind::WHILE => Self::parse_while_stmt,
            TokenKind::FUNC => Self::parse_function,
            TokenKind::RETURN => Self::parse_return,
            TokenKind::VAR => Self::parse_var_stmt,
            TokenKind::CONST => Self::parse_const_stmt,
            TokenKind::SWITCH => Self::parse_switch_stmt,
            TokenKind::DEFER => Self::parse_defer,
            TokenKind::BREAK => |_, _| Ok(Item::Break),
            TokenKind::CONTINUE => |_, _| Ok(Item::Continue),
            TokenKind::FALLTHROUGH => |_, _| Ok(Item::Fallthrough),
            TokenKind::LBRACE => |parser, _| Ok(Item::Block(parser.parse_block_body()?)),
            _ => return None,
        };
        Some(rule)
    }

    fn prefix_rule(kind: TokenKind) -> Option<PrefixFn<'a>> {
        let rule: PrefixFn<'a> = match kind {
            TokenKind::NUMBER
            | TokenKind::STRING
            | TokenKind::BYTES
            | TokenKind::TRUE
            | TokenKind::FALSE
            | TokenKind::NULL => Self::parse_literal,
            TokenKind::IDENT => |_, token| Ok(Expr::Ident(token.lexeme.clone())),
            TokenKind::LPAREN => Self::parse_group,
            TokenKind::LBRACKET => Self::parse_list,
            TokenKind::LBRACE => Self::parse_map,
            TokenKind::MINUS | TokenKind::PLUS | TokenKind::BANG => Self::parse_unary,
            TokenKind::FUNC => Self::parse_func_expr,
            _ => return None,
        };
        Some(rule)
    }

    fn infix_rule(kind: TokenKind) -> Option<(Precedence, InfixFn<'a>)> {
        if let Some(op) = BinOp::from_token(kind) {
            return Some((op.precedence(), Self::parse_binary));
        }
        if BinOp::from_reassign_token(kind).is_some() {
            return Some((Precedence::Assign, Self::parse_reassignment));
        }
        let rule: (Precedence, InfixFn<'a>) = match kind {
            TokenKind::EQUAL => (Precedence::Assign, Self::parse_assignment),
            TokenKind::COLON => (Precedence::Range, Self::parse_range),
            TokenKind::AS => (Precedence::Cast, Self::parse_cast),
            TokenKind::INCREMENT | TokenKind::DECREMENT => (Precedence::Call, Self::parse_update),
            TokenKind::LPAREN => (Precedence::Call, Self::parse_call),
            TokenKind::DOT => (Precedence::Member, Self::parse_field),
            TokenKind::LBRACKET => (Precedence::Member, Self::parse_index),
            _ => return None,
        };
        Some(rule)
    }

    fn parse_item(&mut self) -> Result<Item, SyntaxError> {
        let token = self.peek_token()?;
        if let Some(rule) = Self::statement_rule(token.kind) {
            self.advance();
            return rule(self, token);
        }
        Ok(Item::ExprStmt(self.parse_expr()?))
    }

    fn end_statement(&mut self) -> Result<(), SyntaxError> {
        let token = self.peek_token()?;
        match token.kind {
            TokenKind::EOL => {
                self.advance();
                Ok(())
            }
            // The closing brace and end of file belong to the caller
            TokenKind::RBRACE | TokenKind::EOF => Ok(()),
            _ => Err(SyntaxError::at(token, ErrorMsg::ExpectedEndOfStatement)),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Item>, SyntaxError> {
        self.advance_or_err(TokenKind::LBRACE, ErrorMsg::MissingOpeningBrace)?;
        self.parse_block_body()
    }

    /// Parse the items of a block whose opening brace has been consumed.
    fn parse_block_body(&mut self) -> Result<Vec<Item>, SyntaxError> {
        let mut items = Vec::default();
        loop {
            self.skip_newlines();
            match self.peek_kind() {
                TokenKind::RBRACE => break,
                TokenKind::EOF => {
                    let token = self.peek_token()?;
                    return Err(SyntaxError::at(token, ErrorMsg::MissingClosingBrace));
                }
                _ => {
                    items.push(self.parse_item()?);
                    self.end_statement()?;
                }
            }
        }
        // Consume the closing brace
        self.advance();
        Ok(items)
    }

    fn parse_var_stmt(&mut self, _: &'a Token) -> Result<Item, SyntaxError> {
        let name = self.parse_ident()?;
        let init = if self.advance_if(|t| t.kind == TokenKind::EQUAL).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(Item::VarStmt { name, init })
    }

    fn parse_const_stmt(&mut self, _: &'a Token) -> Result<Item, SyntaxError> {
        let name = self.parse_ident()?;
        self.advance_or_err(TokenKind::EQUAL, ErrorMsg::UnexpectedToken)?;
        let value = self.parse_expr()?;

        Ok(Item::ConstStmt { name, value })
    }

    fn parse_if_stmt(&mut self, _: &'a Token) -> Result<Item, SyntaxError> {
        let condition = self.parse_expr()?;
        let if_block = self.parse_block()?;
        let else_item = if self.advance_if(|t| t.kind == TokenKind::ELSE).is_some() {
            // `else` chains either a nested `if` or a plain block
            match self.advance_if(|t| t.kind == TokenKind::IF) {
                Some(token) => Some(Box::new(self.parse_if_stmt(token)?)),
                None => Some(Box::new(Item::Block(self.parse_block()?))),
            }
        } else {
            None
        };

        Ok(Item::IfStmt {
            condition,
            if_block,
            else_item,
        })
    }

    fn parse_while_stmt(&mut self, _: &'a Token) -> Result<Item, SyntaxError> {
        let condition = self.parse_expr()?;

        Ok(Item::WhileStmt {
            condition,
            body: self.parse_block()?,
        })
    }

    fn parse_for_stmt(&mut self, _: &'a Token) -> Result<Item, SyntaxError> {
        let ident = self.parse_ident()?;
        self.advance_or_err(TokenKind::IN, ErrorMsg::MissingIn)?;
        let iterable = self.parse_expr()?;

        Ok(Item::ForStmt {
            ident,
            iterable,
            body: self.parse_block()?,
        })
    }

    fn parse_switch_stmt(&mut self, _: &'a Token) -> Result<Item, SyntaxError> {
        let subject = self.parse_expr()?;
        self.advance_or_err(TokenKind::LBRACE, ErrorMsg::MissingOpeningBrace)?;
        let mut cases = vec![];
        let mut default = None;
        loop {
            self.skip_newlines();
            let token = self.peek_token()?;
            match token.kind {
                TokenKind::CASE | TokenKind::DEFAULT if default.is_some() => {
                    return Err(SyntaxError::at(token, ErrorMsg::DefaultNotLast))
                }
                TokenKind::CASE => {
                    self.advance();
                    let mut values = vec![];
                    loop {
                        // Parse above range binding power so the colon ends the value
                        values.push(self.parse_expr_bp(Precedence::Range)?);
                        if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                            break;
                        }
                    }
                    self.advance_or_err(TokenKind::COLON, ErrorMsg::MissingColon)?;
                    cases.push(Case {
                        values,
                        body: self.parse_case_body()?,
                    });
                }
                TokenKind::DEFAULT => {
                    self.advance();
                    self.advance_or_err(TokenKind::COLON, ErrorMsg::MissingColon)?;
                    default = Some(self.parse_case_body()?);
                }
                TokenKind::RBRACE => {
                    self.advance();
                    break;
                }
                TokenKind::EOF => {
                    return Err(SyntaxError::at(token, ErrorMsg::MissingClosingBrace))
                }
                _ => return Err(SyntaxError::at(token, ErrorMsg::InvalidCase)),
            }
        }

        Ok(Item::SwitchStmt {
            subject,
            cases,
            default,
        })
    }

    fn parse_case_body(&mut self) -> Result<Vec<Item>, SyntaxError> {
        let mut items = vec![];
        loop {
            self.skip_newlines();
            if matches!(
                self.peek_kind(),
                TokenKind::CASE | TokenKind::DEFAULT | TokenKind::RBRACE | TokenKind::EOF
            ) {
                return Ok(items);
            }
            items.push(self.parse_item()?);
            self.end_statement()?;
        }
    }

    fn parse_function(&mut self, token: &'a Token) -> Result<Item, SyntaxError> {
        if self.peek_kind() != TokenKind::IDENT {
            // An anonymous function used as an expression statement
            let func = self.parse_func_expr(token)?;
            return Ok(Item::ExprStmt(self.parse_infix(func, Precedence::Lowest)?));
        }
        let name = self.parse_ident()?;
        Ok(Item::Function(self.parse_func_decl(Some(name))?))
    }

    fn parse_func_expr(&mut self, _: &'a Token) -> Result<Expr, SyntaxError> {
        Ok(Expr::Func(self.parse_func_decl(None)?))
    }

    fn parse_func_decl(&mut self, name: Option<String>) -> Result<FuncDecl, SyntaxError> {
        self.advance_or_err(TokenKind::LPAREN, ErrorMsg::UnexpectedToken)?;
        let mut params = vec![];
        loop {
            self.skip_newlines();
            if self.advance_if(|t| t.kind == TokenKind::RPAREN).is_some() {
                break;
            }
            params.push(self.parse_ident()?);
            self.skip_newlines();
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                self.skip_newlines();
                self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingClosingParen)?;
                break;
            }
        }
        let body = self.parse_block()?;

        Ok(FuncDecl {
            name,
            params,
            body: Rc::from(body),
        })
    }

    fn parse_return(&mut self, _: &'a Token) -> Result<Item, SyntaxError> {
        if self.peek_kind().ends_statement() {
            return Ok(Item::ReturnStmt(None));
        }
        Ok(Item::ReturnStmt(Some(self.parse_expr()?)))
    }

    fn parse_defer(&mut self, token: &'a Token) -> Result<Item, SyntaxError> {
        let expr = self.parse_expr()?;
        if !matches!(expr, Expr::Call { .. }) {
            return Err(SyntaxError::at(token, ErrorMsg::InvalidDefer));
        }
        Ok(Item::DeferStmt(expr))
    }

    pub fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_expr_bp(Precedence::Lowest)
    }

    /// Parse an expression whose infix operators all bind tighter than `min`.
    fn parse_expr_bp(&mut self, min: Precedence) -> Result<Expr, SyntaxError> {
        let token = self.peek_token()?;
        let Some(prefix) = Self::prefix_rule(token.kind) else {
            return Err(SyntaxError::at(token, ErrorMsg::ExpectedExpression));
        };
        self.advance();
        let lhs = prefix(self, token)?;
        self.parse_infix(lhs, min)
    }

    fn parse_infix(&mut self, mut lhs: Expr, min: Precedence) -> Result<Expr, SyntaxError> {
        while let Some(&token) = self.stream.peek() {
            let Some((precedence, infix)) = Self::infix_rule(token.kind) else {
                break;
            };
            if precedence.compare(min) != Ordering::Greater {
                break;
            }
            self.advance();
            lhs = infix(self, lhs, token)?;
        }
        Ok(lhs)
    }

    fn parse_literal(&mut self, token: &'a Token) -> Result<Expr, SyntaxError> {
        let lit = match token.kind {
            TokenKind::TRUE => Literal::Boolean(true),
            TokenKind::FALSE => Literal::Boolean(false),
            TokenKind::NULL => Literal::Null,
            TokenKind::STRING => Literal::Str(unescape(&token.lexeme)),
            TokenKind::BYTES => Literal::Bytes(decode_hex(&token.lexeme[2..])),
            TokenKind::NUMBER => parse_number(&token.lexeme)
                .ok_or_else(|| SyntaxError::at(token, ErrorMsg::InvalidNumber))?,
            _ => return Err(SyntaxError::at(token, ErrorMsg::UnexpectedToken)),
        };
        Ok(Expr::Literal(lit))
    }

    fn parse_group(&mut self, _: &'a Token) -> Result<Expr, SyntaxError> {
        let expr = self.parse_expr()?;
        self.advance_or_err(TokenKind::RPAREN, ErrorMsg::MissingClosingParen)?;
        Ok(expr)
    }

    fn parse_list(&mut self, _: &'a Token) -> Result<Expr, SyntaxError> {
        Ok(Expr::List(self.parse_sequence(
            TokenKind::RBRACKET,
            ErrorMsg::MissingClosingBracket,
        )?))
    }

    fn parse_map(&mut self, _: &'a Token) -> Result<Expr, SyntaxError> {
        let mut entries = vec![];
        loop {
            self.skip_newlines();
            if self.advance_if(|t| t.kind == TokenKind::RBRACE).is_some() {
                break;
            }
            // Keys bind tighter than ranges so the colon separates the value
            let key = self.parse_expr_bp(Precedence::Range)?;
            self.advance_or_err(TokenKind::COLON, ErrorMsg::MissingColon)?;
            self.skip_newlines();
            let value = self.parse_expr_bp(Precedence::Comma)?;
            entries.push((key, value));
            self.skip_newlines();
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                self.skip_newlines();
                self.advance_or_err(TokenKind::RBRACE, ErrorMsg::MissingClosingBrace)?;
                break;
            }
        }
        Ok(Expr::Map(entries))
    }

    fn parse_unary(&mut self, token: &'a Token) -> Result<Expr, SyntaxError> {
        let op = UnaryOp::from_token(token.kind)
            .ok_or_else(|| SyntaxError::at(token, ErrorMsg::UnexpectedToken))?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(self.parse_expr_bp(Precedence::Unary)?),
        })
    }

    fn parse_binary(&mut self, lhs: Expr, token: &'a Token) -> Result<Expr, SyntaxError> {
        let op = BinOp::from_token(token.kind)
            .ok_or_else(|| SyntaxError::at(token, ErrorMsg::UnexpectedToken))?;
        let precedence = if op.is_right_assoc() {
            op.precedence().lower()
        } else {
            op.precedence()
        };
        Ok(Expr::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(self.parse_expr_bp(precedence)?),
        })
    }

    fn parse_assignment(&mut self, target: Expr, token: &'a Token) -> Result<Expr, SyntaxError> {
        if !target.is_assignable() {
            return Err(SyntaxError::at(token, ErrorMsg::InvalidAssignment));
        }
        Ok(Expr::Assignment {
            target: Box::new(target),
            value: Box::new(self.parse_expr_bp(Precedence::Assign.lower())?),
        })
    }

    fn parse_reassignment(&mut self, target: Expr, token: &'a Token) -> Result<Expr, SyntaxError> {
        // Validate the target before looking at the right-hand side
        if !target.is_assignable() {
            return Err(SyntaxError::at(token, ErrorMsg::InvalidAssignment));
        }
        let op = BinOp::from_reassign_token(token.kind)
            .ok_or_else(|| SyntaxError::at(token, ErrorMsg::UnexpectedToken))?;
        Ok(Expr::Reassignment {
            target: Box::new(target),
            op,
            value: Box::new(self.parse_expr_bp(Precedence::Assign.lower())?),
        })
    }

    fn parse_update(&mut self, target: Expr, token: &'a Token) -> Result<Expr, SyntaxError> {
        if !target.is_assignable() {
            return Err(SyntaxError::at(token, ErrorMsg::InvalidAssignment));
        }
        let op = UpdateOp::from_token(token.kind)
            .ok_or_else(|| SyntaxError::at(token, ErrorMsg::UnexpectedToken))?;
        Ok(Expr::Update {
            target: Box::new(target),
            op,
        })
    }

    fn parse_range(&mut self, start: Expr, _: &'a Token) -> Result<Expr, SyntaxError> {
        let stop = self.parse_expr_bp(Precedence::Range)?;
        let step = if self.advance_if(|t| t.kind == TokenKind::COLON).is_some() {
            Some(Box::new(self.parse_expr_bp(Precedence::Range)?))
        } else {
            None
        };
        Ok(Expr::Range {
            start: Box::new(start),
            stop: Box::new(stop),
            step,
        })
    }

    fn parse_cast(&mut self, expr: Expr, _: &'a Token) -> Result<Expr, SyntaxError> {
        Ok(Expr::Cast {
            expr: Box::new(expr),
            ty: Box::new(self.parse_expr_bp(Precedence::Cast)?),
        })
    }

    fn parse_call(&mut self, func: Expr, _: &'a Token) -> Result<Expr, SyntaxError> {
        Ok(Expr::Call {
            func: Box::new(func),
            args: self.parse_sequence(TokenKind::RPAREN, ErrorMsg::MissingClosingParen)?,
        })
    }

    fn parse_field(&mut self, object: Expr, _: &'a Token) -> Result<Expr, SyntaxError> {
        Ok(Expr::FieldGet {
            object: Box::new(object),
            field: self.parse_ident()?,
        })
    }

    fn parse_index(&mut self, object: Expr, _: &'a Token) -> Result<Expr, SyntaxError> {
        let index = self.parse_expr()?;
        self.advance_or_err(TokenKind::RBRACKET, ErrorMsg::MissingClosingBracket)?;
        Ok(Expr::Index {
            object: Box::new(object),
            index: Box::new(index),
        })
    }

    /// Parse comma separated expressions up to and including `close`,
    /// skipping newlines anywhere in between.
    fn parse_sequence(&mut self, close: TokenKind, msg: ErrorMsg) -> Result<Vec<Expr>, SyntaxError> {
        let mut exprs = vec![];
        loop {
            self.skip_newlines();
            if self.advance_if(|t| t.kind == close).is_some() {
                break;
            }
            exprs.push(self.parse_expr_bp(Precedence::Comma)?);
            self.skip_newlines();
            if self.advance_if(|t| t.kind == TokenKind::COMMA).is_none() {
                self.skip_newlines();
                self.advance_or_err(close, msg)?;
                break;
            }
        }
        Ok(exprs)
    }

    fn parse_ident(&mut self) -> Result<String, SyntaxError> {
        Ok(self
            .advance_or_err(TokenKind::IDENT, ErrorMsg::ExpectedIdent)?
            .lexeme
            .clone())
    }

    fn skip_newlines(&mut self) {
        while self.advance_if(|t| t.kind == TokenKind::EOL).is_some() {}
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.stream.peek().map_or(TokenKind::EOF, |t| t.kind)
    }

    fn peek_token(&mut self) -> Result<&'a Token, SyntaxError> {
        match self.stream.peek() {
            Some(&t) => Ok(t),
            None => Err(self.eof_error(ErrorMsg::UnexpectedToken)),
        }
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.stream.next()?;
        self.line = token.line;
        Some(token)
    }

    fn advance_if<F>(&mut self, cond: F) -> Option<&'a Token>
    where
        F: FnOnce(&Token) -> bool,
    {
        if self.stream.peek().filter(|&&t| cond(t)).is_some() {
            self.advance()
        } else {
            None
        }
    }

    fn advance_or_err(&mut self, kind: TokenKind, msg: ErrorMsg) -> Result<&'a Token, SyntaxError> {
        match self.stream.peek() {
            Some(&t) if t.kind == kind => {
                self.advance();
                Ok(t)
            }
            Some(&t) => Err(SyntaxError::at(t, msg)),
            None => Err(self.eof_error(msg)),
        }
    }

    fn eof_error(&self, msg: ErrorMsg) -> SyntaxError {
        SyntaxError::new(msg, "end of file", self.line + 1)
    }
}

/// Resolve the fixed escape table. Any other character, including
/// an unknown backslash pair, is kept verbatim.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let escaped = match chars.peek() {
                Some('\\') => Some('\\'),
                Some('n') => Some('\n'),
                Some('r') => Some('\r'),
                Some('t') => Some('\t'),
                Some('"') => Some('"'),
                _ => None,
            };
            if let Some(e) = escaped {
                chars.next();
                out.push(e);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// The lexer guarantees an even number of hex digits.
fn decode_hex(digits: &str) -> Vec<u8> {
    digits
        .as_bytes()
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .collect()
}

fn parse_number(lexeme: &str) -> Option<Literal> {
    if let Some(digits) = lexeme.strip_suffix('u') {
        digits.parse().ok().map(Literal::Uint)
    } else if lexeme.contains('.') {
        lexeme.parse().ok().map(Literal::Float)
    } else {
        lexeme.parse().ok().map(Literal::Int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Lexer;
    use pretty_assertions::assert_eq;

    fn parse_test(input: &str, expected: Vec<Item>) {
        let tokens = Lexer::new(input).lex_all().unwrap();
        let source = Parser::new(&tokens).parse().unwrap();
        assert_eq!(source, Source { items: expected });
    }

    fn parse_err_test(input: &str, msg: ErrorMsg, symbol: &str, line: usize) {
        let tokens = Lexer::new(input).lex_all().unwrap();
        let err = Parser::new(&tokens).parse().unwrap_err();
        assert_eq!(err, SyntaxError::new(msg, symbol, line));
    }

    fn int(n: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Int(n)))
    }

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn var_stmt() {
        parse_test(
            "var x = 42\nvar y",
            vec![
                Item::VarStmt {
                    name: "x".to_string(),
                    init: Some(Expr::Literal(Literal::Int(42))),
                },
                Item::VarStmt {
                    name: "y".to_string(),
                    init: None,
                },
            ],
        );
    }

    #[test]
    fn literals() {
        parse_test(
            "7u\n2.5\n0x00ff\n\"a\\tb\\q\"",
            vec![
                Item::ExprStmt(Expr::Literal(Literal::Uint(7))),
                Item::ExprStmt(Expr::Literal(Literal::Float(2.5))),
                Item::ExprStmt(Expr::Literal(Literal::Bytes(vec![0, 255]))),
                Item::ExprStmt(Expr::Literal(Literal::Str("a\tb\\q".to_string()))),
            ],
        );
    }

    #[test]
    fn precedence_climbing() {
        // 1 + 2 * 3 ** 2 ** 2 < 4 && true
        parse_test(
            "1 + 2 * 3 ** 2 ** 2 < 4 && true",
            vec![Item::ExprStmt(Expr::Binary {
                lhs: Box::new(Expr::Binary {
                    lhs: Box::new(Expr::Binary {
                        lhs: int(1),
                        op: BinOp::Plus,
                        rhs: Box::new(Expr::Binary {
                            lhs: int(2),
                            op: BinOp::Star,
                            rhs: Box::new(Expr::Binary {
                                lhs: int(3),
                                op: BinOp::StarStar,
                                rhs: Box::new(Expr::Binary {
                                    lhs: int(2),
                                    op: BinOp::StarStar,
                                    rhs: int(2),
                                }),
                            }),
                        }),
                    }),
                    op: BinOp::Less,
                    rhs: int(4),
                }),
                op: BinOp::And,
                rhs: Box::new(Expr::Literal(Literal::Boolean(true))),
            })],
        );
    }

    #[test]
    fn unary_and_grouping() {
        parse_test(
            "2 * (-3 + 1)",
            vec![Item::ExprStmt(Expr::Binary {
                lhs: int(2),
                op: BinOp::Star,
                rhs: Box::new(Expr::Binary {
                    lhs: Box::new(Expr::Unary {
                        op: UnaryOp::Minus,
                        expr: int(3),
                    }),
                    op: BinOp::Plus,
                    rhs: int(1),
                }),
            })],
        );
    }

    #[test]
    fn postfix_and_member_access() {
        parse_test(
            "a.b[0](1, 2)\nx++",
            vec![
                Item::ExprStmt(Expr::Call {
                    func: Box::new(Expr::Index {
                        object: Box::new(Expr::FieldGet {
                            object: ident("a"),
                            field: "b".to_string(),
                        }),
                        index: int(0),
                    }),
                    args: vec![Expr::Literal(Literal::Int(1)), Expr::Literal(Literal::Int(2))],
                }),
                Item::ExprStmt(Expr::Update {
                    target: ident("x"),
                    op: UpdateOp::Increment,
                }),
            ],
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        parse_test(
            "a = b += 1",
            vec![Item::ExprStmt(Expr::Assignment {
                target: ident("a"),
                value: Box::new(Expr::Reassignment {
                    target: ident("b"),
                    op: BinOp::Plus,
                    value: int(1),
                }),
            })],
        );
    }

    #[test]
    fn range_and_cast() {
        parse_test(
            "0:10:2\nx + 1 as float",
            vec![
                Item::ExprStmt(Expr::Range {
                    start: int(0),
                    stop: int(10),
                    step: Some(int(2)),
                }),
                Item::ExprStmt(Expr::Cast {
                    expr: Box::new(Expr::Binary {
                        lhs: ident("x"),
                        op: BinOp::Plus,
                        rhs: int(1),
                    }),
                    ty: ident("float"),
                }),
            ],
        );
    }

    #[test]
    fn collections_skip_newlines() {
        parse_test(
            "[\n1,\n2\n]\n({\"a\": 1,\n \"b\": 0:2})",
            vec![
                Item::ExprStmt(Expr::List(vec![
                    Expr::Literal(Literal::Int(1)),
                    Expr::Literal(Literal::Int(2)),
                ])),
                Item::ExprStmt(Expr::Map(vec![
                    (
                        Expr::Literal(Literal::Str("a".to_string())),
                        Expr::Literal(Literal::Int(1)),
                    ),
                    (
                        Expr::Literal(Literal::Str("b".to_string())),
                        Expr::Range {
                            start: int(0),
                            stop: int(2),
                            step: None,
                        },
                    ),
                ])),
            ],
        );
    }

    #[test]
    fn if_else_chain() {
        parse_test(
            "if a {\n1\n} else if b {\n2\n} else {\n3\n}",
            vec![Item::IfStmt {
                condition: *ident("a"),
                if_block: vec![Item::ExprStmt(*int(1))],
                else_item: Some(Box::new(Item::IfStmt {
                    condition: *ident("b"),
                    if_block: vec![Item::ExprStmt(*int(2))],
                    else_item: Some(Box::new(Item::Block(vec![Item::ExprStmt(*int(3))]))),
                })),
            }],
        );
    }

    #[test]
    fn loops() {
        parse_test(
            "for i in xs { continue }\nwhile true { break }",
            vec![
                Item::ForStmt {
                    ident: "i".to_string(),
                    iterable: *ident("xs"),
                    body: vec![Item::Continue],
                },
                Item::WhileStmt {
                    condition: Expr::Literal(Literal::Boolean(true)),
                    body: vec![Item::Break],
                },
            ],
        );
    }

    #[test]
    fn function_and_defer() {
        parse_test(
            "func f(a,\n b) {\ndefer g(a)\nreturn\n}",
            vec![Item::Function(FuncDecl {
                name: Some("f".to_string()),
                params: vec!["a".to_string(), "b".to_string()],
                body: Rc::from(vec![
                    Item::DeferStmt(Expr::Call {
                        func: ident("g"),
                        args: vec![*ident("a")],
                    }),
                    Item::ReturnStmt(None),
                ]),
            })],
        );
    }

    #[test]
    fn anonymous_function_statement() {
        parse_test(
            "func(x) { return x }(1)",
            vec![Item::ExprStmt(Expr::Call {
                func: Box::new(Expr::Func(FuncDecl {
                    name: None,
                    params: vec!["x".to_string()],
                    body: Rc::from(vec![Item::ReturnStmt(Some(*ident("x")))]),
                })),
                args: vec![*int(1)],
            })],
        );
    }

    #[test]
    fn switch_stmt() {
        parse_test(
            "switch x {\ncase 1, 2:\n  a\n  fallthrough\ndefault:\n  b\ncase 3:\n}",
            vec![Item::SwitchStmt {
                subject: *ident("x"),
                cases: vec![
                    Case {
                        values: vec![*int(1), *int(2)],
                        body: vec![Item::ExprStmt(*ident("a")), Item::Fallthrough],
                    },
                    Case {
                        values: vec![*int(3)],
                        body: vec![],
                    },
                ],
                default: Some(vec![Item::ExprStmt(*ident("b"))]),
            }],
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        let source = "func f(n) {\n  if n < 2 { return n }\n  return f(n - 1) + f(n - 2)\n}\nf(10)";
        let tokens = Lexer::new(source).lex_all().unwrap();
        let first = Parser::new(&tokens).parse().unwrap();
        let tokens = Lexer::new(source).lex_all().unwrap();
        let second = Parser::new(&tokens).parse().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_assignment() {
        parse_err_test("1 + 2 = 3", ErrorMsg::InvalidAssignment, "=", 1);
        parse_err_test("\nf() += 1", ErrorMsg::InvalidAssignment, "+=", 2);
    }

    #[test]
    fn defer_requires_call() {
        parse_err_test("defer x", ErrorMsg::InvalidDefer, "defer", 1);
    }

    #[test]
    fn missing_closing_paren() {
        parse_err_test("(1 + 2 * 3", ErrorMsg::MissingClosingParen, "end of file", 1);
    }

    #[test]
    fn missing_closing_brace() {
        parse_err_test("while x {\n  a\n", ErrorMsg::MissingClosingBrace, "end of file", 3);
    }

    #[test]
    fn statements_need_separators() {
        parse_err_test("a b", ErrorMsg::ExpectedEndOfStatement, "b", 1);
    }

    #[test]
    fn default_closes_the_switch() {
        let src = "switch x {\ndefault:\n  a\ncase 1:\n  b\n}";
        parse_err_test(src, ErrorMsg::DefaultNotLast, "case", 4);
        let src = "switch x {\ndefault:\ndefault:\n}";
        parse_err_test(src, ErrorMsg::DefaultNotLast, "default", 3);
    }

    #[test]
    fn overflowing_int_literal() {
        let literal = "99999999999999999999";
        parse_err_test(literal, ErrorMsg::InvalidNumber, literal, 1);
        let literal = "18446744073709551616u";
        parse_err_test(&format!("x = {literal}"), ErrorMsg::InvalidNumber, literal, 1);
    }

    #[test]
    fn keyword_statement_in_expression() {
        parse_err_test("var x = if", ErrorMsg::ExpectedExpression, "if", 1);
    }
}
