pub mod ast;
pub mod error;
pub mod lex;
pub mod parse;
pub mod token;

use ast::Source;
use error::SyntaxError;
use lex::Lexer;
use log::trace;
use parse::Parser;

/// Lex and parse a whole compilation unit.
pub fn parse(source: &str) -> Result<Source, SyntaxError> {
    trace!("Lexing {source}");
    let tokens = Lexer::new(source).lex_all()?;
    trace!("Parsing {tokens:#?}");
    Parser::new(&tokens).parse()
}
