pub mod environment;
pub mod error;
pub mod interpret;
pub mod ops;
pub mod repl;
pub mod stdlib;
pub mod types;

use std::{cell::RefCell, io::Write, rc::Rc};

use error::Error;
pub use interpret::Interpreter;
use log::trace;
use types::Value;

/// Where `print` writes to.
pub type Output = Rc<RefCell<dyn Write>>;

/// Parse and run `source` in the program frame of `interpreter`.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<Value, Error> {
    let source = tern_syntax::parse(source)?;
    trace!("Running {} items", source.items.len());
    interpreter.interpret(&source)
}
