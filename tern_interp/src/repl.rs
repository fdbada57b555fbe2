use std::io::{BufRead, Write};

use crate::{
    error::{make, Error, ErrorKind},
    run,
    types::Value,
    Interpreter,
};

const PROMPT: &str = ">>> ";
const CONTINUATION: &str = "... ";

/// Reads whole statements off an input, asking for more lines while
/// brackets are left open.
pub struct LineReader<R> {
    input: R,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// `None` on a clean end of input. Running out of input inside an
    /// open statement is an `EOFError`.
    pub fn read_statement(&mut self, out: &mut impl Write) -> Result<Option<String>, Error> {
        let mut statement = String::new();
        let mut depth = 0;
        loop {
            out.write_all(if statement.is_empty() { PROMPT } else { CONTINUATION }.as_bytes())?;
            out.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                if statement.is_empty() {
                    return Ok(None);
                }
                return Err(make(
                    ErrorKind::EOFError,
                    "end of input inside an unfinished statement",
                ));
            }
            depth += bracket_depth(&line);
            statement.push_str(&line);
            if depth <= 0 {
                return Ok(Some(statement));
            }
        }
    }
}

/// Read, run and echo statements until the input ends. Guest errors
/// go to `err` and the session carries on; failing to write to `out`
/// ends it.
pub fn serve<R: BufRead>(
    reader: &mut LineReader<R>,
    interpreter: &mut Interpreter,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<(), Error> {
    loop {
        let source = match reader.read_statement(out) {
            Ok(Some(source)) => source,
            // Ctrl-D on an empty prompt
            Ok(None) => {
                writeln!(out)?;
                return Ok(());
            }
            Err(e) => {
                writeln!(err, "{e}")?;
                return Ok(());
            }
        };
        match run(&source, interpreter) {
            Ok(Value::Null) => {}
            Ok(value) => writeln!(out, "{}", value.repr())?,
            Err(e) => writeln!(err, "{e}")?,
        }
        // Keep guest output and the next prompt in order
        out.flush()?;
    }
}

/// Net count of opened brackets on `line`, skipping strings and comments.
fn bracket_depth(line: &str) -> i32 {
    let mut depth = 0;
    let mut chars = line.chars();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_string => {
                chars.next();
            }
            '"' => in_string = !in_string,
            _ if in_string => {}
            '#' => break,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}
