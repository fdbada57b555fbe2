use std::fmt::Display;

use tern_syntax::{ast::Expr, error::SyntaxError};

use crate::types::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    NameError,
    DeclarationError,
    TypeError,
    ValueError,
    IndexError,
    KeyError,
    AttributeError,
    ZeroDivisionError,
    ImportError,
    EOFError,
    FileNotFoundError,
    FileError,
    RuntimeError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::SyntaxError => "SyntaxError",
            Self::NameError => "NameError",
            Self::DeclarationError => "DeclarationError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::AttributeError => "AttributeError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::ImportError => "ImportError",
            Self::EOFError => "EOFError",
            Self::FileNotFoundError => "FileNotFoundError",
            Self::FileError => "FileError",
            Self::RuntimeError => "RuntimeError",
        })
    }
}

/// A guest-visible failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl std::error::Error for Error {}

impl From<SyntaxError> for Error {
    fn from(e: SyntaxError) -> Self {
        make(ErrorKind::SyntaxError, e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => make(ErrorKind::FileNotFoundError, e),
            _ => make(ErrorKind::FileError, e),
        }
    }
}

pub fn make(kind: ErrorKind, msg: impl Display) -> Error {
    Error {
        kind,
        msg: msg.to_string(),
    }
}

/// Everything that can interrupt the evaluation of a node. Only
/// `Error` is a failure, the rest are intercepted by the construct
/// they belong to: loops, switches and call boundaries.
#[derive(Debug)]
pub enum Signal {
    Error(Error),
    Break,
    Continue,
    Fallthrough,
    Return(Value),
    Defer(Expr),
}

impl From<Error> for Signal {
    fn from(e: Error) -> Self {
        Self::Error(e)
    }
}

impl Signal {
    /// Turn a signal that escaped every interception point into an error.
    pub fn into_error(self) -> Error {
        match self {
            Self::Error(e) => e,
            Self::Break => make(ErrorKind::SyntaxError, "`break` outside of a loop"),
            Self::Continue => make(ErrorKind::SyntaxError, "`continue` outside of a loop"),
            Self::Fallthrough => make(ErrorKind::SyntaxError, "`fallthrough` outside of a switch"),
            Self::Return(_) => make(ErrorKind::RuntimeError, "`return` outside of a function"),
            Self::Defer(_) => make(ErrorKind::RuntimeError, "`defer` outside of a function"),
        }
    }
}
