use core::fmt;
use std::io;

use super::{CompileError, SyntaxError};

#[derive(Debug)]
pub enum Error {
    /// Neither a text database nor a blob could be loaded.
    DatabaseUnavailable,
    /// The requested terminal (or a `use=` target it pulls in) is not in the
    /// database.
    TerminalNotFound(String),
    /// A `use=` chain refers back to an entry already being expanded.
    CyclicUse(String),
    /// The source database failed to parse.
    Syntax(SyntaxError),
    /// A capability string failed to compile.
    Compile(CompileError),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DatabaseUnavailable => {
                write!(f, "no terminal database is available")
            }
            Self::TerminalNotFound(name) => {
                write!(f, "terminal \"{}\" not found in the database", name)
            }
            Self::CyclicUse(name) => {
                write!(f, "`use={}` forms a cycle", name)
            }
            Self::Syntax(err) => write!(f, "{}", err),
            Self::Compile(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "{}", err),
        }
    }
}

impl From<SyntaxError> for Error {
    fn from(err: SyntaxError) -> Self {
        Self::Syntax(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
