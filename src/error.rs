use crate::loc::{prog, Loc};

use std::{fmt, io};

use thiserror::Error;

pub type Result<T> = std::result::Result::<T, MakeError>;

#[derive(Debug, Error)]
pub enum MakeError {
    /// Fatal diagnostic already in `file:line: *** msg.  Stop.` shape.
    #[error("{0}")]
    Stop(String),

    #[error("{path}: {}", crate::util::strerror(.source))]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl MakeError {
    pub fn stop(loc: Option::<&Loc>, msg: impl fmt::Display) -> Self {
        match loc {
            Some(loc) => Self::Stop(format!("{loc}: *** {msg}.  Stop.")),
            None => Self::Stop(format!("*** {msg}.  Stop."))
        }
    }

    #[inline]
    pub fn io(path: impl Into::<String>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Writes the error the way the driver reports it on exit.
    pub fn report(&self) {
        match self {
            Self::Stop(msg) if msg.starts_with("***") => eprintln!("{prog}: {msg}", prog = prog()),
            Self::Stop(msg) => eprintln!("{msg}"),
            Self::Io { .. } => eprintln!("{prog}: *** {self}.  Stop.", prog = prog())
        }
    }
}
