use std::fmt;
use std::sync::{Arc, OnceLock};

static PROG: OnceLock::<String> = OnceLock::new();

/// Name used to prefix diagnostics, `rmake` or `rmake[N]` for sub-makes.
#[inline]
pub fn prog() -> &'static str {
    PROG.get().map(|s| s.as_str()).unwrap_or("rmake")
}

#[inline]
pub fn set_prog(level: usize) {
    let name = if level > 0 { format!("rmake[{level}]") } else { "rmake".to_owned() };
    _ = PROG.set(name)
}

#[derive(Clone, PartialEq, Eq)]
pub struct Loc {
    pub file: Arc::<str>,
    pub line: usize,
}

impl Loc {
    #[inline(always)]
    pub fn new(file: &Arc::<str>, line: usize) -> Self {
        Self { file: Arc::clone(file), line }
    }
}

impl fmt::Display for Loc {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{file}:{line}", file = self.file, line = self.line)
    }
}

impl fmt::Debug for Loc {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[macro_export]
macro_rules! report_fmt {
    ($loc: expr, $($arg:tt)*) => {
        match $loc {
            Some(loc) => format!{
                "{loc}: {msg}",
                msg = std::fmt::format(format_args!($($arg)*))
            },
            None => std::fmt::format(format_args!($($arg)*))
        }
    };
}

/// Prints a located diagnostic to stderr.
#[macro_export]
macro_rules! report {
    ($loc: expr, $($arg:tt)*) => { eprintln!("{}", report_fmt!($loc, $($arg)*)) }
}

/// Prints a diagnostic prefixed with the program name.
#[macro_export]
macro_rules! report_prog {
    ($($arg:tt)*) => {
        eprintln!("{prog}: {msg}", prog = $crate::loc::prog(), msg = std::fmt::format(format_args!($($arg)*)))
    };
}
