//! Abstract syntax of CBS declarations.
//!
//! The tree is built once by the parser and never mutated afterwards. Every
//! node implements `Display`, printing the notation back in a form the parser
//! accepts, so `parse(print(t)) == t` for any parsed `t`.

use serde::{Deserialize, Serialize};
use std::fmt;

mod decl;
mod term;

pub use decl::*;
pub use term::*;

/// Where a declaration came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub file: String,
    /// One-based line in the cleaned text.
    pub line: usize,
}

impl Origin {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Writes `items` separated by `sep`.
pub(crate) fn write_joined<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    sep: &str,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}
