//! cbsgen: parses CBS funcon specifications into a [`Document`] of
//! declarations and lowers them to interpreter [`NodeSpec`]s.

pub mod ast;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod document;
pub mod driver;
pub mod errors;
pub mod lower;
pub mod syntax;

pub use crate::config::{Config, LowerOptions, ParseOptions};
pub use crate::document::Document;
pub use crate::driver::{parse_batch, parse_file, parse_source, BatchReport, FileReport};
pub use crate::errors::{CbsError, ErrorCategory, ErrorKind};
pub use crate::lower::{lower_document, LoweringReport, NodeSpec};
