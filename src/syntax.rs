//! CBS source handling: cleaning raw text, splitting it into keyword
//! components, and parsing each component into declarations.

pub mod clean;
pub mod keywords;
pub mod parser;
pub mod splitter;

pub use clean::clean;
pub use keywords::{Keyword, Qualifier};
pub use parser::{parse_component, parse_declaration, parse_term};
pub use splitter::{split, Component};
