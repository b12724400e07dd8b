//! Generated-source handling: reading the schema file back into IR.

pub mod reader;

pub use reader::{ParsedSource, parse_source};
