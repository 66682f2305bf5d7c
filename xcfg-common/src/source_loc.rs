//! Positions of statements in assembly sources
//!
//! The reader stamps every label and instruction with the position of its
//! first token; the driver prints it when parsing fails.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name used for sources read from a string rather than a file
pub const UNNAMED_SOURCE: &str = "<input>";

/// Where a statement starts (line and column are 1-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(filename: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }

    pub fn unnamed(line: u32, column: u32) -> Self {
        Self::new(UNNAMED_SOURCE, line, column)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_file_line_column() {
        let loc = SourceLocation::new("fib.asm", 42, 10);
        assert_eq!(loc.to_string(), "fib.asm:42:10");
        assert_eq!(SourceLocation::unnamed(3, 7).to_string(), "<input>:3:7");
    }

    #[test]
    fn test_json_form() {
        let loc = SourceLocation::new("a.asm", 1, 2);
        let json = serde_json::to_string(&loc).unwrap();
        assert_eq!(json, r#"{"filename":"a.asm","line":1,"column":2}"#);
    }
}
