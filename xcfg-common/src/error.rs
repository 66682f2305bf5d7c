//! Error handling for the x86 to SSA CFG converter
//!
//! Every failure of the reader or the lowering engine is reported through
//! [`ConversionError`]. Each kind carries the input element that caused it
//! (opcode, operand shape, token text or label name). Lowering errors raised
//! for a statement that carries a source position are wrapped in
//! [`ConversionError::Located`] so diagnostics point at that statement.

use crate::source_loc::SourceLocation;
use thiserror::Error;

/// Main conversion error type that encompasses all phases of conversion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// A statement is neither a well-formed label nor an instruction node
    #[error("Invalid code structure: {message}")]
    Structure { message: String },

    #[error("Label '{label}' does not exist in the program")]
    UnknownLabel { label: String },

    #[error("Unsupported combination of opcode '{opcode}' and operands ({shape})")]
    UnsupportedCombination { opcode: String, shape: String },

    #[error("Invalid operand: {detail}")]
    InvalidOperand { detail: String },

    #[error("Conditional jump '{opcode}' in block {block} is at the end of the program and has no fallthrough successor")]
    DanglingConditionalJump { opcode: String, block: usize },

    #[error("Label '{label}' is defined more than once (blocks {first} and {second})")]
    DuplicateLabel {
        label: String,
        first: usize,
        second: usize,
    },

    #[error("Parse error at {location}: {message}")]
    Parse {
        location: SourceLocation,
        message: String,
    },

    #[error("IO error: {message}")]
    Io { message: String },

    /// A lowering failure tied to the statement that caused it
    #[error("{location}: in '{opcode}': {error}")]
    Located {
        location: SourceLocation,
        opcode: String,
        error: Box<ConversionError>,
    },
}

impl ConversionError {
    /// Create a structure error
    pub fn structure(message: impl Into<String>) -> Self {
        ConversionError::Structure {
            message: message.into(),
        }
    }

    /// Create an invalid operand error
    pub fn invalid_operand(detail: impl Into<String>) -> Self {
        ConversionError::InvalidOperand {
            detail: detail.into(),
        }
    }

    /// Create an unsupported opcode/operand-shape error
    pub fn unsupported(opcode: &str, shape: impl ToString) -> Self {
        ConversionError::UnsupportedCombination {
            opcode: opcode.to_lowercase(),
            shape: shape.to_string(),
        }
    }

    /// Attach the position and opcode of the offending statement
    pub fn located(self, location: SourceLocation, opcode: &str) -> Self {
        match self {
            located @ ConversionError::Located { .. } => located,
            error => ConversionError::Located {
                location,
                opcode: opcode.to_string(),
                error: Box::new(error),
            },
        }
    }

    /// The underlying error without any statement position
    pub fn root(&self) -> &ConversionError {
        match self {
            ConversionError::Located { error, .. } => error.root(),
            error => error,
        }
    }

    /// Position of the offending statement, when known
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            ConversionError::Located { location, .. } | ConversionError::Parse { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Create a parse error
    pub fn parse_error(message: impl Into<String>, location: SourceLocation) -> Self {
        ConversionError::Parse {
            location,
            message: message.into(),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for ConversionError {
    fn from(err: std::io::Error) -> Self {
        ConversionError::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_lowercases_opcode() {
        let err = ConversionError::unsupported("CALL", "label");
        assert_eq!(
            err,
            ConversionError::UnsupportedCombination {
                opcode: "call".to_string(),
                shape: "label".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "Unsupported combination of opcode 'call' and operands (label)"
        );
    }

    #[test]
    fn test_parse_error_mentions_location() {
        let err = ConversionError::parse_error("unexpected character '$'", SourceLocation::new("a.asm", 2, 9));
        assert_eq!(err.to_string(), "Parse error at a.asm:2:9: unexpected character '$'");
    }

    #[test]
    fn test_located_error_names_statement() {
        let err = ConversionError::invalid_operand("label operand not allowed here: 'rdi, fmt'")
            .located(SourceLocation::unnamed(3, 3), "mov");
        assert_eq!(
            err.to_string(),
            "<input>:3:3: in 'mov': Invalid operand: label operand not allowed here: 'rdi, fmt'"
        );
        assert_eq!(err.location(), Some(&SourceLocation::unnamed(3, 3)));
        assert!(matches!(err.root(), ConversionError::InvalidOperand { .. }));

        // a second position never hides the first
        let again = err.clone().located(SourceLocation::unnamed(9, 1), "jmp");
        assert_eq!(again, err);
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.asm");
        let err: ConversionError = io.into();
        assert!(matches!(err, ConversionError::Io { ref message } if message.contains("missing.asm")));
    }
}
