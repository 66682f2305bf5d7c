//! x86 to SSA CFG converter - Common Types and Utilities
//!
//! This crate contains the pieces shared by the assembly reader, the
//! lowering engine and the driver: the architectural register table, the
//! parse tree handed from the reader to the lowering engine, source
//! locations and the error taxonomy.

pub mod error;
pub mod types;
pub mod syntax;
pub mod source_loc;

pub use error::ConversionError;
pub use types::*;
pub use syntax::{NodeKind, SyntaxNode, Token, TokenKind, Tree};
pub use source_loc::{SourceLocation, UNNAMED_SOURCE};
