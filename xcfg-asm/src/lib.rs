pub mod types;
pub mod parser;

pub use types::{ParserOptions, OPCODES, REGISTERS};
pub use parser::Parser;

use xcfg_common::{ConversionError, Tree};

// Re-export for convenience
pub fn parse(source: &str) -> Result<Tree, ConversionError> {
    let parser = Parser::new(ParserOptions::default());
    parser.parse_source(source)
}
