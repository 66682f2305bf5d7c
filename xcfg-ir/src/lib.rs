//! x86 assembly to SSA control-flow graph
//!
//! This crate defines the SSA IR (`ir`) and the lowering engine (`lower`)
//! that turns a parsed stream of label and instruction statements into a
//! [`Program`] of basic blocks. Registers are carried across blocks as block
//! parameters; every control transfer passes a snapshot of all 17 tracked
//! register values to its successor.

pub mod ir;
pub mod lower;

pub use ir::{
    BasicBlock, BinaryOp, Condition, MemoryRef, Operation, Program, RegisterType, Source, UnaryOp, Value,
    ValueDef, ValueInfo,
};
pub use lower::{convert_statements, convert_tree, Converter, DuplicateLabels, LabelValidation, LoweringOptions};
