//! Lowering of assembly statements into the SSA control-flow graph
//!
//! Conversion runs in fixed phases: the statement stream is split into basic
//! blocks, one block skeleton (with its 17 input parameters) is created per
//! partition, jump targets are optionally validated up front, and finally
//! every block is lowered in program order. Any failure aborts the whole
//! conversion.

use crate::ir::{BasicBlock, Condition, Operation, Program, Value, ValueDef};
use log::debug;
use xcfg_common::{BlockId, ConversionError, NodeKind, Register, SyntaxNode, TokenKind, Tree};

pub mod block;
pub mod instr;
pub mod operand;
pub mod registers;

use block::{split_blocks, SplitBlocks, Statement};
use registers::RegisterTracker;

/// When jump targets are checked against the label table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelValidation {
    /// Each jump's target is resolved when the jump is lowered
    #[default]
    Lazy,
    /// Every jump target is checked before any block is lowered
    Eager,
}

/// What to do when a label is defined more than once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateLabels {
    #[default]
    Reject,
    /// The latest definition wins
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoweringOptions {
    pub label_validation: LabelValidation,
    pub duplicate_labels: DuplicateLabels,
}

impl LoweringOptions {
    pub fn eager_labels(mut self) -> Self {
        self.label_validation = LabelValidation::Eager;
        self
    }

    pub fn allow_duplicate_labels(mut self) -> Self {
        self.duplicate_labels = DuplicateLabels::Overwrite;
        self
    }
}

/// Statement-stream to SSA CFG conversion context
pub struct Converter {
    options: LoweringOptions,

    /// Graph under construction
    pub(crate) program: Program,

    /// Register values of the block being lowered
    pub(crate) registers: RegisterTracker,

    /// Block being lowered
    pub(crate) current_block: BlockId,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(LoweringOptions::default())
    }
}

impl Converter {
    pub fn new(options: LoweringOptions) -> Self {
        Self {
            options,
            program: Program::new(),
            registers: RegisterTracker::new(),
            current_block: 0,
        }
    }

    /// Convert a flat sequence of label and instruction statements
    pub fn convert(mut self, statements: &[SyntaxNode]) -> Result<Program, ConversionError> {
        let SplitBlocks { blocks, labels } = split_blocks(statements, self.options.duplicate_labels)?;
        self.program.labels = labels;

        self.create_skeletons(blocks.len());

        if self.options.label_validation == LabelValidation::Eager {
            self.validate_labels(&blocks)?;
        }

        for (id, statements) in blocks.iter().enumerate() {
            self.lower_block(id, statements)?;
        }

        debug!(
            "Converted {} blocks, {} values",
            self.program.blocks.len(),
            self.program.values.len()
        );
        Ok(self.program)
    }

    /// Create every block with its input parameters before lowering starts,
    /// so forward jumps can bind to their target's parameters.
    fn create_skeletons(&mut self, count: usize) {
        for id in 0..count {
            let params: Vec<Value> = Register::ALL
                .iter()
                .enumerate()
                .map(|(index, reg)| self.program.new_value(*reg, ValueDef::BlockParam { block: id, index }))
                .collect();
            self.program.blocks.push(BasicBlock::new(id, params));
        }
    }

    /// Report the first jump, in program order, whose target label is undefined
    fn validate_labels(&self, blocks: &[Vec<Statement<'_>>]) -> Result<(), ConversionError> {
        for statement in blocks.iter().flatten() {
            let Statement::Instruction { opcode, operands, .. } = statement else {
                continue;
            };
            let opcode = opcode.to_lowercase();
            if opcode != "jmp" && Condition::from_mnemonic(&opcode).is_none() {
                continue;
            }
            if let [SyntaxNode::Leaf(token)] = operands {
                if token.kind == TokenKind::LabelName {
                    self.resolve_label(&token.text)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn emit(&mut self, op: Operation) {
        if let Some(block) = self.program.block_mut(self.current_block) {
            block.add_operation(op);
        }
    }

    /// Allocate result `index` of the operation about to be emitted
    pub(crate) fn define(&mut self, register: Register, index: usize) -> Value {
        let block = self.current_block;
        let op = self.program.block(block).map_or(0, |b| b.operations.len());
        self.program.new_value(register, ValueDef::OpResult { block, op, index })
    }

    pub(crate) fn block_count(&self) -> usize {
        self.program.blocks.len()
    }
}

/// Convert a statement list with the given options
pub fn convert_statements(statements: &[SyntaxNode], options: LoweringOptions) -> Result<Program, ConversionError> {
    Converter::new(options).convert(statements)
}

/// Convert a whole `Program` tree
pub fn convert_tree(tree: &Tree, options: LoweringOptions) -> Result<Program, ConversionError> {
    if tree.kind != NodeKind::Program {
        return Err(ConversionError::structure(format!(
            "expected a program node, found {} node",
            tree.kind
        )));
    }
    convert_statements(&tree.children, options)
}
