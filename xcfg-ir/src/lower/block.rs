use crate::ir::{Condition, Operation};
use crate::lower::{Converter, DuplicateLabels};
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use xcfg_common::{BlockId, ConversionError, NodeKind, SourceLocation, SyntaxNode, TokenKind};

/// A validated statement of the flat input stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statement<'a> {
    Label {
        name: &'a str,
    },
    Instruction {
        opcode: &'a str,
        operands: &'a [SyntaxNode],
        location: Option<&'a SourceLocation>,
    },
}

impl<'a> Statement<'a> {
    /// Validate the shape of a statement node
    pub fn from_node(node: &'a SyntaxNode) -> Result<Self, ConversionError> {
        let tree = match node {
            SyntaxNode::Node(tree) => tree,
            SyntaxNode::Leaf(token) => {
                return Err(ConversionError::structure(format!(
                    "expected a label or instruction, found bare {} '{}'",
                    token.kind, token.text
                )))
            }
        };

        let (first, rest) = tree
            .children
            .split_first()
            .ok_or_else(|| ConversionError::structure(format!("empty {} node", tree.kind)))?;

        match (tree.kind, first) {
            (NodeKind::Label, SyntaxNode::Leaf(token)) if token.kind == TokenKind::LabelName => {
                Ok(Statement::Label { name: &token.text })
            }
            (NodeKind::Instruction, SyntaxNode::Leaf(token)) if token.kind == TokenKind::Opcode => {
                Ok(Statement::Instruction {
                    opcode: &token.text,
                    operands: rest,
                    location: tree.location.as_ref(),
                })
            }
            (NodeKind::Label, _) => Err(ConversionError::structure(format!(
                "label node must start with a label name, found '{}'",
                first
            ))),
            (NodeKind::Instruction, _) => Err(ConversionError::structure(format!(
                "instruction node must start with an opcode, found '{}'",
                first
            ))),
            (kind, _) => Err(ConversionError::structure(format!(
                "expected a label or instruction, found {} node",
                kind
            ))),
        }
    }

    /// Whether this statement closes the block it is in
    pub fn is_terminator(&self) -> bool {
        match self {
            Statement::Label { .. } => false,
            Statement::Instruction { opcode, .. } => {
                let opcode = opcode.to_lowercase();
                opcode == "jmp" || opcode == "ret" || Condition::from_mnemonic(&opcode).is_some()
            }
        }
    }
}

/// Result of partitioning the statement stream
#[derive(Debug, Clone, PartialEq)]
pub struct SplitBlocks<'a> {
    pub blocks: Vec<Vec<Statement<'a>>>,
    pub labels: BTreeMap<String, BlockId>,
}

/// Partition statements into basic blocks at labels and after terminators
pub fn split_blocks(
    statements: &[SyntaxNode],
    duplicates: DuplicateLabels,
) -> Result<SplitBlocks<'_>, ConversionError> {
    let mut blocks: Vec<Vec<Statement<'_>>> = vec![Vec::new()];
    let mut labels = BTreeMap::new();

    for node in statements {
        let statement = Statement::from_node(node)?;

        if let Statement::Label { name } = statement {
            if blocks.last().is_some_and(|block| block.is_empty()) {
                blocks.pop();
            }
            let index = blocks.len();
            if let Some(&first) = labels.get(name) {
                match duplicates {
                    DuplicateLabels::Reject => {
                        return Err(ConversionError::DuplicateLabel {
                            label: name.to_string(),
                            first,
                            second: index,
                        })
                    }
                    DuplicateLabels::Overwrite => {
                        warn!("Label '{}' redefined, block {} replaces block {}", name, index, first)
                    }
                }
            }
            labels.insert(name.to_string(), index);
            blocks.push(Vec::new());
        }

        let terminates = statement.is_terminator();
        if let Some(block) = blocks.last_mut() {
            block.push(statement);
        }
        if terminates {
            blocks.push(Vec::new());
        }
    }

    if blocks.last().is_some_and(|block| block.is_empty()) {
        blocks.pop();
    }

    debug!("Split {} statements into {} blocks", statements.len(), blocks.len());
    for (name, block) in &labels {
        trace!("  label {} -> block {}", name, block);
    }

    Ok(SplitBlocks { blocks, labels })
}

impl Converter {
    /// Lower one block: reset the tracker, lower every statement, then close
    /// the block with a fallthrough when it has no terminator of its own.
    pub(crate) fn lower_block(&mut self, id: BlockId, statements: &[Statement<'_>]) -> Result<(), ConversionError> {
        self.current_block = id;
        let params = self.program.block(id).map(|block| block.params.clone()).unwrap_or_default();
        self.registers.reset(&params);

        debug!("Lowering block {} ({} statements)", id, statements.len());

        for statement in statements {
            match *statement {
                Statement::Label { name } => self.emit(Operation::Label { name: name.to_string() }),
                Statement::Instruction { opcode, operands, location } => {
                    self.lower_instruction(opcode, operands).map_err(|err| match location {
                        Some(location) => err.located(location.clone(), opcode),
                        None => err,
                    })?;
                }
            }
        }

        self.lower_fallthrough();
        Ok(())
    }
}
