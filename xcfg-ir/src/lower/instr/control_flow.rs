use crate::ir::{Condition, Operation};
use crate::lower::Converter;
use log::trace;
use xcfg_common::{BlockId, ConversionError, Register, SyntaxNode, TokenKind};

impl Converter {
    pub(crate) fn resolve_label(&self, label: &str) -> Result<BlockId, ConversionError> {
        self.program
            .labels
            .get(label)
            .copied()
            .ok_or_else(|| ConversionError::UnknownLabel { label: label.to_string() })
    }

    fn jump_target(&self, operands: &[SyntaxNode]) -> Result<BlockId, ConversionError> {
        match operands {
            [SyntaxNode::Leaf(token)] if token.kind == TokenKind::LabelName => self.resolve_label(&token.text),
            _ => Err(ConversionError::invalid_operand("jump requires a single label operand")),
        }
    }

    pub(crate) fn lower_jump(&mut self, operands: &[SyntaxNode]) -> Result<(), ConversionError> {
        let target = self.jump_target(operands)?;
        trace!("  jmp -> block {}", target);
        let args = self.registers.snapshot();
        self.emit(Operation::Jump { target, args });
        Ok(())
    }

    /// Both successors receive the same snapshot; the else edge goes to the
    /// next block in program order.
    pub(crate) fn lower_cond_jump(&mut self, condition: Condition, operands: &[SyntaxNode]) -> Result<(), ConversionError> {
        let then_target = self.jump_target(operands)?;
        let else_target = self.current_block + 1;
        if else_target >= self.block_count() {
            return Err(ConversionError::DanglingConditionalJump {
                opcode: condition.mnemonic().to_string(),
                block: self.current_block,
            });
        }

        trace!("  {} -> block {} / block {}", condition, then_target, else_target);
        let flags = self.registers.read(Register::FLAGS);
        let args = self.registers.snapshot();
        self.emit(Operation::CondJump {
            condition,
            flags,
            then_target,
            then_args: args.clone(),
            else_target,
            else_args: args,
        });
        Ok(())
    }

    pub(crate) fn lower_return(&mut self) {
        self.emit(Operation::Return);
    }

    /// Close a block that ended without a jump or return, unless it is the
    /// last block of the program
    pub(crate) fn lower_fallthrough(&mut self) {
        let has_terminator = self
            .program
            .block(self.current_block)
            .is_some_and(|block| block.has_terminator());
        let target = self.current_block + 1;
        if has_terminator || target >= self.block_count() {
            return;
        }

        trace!("  fallthrough -> block {}", target);
        let args = self.registers.snapshot();
        self.emit(Operation::Fallthrough { target, args });
    }
}
