use crate::ir::{BinaryOp, Operation, Source};
use crate::lower::instr::{Place, SourceKind};
use crate::lower::operand::{decode_memory, decode_operand, decode_register, Operand};
use crate::lower::Converter;
use xcfg_common::{ConversionError, Register, SyntaxNode};

impl Converter {
    /// Fetch operand `index`; the allow-table guarantees it is present
    pub(crate) fn operand<'a>(&self, operands: &'a [SyntaxNode], index: usize) -> Result<&'a SyntaxNode, ConversionError> {
        operands
            .get(index)
            .ok_or_else(|| ConversionError::invalid_operand(format!("missing operand {}", index + 1)))
    }

    /// Decode a source operand of the kind chosen by the allow-table
    pub(crate) fn decode_source(&self, node: &SyntaxNode, kind: SourceKind) -> Result<Source, ConversionError> {
        let operand = decode_operand(node, &self.registers)?;
        match (kind, operand) {
            (SourceKind::Register, Operand::Register(_))
            | (SourceKind::Memory, Operand::Memory(_))
            | (SourceKind::Immediate, Operand::Immediate(_)) => Ok(operand.to_source(&self.registers)),
            _ => Err(ConversionError::invalid_operand(format!(
                "expected a {:?} operand, found '{}'",
                kind, node
            ))),
        }
    }

    pub(crate) fn lower_binary(
        &mut self,
        op: BinaryOp,
        dest: Place,
        src: SourceKind,
        operands: &[SyntaxNode],
    ) -> Result<(), ConversionError> {
        let rhs = self.decode_source(self.operand(operands, 1)?, src)?;
        let dest_node = self.operand(operands, 0)?;

        match dest {
            Place::Register => {
                let reg = decode_register(dest_node)?;
                let lhs = self.registers.read(reg);
                let result = self.define(reg, 0);
                self.emit(Operation::Binary { op, lhs, rhs, result });
                self.registers.write(reg, result);
            }
            Place::Memory => {
                let target = decode_memory(dest_node, &self.registers)?;
                self.emit(Operation::BinaryStore { op, target, rhs });
            }
        }
        Ok(())
    }

    pub(crate) fn lower_move(&mut self, dest: Place, src: SourceKind, operands: &[SyntaxNode]) -> Result<(), ConversionError> {
        let source = self.decode_source(self.operand(operands, 1)?, src)?;
        let dest_node = self.operand(operands, 0)?;

        match dest {
            Place::Register => {
                let reg = decode_register(dest_node)?;
                let result = self.define(reg, 0);
                self.emit(Operation::Move { source, result });
                self.registers.write(reg, result);
            }
            Place::Memory => {
                let target = decode_memory(dest_node, &self.registers)?;
                self.emit(Operation::Store { target, source });
            }
        }
        Ok(())
    }

    pub(crate) fn lower_lea(&mut self, operands: &[SyntaxNode]) -> Result<(), ConversionError> {
        let reg = decode_register(self.operand(operands, 0)?)?;
        let address = decode_memory(self.operand(operands, 1)?, &self.registers)?;
        let result = self.define(reg, 0);
        self.emit(Operation::Lea { address, result });
        self.registers.write(reg, result);
        Ok(())
    }

    /// `cmp` only produces a new flags value
    pub(crate) fn lower_compare(&mut self, lhs: Place, rhs: SourceKind, operands: &[SyntaxNode]) -> Result<(), ConversionError> {
        let lhs_kind = match lhs {
            Place::Register => SourceKind::Register,
            Place::Memory => SourceKind::Memory,
        };
        let lhs = self.decode_source(self.operand(operands, 0)?, lhs_kind)?;
        let rhs = self.decode_source(self.operand(operands, 1)?, rhs)?;
        let flags = self.define(Register::FLAGS, 0);
        self.emit(Operation::Compare { lhs, rhs, flags });
        self.registers.write(Register::FLAGS, flags);
        Ok(())
    }
}
