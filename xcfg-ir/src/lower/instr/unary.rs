use crate::ir::{Operation, UnaryOp};
use crate::lower::instr::Place;
use crate::lower::operand::{decode_memory, decode_register};
use crate::lower::Converter;
use xcfg_common::{ConversionError, SyntaxNode};

impl Converter {
    pub(crate) fn lower_unary(&mut self, op: UnaryOp, dest: Place, operands: &[SyntaxNode]) -> Result<(), ConversionError> {
        let node = self.operand(operands, 0)?;

        match dest {
            Place::Register => {
                let reg = decode_register(node)?;
                let operand = self.registers.read(reg);
                let result = self.define(reg, 0);
                self.emit(Operation::Unary { op, operand, result });
                self.registers.write(reg, result);
            }
            Place::Memory => {
                let target = decode_memory(node, &self.registers)?;
                self.emit(Operation::UnaryStore { op, target });
            }
        }
        Ok(())
    }
}
