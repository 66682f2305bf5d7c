use crate::ir::Operation;
use crate::lower::instr::{Place, SourceKind};
use crate::lower::operand::{decode_memory, decode_register};
use crate::lower::Converter;
use xcfg_common::{ConversionError, Register, SyntaxNode};

impl Converter {
    pub(crate) fn lower_push(&mut self, src: Place, operands: &[SyntaxNode]) -> Result<(), ConversionError> {
        let kind = match src {
            Place::Register => SourceKind::Register,
            Place::Memory => SourceKind::Memory,
        };
        let source = self.decode_source(self.operand(operands, 0)?, kind)?;
        let rsp = self.registers.read(Register::STACK_POINTER);
        let rsp_out = self.define(Register::STACK_POINTER, 0);
        self.emit(Operation::Push { rsp, source, rsp_out });
        self.registers.write(Register::STACK_POINTER, rsp_out);
        Ok(())
    }

    /// Result 0 is the new stack pointer; for a register destination result 1
    /// is the popped value. The stack pointer is written first, so `pop rsp`
    /// leaves the popped value in rsp.
    pub(crate) fn lower_pop(&mut self, dest: Place, operands: &[SyntaxNode]) -> Result<(), ConversionError> {
        let node = self.operand(operands, 0)?;
        let rsp = self.registers.read(Register::STACK_POINTER);

        match dest {
            Place::Register => {
                let reg = decode_register(node)?;
                let rsp_out = self.define(Register::STACK_POINTER, 0);
                let result = self.define(reg, 1);
                self.emit(Operation::Pop { rsp, rsp_out, result });
                self.registers.write(Register::STACK_POINTER, rsp_out);
                self.registers.write(reg, result);
            }
            Place::Memory => {
                let target = decode_memory(node, &self.registers)?;
                let rsp_out = self.define(Register::STACK_POINTER, 0);
                self.emit(Operation::PopStore { rsp, target, rsp_out });
                self.registers.write(Register::STACK_POINTER, rsp_out);
            }
        }
        Ok(())
    }
}
