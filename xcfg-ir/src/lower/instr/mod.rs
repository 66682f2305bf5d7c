//! Instruction selection
//!
//! An instruction is classified by its mnemonic and the shape of its
//! operands. The `(Mnemonic, OperandShape)` pair is looked up in a closed
//! allow-table producing a [`Form`]; each form has exactly one lowering.

use crate::ir::{BinaryOp, Condition, UnaryOp};
use crate::lower::Converter;
use log::trace;
use std::fmt;
use xcfg_common::{ConversionError, NodeKind, SyntaxNode, TokenKind};

mod binary;
mod control_flow;
mod stack;
mod unary;

/// Mnemonics with at least one supported form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Binary(BinaryOp),
    Mov,
    Lea,
    Cmp,
    Unary(UnaryOp),
    Push,
    Pop,
    Jmp,
    Jcc(Condition),
    Ret,
}

impl Mnemonic {
    pub fn from_opcode(opcode: &str) -> Option<Self> {
        let opcode = opcode.to_lowercase();
        let mnemonic = match opcode.as_str() {
            "add" => Mnemonic::Binary(BinaryOp::Add),
            "sub" => Mnemonic::Binary(BinaryOp::Sub),
            "and" => Mnemonic::Binary(BinaryOp::And),
            "xor" => Mnemonic::Binary(BinaryOp::Xor),
            "or" => Mnemonic::Binary(BinaryOp::Or),
            "mov" => Mnemonic::Mov,
            "lea" => Mnemonic::Lea,
            "cmp" => Mnemonic::Cmp,
            "inc" => Mnemonic::Unary(UnaryOp::Inc),
            "dec" => Mnemonic::Unary(UnaryOp::Dec),
            "neg" => Mnemonic::Unary(UnaryOp::Neg),
            "not" => Mnemonic::Unary(UnaryOp::Not),
            "push" => Mnemonic::Push,
            "pop" => Mnemonic::Pop,
            "jmp" => Mnemonic::Jmp,
            "ret" => Mnemonic::Ret,
            other => Mnemonic::Jcc(Condition::from_mnemonic(other)?),
        };
        Some(mnemonic)
    }
}

/// Syntactic kind of one operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Register,
    Memory,
    Immediate,
    Label,
}

impl OperandKind {
    fn classify(node: &SyntaxNode) -> Result<Self, ConversionError> {
        match node {
            SyntaxNode::Leaf(token) => match token.kind {
                TokenKind::Register => Ok(OperandKind::Register),
                TokenKind::Immediate => Ok(OperandKind::Immediate),
                TokenKind::LabelName => Ok(OperandKind::Label),
                TokenKind::Opcode | TokenKind::Sign => Err(ConversionError::invalid_operand(format!(
                    "{} '{}' cannot be used as an operand",
                    token.kind, token.text
                ))),
            },
            SyntaxNode::Node(tree) if tree.kind == NodeKind::Memory => Ok(OperandKind::Memory),
            SyntaxNode::Node(tree) => Err(ConversionError::invalid_operand(format!(
                "{} node cannot be used as an operand",
                tree.kind
            ))),
        }
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperandKind::Register => "reg",
            OperandKind::Memory => "mem",
            OperandKind::Immediate => "imm",
            OperandKind::Label => "label",
        };
        write!(f, "{}", name)
    }
}

/// Operand shape of an instruction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperandShape {
    None,
    Reg,
    Mem,
    Label,
    RegReg,
    RegMem,
    RegImm,
    MemReg,
    MemImm,
    /// Any other combination; never present in the allow-table
    Irregular(Vec<OperandKind>),
}

impl OperandShape {
    /// Classify an operand list. A label is only accepted as the sole operand.
    pub fn classify(operands: &[SyntaxNode]) -> Result<Self, ConversionError> {
        let kinds = operands
            .iter()
            .map(OperandKind::classify)
            .collect::<Result<Vec<_>, _>>()?;

        use OperandKind::*;
        let shape = match kinds.as_slice() {
            [] => OperandShape::None,
            [Label] => OperandShape::Label,
            _ if kinds.contains(&Label) => {
                return Err(ConversionError::invalid_operand(format!(
                    "label operand not allowed here: '{}'",
                    operands.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                )))
            }
            [Register] => OperandShape::Reg,
            [Memory] => OperandShape::Mem,
            [Register, Register] => OperandShape::RegReg,
            [Register, Memory] => OperandShape::RegMem,
            [Register, Immediate] => OperandShape::RegImm,
            [Memory, Register] => OperandShape::MemReg,
            [Memory, Immediate] => OperandShape::MemImm,
            _ => OperandShape::Irregular(kinds),
        };
        Ok(shape)
    }
}

impl fmt::Display for OperandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperandShape::None => "none",
            OperandShape::Reg => "reg",
            OperandShape::Mem => "mem",
            OperandShape::Label => "label",
            OperandShape::RegReg => "reg-reg",
            OperandShape::RegMem => "reg-mem",
            OperandShape::RegImm => "reg-imm",
            OperandShape::MemReg => "mem-reg",
            OperandShape::MemImm => "mem-imm",
            OperandShape::Irregular(kinds) => {
                for (i, kind) in kinds.iter().enumerate() {
                    if i > 0 {
                        write!(f, "-")?;
                    }
                    write!(f, "{}", kind)?;
                }
                return Ok(());
            }
        };
        write!(f, "{}", name)
    }
}

/// Register or memory location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Place {
    Register,
    Memory,
}

/// Syntactic kind of a source operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Register,
    Memory,
    Immediate,
}

/// Canonical operation kind selected for an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form {
    Binary { op: BinaryOp, dest: Place, src: SourceKind },
    Move { dest: Place, src: SourceKind },
    Lea,
    Compare { lhs: Place, rhs: SourceKind },
    Unary { op: UnaryOp, dest: Place },
    Push(Place),
    Pop(Place),
    Jump,
    CondJump(Condition),
    Return,
}

/// The allow-table: every supported (mnemonic, shape) combination
pub fn select(mnemonic: Mnemonic, shape: &OperandShape) -> Option<Form> {
    use OperandShape as S;
    use Place as P;
    use SourceKind as K;

    let form = match (mnemonic, shape) {
        (Mnemonic::Binary(op), S::RegReg) => Form::Binary { op, dest: P::Register, src: K::Register },
        (Mnemonic::Binary(op), S::RegMem) => Form::Binary { op, dest: P::Register, src: K::Memory },
        (Mnemonic::Binary(op), S::RegImm) => Form::Binary { op, dest: P::Register, src: K::Immediate },
        (Mnemonic::Binary(op), S::MemReg) => Form::Binary { op, dest: P::Memory, src: K::Register },
        (Mnemonic::Binary(op), S::MemImm) => Form::Binary { op, dest: P::Memory, src: K::Immediate },

        (Mnemonic::Mov, S::RegReg) => Form::Move { dest: P::Register, src: K::Register },
        (Mnemonic::Mov, S::RegMem) => Form::Move { dest: P::Register, src: K::Memory },
        (Mnemonic::Mov, S::RegImm) => Form::Move { dest: P::Register, src: K::Immediate },
        (Mnemonic::Mov, S::MemReg) => Form::Move { dest: P::Memory, src: K::Register },
        (Mnemonic::Mov, S::MemImm) => Form::Move { dest: P::Memory, src: K::Immediate },

        (Mnemonic::Lea, S::RegMem) => Form::Lea,

        (Mnemonic::Cmp, S::RegReg) => Form::Compare { lhs: P::Register, rhs: K::Register },
        (Mnemonic::Cmp, S::RegMem) => Form::Compare { lhs: P::Register, rhs: K::Memory },
        (Mnemonic::Cmp, S::RegImm) => Form::Compare { lhs: P::Register, rhs: K::Immediate },
        (Mnemonic::Cmp, S::MemReg) => Form::Compare { lhs: P::Memory, rhs: K::Register },
        (Mnemonic::Cmp, S::MemImm) => Form::Compare { lhs: P::Memory, rhs: K::Immediate },

        (Mnemonic::Unary(op), S::Reg) => Form::Unary { op, dest: P::Register },
        (Mnemonic::Unary(op), S::Mem) => Form::Unary { op, dest: P::Memory },

        (Mnemonic::Push, S::Reg) => Form::Push(P::Register),
        (Mnemonic::Push, S::Mem) => Form::Push(P::Memory),
        (Mnemonic::Pop, S::Reg) => Form::Pop(P::Register),
        (Mnemonic::Pop, S::Mem) => Form::Pop(P::Memory),

        (Mnemonic::Jmp, S::Label) => Form::Jump,
        (Mnemonic::Jcc(cond), S::Label) => Form::CondJump(cond),
        (Mnemonic::Ret, S::None) => Form::Return,

        _ => return None,
    };
    Some(form)
}

impl Converter {
    pub(crate) fn lower_instruction(&mut self, opcode: &str, operands: &[SyntaxNode]) -> Result<(), ConversionError> {
        let shape = OperandShape::classify(operands)?;
        let form = Mnemonic::from_opcode(opcode)
            .and_then(|mnemonic| select(mnemonic, &shape))
            .ok_or_else(|| ConversionError::unsupported(opcode, &shape))?;

        trace!("  {} ({}) -> {:?}", opcode, shape, form);

        match form {
            Form::Binary { op, dest, src } => self.lower_binary(op, dest, src, operands),
            Form::Move { dest, src } => self.lower_move(dest, src, operands),
            Form::Lea => self.lower_lea(operands),
            Form::Compare { lhs, rhs } => self.lower_compare(lhs, rhs, operands),
            Form::Unary { op, dest } => self.lower_unary(op, dest, operands),
            Form::Push(src) => self.lower_push(src, operands),
            Form::Pop(dest) => self.lower_pop(dest, operands),
            Form::Jump => self.lower_jump(operands),
            Form::CondJump(condition) => self.lower_cond_jump(condition, operands),
            Form::Return => {
                self.lower_return();
                Ok(())
            }
        }
    }
}
