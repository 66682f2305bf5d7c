//! SSA control-flow graph for x86 code
//!
//! A [`Program`] is an index-addressed sequence of [`BasicBlock`]s. Every
//! block declares one input parameter per tracked register (16 general
//! purpose registers, then `rflags`); control transfers bind a snapshot of
//! the live register values to the parameters of their successor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use xcfg_common::{BlockId, Register};

/// Handle to an SSA value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Value(pub u32);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// The single definition site of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueDef {
    /// Input parameter `index` of `block`
    BlockParam { block: BlockId, index: usize },
    /// Result `index` of operation `op` in `block`
    OpResult { block: BlockId, op: usize, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueInfo {
    /// Register the value lives in
    pub register: Register,
    pub def: ValueDef,
}

/// Prints the register type of a value, `!reg<rax>` or `!rflags`
pub struct RegisterType(pub Register);

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_general() {
            write!(f, "!reg<{}>", self.0)
        } else {
            write!(f, "!{}", self.0)
        }
    }
}

/// Two-operand arithmetic and logic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    And,
    Xor,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::And => "and",
            BinaryOp::Xor => "xor",
            BinaryOp::Or => "or",
        };
        write!(f, "{}", op_str)
    }
}

/// Single-operand read-modify-write operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Inc,
    Dec,
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            UnaryOp::Inc => "inc",
            UnaryOp::Dec => "dec",
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
        };
        write!(f, "{}", op_str)
    }
}

/// Condition codes of the conditional jumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    A,
    Ae,
    B,
    Be,
    C,
    E,
    G,
    Ge,
    L,
    Le,
    Na,
    Nae,
    Nb,
    Nbe,
    Nc,
    Ne,
    Ng,
    Nge,
    Nl,
    Nle,
    No,
    Np,
    Ns,
    Nz,
    O,
    P,
    Pe,
    Po,
    S,
    Z,
}

impl Condition {
    pub const ALL: [Condition; 30] = [
        Condition::A,
        Condition::Ae,
        Condition::B,
        Condition::Be,
        Condition::C,
        Condition::E,
        Condition::G,
        Condition::Ge,
        Condition::L,
        Condition::Le,
        Condition::Na,
        Condition::Nae,
        Condition::Nb,
        Condition::Nbe,
        Condition::Nc,
        Condition::Ne,
        Condition::Ng,
        Condition::Nge,
        Condition::Nl,
        Condition::Nle,
        Condition::No,
        Condition::Np,
        Condition::Ns,
        Condition::Nz,
        Condition::O,
        Condition::P,
        Condition::Pe,
        Condition::Po,
        Condition::S,
        Condition::Z,
    ];

    /// Look up a conditional jump by its (lowercase) mnemonic
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cond| cond.mnemonic() == mnemonic)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::A => "ja",
            Condition::Ae => "jae",
            Condition::B => "jb",
            Condition::Be => "jbe",
            Condition::C => "jc",
            Condition::E => "je",
            Condition::G => "jg",
            Condition::Ge => "jge",
            Condition::L => "jl",
            Condition::Le => "jle",
            Condition::Na => "jna",
            Condition::Nae => "jnae",
            Condition::Nb => "jnb",
            Condition::Nbe => "jnbe",
            Condition::Nc => "jnc",
            Condition::Ne => "jne",
            Condition::Ng => "jng",
            Condition::Nge => "jnge",
            Condition::Nl => "jnl",
            Condition::Nle => "jnle",
            Condition::No => "jno",
            Condition::Np => "jnp",
            Condition::Ns => "jns",
            Condition::Nz => "jnz",
            Condition::O => "jo",
            Condition::P => "jp",
            Condition::Pe => "jpe",
            Condition::Po => "jpo",
            Condition::S => "js",
            Condition::Z => "jz",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// `[base + offset]` memory reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRef {
    pub base: Value,
    pub offset: i64,
}

impl fmt::Display for MemoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            0 => write!(f, "[{}]", self.base),
            o if o < 0 => write!(f, "[{} - {}]", self.base, o.unsigned_abs()),
            o => write!(f, "[{} + {}]", self.base, o),
        }
    }
}

/// Source operand of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Register(Value),
    Memory(MemoryRef),
    Immediate(i64),
}

impl Source {
    /// SSA values read by this operand
    pub fn value(&self) -> Option<Value> {
        match self {
            Source::Register(value) => Some(*value),
            Source::Memory(mem) => Some(mem.base),
            Source::Immediate(_) => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Register(value) => write!(f, "{}", value),
            Source::Memory(mem) => write!(f, "{}", mem),
            Source::Immediate(imm) => write!(f, "{}", imm),
        }
    }
}

/// IR operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Marker for a source label
    Label { name: String },

    /// Register destination: result = lhs op rhs
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Source,
        result: Value,
    },

    /// Memory destination: [target] = [target] op rhs
    BinaryStore {
        op: BinaryOp,
        target: MemoryRef,
        rhs: Source,
    },

    /// result = source
    Move { source: Source, result: Value },

    /// result = address of [address]
    Lea { address: MemoryRef, result: Value },

    /// [target] = source
    Store { target: MemoryRef, source: Source },

    /// flags = compare lhs, rhs
    Compare { lhs: Source, rhs: Source, flags: Value },

    /// result = op operand
    Unary { op: UnaryOp, operand: Value, result: Value },

    /// [target] = op [target]
    UnaryStore { op: UnaryOp, target: MemoryRef },

    /// rsp_out = push source onto rsp
    Push { rsp: Value, source: Source, rsp_out: Value },

    /// rsp_out, result = pop from rsp
    Pop { rsp: Value, rsp_out: Value, result: Value },

    /// rsp_out = pop from rsp into [target]
    PopStore { rsp: Value, target: MemoryRef, rsp_out: Value },

    /// Unconditional jump: jmp target(args)
    Jump { target: BlockId, args: Vec<Value> },

    /// Conditional jump on flags: then_target(then_args) else else_target(else_args)
    CondJump {
        condition: Condition,
        flags: Value,
        then_target: BlockId,
        then_args: Vec<Value>,
        else_target: BlockId,
        else_args: Vec<Value>,
    },

    /// Synthesized transfer to the next block in program order
    Fallthrough { target: BlockId, args: Vec<Value> },

    Return,
}

impl Operation {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Operation::Jump { .. }
                | Operation::CondJump { .. }
                | Operation::Fallthrough { .. }
                | Operation::Return
        )
    }

    /// Values defined by this operation, in result order
    pub fn results(&self) -> Vec<Value> {
        match self {
            Operation::Binary { result, .. }
            | Operation::Move { result, .. }
            | Operation::Lea { result, .. }
            | Operation::Unary { result, .. } => vec![*result],
            Operation::Compare { flags, .. } => vec![*flags],
            Operation::Push { rsp_out, .. } | Operation::PopStore { rsp_out, .. } => vec![*rsp_out],
            Operation::Pop { rsp_out, result, .. } => vec![*rsp_out, *result],
            Operation::Label { .. }
            | Operation::BinaryStore { .. }
            | Operation::Store { .. }
            | Operation::UnaryStore { .. }
            | Operation::Jump { .. }
            | Operation::CondJump { .. }
            | Operation::Fallthrough { .. }
            | Operation::Return => Vec::new(),
        }
    }

    /// Values read by this operation, including successor arguments
    pub fn operands(&self) -> Vec<Value> {
        match self {
            Operation::Label { .. } | Operation::Return => Vec::new(),
            Operation::Binary { lhs, rhs, .. } => std::iter::once(*lhs).chain(rhs.value()).collect(),
            Operation::BinaryStore { target, rhs, .. } => {
                std::iter::once(target.base).chain(rhs.value()).collect()
            }
            Operation::Move { source, .. } => source.value().into_iter().collect(),
            Operation::Lea { address, .. } => vec![address.base],
            Operation::Store { target, source } => {
                std::iter::once(target.base).chain(source.value()).collect()
            }
            Operation::Compare { lhs, rhs, .. } => lhs.value().into_iter().chain(rhs.value()).collect(),
            Operation::Unary { operand, .. } => vec![*operand],
            Operation::UnaryStore { target, .. } => vec![target.base],
            Operation::Push { rsp, source, .. } => std::iter::once(*rsp).chain(source.value()).collect(),
            Operation::Pop { rsp, .. } => vec![*rsp],
            Operation::PopStore { rsp, target, .. } => vec![*rsp, target.base],
            Operation::Jump { args, .. } | Operation::Fallthrough { args, .. } => args.clone(),
            Operation::CondJump { flags, then_args, else_args, .. } => std::iter::once(*flags)
                .chain(then_args.iter().copied())
                .chain(else_args.iter().copied())
                .collect(),
        }
    }

    /// Successor edges of a terminator, each with the values bound to the
    /// successor's parameters
    pub fn successors(&self) -> Vec<(BlockId, &[Value])> {
        match self {
            Operation::Jump { target, args } | Operation::Fallthrough { target, args } => {
                vec![(*target, args.as_slice())]
            }
            Operation::CondJump { then_target, then_args, else_target, else_args, .. } => vec![
                (*then_target, then_args.as_slice()),
                (*else_target, else_args.as_slice()),
            ],
            _ => Vec::new(),
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, target: BlockId, args: &[Value]) -> fmt::Result {
    write!(f, "^bb{}(", target)?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    write!(f, ")")
}

/// Prints the operation body; result names and types are printed by the
/// enclosing [`Program`], which owns the value table.
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Label { name } => write!(f, "label \"{}\"", name),
            Operation::Binary { op, lhs, rhs, .. } => write!(f, "{} {}, {}", op, lhs, rhs),
            Operation::BinaryStore { op, target, rhs } => write!(f, "{} {}, {}", op, target, rhs),
            Operation::Move { source, .. } => write!(f, "mov {}", source),
            Operation::Lea { address, .. } => write!(f, "lea {}", address),
            Operation::Store { target, source } => write!(f, "mov {}, {}", target, source),
            Operation::Compare { lhs, rhs, .. } => write!(f, "cmp {}, {}", lhs, rhs),
            Operation::Unary { op, operand, .. } => write!(f, "{} {}", op, operand),
            Operation::UnaryStore { op, target } => write!(f, "{} {}", op, target),
            Operation::Push { rsp, source, .. } => write!(f, "push {}, {}", rsp, source),
            Operation::Pop { rsp, .. } => write!(f, "pop {}", rsp),
            Operation::PopStore { rsp, target, .. } => write!(f, "pop {}, {}", rsp, target),
            Operation::Jump { target, args } => {
                write!(f, "jmp ")?;
                write_args(f, *target, args)
            }
            Operation::CondJump { condition, flags, then_target, then_args, else_target, else_args } => {
                write!(f, "{} {}, ", condition, flags)?;
                write_args(f, *then_target, then_args)?;
                write!(f, ", ")?;
                write_args(f, *else_target, else_args)
            }
            Operation::Fallthrough { target, args } => {
                write!(f, "fallthrough ")?;
                write_args(f, *target, args)
            }
            Operation::Return => write!(f, "ret"),
        }
    }
}

/// Basic Block - a sequence of operations with a single entry and exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    /// One value per register, in `Register::ALL` order
    pub params: Vec<Value>,
    pub operations: Vec<Operation>,
}

impl BasicBlock {
    pub fn new(id: BlockId, params: Vec<Value>) -> Self {
        Self {
            id,
            params,
            operations: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Parameter holding `reg` on block entry
    pub fn param(&self, reg: Register) -> Option<Value> {
        self.params.get(reg.index()).copied()
    }

    pub fn terminator(&self) -> Option<&Operation> {
        self.operations.last().filter(|op| op.is_terminator())
    }

    pub fn has_terminator(&self) -> bool {
        self.terminator().is_some()
    }

    pub fn successors(&self) -> Vec<(BlockId, &[Value])> {
        self.terminator().map(|op| op.successors()).unwrap_or_default()
    }
}

/// The converted control-flow graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub blocks: Vec<BasicBlock>,
    /// Value table indexed by `Value.0`
    pub values: Vec<ValueInfo>,
    /// Label name to the block it begins
    pub labels: BTreeMap<String, BlockId>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh value
    pub fn new_value(&mut self, register: Register, def: ValueDef) -> Value {
        let value = Value(self.values.len() as u32);
        self.values.push(ValueInfo { register, def });
        value
    }

    pub fn value_info(&self, value: Value) -> Option<&ValueInfo> {
        self.values.get(value.0 as usize)
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id)
    }

    /// Block that `label` begins
    pub fn label_block(&self, label: &str) -> Option<&BasicBlock> {
        self.labels.get(label).and_then(|&id| self.blocks.get(id))
    }

    /// Every (from, to) control edge, in block order
    pub fn edges(&self) -> Vec<(BlockId, BlockId)> {
        self.blocks
            .iter()
            .flat_map(|block| block.successors().into_iter().map(move |(to, _)| (block.id, to)))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn write_type(&self, f: &mut fmt::Formatter<'_>, value: Value) -> fmt::Result {
        match self.value_info(value) {
            Some(info) => write!(f, "{}", RegisterType(info.register)),
            None => write!(f, "!unknown"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "^bb{}(", block.id)?;
            for (i, param) in block.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} : ", param)?;
                self.write_type(f, *param)?;
            }
            writeln!(f, "):")?;

            for op in &block.operations {
                let results = op.results();
                write!(f, "  ")?;
                if !results.is_empty() {
                    for (i, result) in results.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", result)?;
                    }
                    write!(f, " = ")?;
                }
                write!(f, "{}", op)?;
                if !results.is_empty() {
                    write!(f, " : ")?;
                    for (i, result) in results.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        self.write_type(f, *result)?;
                    }
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
