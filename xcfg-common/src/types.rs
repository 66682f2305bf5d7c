//! Common types used throughout the converter
//!
//! This module defines the architectural register table. The table is a
//! static, immutable mapping from register names to their canonical index;
//! block parameters, register snapshots and the per-block register tracker
//! all use the order defined here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a basic block within a program
pub type BlockId = usize;

/// Number of values carried by every block boundary (16 GPRs + flags)
pub const BLOCK_PARAM_COUNT: usize = 17;

/// Architectural registers tracked by the converter.
///
/// The discriminants are the canonical parameter order: the 16 general
/// purpose registers in encoding order, then the flags register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
    /// Synthetic status register written by comparisons
    Rflags = 16,
}

impl Register {
    /// Every tracked register in block parameter order
    pub const ALL: [Register; BLOCK_PARAM_COUNT] = [
        Register::Rax,
        Register::Rcx,
        Register::Rdx,
        Register::Rbx,
        Register::Rsp,
        Register::Rbp,
        Register::Rsi,
        Register::Rdi,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
        Register::Rflags,
    ];

    pub const STACK_POINTER: Register = Register::Rsp;
    pub const FLAGS: Register = Register::Rflags;

    /// Look up a tracked register by name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rax" => Some(Register::Rax),
            "rcx" => Some(Register::Rcx),
            "rdx" => Some(Register::Rdx),
            "rbx" => Some(Register::Rbx),
            "rsp" => Some(Register::Rsp),
            "rbp" => Some(Register::Rbp),
            "rsi" => Some(Register::Rsi),
            "rdi" => Some(Register::Rdi),
            "r8" => Some(Register::R8),
            "r9" => Some(Register::R9),
            "r10" => Some(Register::R10),
            "r11" => Some(Register::R11),
            "r12" => Some(Register::R12),
            "r13" => Some(Register::R13),
            "r14" => Some(Register::R14),
            "r15" => Some(Register::R15),
            "rflags" => Some(Register::Rflags),
            _ => None,
        }
    }

    /// Look up a general purpose register by name; `rflags` is not one
    pub fn general_from_name(name: &str) -> Option<Self> {
        Self::from_name(name).filter(|reg| reg.is_general())
    }

    /// Canonical lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Register::Rax => "rax",
            Register::Rcx => "rcx",
            Register::Rdx => "rdx",
            Register::Rbx => "rbx",
            Register::Rsp => "rsp",
            Register::Rbp => "rbp",
            Register::Rsi => "rsi",
            Register::Rdi => "rdi",
            Register::R8 => "r8",
            Register::R9 => "r9",
            Register::R10 => "r10",
            Register::R11 => "r11",
            Register::R12 => "r12",
            Register::R13 => "r13",
            Register::R14 => "r14",
            Register::R15 => "r15",
            Register::Rflags => "rflags",
        }
    }

    /// Position in the block parameter list
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_general(self) -> bool {
        self != Register::Rflags
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
