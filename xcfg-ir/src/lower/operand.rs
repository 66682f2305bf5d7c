//! Operand decoding
//!
//! Turns raw operand nodes of the parse tree into typed operands. Memory
//! operands are restricted to `[reg]` and `[reg ± imm]`; the base register's
//! current SSA value is read from the tracker at decode time.

use crate::ir::{MemoryRef, Source};
use crate::lower::registers::RegisterTracker;
use xcfg_common::{ConversionError, NodeKind, Register, SyntaxNode, TokenKind};

/// A decoded instruction operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Immediate(i64),
    Memory(MemoryRef),
}

impl Operand {
    /// Source form of the operand, reading registers from the tracker
    pub fn to_source(self, registers: &RegisterTracker) -> Source {
        match self {
            Operand::Register(reg) => Source::Register(registers.read(reg)),
            Operand::Immediate(imm) => Source::Immediate(imm),
            Operand::Memory(mem) => Source::Memory(mem),
        }
    }
}

/// Decode one of the 16 general purpose registers
pub fn decode_register(node: &SyntaxNode) -> Result<Register, ConversionError> {
    match node {
        SyntaxNode::Leaf(token) if token.kind == TokenKind::Register => {
            Register::general_from_name(&token.text).ok_or_else(|| {
                ConversionError::invalid_operand(format!(
                    "'{}' is not a general purpose 64-bit register",
                    token.text
                ))
            })
        }
        other => Err(ConversionError::invalid_operand(format!(
            "expected a register, found '{}'",
            other
        ))),
    }
}

/// Decode a signed decimal or `0x` hexadecimal integer literal
pub fn decode_immediate(node: &SyntaxNode) -> Result<i64, ConversionError> {
    match node {
        SyntaxNode::Leaf(token) if token.kind == TokenKind::Immediate => parse_integer(&token.text)
            .ok_or_else(|| ConversionError::invalid_operand(format!("invalid immediate '{}'", token.text))),
        other => Err(ConversionError::invalid_operand(format!(
            "expected an immediate, found '{}'",
            other
        ))),
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.strip_prefix('+').unwrap_or(text)),
    };

    let (digits, radix) = match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (rest, 10),
    };
    if !digits.starts_with(|c: char| c.is_digit(radix)) {
        return None;
    }

    i64::from_str_radix(&format!("{}{}", sign, digits), radix).ok()
}

/// Decode `[base]` or `[base sign magnitude]`
pub fn decode_memory(node: &SyntaxNode, registers: &RegisterTracker) -> Result<MemoryRef, ConversionError> {
    let tree = match node {
        SyntaxNode::Node(tree) if tree.kind == NodeKind::Memory => tree,
        other => {
            return Err(ConversionError::invalid_operand(format!(
                "expected a memory operand, found '{}'",
                other
            )))
        }
    };

    match tree.children.as_slice() {
        [base] => Ok(MemoryRef {
            base: registers.read(decode_register(base)?),
            offset: 0,
        }),
        [base, sign, magnitude] => {
            let base = registers.read(decode_register(base)?);
            let sign = match sign {
                SyntaxNode::Leaf(token) if token.kind == TokenKind::Sign && (token.text == "+" || token.text == "-") => {
                    &token.text
                }
                _ => {
                    return Err(ConversionError::invalid_operand(format!(
                        "invalid memory offset sign '{}' in '{}'",
                        sign, node
                    )))
                }
            };
            let magnitude = match magnitude {
                SyntaxNode::Leaf(token) if token.kind == TokenKind::Immediate => &token.text,
                other => {
                    return Err(ConversionError::invalid_operand(format!(
                        "expected an offset, found '{}' in '{}'",
                        other, node
                    )))
                }
            };
            // Sign and digits parse together so -2^63 stays in range
            let offset = parse_integer(&format!("{}{}", sign, magnitude.trim())).ok_or_else(|| {
                ConversionError::invalid_operand(format!("invalid memory offset '{}{}' in '{}'", sign, magnitude, node))
            })?;
            Ok(MemoryRef { base, offset })
        }
        _ => Err(ConversionError::invalid_operand(format!(
            "unsupported addressing mode '{}', expected [reg] or [reg +/- imm]",
            node
        ))),
    }
}

/// Decode any register, immediate or memory operand
pub fn decode_operand(node: &SyntaxNode, registers: &RegisterTracker) -> Result<Operand, ConversionError> {
    match node {
        SyntaxNode::Leaf(token) => match token.kind {
            TokenKind::Register => decode_register(node).map(Operand::Register),
            TokenKind::Immediate => decode_immediate(node).map(Operand::Immediate),
            TokenKind::LabelName | TokenKind::Opcode | TokenKind::Sign => Err(ConversionError::invalid_operand(
                format!("{} '{}' cannot be used as an operand", token.kind, token.text),
            )),
        },
        SyntaxNode::Node(_) => decode_memory(node, registers).map(Operand::Memory),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Value;
    use pretty_assertions::assert_eq;

    fn tracker() -> RegisterTracker {
        let mut registers = RegisterTracker::new();
        let inputs: Vec<Value> = (0..17).map(Value).collect();
        registers.reset(&inputs);
        registers
    }

    #[test]
    fn test_decode_register() {
        assert_eq!(decode_register(&SyntaxNode::register("RBX")).unwrap(), Register::Rbx);
        assert!(decode_register(&SyntaxNode::register("eax")).is_err());
        assert!(decode_register(&SyntaxNode::register("rflags")).is_err());
        assert!(decode_register(&SyntaxNode::immediate("1")).is_err());
    }

    #[test]
    fn test_decode_immediate() {
        assert_eq!(decode_immediate(&SyntaxNode::immediate("42")).unwrap(), 42);
        assert_eq!(decode_immediate(&SyntaxNode::immediate("-16")).unwrap(), -16);
        assert_eq!(decode_immediate(&SyntaxNode::immediate("0x1F")).unwrap(), 31);
        assert_eq!(decode_immediate(&SyntaxNode::immediate("-0x10")).unwrap(), -16);
        assert_eq!(decode_immediate(&SyntaxNode::immediate("+7")).unwrap(), 7);
    }

    #[test]
    fn test_decode_immediate_rejects_garbage() {
        for text in ["", "abc", "0x", "0x-5", "--5", "1.5", "99999999999999999999"] {
            let err = decode_immediate(&SyntaxNode::immediate(text)).unwrap_err();
            assert_eq!(err, ConversionError::invalid_operand(format!("invalid immediate '{}'", text)));
        }
    }

    #[test]
    fn test_decode_memory_offsets() {
        let registers = tracker();
        let plus = SyntaxNode::memory("rdx", Some(("+", "4")));
        let minus = SyntaxNode::memory("rdx", Some(("-", "4")));
        let bare = SyntaxNode::memory("rsp", None);

        assert_eq!(decode_memory(&plus, &registers).unwrap(), MemoryRef { base: Value(2), offset: 4 });
        assert_eq!(decode_memory(&minus, &registers).unwrap(), MemoryRef { base: Value(2), offset: -4 });
        assert_eq!(decode_memory(&bare, &registers).unwrap(), MemoryRef { base: Value(4), offset: 0 });
    }

    #[test]
    fn test_decode_memory_offset_range() {
        let registers = tracker();
        let lowest = SyntaxNode::memory("rbx", Some(("-", "9223372036854775808")));
        let highest = SyntaxNode::memory("rbx", Some(("+", "0x7fffffffffffffff")));
        let too_high = SyntaxNode::memory("rbx", Some(("+", "9223372036854775808")));

        assert_eq!(decode_memory(&lowest, &registers).unwrap().offset, i64::MIN);
        assert_eq!(decode_memory(&highest, &registers).unwrap().offset, i64::MAX);
        assert!(matches!(
            decode_memory(&too_high, &registers),
            Err(ConversionError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_decode_memory_reads_current_base_value() {
        let mut registers = tracker();
        registers.write(Register::Rdx, Value(50));
        let mem = SyntaxNode::memory("rdx", Some(("+", "8")));
        assert_eq!(decode_memory(&mem, &registers).unwrap().base, Value(50));
    }

    #[test]
    fn test_decode_memory_rejects_other_shapes() {
        let registers = tracker();
        let two_registers = SyntaxNode::node(
            NodeKind::Memory,
            vec![
                SyntaxNode::register("rbx"),
                SyntaxNode::leaf(TokenKind::Sign, "+"),
                SyntaxNode::register("rcx"),
            ],
        );
        let two_children = SyntaxNode::node(
            NodeKind::Memory,
            vec![SyntaxNode::register("rbx"), SyntaxNode::immediate("4")],
        );
        let bad_sign = SyntaxNode::memory("rbx", Some(("*", "4")));

        for node in [two_registers, two_children, bad_sign] {
            assert!(matches!(
                decode_memory(&node, &registers),
                Err(ConversionError::InvalidOperand { .. })
            ));
        }
    }

    #[test]
    fn test_decode_operand_dispatch() {
        let registers = tracker();
        assert_eq!(
            decode_operand(&SyntaxNode::register("rsi"), &registers).unwrap(),
            Operand::Register(Register::Rsi)
        );
        assert_eq!(
            decode_operand(&SyntaxNode::immediate("3"), &registers).unwrap(),
            Operand::Immediate(3)
        );
        assert!(decode_operand(&SyntaxNode::label_ref("loop"), &registers).is_err());
        assert_eq!(
            Operand::Register(Register::Rsi).to_source(&registers),
            Source::Register(Value(6))
        );
    }
}
