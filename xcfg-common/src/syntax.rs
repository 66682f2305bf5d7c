//! Parse tree handed from the assembly reader to the lowering engine
//!
//! The tree is a closed tagged variant: a node is either a leaf token with a
//! kind and its source text, or a structural node with a kind and children.
//! A program is a `Program` node whose children are `Label` and
//! `Instruction` statements.
//!
//! ```text
//! label        : LabelName
//! instruction  : Opcode operand*
//! operand      : Register | Immediate | LabelName | memory
//! memory       : Register (Sign Immediate)?
//! ```

use crate::source_loc::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a leaf token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Opcode,
    Register,
    Immediate,
    LabelName,
    /// `+` or `-` inside a memory operand
    Sign,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Opcode => "opcode",
            TokenKind::Register => "register",
            TokenKind::Immediate => "immediate",
            TokenKind::LabelName => "label name",
            TokenKind::Sign => "sign",
        };
        write!(f, "{}", name)
    }
}

/// Kind of a structural node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Program,
    Label,
    Instruction,
    Memory,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Program => "program",
            NodeKind::Label => "label",
            NodeKind::Instruction => "instruction",
            NodeKind::Memory => "memory",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub kind: NodeKind,
    pub children: Vec<SyntaxNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntaxNode {
    Leaf(Token),
    Node(Tree),
}

impl Tree {
    pub fn new(kind: NodeKind, children: Vec<SyntaxNode>) -> Self {
        Self {
            kind,
            children,
            location: None,
        }
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn program(statements: Vec<SyntaxNode>) -> Self {
        Self::new(NodeKind::Program, statements)
    }
}

impl SyntaxNode {
    pub fn leaf(kind: TokenKind, text: impl Into<String>) -> Self {
        SyntaxNode::Leaf(Token {
            kind,
            text: text.into(),
        })
    }

    pub fn node(kind: NodeKind, children: Vec<SyntaxNode>) -> Self {
        SyntaxNode::Node(Tree::new(kind, children))
    }

    pub fn register(name: &str) -> Self {
        Self::leaf(TokenKind::Register, name)
    }

    pub fn immediate(text: &str) -> Self {
        Self::leaf(TokenKind::Immediate, text)
    }

    pub fn label_ref(name: &str) -> Self {
        Self::leaf(TokenKind::LabelName, name)
    }

    /// `[base]` or `[base sign magnitude]`
    pub fn memory(base: &str, offset: Option<(&str, &str)>) -> Self {
        let mut children = vec![Self::register(base)];
        if let Some((sign, magnitude)) = offset {
            children.push(Self::leaf(TokenKind::Sign, sign));
            children.push(Self::immediate(magnitude));
        }
        Self::node(NodeKind::Memory, children)
    }

    /// Label statement `name:`
    pub fn label(name: &str) -> Self {
        Self::node(NodeKind::Label, vec![Self::label_ref(name)])
    }

    /// Instruction statement with an opcode and operand nodes
    pub fn instruction(opcode: &str, operands: Vec<SyntaxNode>) -> Self {
        let mut children = Vec::with_capacity(operands.len() + 1);
        children.push(Self::leaf(TokenKind::Opcode, opcode));
        children.extend(operands);
        Self::node(NodeKind::Instruction, children)
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            SyntaxNode::Leaf(token) => Some(token),
            SyntaxNode::Node(_) => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            SyntaxNode::Leaf(_) => None,
            SyntaxNode::Node(tree) => Some(tree),
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.as_tree().and_then(|tree| tree.location.as_ref())
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxNode::Leaf(token) => write!(f, "{}", token.text),
            SyntaxNode::Node(tree) => match tree.kind {
                NodeKind::Memory => {
                    write!(f, "[")?;
                    for (i, child) in tree.children.iter().enumerate() {
                        if i > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{}", child)?;
                    }
                    write!(f, "]")
                }
                NodeKind::Label => {
                    for child in &tree.children {
                        write!(f, "{}", child)?;
                    }
                    write!(f, ":")
                }
                NodeKind::Instruction => {
                    for (i, child) in tree.children.iter().enumerate() {
                        match i {
                            0 => write!(f, "{}", child)?,
                            1 => write!(f, " {}", child)?,
                            _ => write!(f, ", {}", child)?,
                        }
                    }
                    Ok(())
                }
                NodeKind::Program => {
                    for child in &tree.children {
                        writeln!(f, "{}", child)?;
                    }
                    Ok(())
                }
            },
        }
    }
}
