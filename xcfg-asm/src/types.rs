use xcfg_common::source_loc::UNNAMED_SOURCE;

/// All instruction mnemonics the grammar recognizes.
///
/// Recognizing a mnemonic here does not mean the lowering engine supports
/// it: `call`, `syscall`, `mul` and `div` parse but are rejected later.
pub const OPCODES: &[&str] = &[
    "add", "sub", "mul", "div", "inc", "dec", "and", "or", "xor", "not", "neg",
    "push", "pop", "mov", "cmp", "lea",
    "jmp", "ja", "jae", "jb", "jbe", "jc", "je", "jg", "jge", "jl", "jle", "jna", "jnae", "jnb",
    "jnbe", "jnc", "jne", "jng", "jnge", "jnl", "jnle", "jno", "jnp", "jns", "jnz", "jo", "jp",
    "jpe", "jpo", "js", "jz",
    "call", "ret", "syscall",
];

/// All register mnemonics the grammar recognizes (a superset of the
/// registers the lowering engine tracks)
pub const REGISTERS: &[&str] = &[
    "eax", "ebx", "ecx", "edx", "esi", "edi", "ebp", "esp", "eip", "eflags",
    "cs", "ds", "ss", "es", "fs", "gs",
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp", "rip", "rflags",
    "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
];

#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Match opcode and register keywords regardless of case
    pub case_insensitive: bool,
    /// Name recorded in statement locations
    pub filename: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            filename: UNNAMED_SOURCE.to_string(),
        }
    }
}

impl ParserOptions {
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn is_opcode(&self, word: &str) -> bool {
        self.matches_keyword(OPCODES, word)
    }

    pub fn is_register(&self, word: &str) -> bool {
        self.matches_keyword(REGISTERS, word)
    }

    fn matches_keyword(&self, keywords: &[&str], word: &str) -> bool {
        if self.case_insensitive {
            keywords.iter().any(|k| k.eq_ignore_ascii_case(word))
        } else {
            keywords.contains(&word)
        }
    }
}

/// A lexeme with the position of its first character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    Word,
    Number,
    Plus,
    Minus,
    Comma,
    Colon,
    LBracket,
    RBracket,
}
