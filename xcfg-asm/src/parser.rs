use crate::types::{Lexeme, LexemeKind, ParserOptions};
use log::trace;
use xcfg_common::{ConversionError, NodeKind, SourceLocation, SyntaxNode, TokenKind, Tree};

pub struct Parser {
    options: ParserOptions,
}

impl Parser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Parse a whole source file into a `Program` tree of label and
    /// instruction statements.
    pub fn parse_source(&self, source: &str) -> Result<Tree, ConversionError> {
        let mut lexemes = Vec::new();
        for (i, line) in source.lines().enumerate() {
            self.tokenize(line, i as u32 + 1, &mut lexemes)?;
        }
        trace!("tokenized {} lexemes", lexemes.len());

        let mut cursor = Cursor { lexemes: &lexemes, pos: 0 };
        let mut statements = Vec::new();
        while let Some(lexeme) = cursor.peek() {
            let statement = if self.is_label_definition(&cursor) {
                self.parse_label(&mut cursor)?
            } else if lexeme.kind == LexemeKind::Word && self.options.is_opcode(&lexeme.text) {
                self.parse_instruction(&mut cursor)?
            } else {
                return Err(self.error(
                    format!("expected label or instruction, found '{}'", lexeme.text),
                    lexeme,
                ));
            };
            statements.push(statement);
        }

        Ok(Tree::program(statements))
    }

    fn tokenize(&self, line: &str, line_number: u32, out: &mut Vec<Lexeme>) -> Result<(), ConversionError> {
        // Remove comments
        let line = match line.find(';') {
            Some(pos) => &line[..pos],
            None => line,
        };

        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let ch = chars[i];
            let column = i as u32 + 1;
            let single = match ch {
                '+' => Some(LexemeKind::Plus),
                '-' => Some(LexemeKind::Minus),
                ',' => Some(LexemeKind::Comma),
                ':' => Some(LexemeKind::Colon),
                '[' => Some(LexemeKind::LBracket),
                ']' => Some(LexemeKind::RBracket),
                _ => None,
            };

            if ch.is_whitespace() {
                i += 1;
            } else if let Some(kind) = single {
                out.push(Lexeme { kind, text: ch.to_string(), line: line_number, column });
                i += 1;
            } else if ch.is_ascii_alphabetic() || ch == '_' || ch == '.' {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                out.push(Lexeme { kind: LexemeKind::Word, text, line: line_number, column });
            } else if ch.is_ascii_digit() {
                // Swallow the whole literal; malformed numbers are reported
                // by the operand decoder with their full text
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                out.push(Lexeme { kind: LexemeKind::Number, text, line: line_number, column });
            } else {
                return Err(ConversionError::parse_error(
                    format!("unexpected character '{}'", ch),
                    self.location(line_number, column),
                ));
            }
        }

        Ok(())
    }

    fn is_label_definition(&self, cursor: &Cursor) -> bool {
        matches!(
            (cursor.peek(), cursor.peek_at(1)),
            (Some(word), Some(colon)) if word.kind == LexemeKind::Word && colon.kind == LexemeKind::Colon
        )
    }

    fn parse_label(&self, cursor: &mut Cursor) -> Result<SyntaxNode, ConversionError> {
        let name = cursor.advance(self)?;
        cursor.advance(self)?;
        trace!("label '{}' at line {}", name.text, name.line);

        let tree = Tree::new(NodeKind::Label, vec![SyntaxNode::label_ref(&name.text)])
            .with_location(self.location(name.line, name.column));
        Ok(SyntaxNode::Node(tree))
    }

    fn parse_instruction(&self, cursor: &mut Cursor) -> Result<SyntaxNode, ConversionError> {
        let opcode = cursor.advance(self)?;
        let mut children = vec![SyntaxNode::leaf(TokenKind::Opcode, &opcode.text)];

        if self.starts_operand(cursor) {
            children.push(self.parse_operand(cursor)?);
            while cursor.peek().map(|l| l.kind) == Some(LexemeKind::Comma) {
                cursor.advance(self)?;
                children.push(self.parse_operand(cursor)?);
            }
        }

        let tree = Tree::new(NodeKind::Instruction, children)
            .with_location(self.location(opcode.line, opcode.column));
        Ok(SyntaxNode::Node(tree))
    }

    /// An operand follows unless the next lexeme begins a new statement
    fn starts_operand(&self, cursor: &Cursor) -> bool {
        let Some(next) = cursor.peek() else {
            return false;
        };
        match next.kind {
            LexemeKind::LBracket | LexemeKind::Number | LexemeKind::Plus | LexemeKind::Minus => true,
            LexemeKind::Word => !self.options.is_opcode(&next.text) && !self.is_label_definition(cursor),
            LexemeKind::Comma | LexemeKind::Colon | LexemeKind::RBracket => false,
        }
    }

    fn parse_operand(&self, cursor: &mut Cursor) -> Result<SyntaxNode, ConversionError> {
        let lexeme = cursor.advance(self)?;
        match lexeme.kind {
            LexemeKind::LBracket => self.parse_memory(cursor, lexeme),
            LexemeKind::Plus | LexemeKind::Minus => {
                let number = cursor.advance(self)?;
                if number.kind != LexemeKind::Number {
                    return Err(self.error(
                        format!("expected number after '{}', found '{}'", lexeme.text, number.text),
                        number,
                    ));
                }
                Ok(SyntaxNode::immediate(&format!("{}{}", lexeme.text, number.text)))
            }
            LexemeKind::Number => Ok(SyntaxNode::immediate(&lexeme.text)),
            LexemeKind::Word => Ok(self.word_operand(&lexeme.text)),
            LexemeKind::Comma | LexemeKind::Colon | LexemeKind::RBracket => Err(self.error(
                format!("expected operand, found '{}'", lexeme.text),
                lexeme,
            )),
        }
    }

    /// Memory operands keep whatever sits between the brackets; the operand
    /// decoder decides which addressing forms are acceptable.
    fn parse_memory(&self, cursor: &mut Cursor, open: &Lexeme) -> Result<SyntaxNode, ConversionError> {
        let mut children = Vec::new();
        loop {
            let lexeme = cursor.advance_or(|| {
                ConversionError::parse_error("unterminated memory operand", self.location(open.line, open.column))
            })?;
            match lexeme.kind {
                LexemeKind::RBracket => break,
                LexemeKind::Plus | LexemeKind::Minus => {
                    children.push(SyntaxNode::leaf(TokenKind::Sign, &lexeme.text));
                }
                LexemeKind::Number => children.push(SyntaxNode::immediate(&lexeme.text)),
                LexemeKind::Word => children.push(self.word_operand(&lexeme.text)),
                LexemeKind::Comma | LexemeKind::Colon | LexemeKind::LBracket => {
                    return Err(self.error(
                        format!("unexpected '{}' in memory operand", lexeme.text),
                        lexeme,
                    ));
                }
            }
        }

        if children.is_empty() {
            return Err(self.error("empty memory operand", open));
        }
        Ok(SyntaxNode::node(NodeKind::Memory, children))
    }

    fn word_operand(&self, word: &str) -> SyntaxNode {
        if self.options.is_register(word) {
            SyntaxNode::register(word)
        } else {
            SyntaxNode::label_ref(word)
        }
    }

    fn location(&self, line: u32, column: u32) -> SourceLocation {
        SourceLocation::new(&self.options.filename, line, column)
    }

    fn error(&self, message: impl Into<String>, at: &Lexeme) -> ConversionError {
        ConversionError::parse_error(message, self.location(at.line, at.column))
    }

    /// Reported just past the last lexeme of the source
    fn end_of_input(&self, last: Option<&Lexeme>) -> ConversionError {
        let location = match last {
            Some(lexeme) => self.location(lexeme.line, lexeme.column + lexeme.text.chars().count() as u32),
            None => self.location(1, 1),
        };
        ConversionError::parse_error("unexpected end of input", location)
    }
}

struct Cursor<'a> {
    lexemes: &'a [Lexeme],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Lexeme> {
        self.lexemes.get(self.pos + offset)
    }

    fn advance(&mut self, parser: &Parser) -> Result<&'a Lexeme, ConversionError> {
        let lexemes = self.lexemes;
        self.advance_or(|| parser.end_of_input(lexemes.last()))
    }

    fn advance_or(&mut self, err: impl FnOnce() -> ConversionError) -> Result<&'a Lexeme, ConversionError> {
        let lexeme = self.lexemes.get(self.pos).ok_or_else(err)?;
        self.pos += 1;
        Ok(lexeme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn statements(source: &str) -> Vec<SyntaxNode> {
        Parser::new(ParserOptions::default())
            .parse_source(source)
            .unwrap()
            .children
    }

    fn strip_locations(nodes: Vec<SyntaxNode>) -> Vec<SyntaxNode> {
        nodes
            .into_iter()
            .map(|node| match node {
                SyntaxNode::Node(mut tree) => {
                    tree.location = None;
                    SyntaxNode::Node(tree)
                }
                leaf => leaf,
            })
            .collect()
    }

    #[test]
    fn test_parse_simple_instruction() {
        let parsed = strip_locations(statements("add rax, rbx"));
        assert_eq!(
            parsed,
            vec![SyntaxNode::instruction(
                "add",
                vec![SyntaxNode::register("rax"), SyntaxNode::register("rbx")]
            )]
        );
    }

    #[test]
    fn test_parse_label() {
        let parsed = strip_locations(statements("loop: dec rcx"));
        assert_eq!(
            parsed,
            vec![
                SyntaxNode::label("loop"),
                SyntaxNode::instruction("dec", vec![SyntaxNode::register("rcx")]),
            ]
        );
    }

    #[test]
    fn test_ignore_comments() {
        let parsed = strip_locations(statements("xor rax, rax       ; fib_a = 0"));
        assert_eq!(
            parsed,
            vec![SyntaxNode::instruction(
                "xor",
                vec![SyntaxNode::register("rax"), SyntaxNode::register("rax")]
            )]
        );
    }

    #[test]
    fn test_parse_memory_operands() {
        let parsed = strip_locations(statements("mov rax, [rdx]\nmov rbx, [rdx + 4]\nmov [rdx - 4], rbx"));
        assert_eq!(
            parsed,
            vec![
                SyntaxNode::instruction(
                    "mov",
                    vec![SyntaxNode::register("rax"), SyntaxNode::memory("rdx", None)]
                ),
                SyntaxNode::instruction(
                    "mov",
                    vec![SyntaxNode::register("rbx"), SyntaxNode::memory("rdx", Some(("+", "4")))]
                ),
                SyntaxNode::instruction(
                    "mov",
                    vec![SyntaxNode::memory("rdx", Some(("-", "4"))), SyntaxNode::register("rbx")]
                ),
            ]
        );
    }

    #[test]
    fn test_instructions_without_newline_are_split_at_opcodes() {
        let parsed = strip_locations(statements("mov rax, rbx add rbx, rax"));
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].to_string(), "add rbx, rax");
    }

    #[test]
    fn test_ret_before_label_takes_no_operand() {
        let parsed = strip_locations(statements("ret\n.done:\n jge .done"));
        assert_eq!(
            parsed,
            vec![
                SyntaxNode::instruction("ret", vec![]),
                SyntaxNode::label(".done"),
                SyntaxNode::instruction("jge", vec![SyntaxNode::label_ref(".done")]),
            ]
        );
    }

    #[test]
    fn test_signed_immediate() {
        let parsed = strip_locations(statements("add rsp, -16"));
        assert_eq!(
            parsed,
            vec![SyntaxNode::instruction(
                "add",
                vec![SyntaxNode::register("rsp"), SyntaxNode::immediate("-16")]
            )]
        );
    }

    #[test]
    fn test_statement_locations() {
        let parsed = statements("\n  start:\n    ret");
        assert_eq!(parsed[0].location(), Some(&SourceLocation::unnamed(2, 3)));
        assert_eq!(parsed[1].location(), Some(&SourceLocation::unnamed(3, 5)));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Parser::new(ParserOptions::default())
            .parse_source("mov rax, $5")
            .unwrap_err();
        assert!(matches!(err, ConversionError::Parse { ref location, .. } if location.column == 10));
    }

    #[test]
    fn test_end_of_input_points_past_last_lexeme() {
        let parser = Parser::new(ParserOptions::default());
        for (source, line, column) in [("mov rax,", 1, 9), ("ret\n\nadd rax,  ; trailing\n", 3, 9)] {
            let err = parser.parse_source(source).unwrap_err();
            assert_eq!(
                err,
                ConversionError::parse_error("unexpected end of input", SourceLocation::unnamed(line, column))
            );
        }
    }

    #[test]
    fn test_case_sensitive_keywords() {
        let parser = Parser::new(ParserOptions { case_insensitive: false, ..ParserOptions::default() });
        assert!(parser.parse_source("MOV rax, rbx").is_err());
        assert!(parser.parse_source("mov rax, rbx").is_ok());
    }
}
