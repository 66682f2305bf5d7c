use indoc::indoc;
use pretty_assertions::assert_eq;
use xcfg_asm::{parse, Parser, ParserOptions};
use xcfg_common::{ConversionError, NodeKind, SyntaxNode, TokenKind};

const FIB: &str = indoc! {"
    _start:
        push rbx           ; save callee-saved register

        xor rax, rax       ; fib_a = 0
        mov rbx, 1         ; fib_b = 1
        mov rcx, 12        ; print first 12 numbers

    print_loop:
        mov rdi, fmt
        mov rsi, rax
        xor rax, rax       ; varargs count
        call printf

        mov rdx, rax       ; rdx = old a
        mov rax, rbx       ; a = old b
        add rax, rdx       ; a += old a

        dec rcx
        jnz print_loop

        pop rbx            ; restore

        mov rax, 60
        xor rdi, rdi
        syscall
"};

fn kinds(program: &[SyntaxNode]) -> Vec<NodeKind> {
    program
        .iter()
        .map(|stmt| stmt.as_tree().map(|t| t.kind).unwrap())
        .collect()
}

#[test]
fn test_fib_program_statements() {
    let program = parse(FIB).unwrap();
    assert_eq!(program.kind, NodeKind::Program);
    assert_eq!(program.children.len(), 19);

    let labels: Vec<String> = program
        .children
        .iter()
        .filter(|stmt| stmt.as_tree().map(|t| t.kind) == Some(NodeKind::Label))
        .map(|stmt| stmt.to_string())
        .collect();
    assert_eq!(labels, vec!["_start:", "print_loop:"]);

    // `fmt` and `printf` are not registers, so they become label references
    let mov_rdi = &program.children[6];
    assert_eq!(mov_rdi.to_string(), "mov rdi, fmt");
    let operand = &mov_rdi.as_tree().unwrap().children[2];
    assert_eq!(operand.as_token().unwrap().kind, TokenKind::LabelName);
}

#[test]
fn test_mixed_case_keywords() {
    let program = parse("MOV RAX, Rbx\nJMP Done\nDone: RET").unwrap();
    assert_eq!(
        kinds(&program.children),
        vec![NodeKind::Instruction, NodeKind::Instruction, NodeKind::Label, NodeKind::Instruction]
    );
    let mov = program.children[0].as_tree().unwrap();
    assert_eq!(mov.children[1].as_token().unwrap().kind, TokenKind::Register);
    assert_eq!(mov.children[1].as_token().unwrap().text, "RAX");
}

#[test]
fn test_unusual_addressing_is_left_to_the_decoder() {
    let program = parse("mov rax, [rbx + rcx]").unwrap();
    let mem = program.children[0].as_tree().unwrap().children[2].as_tree().unwrap();
    assert_eq!(mem.kind, NodeKind::Memory);
    assert_eq!(mem.children.len(), 3);
    assert_eq!(mem.children[2].as_token().unwrap().kind, TokenKind::Register);
}

#[test]
fn test_locations_carry_filename() {
    let parser = Parser::new(ParserOptions::default().with_filename("fib.asm"));
    let program = parser.parse_source(FIB).unwrap();
    let first = program.children[0].location().unwrap();
    assert_eq!(first.filename, "fib.asm");
    assert_eq!(first.line, 1);
}

#[test]
fn test_parse_errors() {
    assert!(matches!(parse("rax, rbx"), Err(ConversionError::Parse { .. })));
    assert!(matches!(parse("mov rax, [rbx"), Err(ConversionError::Parse { .. })));
    assert!(matches!(parse("mov rax,"), Err(ConversionError::Parse { .. })));
    assert!(matches!(parse("mov rax, []"), Err(ConversionError::Parse { .. })));
}

#[test]
fn test_empty_source() {
    let program = parse("   ; nothing here\n\n").unwrap();
    assert!(program.children.is_empty());
}
