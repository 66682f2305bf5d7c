use indoc::indoc;
use pretty_assertions::assert_eq;
use xcfg_asm::parse;
use xcfg_common::{ConversionError, Register, SourceLocation, Tree};
use xcfg_ir::{convert_tree, LoweringOptions, MemoryRef, Operation, Program, Source, Value};

fn convert_source(source: &str) -> Result<Program, ConversionError> {
    convert_tree(&parse(source)?, LoweringOptions::default())
}

/// Conversion error with the statement position stripped
fn conversion_error(source: &str) -> ConversionError {
    convert_source(source).unwrap_err().root().clone()
}

const FIB_WITH_PRINTF: &str = indoc! {"
    _start:
        push rbx
        xor rax, rax
        mov rbx, 1
        mov rcx, 12
    print_loop:
        mov rdi, fmt
        mov rsi, rax
        call printf
        dec rcx
        jnz print_loop
        ret
"};

const FIB: &str = indoc! {"
    _start:
        push rbx           ; save callee-saved register
        xor rax, rax       ; fib_a = 0
        mov rbx, 1         ; fib_b = 1
        mov rcx, 12

    print_loop:
        mov rdx, rax       ; rdx = old a
        mov rax, rbx       ; a = old b
        add rax, rdx       ; a += old a
        dec rcx
        jnz print_loop

        pop rbx
        ret
"};

#[test]
fn test_fib_loop() {
    let program = convert_source(FIB).unwrap();

    assert_eq!(program.blocks.len(), 3);
    assert_eq!(program.labels.get("_start"), Some(&0));
    assert_eq!(program.labels.get("print_loop"), Some(&1));
    assert_eq!(program.edges(), vec![(0, 1), (1, 1), (1, 2)]);
    assert_eq!(program.blocks[2].terminator(), Some(&Operation::Return));

    // every edge carries one value per tracked register
    for block in &program.blocks {
        for (_, args) in block.successors() {
            assert_eq!(args.len(), Register::ALL.len());
        }
    }
}

#[test]
fn test_fib_loop_carries_values_around_the_back_edge() {
    let program = convert_source(FIB).unwrap();
    let body = &program.blocks[1];

    let Some(Operation::CondJump { then_args, else_args, .. }) = body.terminator() else {
        panic!("loop body must end in a conditional jump");
    };
    assert_eq!(then_args, else_args);

    // rax after `add rax, rdx` and rcx after `dec rcx`
    let add_result = body.operations[3].results()[0];
    let dec_result = body.operations[4].results()[0];
    assert_eq!(then_args[Register::Rax.index()], add_result);
    assert_eq!(then_args[Register::Rcx.index()], dec_result);
    // rdx holds the old rax, which is the loop header's rax parameter
    let mov_rdx = &body.operations[1];
    assert_eq!(
        *mov_rdx,
        Operation::Move {
            source: Source::Register(body.param(Register::Rax).unwrap()),
            result: then_args[Register::Rdx.index()],
        }
    );
}

#[test]
fn test_label_operands_are_rejected_outside_jumps() {
    assert!(matches!(
        conversion_error(FIB_WITH_PRINTF),
        ConversionError::InvalidOperand { .. }
    ));
}

#[test]
fn test_lowering_errors_point_at_the_statement() {
    let err = convert_source("start:\n  mov rax, 1\n  mov rdi, fmt\n  ret").unwrap_err();
    assert_eq!(err.location(), Some(&SourceLocation::unnamed(3, 3)));
    assert!(matches!(err, ConversionError::Located { ref opcode, .. } if opcode == "mov"));
    assert_eq!(
        err.to_string(),
        "<input>:3:3: in 'mov': Invalid operand: label operand not allowed here: 'rdi, fmt'"
    );

    let err = convert_source("xor rax, rax\njmp nowhere").unwrap_err();
    assert_eq!(err.location(), Some(&SourceLocation::unnamed(2, 1)));
    assert_eq!(
        err.root(),
        &ConversionError::UnknownLabel {
            label: "nowhere".to_string()
        }
    );
}

#[test]
fn test_call_is_unsupported() {
    assert_eq!(
        conversion_error("call printf"),
        ConversionError::UnsupportedCombination {
            opcode: "call".to_string(),
            shape: "label".to_string(),
        }
    );
    assert!(matches!(
        conversion_error("mov rax, 60\nsyscall"),
        ConversionError::UnsupportedCombination { ref opcode, .. } if opcode == "syscall"
    ));
}

#[test]
fn test_instructions_sharing_a_line() {
    let program = convert_source("mov rax, rbx add rbx, rax").unwrap();
    assert_eq!(program.blocks.len(), 1);

    let ops = &program.blocks[0].operations;
    let moved = ops[0].results()[0];
    assert_eq!(
        ops[1].operands(),
        vec![program.blocks[0].param(Register::Rbx).unwrap(), moved]
    );
}

#[test]
fn test_trailing_conditional_jump_is_dangling() {
    let source = indoc! {"
        top:
            cmp rax, 0
            jnz top
    "};
    assert_eq!(
        conversion_error(source),
        ConversionError::DanglingConditionalJump {
            opcode: "jnz".to_string(),
            block: 0,
        }
    );
}

#[test]
fn test_hex_and_signed_immediates() {
    let program = convert_source("mov rax, 0x10\nadd rsp, -0x8\nmov [rbp - 8], 255").unwrap();
    let ops = &program.blocks[0].operations;

    assert!(matches!(ops[0], Operation::Move { source: Source::Immediate(16), .. }));
    assert!(matches!(ops[1], Operation::Binary { rhs: Source::Immediate(-8), .. }));
    assert_eq!(
        ops[2],
        Operation::Store {
            target: MemoryRef { base: Value(Register::Rbp.index() as u32), offset: -8 },
            source: Source::Immediate(255),
        }
    );
}

#[test]
fn test_unsupported_addressing_mode() {
    assert!(matches!(
        conversion_error("mov rax, [rbx + rcx]"),
        ConversionError::InvalidOperand { .. }
    ));
}

#[test]
fn test_json_tree_converts_like_text() {
    let tree = parse(FIB).unwrap();
    let json = serde_json::to_string(&tree).unwrap();
    let from_json: Tree = serde_json::from_str(&json).unwrap();

    assert_eq!(
        convert_tree(&from_json, LoweringOptions::default()).unwrap(),
        convert_tree(&tree, LoweringOptions::default()).unwrap()
    );
}

#[test]
fn test_textual_form_lists_every_block() {
    let text = convert_source(FIB).unwrap().to_string();
    let headers: Vec<&str> = text.lines().filter(|line| line.starts_with("^bb")).collect();
    assert_eq!(headers.len(), 3);
    assert!(text.contains("label \"print_loop\""));
    assert!(text.contains("fallthrough ^bb1("));
    assert!(text.lines().any(|line| line.trim_start().starts_with("jnz %")));
}
