//! Structural checks over compiled chunks: the line table tracks the code
//! byte-for-byte, constant operands index into the pool, and every jump
//! lands on an opcode boundary.

use bytelox::chunk::{Chunk, Instruction};
use bytelox::compiler;
use bytelox::debug::Disassembler;
use bytelox::error::{ErrorKind, InterpretError};
use proptest::prelude::*;

fn check_chunk(chunk: &Chunk) {
    assert_eq!(chunk.code_len(), chunk.lines().len());

    let boundaries: Vec<usize> = chunk.iter().with_code_offset().map(|(off, _)| off).collect();

    for (off, instr) in chunk.iter().with_code_offset() {
        match instr {
            Instruction::OpConstant(ix)
            | Instruction::OpGetGlobal(ix)
            | Instruction::OpDefineGlobal(ix)
            | Instruction::OpSetGlobal(ix) => {
                assert!(
                    (ix as usize) < chunk.constants().len(),
                    "constant operand {} out of bounds at offset {}",
                    ix,
                    off
                );
            }
            Instruction::OpJump(jump) | Instruction::OpJumpIfFalse(jump) => {
                let target = off + 3 + jump as usize;
                assert!(target < chunk.code_len(), "jump past the end at {}", off);
                assert!(
                    boundaries.contains(&target),
                    "jump at {} lands inside an instruction ({})",
                    off,
                    target
                );
            }
            Instruction::OpLoop(jump) => {
                let target = (off + 3)
                    .checked_sub(jump as usize)
                    .expect("loop target before chunk start");
                assert!(
                    boundaries.contains(&target),
                    "loop at {} lands inside an instruction ({})",
                    off,
                    target
                );
            }
            Instruction::OpInvalid => panic!("compiler emitted an invalid instruction"),
            _ => {}
        }
    }
}

fn compile_checked(source: &str) -> Chunk {
    let chunk = compiler::compile(source).expect("source failed to compile");
    check_chunk(&chunk);
    chunk
}

#[test]
fn fixed_programs_produce_wellformed_chunks() {
    let programs = [
        "print 1 + 2 * 3;",
        "print \"foo\" + \"bar\";",
        "var a = 1; { var a = 2; print a; } print a;",
        "var x = 0; while (x < 3) { print x; x = x + 1; }",
        "if (true and false) print \"T\"; else print \"F\";",
        "var a; print a;",
        "if (1 or 0) { print \"a\"; } else { print \"b\"; }",
        "var i = 0; while (i < 2) { var j = i * 2; if (j > 0) print j; i = i + 1; }",
        "{ var a; var b; var c; { var d; print a; } }",
        "while (0) {} print \"done\";",
    ];

    for program in programs {
        compile_checked(program);
    }
}

#[test]
fn disassembly_covers_every_instruction() {
    let chunk = compile_checked("var x = 0; while (x < 3) { print x; x = x + 1; }");
    let listed = Disassembler::new(&chunk).count();
    let decoded = chunk.iter().count();
    assert_eq!(listed, decoded);
}

fn arb_expr() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0u32..100).prop_map(|n| n.to_string()),
        Just("true".to_string()),
        Just("false".to_string()),
        Just("nil".to_string()),
        Just("\"s\"".to_string()),
    ];
    leaf.prop_recursive(5, 32, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} + {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} * {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} - {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} < {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} == {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} and {})", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({} or {})", a, b)),
            inner.clone().prop_map(|e| format!("(-{})", e)),
            inner.prop_map(|e| format!("(!{})", e)),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn generated_expressions_compile_to_wellformed_chunks(expr in arb_expr()) {
        let source = format!("print {};", expr);
        compile_checked(&source);
    }

    #[test]
    fn generated_expressions_never_fault_the_vm(expr in arb_expr()) {
        // type errors are legitimate outcomes; internal faults and stack
        // overflows from balanced expressions are not
        let source = format!("print {};", expr);
        let mut out = Vec::new();
        if let Err(InterpretError::Runtime(err)) = bytelox::interpret(&source, &mut out) {
            prop_assert!(!matches!(
                err.kind(),
                ErrorKind::InternalError(_) | ErrorKind::StackOverflow
            ));
        }
    }
}
