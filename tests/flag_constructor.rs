//! Executes encoded flag constructor bodies to check which initializer runs.

use xamlpatch::{
    assembly::{encode, opcodes, CallSite},
    metadata::token::Token,
    rewrite::constructor::dual_dispatch_body,
    Result,
};

const BASE_CTOR: Token = Token::new(0x0A00_0003);
const RUNTIME: Token = Token::new(0x0600_0010);
const PRECOMPILED: Token = Token::new(0x0600_0011);

/// Runs `code` with `flag` as the first argument and returns the called tokens.
fn run(code: &[u8], flag: bool) -> Vec<Token> {
    let mut calls = Vec::new();
    let mut stack: Vec<bool> = Vec::new();
    let mut pc = 0usize;

    let token_at = |at: usize| Token::new(u32::from_le_bytes(code[at..at + 4].try_into().unwrap()));
    let jump = |next: usize, delta: i64| usize::try_from(next as i64 + delta).unwrap();

    loop {
        let opcode = code[pc];
        pc += 1;
        match opcode {
            opcodes::NOP => {}
            opcodes::LDARG_0 => stack.push(true),
            opcodes::LDARG_1 => stack.push(flag),
            opcodes::CALL | opcodes::CALLVIRT => {
                calls.push(token_at(pc));
                pc += 4;
                assert!(stack.pop().unwrap(), "call without `this`");
            }
            opcodes::BRFALSE_S => {
                let delta = i64::from(code[pc] as i8);
                pc += 1;
                if !stack.pop().unwrap() {
                    pc = jump(pc, delta);
                }
            }
            opcodes::BRFALSE => {
                let delta = i64::from(i32::from_le_bytes(code[pc..pc + 4].try_into().unwrap()));
                pc += 4;
                if !stack.pop().unwrap() {
                    pc = jump(pc, delta);
                }
            }
            opcodes::BR_S => {
                let delta = i64::from(code[pc] as i8);
                pc = jump(pc + 1, delta);
            }
            opcodes::BR => {
                let delta = i64::from(i32::from_le_bytes(code[pc..pc + 4].try_into().unwrap()));
                pc = jump(pc + 4, delta);
            }
            opcodes::RET => {
                assert!(stack.is_empty());
                return calls;
            }
            other => panic!("unexpected opcode 0x{other:02X} at {}", pc - 1),
        }
    }
}

fn flag_constructor_code() -> Result<Vec<u8>> {
    let body = dual_dispatch_body(
        BASE_CTOR,
        CallSite::instance_void(PRECOMPILED),
        CallSite::instance_void(RUNTIME),
    )?;
    Ok(encode(&body, false)?.code)
}

#[test]
fn test_true_runs_only_precompiled_initializer() -> Result<()> {
    let code = flag_constructor_code()?;
    assert_eq!(run(&code, true), vec![BASE_CTOR, PRECOMPILED]);
    Ok(())
}

#[test]
fn test_false_runs_only_runtime_initializer() -> Result<()> {
    let code = flag_constructor_code()?;
    assert_eq!(run(&code, false), vec![BASE_CTOR, RUNTIME]);
    Ok(())
}

#[test]
fn test_header_and_stack() -> Result<()> {
    let body = dual_dispatch_body(
        BASE_CTOR,
        CallSite::instance_void(PRECOMPILED),
        CallSite::instance_void(RUNTIME),
    )?;
    let encoded = encode(&body, false)?;

    assert_eq!(encoded.max_stack, 1);
    assert!(encoded.fits_tiny_header(false));
    assert!(!encoded.fits_tiny_header(true));

    let tiny = encoded.to_method_bytes(false)?;
    assert_eq!(tiny[0], (25 << 2) | 0x2);
    assert_eq!(&tiny[1..], encoded.code.as_slice());

    // init_locals forces a fat header: flags/size, max stack, code size, local signature
    let fat = encoded.to_method_bytes(true)?;
    assert_eq!(&fat[..2], &0x3013u16.to_le_bytes());
    assert_eq!(&fat[2..4], &1u16.to_le_bytes());
    assert_eq!(&fat[4..8], &25u32.to_le_bytes());
    assert_eq!(&fat[8..12], &0u32.to_le_bytes());
    assert_eq!(&fat[12..], encoded.code.as_slice());
    Ok(())
}
