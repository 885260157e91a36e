use crate::{
    assembly::{InstructionSequence, OpCode, Operand, SequenceBuilder},
    metadata::{
        method::{MethodAttributes, MethodBody, MethodDef},
        signature::MethodSig,
        token::Token,
    },
};

// A parameterless initializer with a small non-empty body: ldarg.0; pop; ret
pub fn initializer(name: &str) -> MethodDef {
    let mut il = SequenceBuilder::new();
    il.emit_ldarg(0).unwrap();
    il.emit(OpCode::Pop).unwrap();
    il.emit(OpCode::Ret).unwrap();

    MethodDef::new(
        Token::default(),
        name,
        MethodAttributes::PRIVATE | MethodAttributes::HIDE_BY_SIG,
        MethodSig::instance_void(),
    )
    .with_body(MethodBody::new(il.finish().unwrap()))
}

pub fn ret_body() -> MethodBody {
    MethodBody::new(InstructionSequence::empty_body())
}

// Root element of a XAML page bound to `class`
pub fn xaml_page(class: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<ContentPage xmlns="http://xamarin.com/schemas/2014/forms"
             xmlns:x="http://schemas.microsoft.com/winfx/2009/xaml"
             x:Class="{class}">
    <Label Text="Hello" />
</ContentPage>"#
    )
    .into_bytes()
}

// Follows a body with `arg1` as the flag, returning the tokens called in order.
// Only the opcodes used by generated constructors are understood.
pub fn trace_calls(body: &InstructionSequence, flag: bool) -> Vec<Token> {
    let mut calls = Vec::new();
    let mut stack: Vec<bool> = Vec::new();
    let mut index = 0;

    while let Some(instruction) = body.instructions().get(index) {
        index += 1;
        match (instruction.opcode, &instruction.operand) {
            (OpCode::Ldarg0, _) => stack.push(true),
            (OpCode::Ldarg1, _) => stack.push(flag),
            (OpCode::Nop, _) => {}
            (OpCode::Pop, _) => {
                stack.pop().unwrap();
            }
            (OpCode::Call | OpCode::Callvirt, Operand::Call(site)) => {
                for _ in 0..site.pops {
                    stack.pop().unwrap();
                }
                calls.push(site.method);
            }
            (OpCode::Brfalse | OpCode::BrfalseS, Operand::Target(target)) => {
                if !stack.pop().unwrap() {
                    index = target.index();
                }
            }
            (OpCode::Brtrue | OpCode::BrtrueS, Operand::Target(target)) => {
                if stack.pop().unwrap() {
                    index = target.index();
                }
            }
            (OpCode::Br | OpCode::BrS, Operand::Target(target)) => index = target.index(),
            (OpCode::Ret, _) => {
                assert!(stack.is_empty(), "stack not empty at ret");
                return calls;
            }
            (opcode, operand) => panic!("unexpected {opcode} {operand:?}"),
        }
    }
    panic!("fell off the end of the body");
}
