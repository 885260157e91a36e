//! CIL opcode byte constants (ECMA-335) for the instructions the rewriter emits or carries.
//!
//! Opcodes are named after their mnemonic (e.g. [`CALL`] = `0x28`).
#![allow(missing_docs)]

// Misc
pub const NOP: u8 = 0x00;

// Argument shorthand
pub const LDARG_0: u8 = 0x02;
pub const LDARG_1: u8 = 0x03;
pub const LDARG_2: u8 = 0x04;
pub const LDARG_3: u8 = 0x05;

// Argument (short form)
pub const LDARG_S: u8 = 0x0E;

// Constant loaders
pub const LDNULL: u8 = 0x14;
pub const LDC_I4_1: u8 = 0x17;

// Stack
pub const POP: u8 = 0x26;

// Call / return
pub const CALL: u8 = 0x28;
pub const RET: u8 = 0x2A;

// Branch (short form)
pub const BR_S: u8 = 0x2B;
pub const BRFALSE_S: u8 = 0x2C;
pub const BRTRUE_S: u8 = 0x2D;

// Branch (long form)
pub const BR: u8 = 0x38;
pub const BRFALSE: u8 = 0x39;
pub const BRTRUE: u8 = 0x3A;

// Virtual call, string literal
pub const CALLVIRT: u8 = 0x6F;
pub const LDSTR: u8 = 0x72;
