//! CIL instruction model, sequence builder and encoder.
//!
//! This module holds everything needed to produce method bodies:
//!
//! - [`OpCode`], [`Instruction`] and [`Operand`] describe instructions, with a static
//!   [`CilInstruction`] descriptor per opcode
//! - [`SequenceBuilder`] assembles an [`InstructionSequence`] with forward-branch labels
//! - [`encode`] turns a sequence into CIL bytes, sizing branches and computing max-stack
//!
//! # Examples
//!
//! ```rust
//! use xamlpatch::assembly::{encode, OpCode, SequenceBuilder};
//! use xamlpatch::metadata::token::Token;
//!
//! let mut builder = SequenceBuilder::new();
//! let done = builder.label();
//! builder.emit(OpCode::Ldarg1)?;
//! builder.branch(OpCode::Brfalse, done)?;
//! builder.emit(OpCode::Ldarg0)?;
//! builder.emit_instance_call(OpCode::Callvirt, Token::new(0x0600_0001))?;
//! let ret = builder.emit(OpCode::Ret)?;
//! builder.bind(done, ret)?;
//!
//! let body = encode(&builder.finish()?, false)?;
//! assert_eq!(body.code[1], 0x2C); // brfalse.s
//! # Ok::<(), xamlpatch::Error>(())
//! ```

mod builder;
mod encoder;
mod instruction;
pub mod opcodes;

pub use builder::{InstructionSequence, SequenceBuilder};
pub use encoder::{encode, EncodedBody};
pub use instruction::{
    CallSite, CilInstruction, FlowType, Immediate, InstrId, Instruction, Label, OpCode, Operand,
    OperandType,
};
