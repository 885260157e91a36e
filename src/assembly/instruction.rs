//! CIL instruction representation: opcodes, operands and stack/flow metadata.
//!
//! Every [`OpCode`] maps to a static [`CilInstruction`] descriptor carrying its mnemonic,
//! encoding bytes, operand type, fixed stack effect and [`FlowType`]. The descriptor table is
//! shared by the [`crate::assembly::SequenceBuilder`] (operand validation) and the
//! [`crate::assembly::encode`] function (byte layout, stack tracking).
//!
//! Branch operands never hold byte offsets. A finished [`crate::assembly::InstructionSequence`]
//! stores branch targets as [`InstrId`]s, the identity of the target instruction; offsets only
//! come into existence during encoding.

use std::fmt;

use crate::{assembly::opcodes, metadata::token::Token};

/// Types of operands for CIL instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand present
    None,
    /// Short branch displacement
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Long branch displacement
    Int32,
    /// Metadata token reference
    Token,
}

impl OperandType {
    /// Returns the size in bytes of this operand type.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            OperandType::None => 0,
            OperandType::Int8 | OperandType::UInt8 => 1,
            OperandType::Int32 | OperandType::Token => 4,
        }
    }
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Execution continues with the next instruction
    Sequential,
    /// Branches when a condition holds, otherwise falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Method call; stack effect depends on the callee
    Call,
    /// Returns from the method
    Return,
}

/// Static description of one CIL opcode.
#[derive(Debug)]
pub struct CilInstruction {
    /// Assembly mnemonic, e.g. `brfalse.s`
    pub mnemonic: &'static str,
    /// Opcode byte
    pub opcode: u8,
    /// Operand encoding
    pub op_type: OperandType,
    /// Items popped; calls and `ret` are resolved at encoding time
    pub stack_pops: u8,
    /// Items pushed; calls are resolved at encoding time
    pub stack_pushes: u8,
    /// Control flow behaviour
    pub flow: FlowType,
}

impl CilInstruction {
    /// Encoded size of the instruction including its operand.
    #[must_use]
    pub const fn size(&self) -> usize {
        1 + self.op_type.size()
    }
}

macro_rules! define_opcodes {
    ($($variant:ident => ($mnemonic:literal, $opcode:expr, $op_type:ident, $pops:literal, $pushes:literal, $flow:ident)),* $(,)?) => {
        /// The CIL opcodes understood by the builder and encoder.
        #[allow(missing_docs, non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OpCode {
            $($variant),*
        }

        impl OpCode {
            /// All supported opcodes, in table order.
            pub const ALL: &'static [OpCode] = &[$(OpCode::$variant),*];

            /// Static descriptor for this opcode.
            #[must_use]
            pub fn info(self) -> &'static CilInstruction {
                match self {
                    $(OpCode::$variant => &CilInstruction {
                        mnemonic: $mnemonic,
                        opcode: $opcode,
                        op_type: OperandType::$op_type,
                        stack_pops: $pops,
                        stack_pushes: $pushes,
                        flow: FlowType::$flow,
                    }),*
                }
            }
        }
    };
}

define_opcodes! {
    Nop       => ("nop",       opcodes::NOP,       None,  0, 0, Sequential),
    Ldarg0    => ("ldarg.0",   opcodes::LDARG_0,   None,  0, 1, Sequential),
    Ldarg1    => ("ldarg.1",   opcodes::LDARG_1,   None,  0, 1, Sequential),
    Ldarg2    => ("ldarg.2",   opcodes::LDARG_2,   None,  0, 1, Sequential),
    Ldarg3    => ("ldarg.3",   opcodes::LDARG_3,   None,  0, 1, Sequential),
    LdargS    => ("ldarg.s",   opcodes::LDARG_S,   UInt8, 0, 1, Sequential),
    Ldnull    => ("ldnull",    opcodes::LDNULL,    None,  0, 1, Sequential),
    LdcI4_1   => ("ldc.i4.1",  opcodes::LDC_I4_1,  None,  0, 1, Sequential),
    Pop       => ("pop",       opcodes::POP,       None,  1, 0, Sequential),
    Call      => ("call",      opcodes::CALL,      Token, 0, 0, Call),
    Ret       => ("ret",       opcodes::RET,       None,  0, 0, Return),
    BrS       => ("br.s",      opcodes::BR_S,      Int8,  0, 0, UnconditionalBranch),
    BrfalseS  => ("brfalse.s", opcodes::BRFALSE_S, Int8,  1, 0, ConditionalBranch),
    BrtrueS   => ("brtrue.s",  opcodes::BRTRUE_S,  Int8,  1, 0, ConditionalBranch),
    Br        => ("br",        opcodes::BR,        Int32, 0, 0, UnconditionalBranch),
    Brfalse   => ("brfalse",   opcodes::BRFALSE,   Int32, 1, 0, ConditionalBranch),
    Brtrue    => ("brtrue",    opcodes::BRTRUE,    Int32, 1, 0, ConditionalBranch),
    Callvirt  => ("callvirt",  opcodes::CALLVIRT,  Token, 0, 0, Call),
    Ldstr     => ("ldstr",     opcodes::LDSTR,     Token, 0, 1, Sequential),
}

impl OpCode {
    /// The instruction mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    /// Returns true for conditional and unconditional branches.
    #[must_use]
    pub fn is_branch(self) -> bool {
        matches!(
            self.info().flow,
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch
        )
    }

    /// Returns true for `call` and `callvirt`.
    #[must_use]
    pub fn is_call(self) -> bool {
        self.info().flow == FlowType::Call
    }

    /// Returns true if execution never falls through to the next instruction.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self.info().flow,
            FlowType::UnconditionalBranch | FlowType::Return
        )
    }

    /// The one-byte displacement form of a long branch.
    #[must_use]
    pub fn short_form(self) -> Option<OpCode> {
        match self {
            OpCode::Br => Some(OpCode::BrS),
            OpCode::Brfalse => Some(OpCode::BrfalseS),
            OpCode::Brtrue => Some(OpCode::BrtrueS),
            _ => None,
        }
    }

    /// The four-byte displacement form of a branch; long branches map to themselves.
    #[must_use]
    pub fn long_form(self) -> OpCode {
        match self {
            OpCode::BrS => OpCode::Br,
            OpCode::BrfalseS => OpCode::Brfalse,
            OpCode::BrtrueS => OpCode::Brtrue,
            other => other,
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Immediate value embedded in an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    /// Unsigned 8-bit value
    UInt8(u8),
}

/// Target and stack effect of a `call` or `callvirt`.
///
/// The callee signature decides how many values a call consumes and produces, which the
/// opcode table alone cannot know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    /// `MethodDef` or `MemberRef` token of the callee
    pub method: Token,
    /// Values popped, including `this` for instance calls
    pub pops: u8,
    /// Values pushed (1 for non-void callees)
    pub pushes: u8,
}

impl CallSite {
    /// Call site for an instance method taking no arguments and returning nothing.
    #[must_use]
    pub fn instance_void(method: Token) -> Self {
        CallSite {
            method,
            pops: 1,
            pushes: 0,
        }
    }
}

/// Identity of an instruction within one instruction sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub(crate) usize);

impl InstrId {
    /// Position of the instruction in its sequence.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL#{}", self.0)
    }
}

/// A forward-branch placeholder handed out by [`crate::assembly::SequenceBuilder::label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) usize);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// No operand
    None,
    /// Immediate value
    Immediate(Immediate),
    /// Metadata token (fields, types, strings)
    Token(Token),
    /// Call target and its stack effect
    Call(CallSite),
    /// Branch target, by instruction identity
    Target(InstrId),
}

impl Operand {
    /// Short description used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::None => "none",
            Operand::Immediate(Immediate::UInt8(_)) => "uint8",
            Operand::Token(_) => "token",
            Operand::Call(_) => "call site",
            Operand::Target(_) => "branch target",
        }
    }
}

/// One instruction of a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The opcode
    pub opcode: OpCode,
    /// The operand
    pub operand: Operand,
}

impl Instruction {
    /// Branch target of this instruction, if it is a branch.
    #[must_use]
    pub fn branch_target(&self) -> Option<InstrId> {
        match self.operand {
            Operand::Target(id) => Some(id),
            _ => None,
        }
    }

    /// Callee of this instruction, if it is a call.
    #[must_use]
    pub fn call_target(&self) -> Option<Token> {
        match self.operand {
            Operand::Call(site) => Some(site.method),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            Operand::Immediate(Immediate::UInt8(v)) => write!(f, "{} {v}", self.opcode),
            Operand::Token(token) => write!(f, "{} {token}", self.opcode),
            Operand::Call(site) => write!(f, "{} {}", self.opcode, site.method),
            Operand::Target(id) => write!(f, "{} {id}", self.opcode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_encodings_are_unique() {
        let mut seen = HashSet::new();
        for opcode in OpCode::ALL {
            let info = opcode.info();
            assert!(
                seen.insert(info.opcode),
                "duplicate encoding for {}",
                info.mnemonic
            );
        }
    }

    #[test]
    fn test_branch_forms() {
        for opcode in OpCode::ALL.iter().copied().filter(|op| op.is_branch()) {
            let long = opcode.long_form();
            assert_eq!(long.info().op_type, OperandType::Int32);
            let short = long.short_form().unwrap();
            assert_eq!(short.info().op_type, OperandType::Int8);
            assert_eq!(short.info().flow, opcode.info().flow);
        }
    }

    #[test]
    fn test_sizes() {
        assert_eq!(OpCode::Nop.info().size(), 1);
        assert_eq!(OpCode::BrfalseS.info().size(), 2);
        assert_eq!(OpCode::Brfalse.info().size(), 5);
        assert_eq!(OpCode::Call.info().size(), 5);
        assert_eq!(OpCode::LdargS.info().size(), 2);
    }

    #[test]
    fn test_display() {
        let call = Instruction {
            opcode: OpCode::Callvirt,
            operand: Operand::Call(CallSite::instance_void(Token::new(0x0600_0002))),
        };
        assert_eq!(call.to_string(), "callvirt 0x06000002");
        assert_eq!(call.call_target(), Some(Token::new(0x0600_0002)));

        let branch = Instruction {
            opcode: OpCode::Br,
            operand: Operand::Target(InstrId(7)),
        };
        assert_eq!(branch.to_string(), "br IL#7");
        assert_eq!(branch.branch_target(), Some(InstrId(7)));
    }
}
