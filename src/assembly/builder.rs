//! Two-phase instruction sequence builder.
//!
//! Forward branches are expressed through [`Label`]s: a label is created before the
//! instruction it will point to exists, used by one or more branches, then bound to the
//! [`InstrId`] of its target once that instruction has been emitted. [`SequenceBuilder::finish`]
//! resolves every branch to its target's identity and rejects sequences with unbound labels,
//! backward or self-referencing branches, or code that can run off the end of the method.
//!
//! # Examples
//!
//! ```rust
//! use xamlpatch::assembly::{OpCode, SequenceBuilder};
//!
//! let mut builder = SequenceBuilder::new();
//! let skip = builder.label();
//! builder.emit(OpCode::Ldarg1)?;
//! builder.branch(OpCode::Brfalse, skip)?;
//! builder.emit(OpCode::Nop)?;
//! let ret = builder.emit(OpCode::Ret)?;
//! builder.bind(skip, ret)?;
//!
//! let sequence = builder.finish()?;
//! assert_eq!(sequence.len(), 4);
//! # Ok::<(), xamlpatch::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::instruction::{
        CallSite, Immediate, InstrId, Instruction, Label, OpCode, Operand, OperandType,
    },
    metadata::token::Token,
    Error, Result,
};

/// Operand slot of an instruction that is still under construction.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Ready(Operand),
    Branch(Label),
}

/// Builds an [`InstructionSequence`] with forward branch labels.
#[derive(Debug, Default)]
pub struct SequenceBuilder {
    instructions: Vec<(OpCode, Pending)>,
    labels: usize,
    bindings: HashMap<Label, InstrId>,
}

impl SequenceBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity the next emitted instruction will receive.
    #[must_use]
    pub fn next_id(&self) -> InstrId {
        InstrId(self.instructions.len())
    }

    /// Emits an instruction without an operand.
    ///
    /// # Errors
    /// Returns [`Error::WrongOperandType`] if the opcode requires an operand.
    pub fn emit(&mut self, opcode: OpCode) -> Result<InstrId> {
        self.emit_with(opcode, Operand::None)
    }

    /// Emits an instruction with an immediate or token operand.
    ///
    /// Branches go through [`SequenceBuilder::branch`] and calls through
    /// [`SequenceBuilder::emit_call`].
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedOperand`] or [`Error::WrongOperandType`] when the operand does
    /// not fit the opcode.
    pub fn emit_with(&mut self, opcode: OpCode, operand: Operand) -> Result<InstrId> {
        if opcode.is_branch() || opcode.is_call() {
            return Err(Error::WrongOperandType {
                expected: if opcode.is_branch() {
                    "label".to_string()
                } else {
                    "call site".to_string()
                },
                actual: operand.kind().to_string(),
            });
        }

        let expected = opcode.info().op_type;
        let fits = matches!(
            (expected, operand),
            (OperandType::None, Operand::None)
                | (OperandType::UInt8, Operand::Immediate(Immediate::UInt8(_)))
                | (OperandType::Token, Operand::Token(_))
        );
        if !fits {
            if expected == OperandType::None {
                return Err(Error::UnexpectedOperand);
            }
            return Err(Error::WrongOperandType {
                expected: format!("{expected:?}"),
                actual: operand.kind().to_string(),
            });
        }

        Ok(self.push(opcode, Pending::Ready(operand)))
    }

    /// Emits `call` or `callvirt` with the callee's stack effect.
    ///
    /// # Errors
    /// Returns [`Error::WrongOperandType`] if `opcode` is not a call.
    pub fn emit_call(&mut self, opcode: OpCode, site: CallSite) -> Result<InstrId> {
        if !opcode.is_call() {
            return Err(Error::WrongOperandType {
                expected: format!("{:?}", opcode.info().op_type),
                actual: "call site".to_string(),
            });
        }
        Ok(self.push(opcode, Pending::Ready(Operand::Call(site))))
    }

    /// Emits a call to an instance method without arguments or return value.
    ///
    /// # Errors
    /// See [`SequenceBuilder::emit_call`].
    pub fn emit_instance_call(&mut self, opcode: OpCode, method: Token) -> Result<InstrId> {
        self.emit_call(opcode, CallSite::instance_void(method))
    }

    /// Emits the shortest form of `ldarg` for `index`.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for indices that need the two-byte `ldarg` form.
    pub fn emit_ldarg(&mut self, index: u16) -> Result<InstrId> {
        match index {
            0 => self.emit(OpCode::Ldarg0),
            1 => self.emit(OpCode::Ldarg1),
            2 => self.emit(OpCode::Ldarg2),
            3 => self.emit(OpCode::Ldarg3),
            _ => {
                let index = u8::try_from(index)
                    .map_err(|_| malformed_error!("Argument index {} out of range", index))?;
                self.emit_with(OpCode::LdargS, Operand::Immediate(Immediate::UInt8(index)))
            }
        }
    }

    /// Creates a new unbound label.
    pub fn label(&mut self) -> Label {
        let label = Label(self.labels);
        self.labels += 1;
        label
    }

    /// Emits a branch to `label`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBranch`] if `opcode` is not a branch or the label does not belong
    /// to this builder.
    pub fn branch(&mut self, opcode: OpCode, label: Label) -> Result<InstrId> {
        if !opcode.is_branch() {
            return Err(Error::InvalidBranch(format!(
                "{opcode} is not a branch instruction"
            )));
        }
        self.check_label(label)?;
        Ok(self.push(opcode, Pending::Branch(label)))
    }

    /// Binds `label` to an already emitted instruction.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateLabel`] if the label is already bound, and
    /// [`Error::InvalidBranch`] if `target` has not been emitted.
    pub fn bind(&mut self, label: Label, target: InstrId) -> Result<()> {
        self.check_label(label)?;
        if target.0 >= self.instructions.len() {
            return Err(Error::InvalidBranch(format!(
                "{label} bound to {target} which was never emitted"
            )));
        }
        if self.bindings.contains_key(&label) {
            return Err(Error::DuplicateLabel(label));
        }
        self.bindings.insert(label, target);
        Ok(())
    }

    /// Resolves all labels and returns the finished sequence.
    ///
    /// # Errors
    /// - [`Error::UnboundLabel`] if a branch uses a label that was never bound
    /// - [`Error::InvalidBranch`] if a branch targets itself or an earlier instruction
    /// - [`Error::Malformed`] if the sequence is empty or control can fall off its end
    pub fn finish(self) -> Result<InstructionSequence> {
        let Some((last, _)) = self.instructions.last() else {
            return Err(malformed_error!("Empty instruction sequence"));
        };
        if !last.is_terminal() {
            return Err(malformed_error!(
                "Sequence ends with '{}' and can fall through",
                last
            ));
        }

        let mut instructions = Vec::with_capacity(self.instructions.len());
        for (index, (opcode, pending)) in self.instructions.into_iter().enumerate() {
            let operand = match pending {
                Pending::Ready(operand) => operand,
                Pending::Branch(label) => {
                    let target = *self
                        .bindings
                        .get(&label)
                        .ok_or(Error::UnboundLabel(label))?;
                    if target.0 <= index {
                        return Err(Error::InvalidBranch(format!(
                            "{opcode} at IL#{index} targets {target}; only forward branches are allowed"
                        )));
                    }
                    Operand::Target(target)
                }
            };
            instructions.push(Instruction { opcode, operand });
        }

        Ok(InstructionSequence { instructions })
    }

    fn push(&mut self, opcode: OpCode, pending: Pending) -> InstrId {
        let id = self.next_id();
        self.instructions.push((opcode, pending));
        id
    }

    fn check_label(&self, label: Label) -> Result<()> {
        if label.0 >= self.labels {
            return Err(Error::InvalidBranch(format!(
                "{label} was not created by this builder"
            )));
        }
        Ok(())
    }
}

/// A finalized instruction sequence with identity-resolved branch targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSequence {
    instructions: Vec<Instruction>,
}

impl InstructionSequence {
    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the sequence holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instruction with the given identity.
    #[must_use]
    pub fn get(&self, id: InstrId) -> Option<&Instruction> {
        self.instructions.get(id.0)
    }

    /// Iterates over the instructions in order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    /// All instructions as a slice.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The sequence consisting of a single `ret`.
    #[must_use]
    pub fn empty_body() -> Self {
        InstructionSequence {
            instructions: vec![Instruction {
                opcode: OpCode::Ret,
                operand: Operand::None,
            }],
        }
    }
}

impl<'a> IntoIterator for &'a InstructionSequence {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_branch_resolves_to_identity() {
        let mut builder = SequenceBuilder::new();
        let end = builder.label();
        builder.emit(OpCode::Ldarg1).unwrap();
        let br = builder.branch(OpCode::Brtrue, end).unwrap();
        builder.emit(OpCode::Nop).unwrap();
        let ret = builder.emit(OpCode::Ret).unwrap();
        builder.bind(end, ret).unwrap();

        let sequence = builder.finish().unwrap();
        assert_eq!(sequence.get(br).unwrap().branch_target(), Some(ret));
    }

    #[test]
    fn test_unbound_label_rejected() {
        let mut builder = SequenceBuilder::new();
        let end = builder.label();
        builder.emit(OpCode::Ldarg1).unwrap();
        builder.branch(OpCode::Brfalse, end).unwrap();
        builder.emit(OpCode::Ret).unwrap();

        assert!(matches!(builder.finish(), Err(Error::UnboundLabel(l)) if l == end));
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut builder = SequenceBuilder::new();
        let end = builder.label();
        let ret = builder.emit(OpCode::Ret).unwrap();
        builder.bind(end, ret).unwrap();
        assert!(matches!(
            builder.bind(end, ret),
            Err(Error::DuplicateLabel(_))
        ));
    }

    #[test]
    fn test_backward_branch_rejected() {
        let mut builder = SequenceBuilder::new();
        let top = builder.label();
        let first = builder.emit(OpCode::Nop).unwrap();
        builder.bind(top, first).unwrap();
        builder.branch(OpCode::Br, top).unwrap();

        assert!(matches!(builder.finish(), Err(Error::InvalidBranch(_))));
    }

    #[test]
    fn test_self_branch_rejected() {
        let mut builder = SequenceBuilder::new();
        let here = builder.label();
        let br = builder.branch(OpCode::Br, here).unwrap();
        builder.bind(here, br).unwrap();

        assert!(matches!(builder.finish(), Err(Error::InvalidBranch(_))));
    }

    #[test]
    fn test_bind_before_emit_rejected() {
        let mut builder = SequenceBuilder::new();
        let end = builder.label();
        let future = builder.next_id();
        assert!(matches!(
            builder.bind(end, future),
            Err(Error::InvalidBranch(_))
        ));
    }

    #[test]
    fn test_fallthrough_rejected() {
        let mut builder = SequenceBuilder::new();
        builder.emit(OpCode::Nop).unwrap();
        assert!(matches!(builder.finish(), Err(Error::Malformed { .. })));
        assert!(matches!(
            SequenceBuilder::new().finish(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_operand_validation() {
        let mut builder = SequenceBuilder::new();
        assert!(matches!(
            builder.emit_with(OpCode::Nop, Operand::Token(Token::new(0x0A00_0001))),
            Err(Error::UnexpectedOperand)
        ));
        assert!(matches!(
            builder.emit(OpCode::Ldstr),
            Err(Error::WrongOperandType { .. })
        ));
        assert!(matches!(
            builder.emit(OpCode::Br),
            Err(Error::WrongOperandType { .. })
        ));
        assert!(matches!(
            builder.emit_call(OpCode::Nop, CallSite::instance_void(Token::new(0x0600_0001))),
            Err(Error::WrongOperandType { .. })
        ));
        let label = builder.label();
        assert!(matches!(
            builder.branch(OpCode::Call, label),
            Err(Error::InvalidBranch(_))
        ));
    }

    #[test]
    fn test_ldarg_forms() {
        let mut builder = SequenceBuilder::new();
        builder.emit_ldarg(0).unwrap();
        builder.emit_ldarg(3).unwrap();
        builder.emit_ldarg(9).unwrap();
        assert!(builder.emit_ldarg(300).is_err());
        builder.emit(OpCode::Ret).unwrap();

        let sequence = builder.finish().unwrap();
        let opcodes: Vec<_> = sequence.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![OpCode::Ldarg0, OpCode::Ldarg3, OpCode::LdargS, OpCode::Ret]
        );
    }
}
