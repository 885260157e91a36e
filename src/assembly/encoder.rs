//! CIL encoder for finalized instruction sequences.
//!
//! Encoding happens in three passes over an [`InstructionSequence`]:
//!
//! 1. **Branch sizing** - every branch starts in its long form; branches whose displacement
//!    fits in a signed byte are shrunk, repeatedly, until no further branch can be shrunk.
//!    Since only forward branches exist, shrinking never grows another displacement.
//! 2. **Stack analysis** - the evaluation stack depth is tracked along the sequence, with
//!    the depth at every branch target recorded and checked for consistency. Underflow in
//!    reachable code, mismatched merge depths and non-empty stacks at `ret` are rejected.
//! 3. **Emission** - opcodes and little-endian operands are written, with branch
//!    displacements computed from the final layout.
//!
//! [`EncodedBody::to_method_bytes`] then prefixes the code with a tiny or fat method header.

use std::collections::HashMap;

use crate::{
    assembly::{
        builder::InstructionSequence,
        instruction::{FlowType, Immediate, Instruction, OpCode, Operand, OperandType},
    },
    metadata::method::MethodBodyFlags,
    Result,
};

/// Largest code size a tiny method header can describe.
const TINY_MAX_CODE_SIZE: usize = 63;

/// Largest max-stack value implied by a tiny method header.
const TINY_MAX_STACK: u16 = 8;

/// Size of the fat method header, in 4-byte units, stored in its high nibble.
const FAT_HEADER_DWORDS: u16 = 3;

/// Encoded code bytes of a method body together with the data needed for its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    /// Raw CIL bytes
    pub code: Vec<u8>,
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Byte offset of every instruction, indexed by instruction position
    pub offsets: Vec<u32>,
}

impl EncodedBody {
    /// Returns true if a tiny header can describe this body.
    #[must_use]
    pub fn fits_tiny_header(&self, init_locals: bool) -> bool {
        self.code.len() <= TINY_MAX_CODE_SIZE && self.max_stack <= TINY_MAX_STACK && !init_locals
    }

    /// Method body bytes: header followed by code.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the code does not fit a fat header.
    pub fn to_method_bytes(&self, init_locals: bool) -> Result<Vec<u8>> {
        if self.fits_tiny_header(init_locals) {
            let mut bytes = Vec::with_capacity(self.code.len() + 1);
            let header = (self.code.len() << 2) as u8 | MethodBodyFlags::TINY_FORMAT.bits() as u8;
            bytes.push(header);
            bytes.extend_from_slice(&self.code);
            return Ok(bytes);
        }

        let mut flags = MethodBodyFlags::FAT_FORMAT;
        if init_locals {
            flags |= MethodBodyFlags::INIT_LOCALS;
        }
        let code_size = u32::try_from(self.code.len())
            .map_err(|_| malformed_error!("Method body size exceeds u32 range"))?;

        let mut bytes = Vec::with_capacity(self.code.len() + 12);
        bytes.extend_from_slice(&((FAT_HEADER_DWORDS << 12) | flags.bits()).to_le_bytes());
        bytes.extend_from_slice(&self.max_stack.to_le_bytes());
        bytes.extend_from_slice(&code_size.to_le_bytes());
        // no local variable signature
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&self.code);
        Ok(bytes)
    }
}

/// Encodes `sequence` to CIL.
///
/// `returns_value` states whether the method's return type is non-void, which decides how
/// many values `ret` consumes.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] on stack discipline violations and
/// [`crate::Error::InvalidBranch`] if a branch target lies outside the sequence.
///
/// # Examples
///
/// ```rust
/// use xamlpatch::assembly::{encode, OpCode, SequenceBuilder};
///
/// let mut builder = SequenceBuilder::new();
/// builder.emit(OpCode::LdcI4_1)?;
/// builder.emit(OpCode::Ret)?;
///
/// let body = encode(&builder.finish()?, true)?;
/// assert_eq!(body.code, vec![0x17, 0x2A]);
/// assert_eq!(body.max_stack, 1);
/// # Ok::<(), xamlpatch::Error>(())
/// ```
pub fn encode(sequence: &InstructionSequence, returns_value: bool) -> Result<EncodedBody> {
    let instructions = sequence.instructions();
    for (index, instruction) in instructions.iter().enumerate() {
        if let Some(target) = instruction.branch_target() {
            if target.index() >= instructions.len() || target.index() <= index {
                return Err(crate::Error::InvalidBranch(format!(
                    "{instruction} at IL#{index} has no valid target"
                )));
            }
        }
    }

    let forms = size_branches(instructions);
    let offsets = layout(&forms);
    let max_stack = analyze_stack(instructions, returns_value)?;
    let code = emit(&forms, instructions, &offsets)?;

    Ok(EncodedBody {
        code,
        max_stack,
        offsets,
    })
}

/// Chooses the final opcode of every instruction, shrinking branches where possible.
fn size_branches(instructions: &[Instruction]) -> Vec<OpCode> {
    let mut forms: Vec<OpCode> = instructions
        .iter()
        .map(|instruction| {
            if instruction.opcode.is_branch() {
                instruction.opcode.long_form()
            } else {
                instruction.opcode
            }
        })
        .collect();

    loop {
        let offsets = layout(&forms);
        let mut shrunk = false;

        for (index, instruction) in instructions.iter().enumerate() {
            let Some(target) = instruction.branch_target() else {
                continue;
            };
            let Some(short) = forms[index].short_form() else {
                continue;
            };

            // For a forward branch the displacement is the same in both forms
            let end = i64::from(offsets[index]) + forms[index].info().size() as i64;
            let displacement = i64::from(offsets[target.index()]) - end;
            if i8::try_from(displacement).is_ok() {
                forms[index] = short;
                shrunk = true;
            }
        }

        if !shrunk {
            return forms;
        }
    }
}

/// Byte offset of every instruction for the given opcode forms.
fn layout(forms: &[OpCode]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(forms.len());
    let mut position = 0u32;
    for form in forms {
        offsets.push(position);
        position += form.info().size() as u32;
    }
    offsets
}

/// Computes the maximum stack depth and validates stack discipline.
fn analyze_stack(instructions: &[Instruction], returns_value: bool) -> Result<u16> {
    let mut label_depths: HashMap<usize, i32> = HashMap::new();
    let mut depth: i32 = 0;
    let mut unreachable = false;
    let mut max_depth: i32 = 0;

    for (index, instruction) in instructions.iter().enumerate() {
        if let Some(&merged) = label_depths.get(&index) {
            if !unreachable && merged != depth {
                return Err(malformed_error!(
                    "Stack depth mismatch at IL#{}: {} on fall-through, {} on branch",
                    index,
                    depth,
                    merged
                ));
            }
            depth = merged;
            unreachable = false;
        }

        let info = instruction.opcode.info();
        let (pops, pushes) = match (instruction.operand, info.flow) {
            (Operand::Call(site), _) => (site.pops, site.pushes),
            (_, FlowType::Return) => (u8::from(returns_value), 0),
            _ => (info.stack_pops, info.stack_pushes),
        };

        depth -= i32::from(pops);
        if depth < 0 {
            if !unreachable {
                return Err(malformed_error!(
                    "Stack underflow at IL#{} ({}): depth became {}",
                    index,
                    instruction,
                    depth
                ));
            }
            depth = 0;
        }
        depth += i32::from(pushes);
        max_depth = max_depth.max(depth);

        match info.flow {
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch => {
                if let Some(target) = instruction.branch_target() {
                    if !unreachable {
                        record_label_depth(&mut label_depths, target.index(), depth)?;
                    }
                }
                if info.flow == FlowType::UnconditionalBranch {
                    unreachable = true;
                }
            }
            FlowType::Return => {
                if depth != 0 && !unreachable {
                    return Err(malformed_error!(
                        "Stack not empty at ret IL#{}: {} items left",
                        index,
                        depth
                    ));
                }
                unreachable = true;
            }
            FlowType::Sequential | FlowType::Call => {}
        }
    }

    u16::try_from(max_depth).map_err(|_| malformed_error!("Stack depth exceeds u16 range"))
}

fn record_label_depth(label_depths: &mut HashMap<usize, i32>, target: usize, depth: i32) -> Result<()> {
    match label_depths.get(&target) {
        Some(&existing) if existing != depth => Err(malformed_error!(
            "Inconsistent stack depth at IL#{}: {} and {}",
            target,
            existing,
            depth
        )),
        Some(_) => Ok(()),
        None => {
            label_depths.insert(target, depth);
            Ok(())
        }
    }
}

fn emit(forms: &[OpCode], instructions: &[Instruction], offsets: &[u32]) -> Result<Vec<u8>> {
    let size = instructions
        .last()
        .zip(forms.last())
        .map_or(0, |(_, form)| offsets[offsets.len() - 1] as usize + form.info().size());
    let mut code = Vec::with_capacity(size);

    for (index, (form, instruction)) in forms.iter().zip(instructions).enumerate() {
        let info = form.info();
        code.push(info.opcode);

        match instruction.operand {
            Operand::None => {}
            Operand::Immediate(Immediate::UInt8(value)) => code.push(value),
            Operand::Token(token) => code.extend_from_slice(&token.value().to_le_bytes()),
            Operand::Call(site) => code.extend_from_slice(&site.method.value().to_le_bytes()),
            Operand::Target(target) => {
                let end = i64::from(offsets[index]) + info.size() as i64;
                let displacement = i64::from(offsets[target.index()]) - end;
                if info.op_type == OperandType::Int8 {
                    let short = i8::try_from(displacement).map_err(|_| {
                        crate::Error::InvalidBranch(format!(
                            "displacement {displacement} does not fit {form}"
                        ))
                    })?;
                    code.extend_from_slice(&short.to_le_bytes());
                } else {
                    let long = i32::try_from(displacement).map_err(|_| {
                        crate::Error::InvalidBranch(format!(
                            "displacement {displacement} does not fit {form}"
                        ))
                    })?;
                    code.extend_from_slice(&long.to_le_bytes());
                }
            }
        }
    }

    Ok(code)
}
