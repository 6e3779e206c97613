// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Load-time program verification.
//!
//! Verification rejects malformed or unsafe-to-execute programs before they
//! reach the interpreter: every jump/call target, constant reference, and
//! local slot is proven in range here, so the execution hot loop indexes
//! those fields without re-checking them.

use alloc::vec::Vec;
use core::fmt;

use crate::format::{DecodeError, Reader};
use crate::opcode::Opcode;
use crate::program::{Const, ConstId, Program};

/// A decoded instruction.
///
/// Operands referencing the program (targets, constant indices, local slots)
/// are validated when a [`VerifiedProgram`] is constructed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    /// Does nothing.
    Nop,
    /// Stops execution normally.
    Halt,
    /// Pushes an `Int` constant.
    Push {
        /// Constant pool index (points at a [`Const::Int`]).
        idx: ConstId,
    },
    /// Pushes an immediate word.
    Lit {
        /// The immediate value.
        imm: i16,
    },
    /// Discards the top of the stack.
    Pop,
    /// Duplicates the top of the stack.
    Dup,
    /// Swaps the two topmost words.
    Swap,
    /// Rotates the three topmost words.
    Rot3,
    /// Pushes a frame local.
    LoadLocal {
        /// Local slot.
        slot: u8,
    },
    /// Pops into a frame local.
    StoreLocal {
        /// Local slot.
        slot: u8,
    },
    /// Pops an address, pushes the byte there.
    LoadByte,
    /// Pops a value and an address, stores the low byte.
    StoreByte,
    /// Pops an address, pushes the big-endian word there.
    LoadWord,
    /// Pops a value and an address, stores the word big-endian.
    StoreWord,
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Division; faults on zero divisor.
    Div,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Bitwise nor.
    Nor,
    /// Left shift (count masked to 0..=15).
    Shl,
    /// Arithmetic right shift (count masked to 0..=15).
    Shr,
    /// Logical negation.
    Not,
    /// Equality comparison.
    Eq,
    /// Less-than comparison.
    Lt,
    /// Greater-than comparison.
    Gt,
    /// Less-or-equal comparison.
    Le,
    /// Greater-or-equal comparison.
    Ge,
    /// Unconditional branch.
    Jump {
        /// Target instruction index.
        target: u32,
    },
    /// Pops the condition, branches when it is zero.
    JumpIfZero {
        /// Target instruction index.
        target: u32,
    },
    /// Pushes a call frame and branches.
    Call {
        /// Target instruction index.
        target: u32,
    },
    /// Pops the current call frame.
    Ret,
    /// Reads one character from the host bridge.
    ReadChar,
    /// Pops a word and writes its low byte to the host bridge.
    WriteChar,
    /// Writes a `Str` constant through the host bridge.
    WriteStr {
        /// Constant pool index (points at a [`Const::Str`]).
        idx: ConstId,
    },
}

impl Instr {
    /// Returns the instruction's opcode.
    #[must_use]
    pub fn opcode(self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::Halt => Opcode::Halt,
            Self::Push { .. } => Opcode::Push,
            Self::Lit { .. } => Opcode::Lit,
            Self::Pop => Opcode::Pop,
            Self::Dup => Opcode::Dup,
            Self::Swap => Opcode::Swap,
            Self::Rot3 => Opcode::Rot3,
            Self::LoadLocal { .. } => Opcode::LoadLocal,
            Self::StoreLocal { .. } => Opcode::StoreLocal,
            Self::LoadByte => Opcode::LoadByte,
            Self::StoreByte => Opcode::StoreByte,
            Self::LoadWord => Opcode::LoadWord,
            Self::StoreWord => Opcode::StoreWord,
            Self::Add => Opcode::Add,
            Self::Sub => Opcode::Sub,
            Self::Mul => Opcode::Mul,
            Self::Div => Opcode::Div,
            Self::And => Opcode::And,
            Self::Or => Opcode::Or,
            Self::Xor => Opcode::Xor,
            Self::Nor => Opcode::Nor,
            Self::Shl => Opcode::Shl,
            Self::Shr => Opcode::Shr,
            Self::Not => Opcode::Not,
            Self::Eq => Opcode::Eq,
            Self::Lt => Opcode::Lt,
            Self::Gt => Opcode::Gt,
            Self::Le => Opcode::Le,
            Self::Ge => Opcode::Ge,
            Self::Jump { .. } => Opcode::Jump,
            Self::JumpIfZero { .. } => Opcode::JumpIfZero,
            Self::Call { .. } => Opcode::Call,
            Self::Ret => Opcode::Ret,
            Self::ReadChar => Opcode::ReadChar,
            Self::WriteChar => Opcode::WriteChar,
            Self::WriteStr { .. } => Opcode::WriteStr,
        }
    }
}

/// A verification error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyError {
    /// The instruction stream failed to decode.
    Decode(DecodeError),
    /// The entry index is outside the instruction stream.
    EntryOutOfRange {
        /// The declared entry index.
        entry: u32,
        /// Number of decoded instructions.
        len: u32,
    },
    /// A branch target is outside the instruction stream.
    TargetOutOfRange {
        /// Instruction index of the branch.
        pc: u32,
        /// The invalid target.
        target: u32,
        /// Number of decoded instructions.
        len: u32,
    },
    /// A constant index is outside the pool.
    ConstOutOfRange {
        /// Instruction index of the reference.
        pc: u32,
        /// The invalid constant index.
        idx: u16,
        /// Constant pool size.
        len: u16,
    },
    /// A constant reference expects a different literal type.
    ConstTypeMismatch {
        /// Instruction index of the reference.
        pc: u32,
        /// The referenced constant index.
        idx: u16,
    },
    /// A local slot is outside the declared frame size.
    LocalOutOfRange {
        /// Instruction index of the access.
        pc: u32,
        /// The invalid slot.
        slot: u8,
        /// Declared local slots per frame.
        locals: u16,
    },
    /// The data initialization image is larger than the declared segment.
    DataInitTooLong {
        /// Initialization image length.
        init_len: usize,
        /// Declared writable segment size.
        data_size: u16,
    },
    /// The last instruction can fall through past the end of the stream.
    MissingTerminator,
    /// The instruction stream is empty.
    EmptyCode,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "instruction decode failed: {e}"),
            Self::EntryOutOfRange { entry, len } => {
                write!(f, "entry {entry} out of range (instruction count {len})")
            }
            Self::TargetOutOfRange { pc, target, len } => {
                write!(
                    f,
                    "branch target {target} at pc={pc} out of range (instruction count {len})"
                )
            }
            Self::ConstOutOfRange { pc, idx, len } => {
                write!(f, "constant {idx} at pc={pc} out of range (pool size {len})")
            }
            Self::ConstTypeMismatch { pc, idx } => {
                write!(f, "constant {idx} at pc={pc} has the wrong literal type")
            }
            Self::LocalOutOfRange { pc, slot, locals } => {
                write!(f, "local slot {slot} at pc={pc} out of range (frame has {locals})")
            }
            Self::DataInitTooLong {
                init_len,
                data_size,
            } => {
                write!(
                    f,
                    "data init image ({init_len} bytes) exceeds segment size {data_size}"
                )
            }
            Self::MissingTerminator => {
                write!(f, "instruction stream can fall through past its end")
            }
            Self::EmptyCode => write!(f, "instruction stream is empty"),
        }
    }
}

impl core::error::Error for VerifyError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeError> for VerifyError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

/// A program that has passed load-time verification.
///
/// Carries the decoded instruction list so execution never decodes bytecode
/// at runtime, and guarantees:
///
/// - every branch/call target and the entry index name a decoded instruction,
/// - every `push` references an `Int` constant and every `puts` a `Str`
///   constant,
/// - every local slot fits the declared frame size,
/// - the data init image fits the declared segment,
/// - the stream cannot fall through past its last instruction.
///
/// A `VerifiedProgram` is immutable and can be shared read-only across any
/// number of concurrently running engines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedProgram {
    program: Program,
    instrs: Vec<Instr>,
}

impl VerifiedProgram {
    /// Returns the underlying program.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Returns the decoded instruction list.
    #[must_use]
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// Consumes `self` and returns the underlying program.
    #[must_use]
    pub fn into_program(self) -> Program {
        self.program
    }
}

/// Decodes the raw instruction stream of `program`.
pub(crate) fn decode_instructions(program: &Program) -> Result<Vec<Instr>, DecodeError> {
    let mut r = Reader::new(&program.code);
    let mut instrs = Vec::with_capacity(program.instr_count as usize);
    for _ in 0..program.instr_count {
        let byte = r.read_u8()?;
        let op = Opcode::from_byte(byte).ok_or(DecodeError::UnknownOpcode { byte })?;
        let instr = match op {
            Opcode::Nop => Instr::Nop,
            Opcode::Halt => Instr::Halt,
            Opcode::Push => Instr::Push {
                idx: ConstId(r.read_u16_be()?),
            },
            Opcode::Lit => Instr::Lit {
                imm: r.read_i16_be()?,
            },
            Opcode::Pop => Instr::Pop,
            Opcode::Dup => Instr::Dup,
            Opcode::Swap => Instr::Swap,
            Opcode::Rot3 => Instr::Rot3,
            Opcode::LoadLocal => Instr::LoadLocal {
                slot: r.read_u8()?,
            },
            Opcode::StoreLocal => Instr::StoreLocal {
                slot: r.read_u8()?,
            },
            Opcode::LoadByte => Instr::LoadByte,
            Opcode::StoreByte => Instr::StoreByte,
            Opcode::LoadWord => Instr::LoadWord,
            Opcode::StoreWord => Instr::StoreWord,
            Opcode::Add => Instr::Add,
            Opcode::Sub => Instr::Sub,
            Opcode::Mul => Instr::Mul,
            Opcode::Div => Instr::Div,
            Opcode::And => Instr::And,
            Opcode::Or => Instr::Or,
            Opcode::Xor => Instr::Xor,
            Opcode::Nor => Instr::Nor,
            Opcode::Shl => Instr::Shl,
            Opcode::Shr => Instr::Shr,
            Opcode::Not => Instr::Not,
            Opcode::Eq => Instr::Eq,
            Opcode::Lt => Instr::Lt,
            Opcode::Gt => Instr::Gt,
            Opcode::Le => Instr::Le,
            Opcode::Ge => Instr::Ge,
            Opcode::Jump => Instr::Jump {
                target: r.read_u32_be()?,
            },
            Opcode::JumpIfZero => Instr::JumpIfZero {
                target: r.read_u32_be()?,
            },
            Opcode::Call => Instr::Call {
                target: r.read_u32_be()?,
            },
            Opcode::Ret => Instr::Ret,
            Opcode::ReadChar => Instr::ReadChar,
            Opcode::WriteChar => Instr::WriteChar,
            Opcode::WriteStr => Instr::WriteStr {
                idx: ConstId(r.read_u16_be()?),
            },
        };
        instrs.push(instr);
    }
    if !r.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(instrs)
}

/// Verifies `program`, consuming it into a [`VerifiedProgram`].
pub fn verify(program: Program) -> Result<VerifiedProgram, VerifyError> {
    let instrs = decode_instructions(&program)?;
    let len = instrs.len() as u32;
    if len == 0 {
        return Err(VerifyError::EmptyCode);
    }
    if program.entry >= len {
        return Err(VerifyError::EntryOutOfRange {
            entry: program.entry,
            len,
        });
    }
    if program.data_init.len() > program.data_size as usize {
        return Err(VerifyError::DataInitTooLong {
            init_len: program.data_init.len(),
            data_size: program.data_size,
        });
    }

    let pool_len = program.consts.len() as u16;
    for (ix, instr) in instrs.iter().enumerate() {
        let pc = ix as u32;
        match *instr {
            Instr::Jump { target } | Instr::JumpIfZero { target } | Instr::Call { target } => {
                if target >= len {
                    return Err(VerifyError::TargetOutOfRange { pc, target, len });
                }
            }
            Instr::Push { idx } => match program.const_at(idx) {
                Some(Const::Int(_)) => {}
                Some(_) => return Err(VerifyError::ConstTypeMismatch { pc, idx: idx.0 }),
                None => {
                    return Err(VerifyError::ConstOutOfRange {
                        pc,
                        idx: idx.0,
                        len: pool_len,
                    });
                }
            },
            Instr::WriteStr { idx } => match program.const_at(idx) {
                Some(Const::Str(_)) => {}
                Some(_) => return Err(VerifyError::ConstTypeMismatch { pc, idx: idx.0 }),
                None => {
                    return Err(VerifyError::ConstOutOfRange {
                        pc,
                        idx: idx.0,
                        len: pool_len,
                    });
                }
            },
            Instr::LoadLocal { slot } | Instr::StoreLocal { slot } => {
                if u16::from(slot) >= program.locals {
                    return Err(VerifyError::LocalOutOfRange {
                        pc,
                        slot,
                        locals: program.locals,
                    });
                }
            }
            _ => {}
        }
    }

    // Falling off the end of the stream is unrepresentable at runtime when
    // the final instruction cannot fall through.
    if let Some(last) = instrs.last()
        && !last.opcode().is_terminator()
    {
        return Err(VerifyError::MissingTerminator);
    }

    Ok(VerifiedProgram { program, instrs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;
    use crate::format::Writer;

    fn program_with(code: Vec<u8>, instr_count: u32) -> Program {
        Program {
            entry: 0,
            locals: 1,
            instr_count,
            code,
            consts: vec![Const::Int(5), Const::Str("s".to_string())],
            data_size: 4,
            data_init: vec![],
            meta: None,
        }
    }

    fn encode(ops: &[(Opcode, Option<u32>)]) -> Vec<u8> {
        let mut w = Writer::new();
        for (op, operand) in ops {
            w.write_u8(op.byte());
            match op.operand_len() {
                0 => {}
                1 => w.write_u8(operand.unwrap() as u8),
                2 => w.write_u16_be(operand.unwrap() as u16),
                4 => w.write_u32_be(operand.unwrap()),
                _ => unreachable!(),
            }
        }
        w.into_vec()
    }

    #[test]
    fn verifies_a_straight_line_program() {
        let code = encode(&[
            (Opcode::Push, Some(0)),
            (Opcode::Pop, None),
            (Opcode::Halt, None),
        ]);
        let p = program_with(code, 3);
        let vp = verify(p).unwrap();
        assert_eq!(vp.instrs().len(), 3);
        assert_eq!(vp.instrs()[0], Instr::Push { idx: ConstId(0) });
    }

    #[test]
    fn rejects_unknown_opcode() {
        let p = program_with(vec![0xEE], 1);
        assert_eq!(
            verify(p),
            Err(VerifyError::Decode(DecodeError::UnknownOpcode { byte: 0xEE }))
        );
    }

    #[test]
    fn rejects_truncated_operand() {
        let p = program_with(vec![Opcode::Lit.byte(), 0x01], 1);
        assert_eq!(
            verify(p),
            Err(VerifyError::Decode(DecodeError::UnexpectedEof))
        );
    }

    #[test]
    fn rejects_trailing_code_bytes() {
        let mut code = encode(&[(Opcode::Halt, None)]);
        code.push(0x00);
        let p = program_with(code, 1);
        assert_eq!(
            verify(p),
            Err(VerifyError::Decode(DecodeError::TrailingBytes))
        );
    }

    #[test]
    fn rejects_jump_target_out_of_range() {
        let code = encode(&[(Opcode::Jump, Some(9))]);
        let p = program_with(code, 1);
        assert_eq!(
            verify(p),
            Err(VerifyError::TargetOutOfRange {
                pc: 0,
                target: 9,
                len: 1
            })
        );
    }

    #[test]
    fn rejects_const_out_of_range() {
        let code = encode(&[(Opcode::Push, Some(7)), (Opcode::Halt, None)]);
        let p = program_with(code, 2);
        assert_eq!(
            verify(p),
            Err(VerifyError::ConstOutOfRange {
                pc: 0,
                idx: 7,
                len: 2
            })
        );
    }

    #[test]
    fn rejects_push_of_str_const() {
        let code = encode(&[(Opcode::Push, Some(1)), (Opcode::Halt, None)]);
        let p = program_with(code, 2);
        assert_eq!(
            verify(p),
            Err(VerifyError::ConstTypeMismatch { pc: 0, idx: 1 })
        );
    }

    #[test]
    fn rejects_puts_of_int_const() {
        let code = encode(&[(Opcode::WriteStr, Some(0)), (Opcode::Halt, None)]);
        let p = program_with(code, 2);
        assert_eq!(
            verify(p),
            Err(VerifyError::ConstTypeMismatch { pc: 0, idx: 0 })
        );
    }

    #[test]
    fn rejects_local_slot_out_of_range() {
        let code = encode(&[(Opcode::LoadLocal, Some(3)), (Opcode::Halt, None)]);
        let p = program_with(code, 2);
        assert_eq!(
            verify(p),
            Err(VerifyError::LocalOutOfRange {
                pc: 0,
                slot: 3,
                locals: 1
            })
        );
    }

    #[test]
    fn rejects_entry_out_of_range() {
        let code = encode(&[(Opcode::Halt, None)]);
        let mut p = program_with(code, 1);
        p.entry = 5;
        assert_eq!(verify(p), Err(VerifyError::EntryOutOfRange { entry: 5, len: 1 }));
    }

    #[test]
    fn rejects_oversized_data_init() {
        let code = encode(&[(Opcode::Halt, None)]);
        let mut p = program_with(code, 1);
        p.data_init = vec![0; 8];
        assert_eq!(
            verify(p),
            Err(VerifyError::DataInitTooLong {
                init_len: 8,
                data_size: 4
            })
        );
    }

    #[test]
    fn rejects_fallthrough_past_the_end() {
        let code = encode(&[(Opcode::Nop, None)]);
        let p = program_with(code, 1);
        assert_eq!(verify(p), Err(VerifyError::MissingTerminator));
    }

    #[test]
    fn rejects_empty_code() {
        let p = program_with(vec![], 0);
        assert_eq!(verify(p), Err(VerifyError::EmptyCode));
    }
}
