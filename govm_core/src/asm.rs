// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instruction assembler and program builder.
//!
//! [`Asm`] appends instructions and resolves label-based branch targets;
//! [`ProgramBuilder`] owns the constant pool, data segment, and metadata and
//! produces a [`Program`] or [`VerifiedProgram`].

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;

use crate::format::Writer;
use crate::opcode::Opcode;
use crate::program::{Const, ConstId, Metadata, Program};
use crate::verifier::{self, VerifiedProgram, VerifyError};
use crate::vm::Word;

/// A control-flow target that may be placed after it is referenced.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(u32);

/// An assembler error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmError {
    /// A label was referenced but never placed.
    UnresolvedLabel {
        /// The label's id.
        label: u32,
    },
    /// A label was placed twice.
    LabelAlreadyPlaced {
        /// The label's id.
        label: u32,
    },
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedLabel { label } => {
                write!(f, "label {label} was referenced but never placed")
            }
            Self::LabelAlreadyPlaced { label } => write!(f, "label {label} was placed twice"),
        }
    }
}

impl core::error::Error for AsmError {}

/// A [`ProgramBuilder`] error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// The assembler failed to resolve the instruction stream.
    Asm(AsmError),
    /// The produced program failed verification.
    Verify(VerifyError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asm(e) => write!(f, "assembly failed: {e}"),
            Self::Verify(e) => write!(f, "verification failed: {e}"),
        }
    }
}

impl core::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Asm(e) => Some(e),
            Self::Verify(e) => Some(e),
        }
    }
}

impl From<AsmError> for BuildError {
    fn from(e: AsmError) -> Self {
        Self::Asm(e)
    }
}

impl From<VerifyError> for BuildError {
    fn from(e: VerifyError) -> Self {
        Self::Verify(e)
    }
}

/// An instruction stream assembler.
#[derive(Clone, Debug, Default)]
pub struct Asm {
    code: Writer,
    count: u32,
    placed: Vec<Option<u32>>,
    fixups: Vec<(usize, Label)>,
}

impl Asm {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index the next appended instruction will get.
    #[must_use]
    pub fn pc(&self) -> u32 {
        self.count
    }

    /// Creates a fresh, unplaced label.
    pub fn label(&mut self) -> Label {
        let id = self.placed.len() as u32;
        self.placed.push(None);
        Label(id)
    }

    /// Places `label` at the next instruction index.
    pub fn place(&mut self, label: Label) -> Result<(), AsmError> {
        let slot = &mut self.placed[label.0 as usize];
        if slot.is_some() {
            return Err(AsmError::LabelAlreadyPlaced { label: label.0 });
        }
        *slot = Some(self.count);
        Ok(())
    }

    fn op(&mut self, op: Opcode) -> &mut Self {
        self.code.write_u8(op.byte());
        self.count += 1;
        self
    }

    fn branch(&mut self, op: Opcode, label: Label) -> &mut Self {
        self.code.write_u8(op.byte());
        self.count += 1;
        self.fixups.push((self.code.len(), label));
        self.code.write_u32_be(u32::MAX); // placeholder, patched in finish
        self
    }

    /// Appends `nop`.
    pub fn nop(&mut self) -> &mut Self {
        self.op(Opcode::Nop)
    }

    /// Appends `halt`.
    pub fn halt(&mut self) -> &mut Self {
        self.op(Opcode::Halt)
    }

    /// Appends `push` of constant `idx`.
    pub fn push(&mut self, idx: ConstId) -> &mut Self {
        self.code.write_u8(Opcode::Push.byte());
        self.code.write_u16_be(idx.0);
        self.count += 1;
        self
    }

    /// Appends `lit` of an immediate word.
    pub fn lit(&mut self, imm: Word) -> &mut Self {
        self.code.write_u8(Opcode::Lit.byte());
        self.code.write_i16_be(imm);
        self.count += 1;
        self
    }

    /// Appends `pop`.
    pub fn pop(&mut self) -> &mut Self {
        self.op(Opcode::Pop)
    }

    /// Appends `dup`.
    pub fn dup(&mut self) -> &mut Self {
        self.op(Opcode::Dup)
    }

    /// Appends `swap`.
    pub fn swap(&mut self) -> &mut Self {
        self.op(Opcode::Swap)
    }

    /// Appends `rot3`.
    pub fn rot3(&mut self) -> &mut Self {
        self.op(Opcode::Rot3)
    }

    /// Appends `ldloc` of `slot`.
    pub fn load_local(&mut self, slot: u8) -> &mut Self {
        self.code.write_u8(Opcode::LoadLocal.byte());
        self.code.write_u8(slot);
        self.count += 1;
        self
    }

    /// Appends `stloc` of `slot`.
    pub fn store_local(&mut self, slot: u8) -> &mut Self {
        self.code.write_u8(Opcode::StoreLocal.byte());
        self.code.write_u8(slot);
        self.count += 1;
        self
    }

    /// Appends `lb`.
    pub fn load_byte(&mut self) -> &mut Self {
        self.op(Opcode::LoadByte)
    }

    /// Appends `sb`.
    pub fn store_byte(&mut self) -> &mut Self {
        self.op(Opcode::StoreByte)
    }

    /// Appends `lw`.
    pub fn load_word(&mut self) -> &mut Self {
        self.op(Opcode::LoadWord)
    }

    /// Appends `sw`.
    pub fn store_word(&mut self) -> &mut Self {
        self.op(Opcode::StoreWord)
    }

    /// Appends `add`.
    pub fn add(&mut self) -> &mut Self {
        self.op(Opcode::Add)
    }

    /// Appends `sub`.
    pub fn sub(&mut self) -> &mut Self {
        self.op(Opcode::Sub)
    }

    /// Appends `mul`.
    pub fn mul(&mut self) -> &mut Self {
        self.op(Opcode::Mul)
    }

    /// Appends `div`.
    pub fn div(&mut self) -> &mut Self {
        self.op(Opcode::Div)
    }

    /// Appends `and`.
    pub fn and(&mut self) -> &mut Self {
        self.op(Opcode::And)
    }

    /// Appends `or`.
    pub fn or(&mut self) -> &mut Self {
        self.op(Opcode::Or)
    }

    /// Appends `xor`.
    pub fn xor(&mut self) -> &mut Self {
        self.op(Opcode::Xor)
    }

    /// Appends `nor`.
    pub fn nor(&mut self) -> &mut Self {
        self.op(Opcode::Nor)
    }

    /// Appends `shl`.
    pub fn shl(&mut self) -> &mut Self {
        self.op(Opcode::Shl)
    }

    /// Appends `shr`.
    pub fn shr(&mut self) -> &mut Self {
        self.op(Opcode::Shr)
    }

    /// Appends `not`.
    pub fn not(&mut self) -> &mut Self {
        self.op(Opcode::Not)
    }

    /// Appends `equ`.
    pub fn eq(&mut self) -> &mut Self {
        self.op(Opcode::Eq)
    }

    /// Appends `lt`.
    pub fn lt(&mut self) -> &mut Self {
        self.op(Opcode::Lt)
    }

    /// Appends `gt`.
    pub fn gt(&mut self) -> &mut Self {
        self.op(Opcode::Gt)
    }

    /// Appends `loe`.
    pub fn le(&mut self) -> &mut Self {
        self.op(Opcode::Le)
    }

    /// Appends `goe`.
    pub fn ge(&mut self) -> &mut Self {
        self.op(Opcode::Ge)
    }

    /// Appends `jmp` to `label`.
    pub fn jump(&mut self, label: Label) -> &mut Self {
        self.branch(Opcode::Jump, label)
    }

    /// Appends `jz` to `label`.
    pub fn jump_if_zero(&mut self, label: Label) -> &mut Self {
        self.branch(Opcode::JumpIfZero, label)
    }

    /// Appends `call` to `label`.
    pub fn call(&mut self, label: Label) -> &mut Self {
        self.branch(Opcode::Call, label)
    }

    /// Appends `ret`.
    pub fn ret(&mut self) -> &mut Self {
        self.op(Opcode::Ret)
    }

    /// Appends `getc`.
    pub fn read_char(&mut self) -> &mut Self {
        self.op(Opcode::ReadChar)
    }

    /// Appends `putc`.
    pub fn write_char(&mut self) -> &mut Self {
        self.op(Opcode::WriteChar)
    }

    /// Appends `puts` of constant `idx`.
    pub fn write_str(&mut self, idx: ConstId) -> &mut Self {
        self.code.write_u8(Opcode::WriteStr.byte());
        self.code.write_u16_be(idx.0);
        self.count += 1;
        self
    }

    /// Resolves label fixups and returns `(code, instr_count)`.
    pub fn finish(self) -> Result<(Vec<u8>, u32), AsmError> {
        let mut code = self.code.into_vec();
        for (offset, label) in self.fixups {
            let target = self.placed[label.0 as usize]
                .ok_or(AsmError::UnresolvedLabel { label: label.0 })?;
            code[offset..offset + 4].copy_from_slice(&target.to_be_bytes());
        }
        Ok((code, self.count))
    }
}

/// Builds a [`Program`] from assembled code plus pool/data/metadata state.
#[derive(Clone, Debug, Default)]
pub struct ProgramBuilder {
    entry: u32,
    locals: u16,
    consts: Vec<Const>,
    data_size: u16,
    data_init: Vec<u8>,
    meta: Option<Metadata>,
}

impl ProgramBuilder {
    /// Creates an empty builder (entry 0, no locals, no data).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a word constant, deduplicating repeats.
    pub fn int_const(&mut self, v: Word) -> ConstId {
        self.intern(Const::Int(v))
    }

    /// Interns a string constant, deduplicating repeats.
    pub fn str_const(&mut self, s: &str) -> ConstId {
        self.intern(Const::Str(s.to_string()))
    }

    fn intern(&mut self, c: Const) -> ConstId {
        if let Some(ix) = self.consts.iter().position(|existing| *existing == c) {
            return ConstId(ix as u16);
        }
        let ix = self.consts.len() as u16;
        self.consts.push(c);
        ConstId(ix)
    }

    /// Sets the entry instruction index (defaults to 0).
    pub fn set_entry(&mut self, entry: u32) -> &mut Self {
        self.entry = entry;
        self
    }

    /// Sets the local slots owned by every call frame (defaults to 0).
    pub fn set_locals(&mut self, locals: u16) -> &mut Self {
        self.locals = locals;
        self
    }

    /// Declares a writable data segment of `size` bytes, initialized with
    /// `init` (the remainder is zero-filled at run start).
    pub fn data_segment(&mut self, size: u16, init: &[u8]) -> &mut Self {
        self.data_size = size;
        self.data_init = init.to_vec();
        self
    }

    /// Attaches program metadata.
    pub fn metadata(&mut self, name: &str, source: Option<&str>) -> &mut Self {
        self.meta = Some(Metadata {
            name: name.to_string(),
            source: source.map(ToString::to_string),
        });
        self
    }

    /// Assembles `a` into a [`Program`].
    pub fn build(self, a: Asm) -> Result<Program, BuildError> {
        let (code, instr_count) = a.finish()?;
        Ok(Program {
            entry: self.entry,
            locals: self.locals,
            instr_count,
            code,
            consts: self.consts,
            data_size: self.data_size,
            data_init: self.data_init,
            meta: self.meta,
        })
    }

    /// Assembles `a` and verifies the result.
    pub fn build_verified(self, a: Asm) -> Result<VerifiedProgram, BuildError> {
        Ok(verifier::verify(self.build(a)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::Instr;

    #[test]
    fn forward_and_backward_labels_resolve() {
        let mut a = Asm::new();
        let top = a.label();
        let out = a.label();
        a.place(top).unwrap();
        a.lit(0).jump_if_zero(out); // forward reference
        a.jump(top); // backward reference
        a.place(out).unwrap();
        a.halt();

        let vp = ProgramBuilder::new().build_verified(a).unwrap();
        assert_eq!(vp.instrs()[1], Instr::JumpIfZero { target: 3 });
        assert_eq!(vp.instrs()[2], Instr::Jump { target: 0 });
    }

    #[test]
    fn unplaced_label_is_an_error() {
        let mut a = Asm::new();
        let nowhere = a.label();
        a.jump(nowhere);
        assert_eq!(
            a.finish(),
            Err(AsmError::UnresolvedLabel { label: 0 })
        );
    }

    #[test]
    fn double_placement_is_an_error() {
        let mut a = Asm::new();
        let l = a.label();
        a.place(l).unwrap();
        a.halt();
        assert_eq!(a.place(l), Err(AsmError::LabelAlreadyPlaced { label: 0 }));
    }

    #[test]
    fn constants_are_interned() {
        let mut pb = ProgramBuilder::new();
        let a = pb.int_const(3);
        let b = pb.int_const(3);
        let c = pb.int_const(4);
        let s = pb.str_const("x");
        let s2 = pb.str_const("x");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(s, s2);

        let mut asm = Asm::new();
        asm.push(a).push(c).halt();
        let p = pb.build(asm).unwrap();
        assert_eq!(p.consts.len(), 3);
    }

    #[test]
    fn build_verified_rejects_fallthrough() {
        let mut a = Asm::new();
        a.nop();
        assert!(matches!(
            ProgramBuilder::new().build_verified(a),
            Err(BuildError::Verify(VerifyError::MissingTerminator))
        ));
    }

    #[test]
    fn builder_carries_segment_and_metadata() {
        let mut pb = ProgramBuilder::new();
        pb.set_entry(0)
            .set_locals(3)
            .data_segment(8, b"\x01")
            .metadata("demo", Some("demo.adl"));
        let mut a = Asm::new();
        a.halt();
        let p = pb.build(a).unwrap();
        assert_eq!(p.locals, 3);
        assert_eq!(p.data_size, 8);
        assert_eq!(p.data_init, b"\x01");
        assert_eq!(p.meta.as_ref().unwrap().name, "demo");
    }
}
