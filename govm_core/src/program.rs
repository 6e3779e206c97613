// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `GOVM` program container and its binary encoding.
//!
//! This module covers the *portable container format* only; control-flow and
//! cross-reference validation is the job of the [`verifier`].
//!
//! Container layout (all integers big-endian):
//!
//! ```ignore
//! magic:   b"GOVM"
//! version: u16
//! sections until end of input, each: tag u8, byte_len u32, payload
//!   CODE  (1, required):  entry u32, locals u16, instr_count u32, instructions
//!   CONST (2, optional):  count u16, entries (tag 0 = Int i16, tag 1 = Str u32 + UTF-8)
//!   DATA  (3, optional):  data_size u16, init_len u16, init bytes
//!   META  (4, optional):  name u16 + UTF-8, source flag u8 (+ u16 + UTF-8)
//! ```
//!
//! [`verifier`]: crate::verifier

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::format::{DecodeError, Reader, Writer};

/// The container magic header.
pub const MAGIC: &[u8; 4] = b"GOVM";
/// The container format version supported by this crate.
pub const VERSION: u16 = 1;

const SECTION_CODE: u8 = 1;
const SECTION_CONST: u8 = 2;
const SECTION_DATA: u8 = 3;
const SECTION_META: u8 = 4;

const CONST_INT: u8 = 0;
const CONST_STR: u8 = 1;

/// Constant pool identifier (index into [`Program::consts`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstId(pub u16);

/// A constant-pool literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Const {
    /// A word literal.
    Int(i16),
    /// A UTF-8 string literal (consumed by `puts`).
    Str(String),
}

/// Optional program metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Program name.
    pub name: String,
    /// Source path the program was compiled from, when known.
    pub source: Option<String>,
}

/// A decoded, immutable `GOVM` program.
///
/// A `Program` is never mutated after decoding; loading it into a
/// [`VerifiedProgram`] proves its cross-references and makes it executable.
///
/// [`VerifiedProgram`]: crate::verifier::VerifiedProgram
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    /// Entry instruction index.
    pub entry: u32,
    /// Local slots owned by every call frame (including the entry frame).
    pub locals: u16,
    /// Number of encoded instructions in [`Program::code`].
    pub instr_count: u32,
    /// Encoded instruction stream.
    pub code: Vec<u8>,
    /// Constant pool.
    pub consts: Vec<Const>,
    /// Writable data segment size in bytes.
    pub data_size: u16,
    /// Data segment initialization image (at most [`Program::data_size`] bytes).
    pub data_init: Vec<u8>,
    /// Optional metadata.
    pub meta: Option<Metadata>,
}

impl Program {
    /// Returns the constant at `id`, if in range.
    #[must_use]
    pub fn const_at(&self, id: ConstId) -> Option<&Const> {
        self.consts.get(id.0 as usize)
    }

    /// Encodes the program into container bytes.
    ///
    /// `encode` is the exact inverse of [`Program::decode`]: re-loading the
    /// produced bytes yields an equal program.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_bytes(MAGIC);
        w.write_u16_be(VERSION);

        let mut code = Writer::new();
        code.write_u32_be(self.entry);
        code.write_u16_be(self.locals);
        code.write_u32_be(self.instr_count);
        code.write_bytes(&self.code);
        write_section(&mut w, SECTION_CODE, code.as_slice());

        if !self.consts.is_empty() {
            let mut consts = Writer::new();
            consts.write_u16_be(self.consts.len() as u16);
            for c in &self.consts {
                match c {
                    Const::Int(v) => {
                        consts.write_u8(CONST_INT);
                        consts.write_i16_be(*v);
                    }
                    Const::Str(s) => {
                        consts.write_u8(CONST_STR);
                        consts.write_u32_be(s.len() as u32);
                        consts.write_bytes(s.as_bytes());
                    }
                }
            }
            write_section(&mut w, SECTION_CONST, consts.as_slice());
        }

        if self.data_size != 0 || !self.data_init.is_empty() {
            let mut data = Writer::new();
            data.write_u16_be(self.data_size);
            data.write_u16_be(self.data_init.len() as u16);
            data.write_bytes(&self.data_init);
            write_section(&mut w, SECTION_DATA, data.as_slice());
        }

        if let Some(meta) = &self.meta {
            let mut m = Writer::new();
            m.write_u16_be(meta.name.len() as u16);
            m.write_bytes(meta.name.as_bytes());
            match &meta.source {
                Some(source) => {
                    m.write_u8(1);
                    m.write_u16_be(source.len() as u16);
                    m.write_bytes(source.as_bytes());
                }
                None => m.write_u8(0),
            }
            write_section(&mut w, SECTION_META, m.as_slice());
        }

        w.into_vec()
    }

    /// Decodes a program from container bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(bytes);
        if r.read_bytes(4)? != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = r.read_u16_be()?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion { version });
        }

        let mut code: Option<(u32, u16, u32, Vec<u8>)> = None;
        let mut consts: Option<Vec<Const>> = None;
        let mut data: Option<(u16, Vec<u8>)> = None;
        let mut meta: Option<Metadata> = None;

        while !r.is_empty() {
            let tag = r.read_u8()?;
            let len = r.read_u32_be()? as usize;
            let payload = r.read_bytes(len)?;
            let mut s = Reader::new(payload);
            match tag {
                SECTION_CODE => {
                    if code.is_some() {
                        return Err(DecodeError::DuplicateSection { tag });
                    }
                    let entry = s.read_u32_be()?;
                    let locals = s.read_u16_be()?;
                    let instr_count = s.read_u32_be()?;
                    let stream = s.read_bytes(s.remaining())?.to_vec();
                    code = Some((entry, locals, instr_count, stream));
                }
                SECTION_CONST => {
                    if consts.is_some() {
                        return Err(DecodeError::DuplicateSection { tag });
                    }
                    let count = s.read_u16_be()?;
                    let mut pool = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        let ctag = s.read_u8()?;
                        match ctag {
                            CONST_INT => pool.push(Const::Int(s.read_i16_be()?)),
                            CONST_STR => {
                                let len = s.read_u32_be()? as usize;
                                pool.push(Const::Str(s.read_str(len)?.to_string()));
                            }
                            _ => return Err(DecodeError::UnknownConstTag { tag: ctag }),
                        }
                    }
                    if !s.is_empty() {
                        return Err(DecodeError::TrailingBytes);
                    }
                    consts = Some(pool);
                }
                SECTION_DATA => {
                    if data.is_some() {
                        return Err(DecodeError::DuplicateSection { tag });
                    }
                    let data_size = s.read_u16_be()?;
                    let init_len = s.read_u16_be()? as usize;
                    let init = s.read_bytes(init_len)?.to_vec();
                    if !s.is_empty() {
                        return Err(DecodeError::TrailingBytes);
                    }
                    data = Some((data_size, init));
                }
                SECTION_META => {
                    if meta.is_some() {
                        return Err(DecodeError::DuplicateSection { tag });
                    }
                    let name_len = s.read_u16_be()? as usize;
                    let name = s.read_str(name_len)?.to_string();
                    let source = match s.read_u8()? {
                        0 => None,
                        _ => {
                            let len = s.read_u16_be()? as usize;
                            Some(s.read_str(len)?.to_string())
                        }
                    };
                    if !s.is_empty() {
                        return Err(DecodeError::TrailingBytes);
                    }
                    meta = Some(Metadata { name, source });
                }
                _ => return Err(DecodeError::UnknownSectionTag { tag }),
            }
        }

        let (entry, locals, instr_count, stream) = code.ok_or(DecodeError::MissingCodeSection)?;
        let (data_size, data_init) = data.unwrap_or((0, Vec::new()));
        Ok(Self {
            entry,
            locals,
            instr_count,
            code: stream,
            consts: consts.unwrap_or_default(),
            data_size,
            data_init,
            meta,
        })
    }
}

fn write_section(w: &mut Writer, tag: u8, payload: &[u8]) {
    w.write_u8(tag);
    w.write_u32_be(payload.len() as u32);
    w.write_bytes(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;
    use alloc::vec;

    fn sample_program() -> Program {
        Program {
            entry: 0,
            locals: 2,
            instr_count: 2,
            code: vec![Opcode::Nop.byte(), Opcode::Halt.byte()],
            consts: vec![Const::Int(-7), Const::Str("hi\n".to_string())],
            data_size: 16,
            data_init: vec![1, 2, 3],
            meta: Some(Metadata {
                name: "sample".to_string(),
                source: Some("scripts/sample.adl".to_string()),
            }),
        }
    }

    #[test]
    fn container_roundtrip() {
        let p = sample_program();
        let bytes = p.encode();
        assert_eq!(Program::decode(&bytes).unwrap(), p);
    }

    #[test]
    fn minimal_container_roundtrip() {
        let p = Program {
            entry: 0,
            locals: 0,
            instr_count: 1,
            code: vec![Opcode::Halt.byte()],
            consts: vec![],
            data_size: 0,
            data_init: vec![],
            meta: None,
        };
        let bytes = p.encode();
        assert_eq!(Program::decode(&bytes).unwrap(), p);
    }

    #[test]
    fn golden_minimal_container_bytes() {
        // Locks in the container encoding for a minimal program as a
        // regression signal for format changes.
        let p = Program {
            entry: 0,
            locals: 0,
            instr_count: 1,
            code: vec![Opcode::Halt.byte()],
            consts: vec![],
            data_size: 0,
            data_init: vec![],
            meta: None,
        };
        let expected: &[u8] = &[
            b'G', b'O', b'V', b'M', // magic
            0x00, 0x01, // version 1
            0x01, // CODE tag
            0x00, 0x00, 0x00, 0x0B, // section length 11
            0x00, 0x00, 0x00, 0x00, // entry 0
            0x00, 0x00, // locals 0
            0x00, 0x00, 0x00, 0x01, // instr_count 1
            0x01, // halt
        ];
        assert_eq!(p.encode(), expected);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample_program().encode();
        bytes[0] = b'X';
        assert_eq!(Program::decode(&bytes), Err(DecodeError::BadMagic));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = sample_program().encode();
        bytes[5] = 9;
        assert_eq!(
            Program::decode(&bytes),
            Err(DecodeError::UnsupportedVersion { version: 9 })
        );
    }

    #[test]
    fn rejects_truncated_container() {
        let bytes = sample_program().encode();
        for len in [1, 4, 6, 8, bytes.len() - 1] {
            assert!(Program::decode(&bytes[..len]).is_err(), "len {len}");
        }
    }

    #[test]
    fn rejects_unknown_section() {
        let mut bytes = sample_program().encode();
        bytes.push(0x7F);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(
            Program::decode(&bytes),
            Err(DecodeError::UnknownSectionTag { tag: 0x7F })
        );
    }

    #[test]
    fn rejects_duplicate_code_section() {
        let p = Program {
            entry: 0,
            locals: 0,
            instr_count: 1,
            code: vec![Opcode::Halt.byte()],
            consts: vec![],
            data_size: 0,
            data_init: vec![],
            meta: None,
        };
        let mut bytes = p.encode();
        let section = bytes[6..].to_vec();
        bytes.extend_from_slice(&section);
        assert_eq!(
            Program::decode(&bytes),
            Err(DecodeError::DuplicateSection { tag: 1 })
        );
    }

    #[test]
    fn rejects_missing_code_section() {
        let mut w = crate::format::Writer::new();
        w.write_bytes(MAGIC);
        w.write_u16_be(VERSION);
        assert_eq!(
            Program::decode(w.as_slice()),
            Err(DecodeError::MissingCodeSection)
        );
    }
}
