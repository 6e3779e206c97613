// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-call bytecode loading: container decode + verification.

use core::fmt;

use crate::format::DecodeError;
use crate::program::Program;
use crate::verifier::{self, VerifiedProgram, VerifyError};

/// A bytecode load error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadError {
    /// The container failed to decode.
    Decode(DecodeError),
    /// The decoded program failed verification.
    Verify(VerifyError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "container decode failed: {e}"),
            Self::Verify(e) => write!(f, "verification failed: {e}"),
        }
    }
}

impl core::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Verify(e) => Some(e),
        }
    }
}

impl From<DecodeError> for LoadError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<VerifyError> for LoadError {
    fn from(e: VerifyError) -> Self {
        Self::Verify(e)
    }
}

/// Decodes and verifies a `GOVM` bytecode blob.
pub fn load(bytes: &[u8]) -> Result<VerifiedProgram, LoadError> {
    let program = Program::decode(bytes)?;
    Ok(verifier::verify(program)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;
    use alloc::vec;

    #[test]
    fn loads_a_minimal_blob() {
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
        let vp = load(&p.encode()).unwrap();
        assert_eq!(vp.instrs().len(), 1);
    }

    #[test]
    fn decode_failures_surface_as_load_errors() {
        assert_eq!(
            load(b"nope"),
            Err(LoadError::Decode(DecodeError::BadMagic))
        );
    }

    #[test]
    fn verify_failures_surface_as_load_errors() {
        let p = Program {
            entry: 0,
            locals: 0,
            instr_count: 1,
            code: vec![Opcode::Jump.byte(), 0, 0, 0, 9],
            consts: vec![],
            data_size: 0,
            data_init: vec![],
            meta: None,
        };
        assert!(matches!(
            load(&p.encode()),
            Err(LoadError::Verify(VerifyError::TargetOutOfRange { .. }))
        ));
    }
}
