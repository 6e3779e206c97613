// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `govm_core`: the GoVM bytecode container, load-time verifier, and
//! execution engine.
//!
//! Programs are 16-bit-word stack machines packaged in the `GOVM` container
//! format. Loading decodes and verifies a program once; execution runs over
//! the decoded instruction stream against an embedder-supplied
//! [`host::HostIo`] bridge, so the same engine works in a console runner, a
//! native extension, or a network service.
//!
//! ## Example
//!
//! ```
//! use govm_core::asm::{Asm, ProgramBuilder};
//! use govm_core::host::{CallbackHost, Input};
//! use govm_core::vm::{Engine, Status};
//!
//! let mut pb = ProgramBuilder::new();
//! let greeting = pb.str_const("hello, govm\n");
//! let mut a = Asm::new();
//! a.write_str(greeting).halt();
//! let program = pb.build_verified(a)?;
//!
//! let mut output = Vec::new();
//! {
//!     let host = CallbackHost::new(|| Input::Eof, |b| output.push(b));
//!     let mut engine = Engine::new(&program, host);
//!     assert_eq!(engine.run().unwrap(), Status::Halted);
//! }
//! assert_eq!(output, b"hello, govm\n");
//! # Ok::<(), govm_core::asm::BuildError>(())
//! ```

#![no_std]

extern crate alloc;

pub mod asm;
pub mod disasm;
pub mod format;
pub mod host;
pub mod loader;
pub mod opcode;
pub mod program;
pub mod trace;
pub mod verifier;
pub mod vm;
