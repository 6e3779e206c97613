// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `govm_client`: TCP client for the GoVM remote compilation service.
//!
//! The service speaks a length-prefixed request/response protocol: one
//! connection per compilation, one request, one response. [`compile`] opens
//! the connection; [`compile_with`] runs the protocol over any
//! `Read + Write` stream, which is how the test suites drive it against mock
//! servers.

pub mod diagnostics;
pub mod proto;

pub use diagnostics::Diagnostics;
pub use proto::{CompileOutcome, DEFAULT_PORT, ProtocolError, WIRE_MAGIC, compile, compile_with};
