// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integration conformance suite for the GoVM workspace.
//!
//! The crate itself is empty; the suites live in `tests/`:
//! - `conformance`: assemble → encode → load → execute pipelines
//! - `protocol`: the compilation client against real loopback TCP servers
