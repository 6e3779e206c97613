// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disassembler example.
//!
//! Run with:
//! `cargo run -p govm_core --example disasm`

use govm_core::asm::{Asm, ProgramBuilder};
use govm_core::disasm::disassemble;

fn main() {
    let mut pb = ProgramBuilder::new();
    pb.set_locals(1).metadata("disasm_demo", None);
    let greeting = pb.str_const("hello\n");
    let ten = pb.int_const(10);

    // Print the greeting ten times.
    let mut a = Asm::new();
    let top = a.label();
    let done = a.label();
    a.lit(0).store_local(0);
    a.place(top).unwrap();
    a.write_str(greeting);
    a.load_local(0).lit(1).add().dup().store_local(0);
    a.push(ten).lt().jump_if_zero(done);
    a.jump(top);
    a.place(done).unwrap();
    a.halt();

    let program = pb.build_verified(a).unwrap();
    println!("{}", disassemble(&program));
}
