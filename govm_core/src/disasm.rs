// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Textual disassembly of verified programs.

use alloc::string::String;
use core::fmt::Write as _;

use crate::program::Const;
use crate::verifier::{Instr, VerifiedProgram};

/// Renders a one-instruction-per-line listing of `program`.
///
/// Branch targets are shown as instruction indices; constant operands are
/// resolved inline.
#[must_use]
pub fn disassemble(program: &VerifiedProgram) -> String {
    let p = program.program();
    let mut out = String::new();

    if let Some(meta) = &p.meta {
        match &meta.source {
            Some(source) => {
                let _ = writeln!(out, "; program {} (source {})", meta.name, source);
            }
            None => {
                let _ = writeln!(out, "; program {}", meta.name);
            }
        }
    }
    let _ = writeln!(
        out,
        "; entry {}, locals {}, data {}+{}",
        p.entry,
        p.locals,
        p.data_size,
        p.data_init.len()
    );

    for (ix, instr) in program.instrs().iter().enumerate() {
        let mnemonic = instr.opcode().mnemonic();
        let mut operand = String::new();
        match *instr {
            Instr::Lit { imm } => {
                let _ = write!(operand, "{imm}");
            }
            Instr::Push { idx } | Instr::WriteStr { idx } => {
                let _ = write!(operand, "#{}", idx.0);
                match p.const_at(idx) {
                    Some(Const::Int(v)) => {
                        let _ = write!(operand, "  ; {v}");
                    }
                    Some(Const::Str(s)) => {
                        let _ = write!(operand, "  ; {s:?}");
                    }
                    None => {}
                }
            }
            Instr::LoadLocal { slot } | Instr::StoreLocal { slot } => {
                let _ = write!(operand, "{slot}");
            }
            Instr::Jump { target } | Instr::JumpIfZero { target } | Instr::Call { target } => {
                let _ = write!(operand, "-> {target:04}");
            }
            _ => {}
        }
        if operand.is_empty() {
            let _ = writeln!(out, "{ix:04}  {mnemonic}");
        } else {
            let _ = writeln!(out, "{ix:04}  {mnemonic:<6} {operand}");
        }
    }

    if !p.consts.is_empty() {
        let _ = writeln!(out, "; consts:");
        for (ix, c) in p.consts.iter().enumerate() {
            match c {
                Const::Int(v) => {
                    let _ = writeln!(out, ";   #{ix}: int {v}");
                }
                Const::Str(s) => {
                    let _ = writeln!(out, ";   #{ix}: str {s:?}");
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{Asm, ProgramBuilder};

    #[test]
    fn listing_shows_operands_and_targets() {
        let mut pb = ProgramBuilder::new();
        pb.set_locals(1).metadata("demo", None);
        let k = pb.int_const(42);
        let s = pb.str_const("hi\n");
        let mut a = Asm::new();
        let out = a.label();
        a.push(k).store_local(0).write_str(s).lit(0).jump_if_zero(out);
        a.place(out).unwrap();
        a.halt();
        let vp = pb.build_verified(a).unwrap();

        let listing = disassemble(&vp);
        assert!(listing.contains("; program demo"));
        assert!(listing.contains("; entry 0, locals 1, data 0+0"));
        assert!(listing.contains("0000  push   #0  ; 42"));
        assert!(listing.contains("stloc  0"));
        assert!(listing.contains("puts   #1  ; \"hi\\n\""));
        assert!(listing.contains("jz     -> 0005"));
        assert!(listing.contains("0005  halt"));
        assert!(listing.contains("; consts:"));
        assert!(listing.contains(";   #0: int 42"));
        assert!(listing.contains(";   #1: str \"hi\\n\""));
    }
}
