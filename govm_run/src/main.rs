// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Standalone console runner.
//!
//! Loads a `.govm` container and runs it with stdin/stdout as the host I/O
//! bridge. Exit status: 0 on halt, 1 on a runtime fault, 2 on load or usage
//! errors.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;

use govm_core::disasm;
use govm_core::host::{HostIo, Input};
use govm_core::loader;
use govm_core::opcode::Opcode;
use govm_core::program::Program;
use govm_core::trace::{TraceMask, TraceOutcome, TraceSink};
use govm_core::vm::{Engine, Limits, RunOptions, Status};

#[derive(Parser, Debug)]
#[command(name = "govm-run", about = "Run a GoVM bytecode program on the console")]
struct Args {
    /// The `.govm` bytecode file to run.
    file: PathBuf,

    /// Preset input buffer, drained by `getc` before stdin.
    #[arg(long, default_value = "")]
    gets: String,

    /// Read-only bytes appended to data memory past the writable segment.
    #[arg(long, default_value = "")]
    data: String,

    /// Instruction budget.
    #[arg(long, default_value_t = 1 << 20)]
    fuel: u64,

    /// Stream instruction and I/O events to stderr.
    #[arg(long)]
    trace: bool,

    /// Print the disassembly listing instead of running.
    #[arg(long)]
    disasm: bool,
}

/// Line-buffered console bridge: byte reads from stdin, flushed writes to
/// stdout. Console errors end the input stream rather than faulting the
/// program.
struct ConsoleHost {
    stdin: io::StdinLock<'static>,
    stdout: io::StdoutLock<'static>,
}

impl ConsoleHost {
    fn new() -> Self {
        Self {
            stdin: io::stdin().lock(),
            stdout: io::stdout().lock(),
        }
    }
}

impl HostIo for ConsoleHost {
    fn read_char(&mut self) -> Input {
        let mut buf = [0u8; 1];
        loop {
            match self.stdin.read(&mut buf) {
                Ok(0) => return Input::Eof,
                Ok(_) => return Input::Byte(buf[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => return Input::Eof,
            }
        }
    }

    fn write_char(&mut self, byte: u8) {
        // A closed output pipe is not the program's problem.
        let _ = self
            .stdout
            .write_all(&[byte])
            .and_then(|()| self.stdout.flush());
    }
}

struct StderrTrace;

impl TraceSink for StderrTrace {
    fn run_start(&mut self, program: &Program) {
        eprintln!("trace: run start ({} instructions)", program.instr_count);
    }

    fn instr(&mut self, pc: u32, opcode: Opcode) {
        eprintln!("trace: {pc:04}  {}", opcode.mnemonic());
    }

    fn io_read(&mut self, pc: u32, input: Input) {
        eprintln!("trace: {pc:04}  read {input:?}");
    }

    fn io_write(&mut self, pc: u32, byte: u8) {
        eprintln!("trace: {pc:04}  write 0x{byte:02X}");
    }

    fn run_end(&mut self, _program: &Program, outcome: TraceOutcome<'_>) {
        match outcome {
            TraceOutcome::Halted => eprintln!("trace: run end (halted)"),
            TraceOutcome::Fault(info) => eprintln!("trace: run end ({info})"),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("govm: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let bytes =
        fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let program = loader::load(&bytes)
        .with_context(|| format!("loading {}", args.file.display()))?;
    log::debug!(
        "loaded {} ({} instructions)",
        args.file.display(),
        program.instrs().len()
    );

    if args.disasm {
        print!("{}", disasm::disassemble(&program));
        return Ok(ExitCode::SUCCESS);
    }

    let options = RunOptions {
        preset_input: args.gets.clone().into_bytes(),
        extra_data: args.data.clone().into_bytes(),
    };
    let limits = Limits {
        fuel: args.fuel,
        ..Limits::default()
    };
    let mut engine = Engine::with_options(&program, ConsoleHost::new(), limits, options);

    let status = if args.trace {
        let mut trace = StderrTrace;
        engine.run_traced(
            TraceMask::RUN | TraceMask::INSTR | TraceMask::IO,
            Some(&mut trace),
        )
    } else {
        engine.run()
    };

    match status {
        Ok(Status::Halted) => Ok(ExitCode::SUCCESS),
        // The console bridge blocks instead of returning pending input.
        Ok(Status::Suspended) => bail!("engine suspended on console input"),
        Err(fault) => {
            eprintln!("govm: {fault}");
            Ok(ExitCode::from(1))
        }
    }
}
