// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batch compiler driver.
//!
//! Scans a directory for source files, submits each to the compilation
//! service, and writes a bytecode file plus a diagnostics log per input.
//! Individual failures are reported on the console and do not stop the
//! remaining files; only this layer keeps going past lower-layer errors.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "govm-batch", about = "Compile a directory of sources via the GoVM service")]
struct Args {
    /// Compilation service host.
    #[arg(long)]
    host: String,

    /// Compilation service port.
    #[arg(long, default_value_t = govm_client::DEFAULT_PORT)]
    port: u16,

    /// Directory scanned for source files.
    #[arg(long, default_value = "scripts")]
    source_dir: PathBuf,

    /// Directory receiving `.govm` bytecode and `.log` diagnostics files.
    #[arg(long, default_value = "bytecode")]
    out_dir: PathBuf,

    /// Source file extension to match.
    #[arg(long, default_value = "adl")]
    ext: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let sources = discover(&args.source_dir, &args.ext)?;
    if sources.is_empty() {
        log::warn!(
            "no .{} files under {}",
            args.ext,
            args.source_dir.display()
        );
        return Ok(ExitCode::SUCCESS);
    }
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let mut failures = 0usize;
    for src in &sources {
        let (bytecode_path, log_path) = output_paths(&args.out_dir, src);
        log::info!("compiling {}", src.display());
        match compile_one(args, src, &bytecode_path, &log_path) {
            Ok(true) => {}
            Ok(false) => {
                failures += 1;
                eprintln!(
                    "{}: rejected by the service (see {})",
                    src.display(),
                    log_path.display()
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {e:#}", src.display());
            }
        }
    }

    log::info!(
        "compiled {}/{} files",
        sources.len() - failures,
        sources.len()
    );
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Compiles one file. Returns `Ok(true)` when the service produced bytecode.
/// The diagnostics log is written in every outcome that reaches the service.
fn compile_one(
    args: &Args,
    src: &Path,
    bytecode_path: &Path,
    log_path: &Path,
) -> Result<bool> {
    let source = fs::read(src).with_context(|| format!("reading {}", src.display()))?;
    let outcome = govm_client::compile(&source, &args.host, args.port)
        .with_context(|| format!("compiling against {}:{}", args.host, args.port))?;

    fs::write(log_path, outcome.diagnostics.as_str())
        .with_context(|| format!("writing {}", log_path.display()))?;
    for line in outcome.diagnostics.lines() {
        log::debug!("{}: {line}", src.display());
    }

    match outcome.bytecode {
        Some(bytecode) => {
            fs::write(bytecode_path, bytecode)
                .with_context(|| format!("writing {}", bytecode_path.display()))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Lists `dir`'s files with extension `ext`, sorted for stable output.
fn discover(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("scanning {}", dir.display()))?;
    let mut sources = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Derives the paired `.govm` and `.log` paths for `src` under `out_dir`.
fn output_paths(out_dir: &Path, src: &Path) -> (PathBuf, PathBuf) {
    let stem = src.file_stem().unwrap_or(src.as_os_str());
    let base = out_dir.join(stem);
    (base.with_extension("govm"), base.with_extension("log"))
}

#[cfg(test)]
mod tests {
    use super::output_paths;
    use std::path::Path;

    #[test]
    fn output_paths_pair_bytecode_and_log() {
        let (bc, log) = output_paths(Path::new("bytecode"), Path::new("scripts/demo.adl"));
        assert_eq!(bc, Path::new("bytecode/demo.govm"));
        assert_eq!(log, Path::new("bytecode/demo.log"));
    }

    #[test]
    fn output_paths_handle_extensionless_sources() {
        let (bc, log) = output_paths(Path::new("out"), Path::new("scripts/plain"));
        assert_eq!(bc, Path::new("out/plain.govm"));
        assert_eq!(log, Path::new("out/plain.log"));
    }
}
