// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compilation service wire protocol.
//!
//! All integers are big-endian 4-byte signed. The exchange, in order:
//!
//! 1. server → client: the 4-byte ASCII tag `GoVM`
//! 2. client → server: source length, then the raw source bytes
//! 3. server → client: status (`1` = accepted)
//! 4. server → client: code (`2` = a bytecode frame follows)
//! 5. server → client: bytecode frame, when present
//! 6. server → client: diagnostics frame (always)
//!
//! Reads loop until the declared byte count arrives; a short read is not an
//! error, but a closed connection with bytes outstanding is.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use crate::diagnostics::Diagnostics;

/// The handshake tag sent by the service on connect.
pub const WIRE_MAGIC: &[u8; 4] = b"GoVM";

/// The service's default TCP port.
pub const DEFAULT_PORT: u16 = 2318;

/// Upper bound on a declared frame length; larger frames are treated as
/// protocol corruption rather than allocated.
const MAX_FRAME_LEN: i32 = 16 * 1024 * 1024;

/// A protocol failure.
///
/// Every variant is fatal to its connection; the client never retries.
#[derive(Debug)]
pub enum ProtocolError {
    /// The handshake tag did not match [`WIRE_MAGIC`].
    BadHeader,
    /// The service answered a status other than "accepted".
    UnexpectedResult(i32),
    /// The connection closed with declared bytes still outstanding.
    ConnectionClosedEarly,
    /// A declared frame length was negative or implausibly large.
    InvalidFrameLength(i32),
    /// The source is too large to frame in a 4-byte signed length.
    SourceTooLarge {
        /// The unframeable source length.
        len: usize,
    },
    /// An underlying socket error.
    Io(io::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadHeader => write!(f, "bad header"),
            Self::UnexpectedResult(status) => write!(f, "unexpected result ({status})"),
            Self::ConnectionClosedEarly => write!(f, "connection closed early"),
            Self::InvalidFrameLength(len) => write!(f, "invalid frame length {len}"),
            Self::SourceTooLarge { len } => write!(f, "source too large ({len} bytes)"),
            Self::Io(e) => write!(f, "socket error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// The result of a successful protocol exchange.
///
/// Diagnostics are data, not errors: a compilation with bytecode and empty
/// diagnostics is the success case, and a rejected compilation still returns
/// `Ok` with `bytecode: None` and the service's messages.
#[derive(Debug)]
pub struct CompileOutcome {
    /// The compiled bytecode, when the service produced any.
    pub bytecode: Option<Vec<u8>>,
    /// The service's diagnostic messages, in emission order.
    pub diagnostics: Diagnostics,
}

/// Compiles `source` against the service at `host:port`.
///
/// Opens one connection, performs exactly one exchange, and closes the
/// connection when it returns (success or error).
pub fn compile(source: &[u8], host: &str, port: u16) -> Result<CompileOutcome, ProtocolError> {
    let mut stream = TcpStream::connect((host, port))?;
    log::debug!("connected to {host}:{port}, submitting {} bytes", source.len());
    let outcome = compile_with(&mut stream, source);
    if let Ok(outcome) = &outcome {
        log::debug!(
            "service answered: bytecode {}, {} diagnostic bytes",
            match &outcome.bytecode {
                Some(b) => format!("{} bytes", b.len()),
                None => "absent".to_string(),
            },
            outcome.diagnostics.as_str().len()
        );
    }
    outcome
}

/// Runs the protocol over an already connected stream.
pub fn compile_with<S: Read + Write>(
    stream: &mut S,
    source: &[u8],
) -> Result<CompileOutcome, ProtocolError> {
    let mut magic = [0u8; 4];
    read_full(stream, &mut magic)?;
    if &magic != WIRE_MAGIC {
        return Err(ProtocolError::BadHeader);
    }

    let len = i32::try_from(source.len())
        .map_err(|_| ProtocolError::SourceTooLarge { len: source.len() })?;
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(source)?;
    stream.flush()?;

    let status = read_i32(stream)?;
    if status != 1 {
        return Err(ProtocolError::UnexpectedResult(status));
    }

    let code = read_i32(stream)?;
    let bytecode = if code == 2 {
        Some(read_frame(stream)?)
    } else {
        None
    };

    // The diagnostics frame is always sent, bytecode or not.
    let diagnostics = read_frame(stream)?;
    Ok(CompileOutcome {
        bytecode,
        diagnostics: Diagnostics::new(String::from_utf8_lossy(&diagnostics).into_owned()),
    })
}

/// Reads until `buf` is full, accumulating partial reads.
fn read_full<S: Read>(stream: &mut S, buf: &mut [u8]) -> Result<(), ProtocolError> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Err(ProtocolError::ConnectionClosedEarly),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }
    Ok(())
}

fn read_i32<S: Read>(stream: &mut S) -> Result<i32, ProtocolError> {
    let mut buf = [0u8; 4];
    read_full(stream, &mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_frame<S: Read>(stream: &mut S) -> Result<Vec<u8>, ProtocolError> {
    let len = read_i32(stream)?;
    if !(0..=MAX_FRAME_LEN).contains(&len) {
        return Err(ProtocolError::InvalidFrameLength(len));
    }
    let mut buf = vec![0u8; len as usize];
    read_full(stream, &mut buf)?;
    Ok(buf)
}
