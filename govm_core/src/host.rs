// Copyright 2026 the GoVM Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The host I/O bridge.
//!
//! The engine delegates character I/O to an embedder-provided [`HostIo`]
//! instance. Each engine owns its own bridge; there is no process-wide I/O
//! state, so independent engines can run concurrently against different
//! hosts.

/// The result of a [`HostIo::read_char`] call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// One input byte.
    Byte(u8),
    /// No more input will ever arrive. An explicit sentinel, not an error:
    /// the engine pushes its documented end-of-stream value and continues.
    Eof,
    /// No input available right now; the engine suspends until a later
    /// `run()` call finds input.
    Pending,
}

/// Character I/O capabilities supplied by the embedding host.
///
/// `read_char` is called synchronously per input instruction and
/// `write_char` once per output byte, in exact execution order. Hosts that
/// need timeouts or cancellation implement them here: returning
/// [`Input::Eof`] forces a suspended program to make progress.
pub trait HostIo {
    /// Produces the next input byte, end-of-stream, or "not yet".
    fn read_char(&mut self) -> Input;

    /// Consumes one output byte.
    fn write_char(&mut self, byte: u8);
}

impl<T: HostIo + ?Sized> HostIo for &mut T {
    fn read_char(&mut self) -> Input {
        (**self).read_char()
    }

    fn write_char(&mut self, byte: u8) {
        (**self).write_char(byte);
    }
}

/// Adapts a pair of closures into a [`HostIo`] bridge.
///
/// This is the construction-time capability pair of the embedding contract:
/// the host hands the engine one callback for input and one for output.
#[derive(Debug)]
pub struct CallbackHost<R, W> {
    read: R,
    write: W,
}

impl<R, W> CallbackHost<R, W>
where
    R: FnMut() -> Input,
    W: FnMut(u8),
{
    /// Creates a bridge from `read` and `write` callbacks.
    pub fn new(read: R, write: W) -> Self {
        Self { read, write }
    }
}

impl<R, W> HostIo for CallbackHost<R, W>
where
    R: FnMut() -> Input,
    W: FnMut(u8),
{
    fn read_char(&mut self) -> Input {
        (self.read)()
    }

    fn write_char(&mut self, byte: u8) {
        (self.write)(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn callback_host_forwards_both_directions() {
        let mut written = Vec::new();
        {
            let mut chars = [Input::Byte(b'a'), Input::Eof].into_iter();
            let mut host = CallbackHost::new(
                move || chars.next().unwrap_or(Input::Eof),
                |b| written.push(b),
            );
            assert_eq!(host.read_char(), Input::Byte(b'a'));
            assert_eq!(host.read_char(), Input::Eof);
            host.write_char(b'x');
        }
        assert_eq!(written, [b'x']);
    }
}
