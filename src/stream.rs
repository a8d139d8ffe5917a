//! Stream adapter over the scan engine.
//!
//! [`Tokenizer`] wraps a [`Scanner`] with stream-style plumbing: drain and
//! end callbacks, and a `std::io::Write` implementation so a reader can be
//! piped straight into the engine with `io::copy`. All scanner operations
//! are reachable through `Deref`.

use std::io;
use std::ops::{Deref, DerefMut};

use crate::config::ScannerConfig;
use crate::error::Result;
use crate::rule::Token;
use crate::scanner::Scanner;

/// Stream-facing tokenizer.
///
/// `write` returns `false` once the engine pauses; the caller should stop
/// writing until the drain callback fires (on the `resume` that clears the
/// backpressure).
pub struct Tokenizer {
    scanner: Scanner,
    on_drain: Option<Box<dyn FnMut()>>,
    on_end: Option<Box<dyn FnMut()>>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Scanner> for Tokenizer {
    fn from(scanner: Scanner) -> Self {
        Self {
            scanner,
            on_drain: None,
            on_end: None,
        }
    }
}

impl Deref for Tokenizer {
    type Target = Scanner;

    fn deref(&self) -> &Scanner {
        &self.scanner
    }
}

impl DerefMut for Tokenizer {
    fn deref_mut(&mut self) -> &mut Scanner {
        &mut self.scanner
    }
}

impl Tokenizer {
    /// Tokenizer over a default-configured engine.
    pub fn new() -> Self {
        Scanner::new().into()
    }

    /// Tokenizer over an engine with the given configuration.
    pub fn with_config(config: ScannerConfig) -> Self {
        Scanner::with_config(config).into()
    }

    /// Callback fired when a `resume` clears pending backpressure.
    pub fn on_drain<F>(&mut self, f: F)
    where
        F: FnMut() + 'static,
    {
        self.on_drain = Some(Box::new(f));
    }

    /// Callback fired after the stream ends.
    pub fn on_end<F>(&mut self, f: F)
    where
        F: FnMut() + 'static,
    {
        self.on_end = Some(Box::new(f));
    }

    /// Append a chunk. `false` means the engine paused and the caller
    /// should wait for the drain callback.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> Result<bool> {
        self.scanner.write(data)
    }

    /// End the stream, running a final pass.
    pub fn end(&mut self) -> Result<()> {
        self.scanner.end()?;
        if let Some(f) = &mut self.on_end {
            f();
        }
        Ok(())
    }

    /// End the stream with a final chunk.
    pub fn end_with(&mut self, data: impl AsRef<[u8]>) -> Result<()> {
        self.scanner.end_with(data)?;
        if let Some(f) = &mut self.on_end {
            f();
        }
        Ok(())
    }

    /// Resume a paused engine. Fires the drain callback when a blocked
    /// write was waiting and the engine came back unpaused.
    pub fn resume(&mut self) -> Result<bool> {
        let was_waiting = self.scanner.needs_drain();
        let resumed = self.scanner.resume()?;
        if was_waiting && resumed {
            if let Some(f) = &mut self.on_drain {
                f();
            }
        }
        Ok(resumed)
    }

    /// Run a pass, then discard and return the unconsumed tail.
    pub fn flush(&mut self) -> Result<Vec<u8>> {
        self.scanner.flush()
    }

    /// Terminal teardown without a final pass. No end callback.
    pub fn destroy(&mut self) {
        self.scanner.destroy();
    }

    /// Give the wrapped engine back.
    pub fn into_inner(self) -> Scanner {
        self.scanner
    }

    /// Forwarded for discoverability next to the other callbacks.
    pub fn on_token<F>(&mut self, f: F)
    where
        F: FnMut(&mut Scanner, &Token) + 'static,
    {
        self.scanner.on_token(f);
    }
}

impl io::Write for Tokenizer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // a paused engine still buffers the bytes, so the write succeeded
        Tokenizer::write(self, buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // every write already ran a scan pass
        Ok(())
    }
}
