//! Newline-delimited line framing
//!
//! Bytes are fed one at a time. A line ends at `\n`; a trailing `\r` is
//! stripped. A line longer than the buffer is dropped up to the next `\n`
//! and reported once as [`LineError::Overflow`].

use heapless::{String, Vec};

/// Maximum line length in bytes (excluding the terminator)
pub const MAX_LINE_LEN: usize = 128;

/// Errors reported while framing lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Line exceeded the buffer and was dropped
    Overflow,
    /// Line was not valid UTF-8
    InvalidUtf8,
}

/// Incremental line parser
#[derive(Debug, Clone)]
pub struct LineParser<const N: usize = MAX_LINE_LEN> {
    buffer: Vec<u8, N>,
    discarding: bool,
}

impl<const N: usize> Default for LineParser<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LineParser<N> {
    /// Create an empty parser
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    /// Bytes received since the last terminator
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Feed a single byte
    ///
    /// Returns `Ok(Some(line))` when a terminator completes a line,
    /// `Ok(None)` when more bytes are needed.
    pub fn feed(&mut self, byte: u8) -> Result<Option<String<N>>, LineError> {
        if byte == b'\n' {
            if self.discarding {
                self.discarding = false;
                return Ok(None);
            }
            return self.finish().map(Some);
        }

        if self.discarding {
            return Ok(None);
        }

        if self.buffer.push(byte).is_err() {
            self.buffer.clear();
            self.discarding = true;
            return Err(LineError::Overflow);
        }
        Ok(None)
    }

    fn finish(&mut self) -> Result<String<N>, LineError> {
        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }
        let bytes = core::mem::take(&mut self.buffer);
        String::from_utf8(bytes).map_err(|_| LineError::InvalidUtf8)
    }
}
