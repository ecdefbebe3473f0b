#![forbid(unsafe_code)]

use std::ops::Range;

use crate::error::ErrorKind;

/// Where the buffer's contents ended when the mark was taken. Not `Copy`:
/// each mark is handed back to [`ScratchBuf::release`] exactly once, and
/// nested marks must be released in reverse order.
#[derive(Debug)]
#[must_use]
pub struct ScratchMark(usize);

/// The shared buffer that holds expanded argument text. It only ever grows;
/// releasing a mark truncates the contents but keeps the capacity.
#[derive(Debug)]
pub struct ScratchBuf {
    buf: String,
    max_mem: usize,
}

impl ScratchBuf {
    pub fn new(max_mem: usize) -> Self {
        Self {
            buf: String::new(),
            max_mem,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn mark(&self) -> ScratchMark {
        ScratchMark(self.buf.len())
    }

    pub fn release(&mut self, mark: ScratchMark) {
        debug_assert!(mark.0 <= self.buf.len(), "scratch marks released out of order");
        self.buf.truncate(mark.0);
    }

    /// Makes room for `additional` more bytes, growing to the next power of
    /// two (capped at the ceiling).
    pub fn reserve(&mut self, additional: usize) -> Result<(), ErrorKind> {
        let needed = self.buf.len().saturating_add(additional);
        if needed <= self.buf.capacity() {
            return Ok(());
        }
        if needed > self.max_mem {
            return Err(ErrorKind::OutOfMemory {
                needed,
                limit: self.max_mem,
            });
        }
        let target = needed.checked_next_power_of_two().unwrap_or(needed).min(self.max_mem);
        self.buf.reserve_exact(target - self.buf.len());
        tracing::debug!(capacity = self.buf.capacity(), "scratch buffer grown");
        Ok(())
    }

    pub fn push_str(&mut self, s: &str) -> Range<usize> {
        let start = self.buf.len();
        self.buf.push_str(s);
        start..self.buf.len()
    }

    pub(crate) fn buf_mut(&mut self) -> &mut String {
        &mut self.buf
    }

    pub fn get(&self, range: Range<usize>) -> &str {
        self.buf.get(range).unwrap_or("")
    }
}
