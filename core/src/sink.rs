// core/src/sink.rs
//
// Output sink for generated rules. The generator only sees the trait;
// the CLI hands it a BufferedSink over stdout, tests hand it a
// Vec<String>.

use std::io::{self, Write};

/// Default in-memory buffer size before a forced write-through (~10 MB).
pub const DEFAULT_BUFFER_SIZE: usize = 10_240_000;

/// Periodic flush cadence, in written rules.
const FLUSH_EVERY: u64 = 1000;

/// Where generated rules go, one record per call.
pub trait RuleSink {
    /// Append one rule (raw bytes, no terminator).
    fn write_rule(&mut self, rule: &[u8]) -> io::Result<()>;

    /// Force buffered records out to the underlying writer.
    fn flush(&mut self) -> io::Result<()>;

    /// Rules written so far.
    fn rules_written(&self) -> u64;
}

/// Bulk-buffered sink: records are newline-terminated and collected into a
/// large owned buffer, written through when the buffer fills, on every
/// 1000th rule, and on an explicit flush.
pub struct BufferedSink<W: Write> {
    out: W,
    buf: Vec<u8>,
    capacity: usize,
    written: u64,
}

impl<W: Write> BufferedSink<W> {
    pub fn new(out: W) -> Self {
        Self::with_capacity(out, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(out: W, capacity: usize) -> Self {
        Self {
            out,
            buf: Vec::with_capacity(capacity.min(DEFAULT_BUFFER_SIZE)),
            capacity,
            written: 0,
        }
    }

    /// Flush what remains and hand back the writer.
    pub fn finish(mut self) -> io::Result<W> {
        RuleSink::flush(&mut self)?;
        Ok(self.out)
    }
}

impl<W: Write> RuleSink for BufferedSink<W> {
    fn write_rule(&mut self, rule: &[u8]) -> io::Result<()> {
        if self.buf.len() + rule.len() + 1 >= self.capacity {
            self.flush()?;
        }
        self.buf.extend_from_slice(rule);
        self.buf.push(b'\n');
        self.written += 1;
        if self.written % FLUSH_EVERY == 0 {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.out.write_all(&self.buf)?;
            self.buf.clear();
            self.out.flush()?;
        }
        Ok(())
    }

    fn rules_written(&self) -> u64 {
        self.written
    }
}

/// Collecting sink for tests and embedders.
impl RuleSink for Vec<String> {
    fn write_rule(&mut self, rule: &[u8]) -> io::Result<()> {
        self.push(String::from_utf8_lossy(rule).into_owned());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn rules_written(&self) -> u64 {
        self.len() as u64
    }
}
