use std::io::Write;

use crate::api::error::{SnapshotError, SnapshotResult};

use super::FRAME_HEADER_BYTES;

/// Output accumulates in memory and is handed to the descriptor once
/// the buffer crosses this mark, keeping the steady-state footprint
/// bounded while avoiding a syscall per frame.
pub(crate) const BUFFER_HIGH_WATER: usize = 1 << 20;

/// Buffered writer for the length-prefixed frame layer.
///
/// The descriptor is owned by the caller; the writer never closes it.
/// OS-level write failures surface as `SystemWriteError`.
pub struct FrameWriter<W: Write> {
    out: W,
    buf: Vec<u8>,
    written: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            buf: Vec::new(),
            written: 0,
        }
    }

    /// Appends one `u64_be length || payload` frame, flushing if the
    /// buffer has grown past the high-water mark.
    pub fn write_frame(&mut self, payload: &[u8]) -> SnapshotResult<()> {
        self.buf
            .extend_from_slice(&(payload.len() as u64).to_be_bytes());
        self.buf.extend_from_slice(payload);
        self.written += (FRAME_HEADER_BYTES + payload.len()) as u64;
        if self.buf.len() > BUFFER_HIGH_WATER {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> SnapshotResult<()> {
        if !self.buf.is_empty() {
            self.out
                .write_all(&self.buf)
                .map_err(SnapshotError::write)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Final flush at stream end, pushing buffered bytes down through
    /// the descriptor's own buffering as well.
    pub fn finish(&mut self) -> SnapshotResult<()> {
        self.flush()?;
        self.out.flush().map_err(SnapshotError::write)
    }

    /// Running total of frame bytes produced, for progress reporting.
    /// Counts buffered bytes as written.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}
