use std::io::{ErrorKind, Read};

use crate::api::error::{SnapshotError, SnapshotResult};

use super::FRAME_HEADER_BYTES;

/// The buffer refills from the descriptor in chunks of at least this
/// size, independent of how small the next frame is.
pub(crate) const REFILL_CHUNK: usize = 1 << 20;

/// A frame longer than this cannot come from a well-formed snapshot;
/// the cap keeps a corrupted length prefix from driving a giant
/// allocation before the payload read fails.
const MAX_FRAME_BYTES: u64 = 1 << 30;

/// Buffered reader for the length-prefixed frame layer.
///
/// Consumed bytes are shifted out of the buffer before each refill, so
/// the steady-state footprint is one refill chunk plus the largest
/// frame. The descriptor is owned by the caller.
pub struct FrameReader<R: Read> {
    src: R,
    buf: Vec<u8>,
    start: usize,
}

impl<R: Read> FrameReader<R> {
    pub fn new(src: R) -> Self {
        Self {
            src,
            buf: Vec::new(),
            start: 0,
        }
    }

    /// Reads the next frame and returns its payload.
    ///
    /// EOF exactly on a frame boundary is `MissingSnapshotData` (the
    /// stream ended while commands were still expected); EOF inside a
    /// frame is `InconsistentSnapshotFile`.
    pub fn read_frame(&mut self) -> SnapshotResult<&[u8]> {
        let available = self.fill(FRAME_HEADER_BYTES)?;
        if available < FRAME_HEADER_BYTES {
            return Err(if available == 0 {
                SnapshotError::MissingSnapshotData
            } else {
                SnapshotError::InconsistentSnapshotFile
            });
        }
        let header = &self.buf[self.start..self.start + FRAME_HEADER_BYTES];
        let length = u64::from_be_bytes(header.try_into().unwrap());
        if length > MAX_FRAME_BYTES {
            return Err(SnapshotError::InconsistentSnapshotFile);
        }
        self.start += FRAME_HEADER_BYTES;

        let length = length as usize;
        if self.fill(length)? < length {
            return Err(SnapshotError::InconsistentSnapshotFile);
        }
        let payload = &self.buf[self.start..self.start + length];
        self.start += length;
        Ok(payload)
    }

    fn available(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Refills until `need` bytes are buffered or the source is
    /// exhausted; returns how many bytes are available.
    fn fill(&mut self, need: usize) -> SnapshotResult<usize> {
        if self.available() >= need {
            return Ok(self.available());
        }
        self.compact();
        while self.buf.len() < need {
            let old = self.buf.len();
            let chunk = REFILL_CHUNK.max(need - old);
            self.buf.resize(old + chunk, 0);
            match self.src.read(&mut self.buf[old..]) {
                Ok(0) => {
                    self.buf.truncate(old);
                    break;
                }
                Ok(count) => self.buf.truncate(old + count),
                Err(err) if err.kind() == ErrorKind::Interrupted => self.buf.truncate(old),
                Err(err) => {
                    self.buf.truncate(old);
                    return Err(SnapshotError::read(err));
                }
            }
        }
        Ok(self.available())
    }

    fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        let len = self.buf.len();
        self.buf.copy_within(self.start..len, 0);
        self.buf.truncate(len - self.start);
        self.start = 0;
    }
}
