use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Result, TickscopeError};

use super::frame::{MAX_FRAME_BYTES, ScopeFrame};

/// Streams scope frames back out of a capture produced by the binary file
/// sink.
///
/// Frames are independent, so reading stops cleanly at end of stream and a
/// partial trailing frame (say, from a process killed mid-write) surfaces as
/// an [`TickscopeError::InvalidFormat`] rather than a panic.
#[derive(Debug)]
pub struct CaptureReader<R: Read> {
    reader: R,
}

impl CaptureReader<BufReader<File>> {
    /// Opens a capture file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> CaptureReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next frame, or `Ok(None)` at a clean end of stream.
    pub fn next_frame(&mut self) -> Result<Option<ScopeFrame>> {
        let len = match self.read_length_prefix()? {
            Some(len) => len as usize,
            None => return Ok(None),
        };
        if len > MAX_FRAME_BYTES {
            return Err(TickscopeError::InvalidFormat("frame length exceeds limit"));
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload)?;
        ScopeFrame::decode(&payload).map(Some)
    }

    /// Iterator over the remaining frames.
    pub fn frames(&mut self) -> Frames<'_, R> {
        Frames { reader: self }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_length_prefix(&mut self) -> Result<Option<u32>> {
        let mut bytes = [0u8; 4];
        let mut filled = 0;

        while filled < bytes.len() {
            let n = self.reader.read(&mut bytes[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(TickscopeError::InvalidFormat("frame length truncated"));
            }
            filled += n;
        }

        Ok(Some(u32::from_le_bytes(bytes)))
    }
}

/// Iterator adapter returned by [`CaptureReader::frames`].
#[derive(Debug)]
pub struct Frames<'a, R: Read> {
    reader: &'a mut CaptureReader<R>,
}

impl<R: Read> Iterator for Frames<'_, R> {
    type Item = Result<ScopeFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_frame().transpose()
    }
}
