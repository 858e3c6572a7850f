use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use bytes::BytesMut;

use crate::error::{Result, TickscopeError};
use crate::format;
use crate::scope::ScopeRecord;

/// Destination for completed scope records.
///
/// A tagged enum rather than a trait object keeps the aggregation worker's
/// dispatch monomorphic. Sinks receive each record by reference and must not
/// hold onto it past the call.
#[derive(Debug)]
pub enum Sink {
    /// Discards every record. The default after profiler construction.
    Silent,
    /// One human-readable line per record on standard output.
    Text,
    /// Length-prefixed binary frames appended to a file.
    BinaryFile(BinaryFileSink),
}

/// Discriminant-only view of [`Sink`], for status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Silent,
    Text,
    BinaryFile,
}

impl Sink {
    pub fn kind(&self) -> SinkKind {
        match self {
            Self::Silent => SinkKind::Silent,
            Self::Text => SinkKind::Text,
            Self::BinaryFile(_) => SinkKind::BinaryFile,
        }
    }

    pub(crate) fn consume(&mut self, record: &ScopeRecord, nominal_frequency_hz: u64) -> Result<()> {
        match self {
            Self::Silent => Ok(()),
            Self::Text => {
                let mut out = io::stdout().lock();
                writeln!(out, "{record}")?;
                Ok(())
            }
            Self::BinaryFile(sink) => sink.write_record(record, nominal_frequency_hz),
        }
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        match self {
            Self::Silent | Self::Text => Ok(()),
            Self::BinaryFile(sink) => sink.flush(),
        }
    }
}

/// Appends scope records to a file as self-describing binary frames.
///
/// Each record becomes a 4-byte little-endian length prefix followed by the
/// frame payload; see [`crate::format`] for the layout and
/// [`crate::format::CaptureReader`] for reading captures back.
#[derive(Debug)]
pub struct BinaryFileSink {
    writer: BufWriter<File>,
    scratch: BytesMut,
}

impl BinaryFileSink {
    /// Opens `path` for append-only binary writes, creating it if needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| TickscopeError::SinkCreate {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path.display(), "binary capture sink opened");
        Ok(Self {
            writer: BufWriter::new(file),
            scratch: BytesMut::new(),
        })
    }

    fn write_record(&mut self, record: &ScopeRecord, nominal_frequency_hz: u64) -> Result<()> {
        self.scratch.clear();
        format::encode_record(record, nominal_frequency_hz, &mut self.scratch);

        let len = u32::try_from(self.scratch.len())
            .map_err(|_| TickscopeError::InvalidFormat("frame length exceeds prefix range"))?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&self.scratch)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
