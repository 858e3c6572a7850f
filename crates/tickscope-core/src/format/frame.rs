use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TickscopeError};
use crate::metadata::{MetadataKind, MetadataValue, decode_payload};
use crate::scope::ScopeRecord;

/// Every frame in a capture stream is preceded by its payload length as a
/// little-endian u32.
pub const FRAME_LENGTH_PREFIX_BYTES: usize = 4;

/// Upper bound accepted for a single frame payload.
///
/// Far above anything the writer produces; guards readers against allocating
/// for a corrupt length prefix.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// One scope record decoded from (or encodable to) a capture stream.
///
/// Frames are self-contained: each carries the nominal counter frequency so a
/// consumer can convert ticks without out-of-band context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeFrame {
    pub tag: String,
    pub ticks_start: u64,
    pub ticks_end: u64,
    pub nominal_frequency_hz: u64,
    pub metadata: Vec<FrameMetadataEntry>,
}

/// A metadata entry as stored on disk: key, kind and the raw 8-byte payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMetadataEntry {
    pub key: String,
    pub kind: MetadataKind,
    pub raw: u64,
}

impl FrameMetadataEntry {
    /// Decodes the raw payload according to the entry kind.
    pub fn value(&self) -> Option<MetadataValue> {
        decode_payload(self.kind, self.raw.to_ne_bytes())
    }
}

impl ScopeFrame {
    /// Appends this frame's payload (without the length prefix) to `out`.
    pub fn encode(&self, out: &mut BytesMut) {
        put_str(out, &self.tag);
        out.put_u64_le(self.ticks_start);
        out.put_u64_le(self.ticks_end);
        out.put_u64_le(self.nominal_frequency_hz);
        out.put_u8(self.metadata.len().min(u8::MAX as usize) as u8);
        for entry in self.metadata.iter().take(u8::MAX as usize) {
            put_str(out, &entry.key);
            out.put_u8(entry.kind as u8);
            out.put_u64_le(entry.raw);
        }
    }

    /// Decodes one frame payload. The buffer must contain exactly one frame.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        let tag = get_str(&mut buf)?;

        if buf.remaining() < 3 * 8 + 1 {
            return Err(TickscopeError::InvalidFormat("frame header truncated"));
        }
        let ticks_start = buf.get_u64_le();
        let ticks_end = buf.get_u64_le();
        let nominal_frequency_hz = buf.get_u64_le();

        let entry_count = buf.get_u8() as usize;
        let mut metadata = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            let key = get_str(&mut buf)?;
            if buf.remaining() < 1 + 8 {
                return Err(TickscopeError::InvalidFormat("metadata entry truncated"));
            }
            let kind = MetadataKind::from_u8(buf.get_u8())
                .ok_or(TickscopeError::InvalidFormat("unknown metadata kind"))?;
            let raw = buf.get_u64_le();
            metadata.push(FrameMetadataEntry { key, kind, raw });
        }

        if buf.has_remaining() {
            return Err(TickscopeError::InvalidFormat("trailing bytes in frame"));
        }

        Ok(Self {
            tag,
            ticks_start,
            ticks_end,
            nominal_frequency_hz,
            metadata,
        })
    }
}

/// Encodes a live record straight into `out`, bypassing the owned
/// [`ScopeFrame`] representation. Byte-for-byte identical to
/// [`ScopeFrame::encode`].
pub(crate) fn encode_record(record: &ScopeRecord, nominal_frequency_hz: u64, out: &mut BytesMut) {
    put_str(out, record.tag.as_str());
    out.put_u64_le(record.ticks_start);
    out.put_u64_le(record.ticks_end);
    out.put_u64_le(nominal_frequency_hz);

    let entries = record.metadata();
    out.put_u8(entries.len().min(u8::MAX as usize) as u8);
    for entry in entries {
        put_str(out, entry.key.as_str());
        out.put_u8(entry.kind as u8);
        out.put_u64_le(u64::from_ne_bytes(entry.payload));
    }
}

fn put_str(out: &mut BytesMut, value: &str) {
    let len = value.len().min(u16::MAX as usize);
    out.put_u16_le(len as u16);
    out.put_slice(&value.as_bytes()[..len]);
}

fn get_str(buf: &mut &[u8]) -> Result<String> {
    if buf.remaining() < 2 {
        return Err(TickscopeError::InvalidFormat("string length truncated"));
    }
    let len = buf.get_u16_le() as usize;
    if buf.remaining() < len {
        return Err(TickscopeError::InvalidFormat("string bytes truncated"));
    }

    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes)
        .map_err(|_| TickscopeError::InvalidFormat("string is not valid UTF-8"))
}
