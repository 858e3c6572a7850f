use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tag::MetadataKey;

/// Maximum number of metadata entries one scope can carry.
pub const MAX_METADATA_ENTRIES: usize = 8;
/// Size of a metadata payload in bytes; the largest supported primitive is 8 bytes.
pub const METADATA_PAYLOAD_BYTES: usize = 8;

/// Discriminant selecting how a metadata payload is interpreted.
///
/// `Unset` marks an empty entry and never appears in emitted records. The
/// discriminant values are part of the capture file format and must not be
/// reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MetadataKind {
    Unset = 0,
    I8 = 1,
    U8 = 2,
    I16 = 3,
    U16 = 4,
    I32 = 5,
    U32 = 6,
    I64 = 7,
    U64 = 8,
    F32 = 9,
    F64 = 10,
}

impl MetadataKind {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Unset,
            1 => Self::I8,
            2 => Self::U8,
            3 => Self::I16,
            4 => Self::U16,
            5 => Self::I32,
            6 => Self::U32,
            7 => Self::I64,
            8 => Self::U64,
            9 => Self::F32,
            10 => Self::F64,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Primitive value types that can be attached to a scope as metadata.
///
/// The set is closed; wider host types map onto it explicitly (`usize` is
/// stored as `U64`).
pub trait MetadataPrimitive: sealed::Sealed + Copy {
    const KIND: MetadataKind;

    /// Encodes the value into a payload in native byte order, zero-padded.
    fn to_payload(self) -> [u8; METADATA_PAYLOAD_BYTES];
}

macro_rules! impl_metadata_primitive {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl MetadataPrimitive for $ty {
                const KIND: MetadataKind = MetadataKind::$kind;

                fn to_payload(self) -> [u8; METADATA_PAYLOAD_BYTES] {
                    let mut payload = [0u8; METADATA_PAYLOAD_BYTES];
                    let bytes = self.to_ne_bytes();
                    payload[..bytes.len()].copy_from_slice(&bytes);
                    payload
                }
            }
        )+
    };
}

impl_metadata_primitive!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl sealed::Sealed for usize {}

impl MetadataPrimitive for usize {
    const KIND: MetadataKind = MetadataKind::U64;

    fn to_payload(self) -> [u8; METADATA_PAYLOAD_BYTES] {
        (self as u64).to_ne_bytes()
    }
}

/// One key/value metadata entry attached to a scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataEntry {
    pub key: MetadataKey,
    pub kind: MetadataKind,
    pub payload: [u8; METADATA_PAYLOAD_BYTES],
}

impl MetadataEntry {
    pub const UNSET: Self = Self {
        key: MetadataKey::empty(),
        kind: MetadataKind::Unset,
        payload: [0u8; METADATA_PAYLOAD_BYTES],
    };

    pub fn new<T: MetadataPrimitive>(key: MetadataKey, value: T) -> Self {
        Self {
            key,
            kind: T::KIND,
            payload: value.to_payload(),
        }
    }

    /// Decodes the payload according to the entry kind.
    ///
    /// Returns `None` for `Unset` entries, whose payload content is undefined.
    pub fn value(&self) -> Option<MetadataValue> {
        decode_payload(self.kind, self.payload)
    }
}

impl Default for MetadataEntry {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Display for MetadataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}: ", self.key, self.kind)?;
        match self.value() {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("(unset)"),
        }
    }
}

/// A metadata payload decoded into its concrete primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetadataValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I8(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
        }
    }
}

pub(crate) fn decode_payload(
    kind: MetadataKind,
    p: [u8; METADATA_PAYLOAD_BYTES],
) -> Option<MetadataValue> {
    Some(match kind {
        MetadataKind::Unset => return None,
        MetadataKind::I8 => MetadataValue::I8(i8::from_ne_bytes([p[0]])),
        MetadataKind::U8 => MetadataValue::U8(p[0]),
        MetadataKind::I16 => MetadataValue::I16(i16::from_ne_bytes([p[0], p[1]])),
        MetadataKind::U16 => MetadataValue::U16(u16::from_ne_bytes([p[0], p[1]])),
        MetadataKind::I32 => MetadataValue::I32(i32::from_ne_bytes([p[0], p[1], p[2], p[3]])),
        MetadataKind::U32 => MetadataValue::U32(u32::from_ne_bytes([p[0], p[1], p[2], p[3]])),
        MetadataKind::I64 => MetadataValue::I64(i64::from_ne_bytes(p)),
        MetadataKind::U64 => MetadataValue::U64(u64::from_ne_bytes(p)),
        MetadataKind::F32 => MetadataValue::F32(f32::from_ne_bytes([p[0], p[1], p[2], p[3]])),
        MetadataKind::F64 => MetadataValue::F64(f64::from_ne_bytes(p)),
    })
}

/// Fixed-capacity metadata storage loaned to one active scope.
///
/// Entries `[0, len)` are populated; the remainder stays `Unset`. Resetting
/// only rewinds `len`, readers must bound themselves with [`Self::entries`].
#[derive(Debug)]
pub struct MetadataSlot {
    len: u8,
    entries: [MetadataEntry; MAX_METADATA_ENTRIES],
}

impl MetadataSlot {
    /// Appends an entry. Returns `false` when the slot is already full.
    pub fn push<T: MetadataPrimitive>(&mut self, key: MetadataKey, value: T) -> bool {
        let index = self.len as usize;
        if index >= MAX_METADATA_ENTRIES {
            return false;
        }

        self.entries[index] = MetadataEntry::new(key, value);
        self.len += 1;
        true
    }

    /// The populated entries, in attachment order.
    pub fn entries(&self) -> &[MetadataEntry] {
        &self.entries[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rewinds the slot to pristine for reuse.
    pub fn reset(&mut self) {
        self.len = 0;
    }
}

impl Default for MetadataSlot {
    fn default() -> Self {
        Self {
            len: 0,
            entries: [MetadataEntry::UNSET; MAX_METADATA_ENTRIES],
        }
    }
}
