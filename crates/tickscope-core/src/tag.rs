use std::fmt;

/// Capacity in bytes of a scope tag.
pub const SCOPE_TAG_BYTES: usize = 32;
/// Capacity in bytes of a metadata key.
pub const METADATA_KEY_BYTES: usize = 32;

/// Tag identifying a profiled scope.
pub type ScopeTag = InlineTag<SCOPE_TAG_BYTES>;
/// Key naming one metadata entry.
pub type MetadataKey = InlineTag<METADATA_KEY_BYTES>;

/// A bounded string stored inline, without heap allocation.
///
/// Values longer than `N` bytes are truncated on a character boundary at
/// construction. Copying a tag is a plain memcpy, which keeps tags cheap to
/// move through records and across threads.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InlineTag<const N: usize> {
    len: u8,
    bytes: [u8; N],
}

impl<const N: usize> InlineTag<N> {
    const LEN_FITS_U8: () = assert!(N <= u8::MAX as usize, "inline tag capacity exceeds u8 range");

    /// Builds a tag from `value`, truncating to at most `N` bytes.
    pub fn new(value: &str) -> Self {
        let _ = Self::LEN_FITS_U8;

        let mut len = value.len().min(N);
        while len > 0 && !value.is_char_boundary(len) {
            len -= 1;
        }

        let mut bytes = [0u8; N];
        bytes[..len].copy_from_slice(&value.as_bytes()[..len]);
        Self {
            len: len as u8,
            bytes,
        }
    }

    /// The empty tag.
    pub const fn empty() -> Self {
        Self {
            len: 0,
            bytes: [0u8; N],
        }
    }

    pub fn as_str(&self) -> &str {
        // Constructed from `&str` on a character boundary, so this never fails.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of bytes this tag can hold.
    pub const fn capacity() -> usize {
        N
    }
}

impl<const N: usize> Default for InlineTag<N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> fmt::Display for InlineTag<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> fmt::Debug for InlineTag<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InlineTag({:?})", self.as_str())
    }
}

impl<const N: usize> From<&str> for InlineTag<N> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
