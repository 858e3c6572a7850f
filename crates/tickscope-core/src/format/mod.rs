//! On-disk capture format: length-prefixed, self-describing scope frames.

mod frame;
mod reader;

pub use frame::{FRAME_LENGTH_PREFIX_BYTES, FrameMetadataEntry, MAX_FRAME_BYTES, ScopeFrame};
pub use reader::{CaptureReader, Frames};

pub(crate) use frame::encode_record;
