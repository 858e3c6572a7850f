pub mod error;
pub mod format;
mod macros;
pub mod metadata;
pub mod profiler;
pub mod scope;
pub mod sink;
pub mod slots;
pub mod tag;
pub mod timer;

pub use error::{Result, TickscopeError};
pub use format::{
    CaptureReader, FRAME_LENGTH_PREFIX_BYTES, FrameMetadataEntry, Frames, MAX_FRAME_BYTES,
    ScopeFrame,
};
pub use metadata::{
    MAX_METADATA_ENTRIES, METADATA_PAYLOAD_BYTES, MetadataEntry, MetadataKind, MetadataPrimitive,
    MetadataSlot, MetadataValue,
};
pub use profiler::{
    Profiler, ProfilerStats, WORKER_DEQUEUE_WAIT, available, create_binary_file_sink, instance,
    set_sink_binary_file, set_sink_silent, set_sink_text, start, stop,
};
pub use scope::{SCOPE_STACK_RESERVATION, ScopeGuard, ScopeRecord};
pub use sink::{BinaryFileSink, Sink, SinkKind};
pub use slots::{DEFAULT_POOL_SLOTS, PooledSlot, SlotPool};
pub use tag::{InlineTag, METADATA_KEY_BYTES, MetadataKey, SCOPE_TAG_BYTES, ScopeTag};
pub use timer::{Timer, now};
