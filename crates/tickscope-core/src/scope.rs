use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;

use crate::metadata::{MetadataEntry, MetadataPrimitive};
use crate::profiler;
use crate::slots::PooledSlot;
use crate::tag::{MetadataKey, ScopeTag};
use crate::timer;

/// Open-scope stack capacity reserved per thread.
///
/// A high-water mark rather than a hard limit; nesting deeper than this
/// allocates on scope entry.
pub const SCOPE_STACK_RESERVATION: usize = 32;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<ScopeRecord>> =
        RefCell::new(Vec::with_capacity(SCOPE_STACK_RESERVATION));
}

/// The snapshot emitted when a scope closes.
///
/// Tick values are raw counter readings; divide by the profiler's nominal
/// frequency to convert to time. The metadata slot travels with the record
/// and returns to the pool once the sink has seen it.
#[derive(Debug)]
pub struct ScopeRecord {
    pub tag: ScopeTag,
    pub ticks_start: u64,
    pub ticks_end: u64,
    pub(crate) slot: Option<PooledSlot>,
}

impl ScopeRecord {
    pub(crate) fn open(tag: ScopeTag, slot: Option<PooledSlot>) -> Self {
        Self {
            tag,
            ticks_start: 0,
            ticks_end: 0,
            slot,
        }
    }

    /// The metadata attached to this scope, in attachment order.
    ///
    /// Empty when slot acquisition failed at scope entry.
    pub fn metadata(&self) -> &[MetadataEntry] {
        match &self.slot {
            Some(slot) => slot.entries(),
            None => &[],
        }
    }

    fn push_metadata<T: MetadataPrimitive>(&mut self, key: MetadataKey, value: T) -> bool {
        match &mut self.slot {
            Some(slot) => slot.push(key, value),
            None => false,
        }
    }
}

impl fmt::Display for ScopeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scope[{}] ticks_start={} ticks_end={} metadata={{",
            self.tag, self.ticks_start, self.ticks_end
        )?;
        for (index, entry) in self.metadata().iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{entry}")?;
        }
        f.write_str("}")
    }
}

/// RAII handle bracketing one profiled scope.
///
/// Construction acquires a metadata slot and registers the scope on the
/// calling thread's stack, reading the entry tick as the very last step;
/// destruction reads the exit tick first, then pops and hands the record to
/// the aggregation worker. Keeping the bookkeeping outside the two reads
/// keeps it out of the measurement window.
pub struct ScopeGuard {
    // Scope exit must run on the thread that entered; keep the guard !Send.
    _not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// Opens a scope tagged `tag` for the lifetime of the returned guard.
    pub fn enter(tag: &str) -> Self {
        let slot = profiler::instance().acquire_slot();
        let record = ScopeRecord::open(ScopeTag::new(tag), slot);

        let _ = SCOPE_STACK.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(record);
            if let Some(open) = stack.last_mut() {
                open.ticks_start = timer::now();
            }
        });

        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let ticks_end = timer::now();

        let record = SCOPE_STACK
            .try_with(|stack| stack.borrow_mut().pop())
            .ok()
            .flatten();

        if let Some(mut record) = record {
            record.ticks_end = ticks_end;
            profiler::instance().submit(record);
        }
    }
}

/// Attaches one metadata entry to the innermost open scope on this thread.
///
/// Dropped silently when no scope is open, when the scope has no slot, or
/// when the slot is already full; instrumentation must not fail the host.
pub fn attach<T: MetadataPrimitive>(key: &str, value: T) {
    let _ = SCOPE_STACK.try_with(|stack| {
        let mut stack = stack.borrow_mut();
        if let Some(open) = stack.last_mut() {
            if !open.push_metadata(MetadataKey::new(key), value) {
                if let Some(profiler) = profiler::try_instance() {
                    profiler.note_metadata_dropped();
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataKind, MetadataValue};

    #[test]
    fn attach_without_open_scope_is_a_no_op() {
        attach("orphan", 1u32);
    }

    #[test]
    fn record_display_includes_tag_and_metadata() {
        let mut record = ScopeRecord::open(ScopeTag::new("render"), None);
        record.ticks_start = 10;
        record.ticks_end = 42;
        assert_eq!(
            record.to_string(),
            "Scope[render] ticks_start=10 ticks_end=42 metadata={}"
        );
    }

    #[test]
    fn record_metadata_decodes_pushed_values() {
        let pool = crate::slots::SlotPool::with_capacity(1);
        let mut slot = pool.acquire().expect("fresh pool has a free slot");
        assert!(slot.push(MetadataKey::new("items"), 7u32));

        let record = ScopeRecord::open(ScopeTag::new("walk"), Some(slot));
        let entries = record.metadata();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, MetadataKind::U32);
        assert_eq!(entries[0].value(), Some(MetadataValue::U32(7)));
    }
}
