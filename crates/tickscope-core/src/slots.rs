use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::error::{Result, TickscopeError};
use crate::metadata::{MetadataEntry, MetadataPrimitive, MetadataSlot};
use crate::tag::MetadataKey;

/// Number of metadata slots allocated up front, and per expansion chunk.
pub const DEFAULT_POOL_SLOTS: usize = 1024;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A pool of reusable metadata slots.
///
/// Slots are pre-allocated and recirculated through a free list so that scope
/// entry never allocates in the common case. When the free list runs dry the
/// pool grows by one chunk under a mutex; concurrent callers re-check the free
/// list after taking the lock so only one of them pays for the expansion.
#[derive(Debug)]
pub struct SlotPool {
    recycler: Sender<Box<MetadataSlot>>,
    free: Receiver<Box<MetadataSlot>>,
    chunk: usize,
    growth: Mutex<PoolGrowth>,
}

#[derive(Debug)]
struct PoolGrowth {
    allocated: usize,
}

impl SlotPool {
    /// Creates a pool with the default chunk size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_SLOTS)
    }

    /// Creates a pool that starts with `chunk` slots and grows by the same
    /// amount on exhaustion.
    pub fn with_capacity(chunk: usize) -> Self {
        let chunk = chunk.max(1);
        let (recycler, free) = unbounded();
        for _ in 0..chunk {
            let _ = recycler.send(Box::default());
        }

        Self {
            recycler,
            free,
            chunk,
            growth: Mutex::new(PoolGrowth { allocated: chunk }),
        }
    }

    /// Takes a slot from the pool.
    ///
    /// The fast path is a single non-blocking dequeue from the free list. On
    /// exhaustion the pool expands by one chunk; the call only fails if a slot
    /// still cannot be obtained afterwards.
    pub fn acquire(&self) -> Result<PooledSlot> {
        if let Ok(slot) = self.free.try_recv() {
            return Ok(self.lend(slot));
        }

        let mut growth = lock_unpoisoned(&self.growth);

        // Another caller may have expanded while we waited for the lock.
        if let Ok(slot) = self.free.try_recv() {
            return Ok(self.lend(slot));
        }

        for _ in 0..self.chunk {
            let _ = self.recycler.send(Box::default());
        }
        growth.allocated += self.chunk;
        tracing::debug!(allocated = growth.allocated, chunk = self.chunk, "slot pool expanded");
        drop(growth);

        match self.free.try_recv() {
            Ok(slot) => Ok(self.lend(slot)),
            Err(_) => Err(TickscopeError::SlotsExhausted),
        }
    }

    /// Number of slots currently sitting on the free list.
    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    /// Total number of slots the pool has ever allocated.
    pub fn allocated_slots(&self) -> usize {
        lock_unpoisoned(&self.growth).allocated
    }

    /// Chunk size used for the initial allocation and each expansion.
    pub fn chunk_size(&self) -> usize {
        self.chunk
    }

    fn lend(&self, slot: Box<MetadataSlot>) -> PooledSlot {
        PooledSlot {
            slot: Some(slot),
            recycler: self.recycler.clone(),
        }
    }
}

impl Default for SlotPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A metadata slot on loan from a [`SlotPool`].
///
/// Dropping the loan resets the slot to pristine and returns it to the pool's
/// free list, whichever thread the drop happens on.
#[derive(Debug)]
pub struct PooledSlot {
    slot: Option<Box<MetadataSlot>>,
    recycler: Sender<Box<MetadataSlot>>,
}

impl PooledSlot {
    /// Appends a metadata entry. Returns `false` when the slot is full.
    pub fn push<T: MetadataPrimitive>(&mut self, key: MetadataKey, value: T) -> bool {
        match &mut self.slot {
            Some(slot) => slot.push(key, value),
            None => false,
        }
    }

    /// The populated entries, in attachment order.
    pub fn entries(&self) -> &[MetadataEntry] {
        match &self.slot {
            Some(slot) => slot.entries(),
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Drop for PooledSlot {
    fn drop(&mut self) {
        if let Some(mut slot) = self.slot.take() {
            slot.reset();
            // Fails only when the pool itself is gone; the slot is then freed.
            let _ = self.recycler.send(slot);
        }
    }
}
