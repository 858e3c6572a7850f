use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::error::{Result, TickscopeError};
use crate::scope::ScopeRecord;
use crate::sink::{BinaryFileSink, Sink, SinkKind};
use crate::slots::{PooledSlot, SlotPool, lock_unpoisoned};
use crate::timer::Timer;

/// How long the aggregation worker blocks on the record queue per iteration.
/// Bounds how late a stop request can be noticed.
pub const WORKER_DEQUEUE_WAIT: Duration = Duration::from_millis(10);

/// Process-wide profiler: resource owner and aggregation point.
///
/// Lazily constructed on first reference via [`instance`]. Producer threads
/// hand completed records to the queue; a single background worker drains it,
/// feeds the selected sink and recycles metadata slots. The entire producer
/// path is non-blocking.
pub struct Profiler {
    timer: Timer,
    slots: SlotPool,
    records_tx: Sender<ScopeRecord>,
    records_rx: Receiver<ScopeRecord>,
    sink: Mutex<Sink>,
    worker: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
    stop_requested: AtomicBool,
    stats: StatsInner,
}

static INSTANCE: OnceLock<Profiler> = OnceLock::new();

/// Returns the process-wide profiler, constructing it on first use.
pub fn instance() -> &'static Profiler {
    INSTANCE.get_or_init(Profiler::probe)
}

/// The profiler, only if something has already constructed it.
pub(crate) fn try_instance() -> Option<&'static Profiler> {
    INSTANCE.get()
}

impl Profiler {
    fn probe() -> Self {
        let (records_tx, records_rx) = unbounded();
        Self {
            timer: Timer::detect(),
            slots: SlotPool::new(),
            records_tx,
            records_rx,
            sink: Mutex::new(Sink::Silent),
            worker: Mutex::new(None),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            stats: StatsInner::default(),
        }
    }

    /// True when the hardware counter is usable for measurement.
    pub fn ready(&self) -> bool {
        self.timer.ok()
    }

    /// Tick rate of the counter in Hz; zero when not [`ready`](Self::ready).
    pub fn nominal_frequency_hz(&self) -> u64 {
        self.timer.nominal_frequency_hz()
    }

    /// Starts the aggregation worker.
    ///
    /// Idempotent while running. Fails with `UnsupportedPlatform` when the
    /// counter is unusable; scopes can still be created but carry no
    /// meaningful timings and nothing drains the queue.
    pub fn try_start(&'static self) -> Result<()> {
        if !self.ready() {
            return Err(TickscopeError::UnsupportedPlatform);
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.stop_requested.store(false, Ordering::Release);
        let spawned = thread::Builder::new()
            .name("tickscope-sink".into())
            .spawn(move || self.run_worker());

        match spawned {
            Ok(handle) => {
                *lock_unpoisoned(&self.worker) = Some(handle);
                tracing::debug!("aggregation worker started");
                Ok(())
            }
            Err(source) => {
                self.running.store(false, Ordering::Release);
                Err(source.into())
            }
        }
    }

    /// [`try_start`](Self::try_start) with the failure reduced to `false`.
    pub fn start(&'static self) -> bool {
        match self.try_start() {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(%error, "profiler start refused");
                false
            }
        }
    }

    /// Signals the worker to drain the queue and exit, then joins it.
    ///
    /// Every record enqueued before this call has reached the sink by the
    /// time it returns. A later [`start`](Self::start) resumes aggregation.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Release);

        let handle = lock_unpoisoned(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("aggregation worker panicked");
            }
            tracing::debug!("aggregation worker stopped");
        }

        self.running.store(false, Ordering::Release);
    }

    /// Selects the sink that discards all records.
    pub fn set_sink_silent(&self) {
        self.set_sink(Sink::Silent);
    }

    /// Selects the line-per-record sink on standard output.
    pub fn set_sink_text(&self) {
        self.set_sink(Sink::Text);
    }

    /// Installs a binary file sink previously built with
    /// [`BinaryFileSink::create`].
    pub fn set_sink_binary_file(&self, sink: BinaryFileSink) {
        self.set_sink(Sink::BinaryFile(sink));
    }

    /// The kind of the currently selected sink.
    pub fn sink_kind(&self) -> SinkKind {
        lock_unpoisoned(&self.sink).kind()
    }

    /// Snapshot of the profiler's diagnostic counters.
    pub fn stats(&self) -> ProfilerStats {
        self.stats.snapshot()
    }

    fn set_sink(&self, sink: Sink) {
        let kind = sink.kind();
        let mut current = lock_unpoisoned(&self.sink);
        let previous = std::mem::replace(&mut *current, sink);
        drop(current);
        // Dropping the previous sink flushes it outside the lock.
        drop(previous);
        tracing::debug!(?kind, "sink selected");
    }

    pub(crate) fn acquire_slot(&self) -> Option<PooledSlot> {
        match self.slots.acquire() {
            Ok(slot) => Some(slot),
            Err(error) => {
                self.stats.slots_exhausted.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%error, "scope proceeds without metadata slot");
                None
            }
        }
    }

    pub(crate) fn submit(&self, record: ScopeRecord) {
        // Unbounded channel; only fails if the receiver is gone, and the
        // profiler owns the receiver for the life of the process.
        let _ = self.records_tx.send(record);
    }

    pub(crate) fn note_metadata_dropped(&self) {
        self.stats.metadata_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn run_worker(&self) {
        while !self.stop_requested.load(Ordering::Acquire) {
            match self.records_rx.recv_timeout(WORKER_DEQUEUE_WAIT) {
                Ok(record) => self.deliver(record),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Stop must not lose records already handed off.
        while let Ok(record) = self.records_rx.try_recv() {
            self.deliver(record);
        }

        if let Err(error) = lock_unpoisoned(&self.sink).flush() {
            tracing::warn!(%error, "sink flush failed at shutdown");
        }
    }

    fn deliver(&self, record: ScopeRecord) {
        let nominal_hz = self.timer.nominal_frequency_hz();

        let mut sink = lock_unpoisoned(&self.sink);
        let outcome = catch_unwind(AssertUnwindSafe(|| sink.consume(&record, nominal_hz)));
        drop(sink);

        match outcome {
            Ok(Ok(())) => {
                self.stats.records_delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(error)) => {
                self.stats.sink_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%error, tag = %record.tag, "sink rejected record");
            }
            Err(_) => {
                self.stats.sink_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(tag = %record.tag, "sink panicked while consuming record");
            }
        }
        // Dropping the record returns its metadata slot to the pool.
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    records_delivered: AtomicU64,
    sink_failures: AtomicU64,
    metadata_dropped: AtomicU64,
    slots_exhausted: AtomicU64,
}

impl StatsInner {
    fn snapshot(&self) -> ProfilerStats {
        ProfilerStats {
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            metadata_dropped: self.metadata_dropped.load(Ordering::Relaxed),
            slots_exhausted: self.slots_exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of the profiler's diagnostic counters.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct ProfilerStats {
    /// Records the sink consumed without error.
    pub records_delivered: u64,
    /// Sink invocations that returned an error or panicked.
    pub sink_failures: u64,
    /// Metadata entries dropped because a slot was missing or full.
    pub metadata_dropped: u64,
    /// Scope entries that could not obtain a metadata slot.
    pub slots_exhausted: u64,
}

/// True when the hardware counter is usable on this machine.
pub fn available() -> bool {
    instance().ready()
}

/// Starts aggregation; `false` when the counter is unusable.
pub fn start() -> bool {
    instance().start()
}

/// Drains outstanding records and halts the aggregation worker.
pub fn stop() {
    instance().stop()
}

/// Selects the sink that discards all records.
pub fn set_sink_silent() {
    instance().set_sink_silent()
}

/// Selects the line-per-record sink on standard output.
pub fn set_sink_text() {
    instance().set_sink_text()
}

/// Builds a binary file sink, reporting construction failures to the caller.
/// The active sink is unchanged until [`set_sink_binary_file`] installs it.
pub fn create_binary_file_sink(path: impl AsRef<Path>) -> Result<BinaryFileSink> {
    BinaryFileSink::create(path)
}

/// Installs a binary file sink built with [`create_binary_file_sink`].
pub fn set_sink_binary_file(sink: BinaryFileSink) {
    instance().set_sink_binary_file(sink)
}
