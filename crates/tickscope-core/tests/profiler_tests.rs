use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

use tickscope_core::{
    CaptureReader, MetadataKind, MetadataValue, ScopeFrame, SinkKind, available,
    create_binary_file_sink, instance, scope, scope_metadata, set_sink_binary_file,
    set_sink_silent, set_sink_text, start, stop,
};

// The profiler is process-wide; tests that touch it take turns.
static PROFILER_LOCK: Mutex<()> = Mutex::new(());

fn capture<F: FnOnce()>(produce: F) -> Result<Vec<ScopeFrame>, Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("capture.bin");

    set_sink_binary_file(create_binary_file_sink(&path)?);
    assert!(start(), "profiler refused to start");
    produce();
    stop();
    set_sink_silent();

    let mut reader = CaptureReader::open(&path)?;
    Ok(reader.frames().collect::<Result<Vec<_>, _>>()?)
}

macro_rules! skip_unless_available {
    () => {
        if !available() {
            eprintln!("skipping: hardware counter unavailable on this machine");
            return Ok(());
        }
    };
}

#[test]
fn single_scope_without_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");
    skip_unless_available!();

    let frames = capture(|| {
        scope!("alpha");
    })?;

    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert_eq!(frame.tag, "alpha");
    assert!(frame.ticks_end >= frame.ticks_start);
    assert_eq!(frame.nominal_frequency_hz, instance().nominal_frequency_hz());
    assert!(frame.nominal_frequency_hz > 0);
    assert!(frame.metadata.is_empty());
    Ok(())
}

#[test]
fn metadata_kinds_arrive_in_attachment_order() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");
    skip_unless_available!();

    let frames = capture(|| {
        scope!("kinds");
        scope_metadata!("a", -1i8);
        scope_metadata!("b", 2u8);
        scope_metadata!("c", -3i16);
        scope_metadata!("d", 4u16);
        scope_metadata!("e", -5i32);
        scope_metadata!("f", 6u32);
        scope_metadata!("g", -7i64);
        scope_metadata!("h", 8u64);
        scope_metadata!("i", 9.5f32);
        scope_metadata!("j", -10.25f64);
    })?;

    assert_eq!(frames.len(), 1);
    let metadata = &frames[0].metadata;
    assert_eq!(metadata.len(), 10);

    let expected = [
        ("a", MetadataKind::I8, MetadataValue::I8(-1)),
        ("b", MetadataKind::U8, MetadataValue::U8(2)),
        ("c", MetadataKind::I16, MetadataValue::I16(-3)),
        ("d", MetadataKind::U16, MetadataValue::U16(4)),
        ("e", MetadataKind::I32, MetadataValue::I32(-5)),
        ("f", MetadataKind::U32, MetadataValue::U32(6)),
        ("g", MetadataKind::I64, MetadataValue::I64(-7)),
        ("h", MetadataKind::U64, MetadataValue::U64(8)),
        ("i", MetadataKind::F32, MetadataValue::F32(9.5)),
        ("j", MetadataKind::F64, MetadataValue::F64(-10.25)),
    ];

    for (entry, (key, kind, value)) in metadata.iter().zip(expected) {
        assert_eq!(entry.key, key);
        assert_eq!(entry.kind, kind);
        assert_eq!(entry.value(), Some(value));
    }
    Ok(())
}

#[test]
fn nested_scopes_emit_innermost_first() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");
    skip_unless_available!();

    let frames = capture(|| {
        scope!("outer");
        {
            scope!("mid");
            {
                scope!("inner");
            }
        }
    })?;

    let tags: Vec<&str> = frames.iter().map(|frame| frame.tag.as_str()).collect();
    assert_eq!(tags, ["inner", "mid", "outer"]);

    let inner = &frames[0];
    let mid = &frames[1];
    let outer = &frames[2];
    assert!(outer.ticks_start <= mid.ticks_start);
    assert!(mid.ticks_start <= inner.ticks_start);
    assert!(inner.ticks_end <= mid.ticks_end);
    assert!(mid.ticks_end <= outer.ticks_end);
    Ok(())
}

#[test]
fn metadata_overflow_drops_extra_entries() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");
    skip_unless_available!();

    let dropped_before = instance().stats().metadata_dropped;

    let frames = capture(|| {
        scope!("overflow");
        for i in 0..9u32 {
            scope_metadata!("entry", i);
        }
    })?;

    assert_eq!(frames.len(), 1);
    let metadata = &frames[0].metadata;
    assert_eq!(metadata.len(), 8);
    for (i, entry) in metadata.iter().enumerate() {
        assert_eq!(entry.value(), Some(MetadataValue::U32(i as u32)));
    }

    assert!(instance().stats().metadata_dropped > dropped_before);
    Ok(())
}

#[test]
fn metadata_without_open_scope_is_dropped() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");
    skip_unless_available!();

    scope_metadata!("orphan", 1u32);

    let frames = capture(|| {
        scope!("after-orphan");
        scope_metadata!("kept", 2u32);
    })?;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].metadata.len(), 1);
    assert_eq!(frames[0].metadata[0].key, "kept");
    Ok(())
}

#[test]
fn function_scope_uses_the_enclosing_function_name() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");
    skip_unless_available!();

    fn instrumented_helper() {
        tickscope_core::function_scope!();
    }

    let frames = capture(instrumented_helper)?;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].tag, "instrumented_helper");
    Ok(())
}

#[test]
fn shutdown_drains_every_pending_record() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");
    skip_unless_available!();

    const THREADS: usize = 2;
    const SCOPES_PER_THREAD: usize = 1000;

    let frames = capture(|| {
        thread::scope(|workers| {
            for thread_id in 0..THREADS {
                workers.spawn(move || {
                    for i in 0..SCOPES_PER_THREAD {
                        scope!("burst");
                        scope_metadata!("thread", thread_id as u32);
                        scope_metadata!("iteration", i);
                    }
                });
            }
        });
    })?;

    assert_eq!(frames.len(), THREADS * SCOPES_PER_THREAD);

    let mut per_thread: HashMap<u64, usize> = HashMap::new();
    for frame in &frames {
        assert_eq!(frame.tag, "burst");
        assert_eq!(frame.metadata.len(), 2);
        let Some(MetadataValue::U32(thread_id)) = frame.metadata[0].value() else {
            panic!("unexpected thread metadata: {:?}", frame.metadata[0]);
        };
        *per_thread.entry(thread_id as u64).or_default() += 1;
    }

    assert_eq!(per_thread.len(), THREADS);
    assert!(per_thread.values().all(|count| *count == SCOPES_PER_THREAD));
    Ok(())
}

#[test]
fn restart_delivers_records_in_both_sessions() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");
    skip_unless_available!();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("capture.bin");
    set_sink_binary_file(create_binary_file_sink(&path)?);

    assert!(start());
    {
        scope!("first-session");
    }
    stop();

    assert!(start());
    {
        scope!("second-session");
    }
    stop();
    set_sink_silent();

    let mut reader = CaptureReader::open(&path)?;
    let frames = reader.frames().collect::<Result<Vec<_>, _>>()?;
    let tags: Vec<&str> = frames.iter().map(|frame| frame.tag.as_str()).collect();
    assert_eq!(tags, ["first-session", "second-session"]);
    Ok(())
}

#[test]
fn sink_selection_is_reported() {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");

    set_sink_text();
    assert_eq!(instance().sink_kind(), SinkKind::Text);

    set_sink_silent();
    assert_eq!(instance().sink_kind(), SinkKind::Silent);
}

#[test]
fn start_reports_availability() {
    let _guard = PROFILER_LOCK.lock().expect("profiler lock poisoned");

    if available() {
        assert!(start());
        stop();
    } else {
        assert!(!start());
    }
}
