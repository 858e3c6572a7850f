use std::io::Cursor;

use bytes::{BufMut, BytesMut};
use tickscope_core::{
    CaptureReader, FrameMetadataEntry, MetadataEntry, MetadataKey, MetadataKind, MetadataPrimitive,
    MetadataValue, ScopeFrame, TickscopeError,
};

fn raw_payload<T: MetadataPrimitive>(value: T) -> u64 {
    u64::from_ne_bytes(MetadataEntry::new(MetadataKey::new("raw"), value).payload)
}

fn sample_frame(tag: &str, ticks_start: u64, ticks_end: u64) -> ScopeFrame {
    ScopeFrame {
        tag: tag.to_string(),
        ticks_start,
        ticks_end,
        nominal_frequency_hz: 3_000_000_000,
        metadata: vec![
            FrameMetadataEntry {
                key: "attempt".to_string(),
                kind: MetadataKind::U32,
                raw: raw_payload(7u32),
            },
            FrameMetadataEntry {
                key: "ratio".to_string(),
                kind: MetadataKind::F64,
                raw: raw_payload(0.5f64),
            },
        ],
    }
}

fn write_frame(out: &mut Vec<u8>, frame: &ScopeFrame) {
    let mut payload = BytesMut::new();
    frame.encode(&mut payload);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
}

#[test]
fn frame_round_trips_through_its_encoding() -> Result<(), Box<dyn std::error::Error>> {
    let frame = sample_frame("compress", 100, 250);

    let mut payload = BytesMut::new();
    frame.encode(&mut payload);
    let decoded = ScopeFrame::decode(&payload)?;

    assert_eq!(decoded, frame);
    assert_eq!(decoded.metadata[0].value(), Some(MetadataValue::U32(7)));
    assert_eq!(decoded.metadata[1].value(), Some(MetadataValue::F64(0.5)));
    Ok(())
}

#[test]
fn frames_are_read_back_independently() -> Result<(), Box<dyn std::error::Error>> {
    let frames = [
        sample_frame("first", 1, 2),
        sample_frame("second", 3, 4),
        sample_frame("third", 5, 6),
    ];

    let mut stream = Vec::new();
    for frame in &frames {
        write_frame(&mut stream, frame);
    }

    let mut reader = CaptureReader::new(Cursor::new(stream));
    for expected in &frames {
        let frame = reader.next_frame()?;
        assert_eq!(frame.as_ref(), Some(expected));
    }
    assert!(reader.next_frame()?.is_none());
    Ok(())
}

#[test]
fn empty_stream_yields_no_frames() -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = CaptureReader::new(Cursor::new(Vec::new()));
    assert!(reader.next_frame()?.is_none());
    Ok(())
}

#[test]
fn truncated_length_prefix_is_rejected() {
    let mut reader = CaptureReader::new(Cursor::new(vec![0x04, 0x00]));
    assert!(matches!(
        reader.next_frame(),
        Err(TickscopeError::InvalidFormat(_))
    ));
}

#[test]
fn truncated_payload_is_rejected() {
    let mut stream = Vec::new();
    stream.extend_from_slice(&100u32.to_le_bytes());
    stream.extend_from_slice(&[0u8; 10]);

    let mut reader = CaptureReader::new(Cursor::new(stream));
    assert!(reader.next_frame().is_err());
}

#[test]
fn oversized_length_prefix_is_rejected() {
    let mut stream = Vec::new();
    stream.extend_from_slice(&u32::MAX.to_le_bytes());

    let mut reader = CaptureReader::new(Cursor::new(stream));
    assert!(matches!(
        reader.next_frame(),
        Err(TickscopeError::InvalidFormat(_))
    ));
}

#[test]
fn unknown_metadata_kind_is_rejected() {
    let mut payload = BytesMut::new();
    payload.put_u16_le(4);
    payload.put_slice(b"work");
    payload.put_u64_le(1);
    payload.put_u64_le(2);
    payload.put_u64_le(24_000_000);
    payload.put_u8(1);
    payload.put_u16_le(3);
    payload.put_slice(b"key");
    payload.put_u8(99);
    payload.put_u64_le(0);

    assert!(matches!(
        ScopeFrame::decode(&payload),
        Err(TickscopeError::InvalidFormat("unknown metadata kind"))
    ));
}

#[test]
fn trailing_bytes_in_frame_are_rejected() {
    let mut payload = BytesMut::new();
    sample_frame("tail", 9, 10).encode(&mut payload);
    payload.put_u8(0xAA);

    assert!(matches!(
        ScopeFrame::decode(&payload),
        Err(TickscopeError::InvalidFormat("trailing bytes in frame"))
    ));
}

#[test]
fn frames_export_as_json() -> Result<(), Box<dyn std::error::Error>> {
    let frame = sample_frame("export", 11, 19);
    let json = serde_json::to_string(&frame)?;
    let restored: ScopeFrame = serde_json::from_str(&json)?;
    assert_eq!(restored, frame);
    Ok(())
}

#[test]
fn iterator_walks_the_whole_stream() -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = Vec::new();
    for i in 0..5u64 {
        write_frame(&mut stream, &sample_frame("loop", i, i + 1));
    }

    let mut reader = CaptureReader::new(Cursor::new(stream));
    let frames = reader.frames().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(frames.len(), 5);
    assert!(frames.iter().all(|frame| frame.tag == "loop"));
    Ok(())
}
