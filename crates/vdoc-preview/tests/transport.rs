use pretty_assertions::assert_eq;
use vdoc_preview::{ImageHeader, PixelSource, PreviewFrame, SharedBufferCache, TransportError};

fn header(width: u32, height: u32) -> ImageHeader {
    ImageHeader {
        byte_count: width * height * 4,
        bytes_per_line: width * 4,
        width,
        height,
        pixel_format: 5,
    }
}

#[test]
fn inline_frame_resolves_without_a_cache_entry() {
    let pixels = vec![7u8; 2 * 2 * 4];
    let frame = PreviewFrame::inline(header(2, 2), pixels.clone()).unwrap();
    let mut cache = SharedBufferCache::new(4);

    assert_eq!(frame.resolve(&mut cache).unwrap(), pixels.as_slice());
    assert!(cache.is_empty());
}

#[test]
fn shared_frame_resolves_through_the_cache() {
    let pixels = vec![3u8; 4 * 1 * 4];
    let mut cache = SharedBufferCache::new(4);
    cache.insert(42, pixels.clone());

    let wire = PreviewFrame::shared(header(4, 1), 42).encode();
    let frame = PreviewFrame::decode(&wire).unwrap();

    assert!(matches!(frame.source, PixelSource::Shared(42)));
    assert_eq!(frame.resolve(&mut cache).unwrap(), pixels.as_slice());
}

#[test]
fn unknown_buffer_key_is_reported() {
    let frame = PreviewFrame::shared(header(4, 1), 7);
    let mut cache = SharedBufferCache::new(4);

    assert_eq!(
        frame.resolve(&mut cache).unwrap_err(),
        TransportError::UnknownBuffer(7)
    );
}

#[test]
fn evicted_buffer_no_longer_resolves() {
    let mut cache = SharedBufferCache::new(1);
    cache.insert(1, vec![1u8; 16]);
    cache.insert(2, vec![2u8; 16]);

    let stale = PreviewFrame::shared(header(2, 2), 1);
    let live = PreviewFrame::shared(header(2, 2), 2);

    assert_eq!(
        stale.resolve(&mut cache).unwrap_err(),
        TransportError::UnknownBuffer(1)
    );
    assert_eq!(live.resolve(&mut cache).unwrap(), &[2u8; 16][..]);
}
