//! Wire format for preview bitmaps.
//!
//! A frame is a fixed five-field little-endian header followed by the pixel
//! payload, either inline in the stream or referenced by a 32-bit shared
//! buffer key when a shared segment is available on both sides.

use crate::cache::SharedBufferCache;
use crate::error::TransportError;

/// Encoded size of [`ImageHeader`]: five `u32` fields.
pub const HEADER_LEN: usize = 20;

/// Image metadata preceding the pixel bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Total pixel payload size. Always `bytes_per_line * height`.
    pub byte_count: u32,
    pub bytes_per_line: u32,
    pub width: u32,
    pub height: u32,
    /// Opaque pixel format id, passed through to the consumer.
    pub pixel_format: u32,
}

impl ImageHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        for (slot, field) in [
            self.byte_count,
            self.bytes_per_line,
            self.width,
            self.height,
            self.pixel_format,
        ]
        .iter()
        .enumerate()
        {
            out[slot * 4..slot * 4 + 4].copy_from_slice(&field.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        if bytes.len() < HEADER_LEN {
            return Err(TransportError::UnexpectedEof {
                need: HEADER_LEN,
                have: bytes.len(),
            });
        }
        let field = |slot: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[slot * 4..slot * 4 + 4]);
            u32::from_le_bytes(buf)
        };
        let header = ImageHeader {
            byte_count: field(0),
            bytes_per_line: field(1),
            width: field(2),
            height: field(3),
            pixel_format: field(4),
        };
        if u64::from(header.byte_count)
            != u64::from(header.bytes_per_line) * u64::from(header.height)
        {
            return Err(TransportError::InconsistentHeader {
                byte_count: header.byte_count,
                bytes_per_line: header.bytes_per_line,
                height: header.height,
            });
        }
        Ok(header)
    }
}

/// Where a frame's pixels live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelSource {
    /// Pixels follow the header in the stream.
    Inline(Vec<u8>),
    /// Pixels sit in a shared buffer under this key; only the key travels.
    Shared(u32),
}

const TAG_INLINE: u8 = 0;
const TAG_SHARED: u8 = 1;

/// One rendered preview bitmap in transit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub header: ImageHeader,
    pub source: PixelSource,
}

impl PreviewFrame {
    /// A frame carrying its pixels inline. The header's byte count must
    /// match the payload.
    pub fn inline(header: ImageHeader, pixels: Vec<u8>) -> Result<Self, TransportError> {
        if pixels.len() != header.byte_count as usize {
            return Err(TransportError::PixelCountMismatch {
                declared: header.byte_count,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            header,
            source: PixelSource::Inline(pixels),
        })
    }

    /// A frame whose pixels travel through a shared buffer.
    pub fn shared(header: ImageHeader, key: u32) -> Self {
        Self {
            header,
            source: PixelSource::Shared(key),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + 1 + 4);
        out.extend_from_slice(&self.header.encode());
        match &self.source {
            PixelSource::Inline(pixels) => {
                out.push(TAG_INLINE);
                out.extend_from_slice(pixels);
            }
            PixelSource::Shared(key) => {
                out.push(TAG_SHARED);
                out.extend_from_slice(&key.to_le_bytes());
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        let header = ImageHeader::decode(bytes)?;
        let rest = &bytes[HEADER_LEN..];
        let (&tag, payload) = rest.split_first().ok_or(TransportError::UnexpectedEof {
            need: HEADER_LEN + 1,
            have: bytes.len(),
        })?;
        match tag {
            TAG_INLINE => {
                if payload.len() != header.byte_count as usize {
                    return Err(TransportError::PixelCountMismatch {
                        declared: header.byte_count,
                        actual: payload.len(),
                    });
                }
                Ok(Self {
                    header,
                    source: PixelSource::Inline(payload.to_vec()),
                })
            }
            TAG_SHARED => {
                if payload.len() < 4 {
                    return Err(TransportError::UnexpectedEof {
                        need: HEADER_LEN + 1 + 4,
                        have: bytes.len(),
                    });
                }
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&payload[..4]);
                Ok(Self {
                    header,
                    source: PixelSource::Shared(u32::from_le_bytes(buf)),
                })
            }
            other => Err(TransportError::UnknownTag(other)),
        }
    }

    /// The pixel bytes, fetching shared frames from `cache`. A cache hit
    /// counts as a use for eviction ordering.
    pub fn resolve<'a>(
        &'a self,
        cache: &'a mut SharedBufferCache,
    ) -> Result<&'a [u8], TransportError> {
        match &self.source {
            PixelSource::Inline(pixels) => Ok(pixels),
            PixelSource::Shared(key) => cache
                .get(*key)
                .ok_or(TransportError::UnknownBuffer(*key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(width: u32, height: u32) -> ImageHeader {
        ImageHeader {
            byte_count: width * 4 * height,
            bytes_per_line: width * 4,
            width,
            height,
            pixel_format: 5,
        }
    }

    #[test]
    fn header_round_trips_little_endian() {
        let h = header(3, 2);
        let bytes = h.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..4], &24u32.to_le_bytes());
        assert_eq!(ImageHeader::decode(&bytes).unwrap(), h);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let bytes = header(1, 1).encode();
        assert_eq!(
            ImageHeader::decode(&bytes[..7]),
            Err(TransportError::UnexpectedEof { need: 20, have: 7 })
        );
    }

    #[test]
    fn inconsistent_byte_count_is_rejected() {
        let mut h = header(2, 2);
        h.byte_count += 1;
        assert!(matches!(
            ImageHeader::decode(&h.encode()),
            Err(TransportError::InconsistentHeader { .. })
        ));
    }

    #[test]
    fn inline_frame_round_trips() {
        let h = header(2, 1);
        let frame = PreviewFrame::inline(h, vec![7; 8]).unwrap();
        assert_eq!(PreviewFrame::decode(&frame.encode()).unwrap(), frame);
    }

    #[test]
    fn shared_frame_carries_only_the_key() {
        let frame = PreviewFrame::shared(header(100, 100), 42);
        let bytes = frame.encode();
        assert_eq!(bytes.len(), HEADER_LEN + 1 + 4);
        assert_eq!(PreviewFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn short_inline_payload_is_rejected() {
        let h = header(2, 1);
        assert_eq!(
            PreviewFrame::inline(h, vec![0; 3]),
            Err(TransportError::PixelCountMismatch {
                declared: 8,
                actual: 3
            })
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut bytes = PreviewFrame::shared(header(1, 1), 9).encode();
        bytes[HEADER_LEN] = 7;
        assert_eq!(
            PreviewFrame::decode(&bytes),
            Err(TransportError::UnknownTag(7))
        );
    }
}
