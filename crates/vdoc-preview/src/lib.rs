//! Wire format for preview frames.
//!
//! A frame is a fixed-size image header followed by its pixels, which travel
//! either inline in the stream or as a key into a [`SharedBufferCache`] the
//! receiver maintains out of band.

pub mod cache;
pub mod codec;
pub mod error;

pub use cache::SharedBufferCache;
pub use codec::{HEADER_LEN, ImageHeader, PixelSource, PreviewFrame};
pub use error::TransportError;
