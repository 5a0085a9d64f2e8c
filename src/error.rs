use alloc::string::String;

use thiserror::Error;

use crate::SourceFormat;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodeError {
    #[error("canvas dimensions cannot be zero")]
    ZeroDimension,

    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch {
        len: usize,
        width: u32,
        height: u32,
    },

    #[error("quality must be between 0.0 and 1.0, got {0}")]
    InvalidQuality(f32),

    #[error("no frames to encode")]
    NoFrames,

    #[error("still-image source cannot provide {0:?} bitstreams")]
    UnsupportedFormat(SourceFormat),

    #[error("malformed still-image bitstream: {0}")]
    MalformedBitstream(&'static str),

    #[error("container length exceeds the 32-bit field range")]
    SizeOverflow,

    #[error("still-image encoder failed: {0}")]
    Backend(String),
}
