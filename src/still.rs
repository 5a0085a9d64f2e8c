//! Collaborator boundaries: the per-frame still-image encoder and the
//! generic zlib compressor.
//!
//! The animated pipeline never encodes pixels itself. It hands each frame to
//! a [`StillEncoder`] and re-packs what comes back, and it deflates indexed
//! scanlines through a [`Compressor`]. Both seams are traits so hosts can
//! plug in whatever implementation the platform provides.

use alloc::vec::Vec;

use rgb::RGBA;

use crate::error::EncodeError;
use crate::{Fitting, ImageData, SourceFormat};

/// Produces standalone still images, one per frame.
pub trait StillEncoder {
    /// Whether this backend can emit the given bitstream format. A pure
    /// capability query; callers must pick a supported format before
    /// encoding starts.
    fn supports(&self, format: SourceFormat) -> bool;

    /// Draw a source image onto a canvas of the session dimensions.
    fn render(
        &mut self,
        image: &ImageData,
        width: u32,
        height: u32,
        fitting: Fitting,
    ) -> Vec<RGBA<u8>>;

    /// Encode a pixel buffer as a complete still-image file.
    fn encode(
        &mut self,
        pixels: &[RGBA<u8>],
        width: u32,
        height: u32,
        format: SourceFormat,
        quality: f32,
    ) -> Result<Vec<u8>, EncodeError>;
}

/// Zlib-wrapped DEFLATE for indexed PNG frames.
///
/// Presence of a compressor is what unlocks the palette path; without one
/// the session stays truecolor, which is a policy fallback, not an error.
pub trait Compressor {
    fn deflate(&mut self, data: &[u8]) -> Result<Vec<u8>, EncodeError>;
}

/// [`Compressor`] backed by the flate2 crate at maximum compression.
#[cfg(feature = "flate2")]
#[derive(Debug, Default)]
pub struct Flate2Compressor;

#[cfg(feature = "flate2")]
impl Compressor for Flate2Compressor {
    fn deflate(&mut self, data: &[u8]) -> Result<Vec<u8>, EncodeError> {
        use alloc::string::ToString;
        use std::io::Write;

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
        encoder
            .write_all(data)
            .and_then(|_| encoder.finish())
            .map_err(|e| EncodeError::Backend(e.to_string()))
    }
}

#[cfg(all(test, feature = "flate2"))]
mod tests {
    use super::*;

    #[test]
    fn deflate_round_trips() {
        use std::io::Read;

        let data = b"scanline data scanline data scanline data";
        let compressed = Flate2Compressor.deflate(data).unwrap();
        assert!(compressed.len() < data.len());

        let mut decoder = flate2::read::ZlibDecoder::new(compressed.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn zlib_header_present() {
        // 0x78 is the zlib CMF byte for 32K windows; raw deflate would not
        // have it and PNG decoders would reject the stream.
        let compressed = Flate2Compressor.deflate(b"x").unwrap();
        assert_eq!(compressed[0], 0x78);
    }
}
