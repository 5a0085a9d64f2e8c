//! Pulls the compressed image data back out of a still encoder's output.
//!
//! The still-image boundary hands back complete files (a whole PNG or WebP),
//! but the animated container only wants the compressed bitstream inside.
//! PNG frames keep their IDAT data for re-wrapping as IDAT or fdAT; WebP
//! frames contribute their VP8/VP8L subchunk verbatim.

use alloc::vec::Vec;

use crate::error::EncodeError;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Data slices of the contiguous IDAT run in a PNG stream, in order.
///
/// Encoders may split the bitstream across several IDAT chunks; they must be
/// back to back, so the walk stops at the first non-IDAT chunk after the run
/// begins.
pub(crate) fn png_idat_segments(stream: &[u8]) -> Result<Vec<&[u8]>, EncodeError> {
    if stream.len() < 8 || stream[..8] != PNG_SIGNATURE {
        return Err(EncodeError::MalformedBitstream("missing PNG signature"));
    }
    let mut segments = Vec::new();
    let mut pos = 8usize;
    while pos + 12 <= stream.len() {
        let len = u32::from_be_bytes([
            stream[pos],
            stream[pos + 1],
            stream[pos + 2],
            stream[pos + 3],
        ]) as usize;
        let Some(end) = pos.checked_add(12 + len).filter(|&e| e <= stream.len()) else {
            return Err(EncodeError::MalformedBitstream("chunk overruns stream"));
        };
        if &stream[pos + 4..pos + 8] == b"IDAT" {
            segments.push(&stream[pos + 8..pos + 8 + len]);
        } else if !segments.is_empty() {
            break;
        }
        pos = end;
    }
    if segments.is_empty() {
        return Err(EncodeError::MalformedBitstream("no IDAT chunk found"));
    }
    Ok(segments)
}

/// The first `VP8`-prefixed subchunk of a WebP file, headers included.
///
/// The returned slice starts at the subchunk FourCC and covers the 4-byte
/// little-endian length plus the payload, ready to drop into an ANMF or
/// directly after VP8X.
pub(crate) fn webp_bitstream_chunk(stream: &[u8]) -> Result<&[u8], EncodeError> {
    if stream.len() < 12 || &stream[..4] != b"RIFF" || &stream[8..12] != b"WEBP" {
        return Err(EncodeError::MalformedBitstream("missing RIFF/WEBP header"));
    }
    let mut pos = 12usize;
    while pos + 8 <= stream.len() {
        let len = u32::from_le_bytes([
            stream[pos + 4],
            stream[pos + 5],
            stream[pos + 6],
            stream[pos + 7],
        ]) as usize;
        let Some(end) = pos.checked_add(8 + len).filter(|&e| e <= stream.len()) else {
            return Err(EncodeError::MalformedBitstream("subchunk overruns stream"));
        };
        if stream[pos..pos + 4].starts_with(b"VP8") {
            return Ok(&stream[pos..end]);
        }
        // RIFF pads odd-sized chunks with one byte.
        pos = end + (len & 1);
    }
    Err(EncodeError::MalformedBitstream("no VP8 bitstream found"))
}
