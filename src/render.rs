//! Per-frame rendering: palette index mapping, inter-frame pixel recycling,
//! and wrapping each frame's bitstream into container-ready payload chunks.
//!
//! Movie-style sessions recycle pixels across frames: anything unchanged
//! since the previous frame (or locked because frame 0 had transparency
//! there) is emitted as fully transparent so the deflate or VP8 stage sees
//! long runs of nothing. Sprite-style sessions redraw every pixel and skip
//! all of this.

use alloc::vec::Vec;

use rgb::RGBA;

use crate::container::{push_chunk, Payload};
use crate::dither::{positional_fourth, positional_half, reduce_channel};
use crate::error::EncodeError;
use crate::extract::{png_idat_segments, webp_bitstream_chunk};
use crate::palette::{manhattan, Palette};
use crate::still::Compressor;

/// Palette-path dither step: 3 bits per channel.
const PALETTE_INC: u16 = 0x20;
const PALETTE_KEEP: u8 = 0xE0;
/// A dithered color must differ from the source by more than this Manhattan
/// distance to be worth matching instead of the exact color.
const DITHER_ACCEPT_THRESH: u32 = 48;

const TRANSPARENT: RGBA<u8> = RGBA {
    r: 0,
    g: 0,
    b: 0,
    a: 0,
};

/// Inter-frame state for movie-style recycling, reset per encode.
#[derive(Debug, Default)]
pub(crate) struct RecycleState {
    /// What a decoder has on the canvas after the previous frame.
    prev: Vec<RGBA<u8>>,
    /// Pixels that had transparency on frame 0 and must stay untouched.
    locks: Vec<bool>,
}

impl RecycleState {
    pub fn reset(&mut self, pixel_count: usize) {
        self.prev.clear();
        self.prev.resize(pixel_count, TRANSPARENT);
        self.locks.clear();
        self.locks.resize(pixel_count, false);
    }
}

/// Append an fcTL chunk and advance the shared sequence counter.
fn push_fctl(
    out: &mut Vec<u8>,
    seq: &mut u32,
    width: u32,
    height: u32,
    delay_ms: u32,
    movie: bool,
) {
    let mut data = [0u8; 26];
    data[..4].copy_from_slice(&seq.to_be_bytes());
    data[4..8].copy_from_slice(&width.to_be_bytes());
    data[8..12].copy_from_slice(&height.to_be_bytes());
    // x and y stay 0: frames always cover the whole canvas.
    data[20..22].copy_from_slice(&(delay_ms.min(0xFFFF) as u16).to_be_bytes());
    data[22..24].copy_from_slice(&1000u16.to_be_bytes());
    if movie {
        data[24] = 0; // dispose: none
        data[25] = 1; // blend: over
    } else {
        data[24] = 1; // dispose: background
        data[25] = 0; // blend: source
    }
    push_chunk(out, b"fcTL", &data);
    *seq += 1;
}

/// Append an fdAT chunk carrying the next sequence number.
fn push_fdat(out: &mut Vec<u8>, seq: &mut u32, data: &[u8]) -> Result<(), EncodeError> {
    if data.len() as u64 + 4 > u32::MAX as u64 {
        return Err(EncodeError::SizeOverflow);
    }
    let mut body = Vec::with_capacity(4 + data.len());
    body.extend_from_slice(&seq.to_be_bytes());
    body.extend_from_slice(data);
    push_chunk(out, b"fdAT", &body);
    *seq += 1;
    Ok(())
}

/// Map one pixel to its palette index, applying locks, dithering, and
/// movie-style recycling. Mutates the pixel so later comparisons see the
/// color a decoder would actually show.
#[allow(clippy::too_many_arguments)]
fn palette_index(
    px: &mut RGBA<u8>,
    i: usize,
    x: u32,
    y: u32,
    frame_index: u32,
    movie: bool,
    palette: &Palette,
    state: &mut RecycleState,
) -> u8 {
    let transparent = palette.transparent_index().unwrap_or(0);

    if movie && frame_index > 0 && state.locks[i] {
        *px = TRANSPARENT;
        return transparent;
    }

    let mut target = *px;
    if !palette.contains_exact(target) {
        let half = positional_half(x, y);
        let fourth = positional_fourth(x, y);
        let dithered = RGBA {
            r: reduce_channel(px.r, PALETTE_INC, PALETTE_KEEP, half, fourth),
            g: reduce_channel(px.g, PALETTE_INC, PALETTE_KEEP, half, fourth),
            b: reduce_channel(px.b, PALETTE_INC, PALETTE_KEEP, half, fourth),
            a: reduce_channel(px.a, PALETTE_INC, PALETTE_KEEP, half, fourth),
        };
        // Small errors match better against the exact color; only a real
        // step change is worth dithering toward.
        if manhattan(*px, dithered) > DITHER_ACCEPT_THRESH {
            target = dithered;
        }
    }

    let (index, chosen) = palette.nearest(target);
    if movie {
        if frame_index > 0 {
            if chosen == state.prev[i] {
                return transparent;
            }
            state.prev[i] = chosen;
        } else {
            state.locks[i] = chosen.a < 0xFF;
            *px = chosen;
        }
    }
    index
}

/// Render one frame on the indexed PNG path: map pixels to indices,
/// serialize scanlines, deflate, and wrap as fcTL + IDAT/fdAT.
#[allow(clippy::too_many_arguments)]
pub(crate) fn indexed_payload(
    pixels: &mut [RGBA<u8>],
    width: u32,
    height: u32,
    frame_index: u32,
    frame_count: u32,
    movie: bool,
    delay_ms: u32,
    palette: &Palette,
    state: &mut RecycleState,
    seq: &mut u32,
    compressor: &mut dyn Compressor,
) -> Result<Payload, EncodeError> {
    // One filter-mode byte (0: none) leads every scanline.
    let mut indices = Vec::with_capacity((width as usize + 1) * height as usize);
    for y in 0..height {
        indices.push(0);
        for x in 0..width {
            let i = y as usize * width as usize + x as usize;
            indices.push(palette_index(
                &mut pixels[i],
                i,
                x,
                y,
                frame_index,
                movie,
                palette,
                state,
            ));
        }
    }
    if frame_index == 0 {
        // Snapshot what was actually drawn, palette-mapped, for the next
        // frame's comparisons.
        state.prev.clear();
        state.prev.extend_from_slice(pixels);
    }

    let deflated = compressor.deflate(&indices)?;

    let mut bytes = Vec::new();
    if frame_count > 1 {
        push_fctl(&mut bytes, seq, width, height, delay_ms, movie);
    }
    if frame_index == 0 {
        if deflated.len() as u64 > u32::MAX as u64 {
            return Err(EncodeError::SizeOverflow);
        }
        push_chunk(&mut bytes, b"IDAT", &deflated);
    } else {
        push_fdat(&mut bytes, seq, &deflated)?;
    }
    Ok(Payload { bytes, delay_ms })
}

/// Movie-style recycling for the truecolor PNG path, after quantization.
pub(crate) fn recycle_direct(
    pixels: &mut [RGBA<u8>],
    frame_index: u32,
    movie: bool,
    state: &mut RecycleState,
) {
    if frame_index == 0 {
        for (i, px) in pixels.iter().enumerate() {
            state.locks[i] = movie && px.a < 0xFF;
        }
        state.prev.clear();
        state.prev.extend_from_slice(pixels);
        return;
    }
    if !movie {
        return;
    }
    for (i, px) in pixels.iter_mut().enumerate() {
        if state.locks[i] || *px == state.prev[i] {
            *px = TRANSPARENT;
        } else {
            state.prev[i] = *px;
        }
    }
}

/// Wrap a still PNG's image data for the animated container: frame 0 keeps
/// its IDAT chunks, later frames are retagged as fdAT with fresh CRCs.
#[allow(clippy::too_many_arguments)]
pub(crate) fn png_payload(
    stream: &[u8],
    width: u32,
    height: u32,
    frame_index: u32,
    frame_count: u32,
    movie: bool,
    delay_ms: u32,
    seq: &mut u32,
) -> Result<Payload, EncodeError> {
    let segments = png_idat_segments(stream)?;

    let mut bytes = Vec::new();
    if frame_count > 1 {
        push_fctl(&mut bytes, seq, width, height, delay_ms, movie);
    }
    for segment in segments {
        if frame_index == 0 {
            push_chunk(&mut bytes, b"IDAT", segment);
        } else {
            push_fdat(&mut bytes, seq, segment)?;
        }
    }
    Ok(Payload { bytes, delay_ms })
}

/// Extract the VP8/VP8L bitstream chunk of a still WebP, verbatim.
pub(crate) fn webp_payload(stream: &[u8], delay_ms: u32) -> Result<Payload, EncodeError> {
    let chunk = webp_bitstream_chunk(stream)?;
    Ok(Payload {
        bytes: chunk.to_vec(),
        delay_ms,
    })
}
