//! Direct-color bit-depth reduction for the truecolor PNG path.
//!
//! Quality maps to one of nine reduction levels. Level 0 is lossless
//! passthrough; level k zeroes the low k bits of every channel and rounds the
//! lost fraction back in with ordered dithering. Only pixels rare enough in
//! the session histogram get reduced, so large flat areas keep their exact
//! color while noisy regions give up precision the deflate stage can exploit.

use rgb::RGBA;

use crate::dither::{reduce_channel, DitherMasks};
use crate::histogram::ColorHistogram;

/// Additive step per reduction level. Level 8 steps by 0x100, so a channel
/// either floors to 0 or saturates to 0xFF.
const QUANT_INC: [u16; 9] = [
    0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x100,
];

/// Bits kept per reduction level.
const QUANT_MASK: [u8; 9] = [0xFF, 0xFE, 0xFC, 0xF8, 0xF0, 0xE0, 0xC0, 0x80, 0x00];

/// Quality to reduction level. The ranges widen toward the low end where
/// each extra bit dropped costs much more visual quality.
pub(crate) fn quant_level(quality: f32) -> usize {
    let mut level = 0;
    if quality < 1.0 {
        level = 1;
    }
    if quality <= 0.9 {
        level = 2;
    }
    if quality <= 0.8 {
        level = 3;
    }
    if quality <= 0.7 {
        level = 4;
    }
    if quality <= 0.5 {
        level = 5;
    }
    if quality <= 0.3 {
        level = 6;
    }
    if quality <= 0.1 {
        level = 7;
    }
    if quality <= 0.0 {
        level = 8;
    }
    level
}

/// Occurrence count below which a pixel qualifies for reduction. Frequent
/// colors are assumed deliberate and kept exact.
pub(crate) fn quant_thresh(width: u32, height: u32, frame_count: u32, quality: f32) -> f64 {
    width as f64 * height as f64 * frame_count as f64 * 0.001 * (1.0 - quality as f64)
}

/// Reduce a frame's pixel buffer in place. No-op at level 0.
pub(crate) fn quantize(
    pixels: &mut [RGBA<u8>],
    hist: &ColorHistogram,
    masks: &DitherMasks,
    quality: f32,
    thresh: f64,
) {
    let level = quant_level(quality);
    if level == 0 {
        return;
    }
    let inc = QUANT_INC[level];
    let keep = QUANT_MASK[level];

    for (i, px) in pixels.iter_mut().enumerate() {
        if (hist.count(*px) as f64) >= thresh {
            continue;
        }
        let base = i * 4;
        px.r = reduce_channel(px.r, inc, keep, masks.half(base), masks.fourth(base));
        px.g = reduce_channel(px.g, inc, keep, masks.half(base + 1), masks.fourth(base + 1));
        px.b = reduce_channel(px.b, inc, keep, masks.half(base + 2), masks.fourth(base + 2));
        px.a = reduce_channel(px.a, inc, keep, masks.half(base + 3), masks.fourth(base + 3));
    }
}
