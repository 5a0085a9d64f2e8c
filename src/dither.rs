//! Ordered-dither masks and the shared channel rounding rule.
//!
//! Two precomputed boolean masks cover the whole canvas at one bool per
//! channel octet: a half-density checkerboard for values near the midpoint of
//! a quantization step, and a quarter-density staggered pattern for values in
//! the outer bands. The patterns are position-based and deterministic, so the
//! same input always dithers the same way.

use alloc::vec::Vec;

/// Per-canvas dither masks, one bool per channel octet (width*height*4).
///
/// Building the masks is the only expensive part, so callers keep one
/// instance around and rebuild only when the canvas dimensions change.
#[derive(Debug)]
pub struct DitherMasks {
    width: u32,
    height: u32,
    half: Vec<bool>,
    fourth: Vec<bool>,
}

impl DitherMasks {
    /// Return masks for the given dimensions, rebuilding the cached set only
    /// on a dimension change. 10x20 and 20x10 have equal mask sizes but
    /// different patterns, so the key is (width, height), not the length.
    pub fn ensure(slot: &mut Option<DitherMasks>, width: u32, height: u32) -> &DitherMasks {
        if let Some(masks) = slot {
            if masks.width != width || masks.height != height {
                *slot = None;
            }
        }
        slot.get_or_insert_with(|| DitherMasks::build(width, height))
    }

    fn build(width: u32, height: u32) -> DitherMasks {
        let len = width as usize * height as usize * 4;
        let mut half = Vec::with_capacity(len);
        let mut fourth = Vec::with_capacity(len);

        // The half mask staggers channels [d, !d, d, !d] so artifacting on
        // adjacent channels lands on different pixels. The toggle repeats per
        // row when the width is even, which would otherwise produce columns
        // instead of checkers.
        let even_width = width % 2 == 0;
        let mut d = true;
        for y in 0..height {
            for x in 0..width {
                half.push(d);
                half.push(!d);
                half.push(d);
                half.push(!d);
                for c in 0..4u32 {
                    fourth.push(fourth_pattern(x + c, y + 3 - c));
                }
                d = !d;
            }
            if even_width {
                d = !d;
            }
        }

        DitherMasks {
            width,
            height,
            half,
            fourth,
        }
    }

    /// Half-density bit for a channel octet index into the RGBA buffer.
    #[inline]
    pub fn half(&self, octet: usize) -> bool {
        self.half[octet]
    }

    /// Quarter-density bit for a channel octet index.
    #[inline]
    pub fn fourth(&self, octet: usize) -> bool {
        self.fourth[octet]
    }
}

/// Quarter-density pattern: true on two of every sixteen cells, staggered so
/// consecutive rows never light the same column.
#[inline]
fn fourth_pattern(x: u32, y: u32) -> bool {
    (y % 4 == 2 && x % 4 == 0) || (y % 4 == 0 && x % 4 == 2)
}

/// Positional half-density bit used by the palette path, which dithers whole
/// pixels rather than individual channel octets.
#[inline]
pub(crate) fn positional_half(x: u32, y: u32) -> bool {
    (x + y) % 2 == 0
}

/// Positional quarter-density bit for the palette path.
#[inline]
pub(crate) fn positional_fourth(x: u32, y: u32) -> bool {
    fourth_pattern(x, y)
}

/// Reduce one channel value onto the step grid defined by `inc` and `keep`
/// (`keep` masks off the bits below one step). The fractional position within
/// the step picks the rounding strategy:
///
/// - middle band (0.375, 0.625): half-density bit decides;
/// - low band (0.125, 0.375]: quarter-density bit (sparse ceiling);
/// - high band [0.625, 0.875): inverted quarter-density bit (sparse floor);
/// - outer bands: plain arithmetic rounding.
///
/// The sum can reach 0x100 when rounding up from the top step, so the result
/// is clamped to 0xFF rather than masked.
#[inline]
pub(crate) fn reduce_channel(value: u8, inc: u16, keep: u8, half: bool, fourth: bool) -> u8 {
    let frac = (value as u16 % inc) as f32 / inc as f32;
    let round_up = if frac > 0.375 && frac < 0.625 {
        half
    } else if frac > 0.125 && frac <= 0.375 {
        fourth
    } else if (0.625..0.875).contains(&frac) {
        !fourth
    } else {
        frac >= 0.5
    };

    let mut out = (value & keep) as u16;
    if round_up {
        out += inc;
    }
    if out > 0xFF {
        0xFF
    } else {
        out as u8
    }
}
