//! Session-wide color histogram.
//!
//! Counts exact (A,R,G,B) occurrences across every frame of an encode, plus a
//! coarsened 20-bit bucket table used only to estimate how many *significant*
//! colors the animation has. The significant-color estimate decides whether a
//! palette can represent the session without unacceptable loss; the exact
//! counts gate per-pixel quantization and rank palette candidates.

use alloc::collections::BTreeMap;

/// Fraction of total session pixels a color must reach to count as significant.
const SIGNIFICANCE_FACTOR: f64 = 0.0004;

/// Pack (A,R,G,B) into one key. Fully transparent pixels are canonicalized to
/// 0x00000000 before packing so every transparent pixel lands in one bucket.
#[inline]
pub(crate) fn pack_argb(px: rgb::RGBA<u8>) -> u32 {
    let px = canonicalize(px);
    (px.a as u32) << 24 | (px.r as u32) << 16 | (px.g as u32) << 8 | px.b as u32
}

/// Inverse of [`pack_argb`].
#[inline]
pub(crate) fn unpack_argb(key: u32) -> rgb::RGBA<u8> {
    rgb::RGBA {
        r: (key >> 16) as u8,
        g: (key >> 8) as u8,
        b: key as u8,
        a: (key >> 24) as u8,
    }
}

#[inline]
pub(crate) fn canonicalize(px: rgb::RGBA<u8>) -> rgb::RGBA<u8> {
    if px.a == 0 {
        rgb::RGBA {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    } else {
        px
    }
}

/// 20-bit coarse bucket: each channel truncated to its top 5 bits.
#[inline]
fn coarse_key(px: rgb::RGBA<u8>) -> u32 {
    (px.a as u32 >> 3) << 15 | (px.r as u32 >> 3) << 10 | (px.g as u32 >> 3) << 5 | px.b as u32 >> 3
}

/// Exact and coarse color counts for one encode session.
#[derive(Debug)]
pub struct ColorHistogram {
    exact: BTreeMap<u32, u32>,
    coarse: BTreeMap<u32, u32>,
    unique_colors: u32,
    significant_colors: u32,
    significance_thresh: u32,
}

impl ColorHistogram {
    /// The significance threshold scales with the total pixel volume of the
    /// session, floored at 8 so tiny animations still filter noise.
    pub fn new(width: u32, height: u32, frame_count: u32) -> Self {
        let volume = width as f64 * height as f64 * frame_count as f64;
        let thresh = (volume * SIGNIFICANCE_FACTOR).round() as u32;
        Self {
            exact: BTreeMap::new(),
            coarse: BTreeMap::new(),
            unique_colors: 0,
            significant_colors: 0,
            significance_thresh: thresh.max(8),
        }
    }

    /// Count one pixel. Purely additive, no failure modes.
    pub fn increment(&mut self, px: rgb::RGBA<u8>) {
        let px = canonicalize(px);

        let coarse = self.coarse.entry(coarse_key(px)).or_insert(0);
        *coarse += 1;
        let coarse_count = *coarse;

        let count = self.exact.entry(pack_argb(px)).or_insert(0);
        if *count == 0 {
            self.unique_colors += 1;
        }
        *count += 1;
        // A color becomes significant exactly once, on the increment where
        // its exact count reaches the threshold and its coarse bucket has
        // too. The bucket aggregates every color it covers, so its count is
        // at least the exact count and the bucket check holds whenever the
        // exact check does.
        if *count == self.significance_thresh && coarse_count >= self.significance_thresh {
            self.significant_colors += 1;
        }
    }

    /// Exact occurrence count, 0 when the color was never seen.
    pub fn count(&self, px: rgb::RGBA<u8>) -> u32 {
        self.exact.get(&pack_argb(px)).copied().unwrap_or(0)
    }

    pub fn unique_colors(&self) -> u32 {
        self.unique_colors
    }

    pub fn significant_colors(&self) -> u32 {
        self.significant_colors
    }

    /// Iterate exact colors as (packed ARGB, count), in ascending key order.
    /// The deterministic order keeps palette construction reproducible.
    pub(crate) fn iter_exact(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.exact.iter().map(|(&k, &v)| (k, v))
    }
}
