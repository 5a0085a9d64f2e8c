//! Palette construction for the indexed PNG path.
//!
//! Candidates come straight from the exact histogram, ranked by occurrence
//! count, then thinned by merging near-identical colors until the slot budget
//! fits. The approach favors the colors the image actually uses most over a
//! perceptually even spread, which suits animation frames where large flat
//! regions dominate.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use rgb::RGBA;

use crate::histogram::{canonicalize, pack_argb, unpack_argb, ColorHistogram};

/// Minimum occurrence count for palette candidacy on large canvases.
const INCLUDE_THRESH: u32 = 4;
/// Below this count a candidate is appended unsorted instead of
/// insertion-sorted; rare colors are not worth the linear scan.
const SORT_THRESH: u32 = 10;
/// Canvases smaller than this admit every color seen even once.
const SMALL_CANVAS: u64 = 16384;

/// Palette slot budget for a quality setting, or `None` when the session
/// should stay truecolor.
///
/// Low quality always forces a palette. The 0.5..=0.75 band opts in only
/// when the significant-color estimate says 256 slots can cover the image
/// without unacceptable loss.
pub(crate) fn palette_limit(quality: f32, significant_colors: u32) -> Option<u32> {
    if quality <= 0.5 {
        let limit = (512.0 * quality as f64).round() as u32;
        // 13 slots is enough for 12 colors plus the transparent pixel.
        Some(limit.max(13))
    } else if quality <= 0.75 && significant_colors as f64 <= 350.0 * (0.75 / quality as f64) {
        Some(256)
    } else {
        None
    }
}

/// An ordered color table with exact-match lookup and a recycle target.
#[derive(Debug)]
pub struct Palette {
    /// Packed ARGB, in table order.
    entries: Vec<u32>,
    exact: BTreeSet<u32>,
    /// First entry with alpha 0, the target for recycled pixels.
    transparent_index: Option<u8>,
}

impl Palette {
    pub fn build(
        hist: &ColorHistogram,
        limit: u32,
        width: u32,
        height: u32,
        frame_count: u32,
    ) -> Palette {
        let include_thresh = if (width as u64 * height as u64) < SMALL_CANVAS {
            1
        } else {
            INCLUDE_THRESH
        };

        // (packed color, count), kept in descending count order for the
        // sorted head of the list.
        let mut candidates: Vec<(u32, u32)> = Vec::new();

        // Movie-style animations depend on a transparent entry existing for
        // recycling, so it is seeded at unbeatable priority.
        let seeded = frame_count > 1;
        if seeded {
            candidates.push((0x0000_0000, 0x7FFF_FFFF));
        }

        for (color, count) in hist.iter_exact() {
            if count < include_thresh || (seeded && color == 0) {
                continue;
            }
            if count > SORT_THRESH {
                let pos = candidates
                    .iter()
                    .position(|&(_, c)| count > c)
                    .unwrap_or(candidates.len());
                candidates.insert(pos, (color, count));
            } else {
                candidates.push((color, count));
            }
        }

        reduce(&mut candidates, limit as usize);
        candidates.truncate(limit as usize);

        let entries: Vec<u32> = candidates.into_iter().map(|(color, _)| color).collect();
        let exact = entries.iter().copied().collect();
        let transparent_index = entries
            .iter()
            .position(|&color| color >> 24 == 0)
            .map(|i| i as u8);

        Palette {
            entries,
            exact,
            transparent_index,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Packed ARGB entries in table order.
    pub(crate) fn entries(&self) -> &[u32] {
        &self.entries
    }

    pub fn transparent_index(&self) -> Option<u8> {
        self.transparent_index
    }

    /// Whether the exact color is in the table. Exact hits skip dithering.
    pub(crate) fn contains_exact(&self, px: RGBA<u8>) -> bool {
        self.exact.contains(&pack_argb(px))
    }

    /// Nearest entry by Manhattan distance over (A,R,G,B). Ties go to the
    /// earlier (higher-priority) entry.
    pub(crate) fn nearest(&self, px: RGBA<u8>) -> (u8, RGBA<u8>) {
        let px = canonicalize(px);
        let mut best = 0usize;
        let mut best_dif = u32::MAX;
        for (i, &packed) in self.entries.iter().enumerate() {
            let entry = unpack_argb(packed);
            let dif = manhattan(px, entry);
            if dif < best_dif {
                best_dif = dif;
                best = i;
            }
        }
        (best as u8, unpack_argb(self.entries[best]))
    }
}

#[inline]
pub(crate) fn manhattan(a: RGBA<u8>, b: RGBA<u8>) -> u32 {
    (a.r as i32 - b.r as i32).unsigned_abs()
        + (a.g as i32 - b.g as i32).unsigned_abs()
        + (a.b as i32 - b.b as i32).unsigned_abs()
        + (a.a as i32 - b.a as i32).unsigned_abs()
}

/// Merge candidates into earlier, higher-ranked ones within an expanding
/// Chebyshev box until the list fits the budget. The window stops growing at
/// 8; past that the list is truncated as-is.
fn reduce(candidates: &mut Vec<(u32, u32)>, limit: usize) {
    let mut zdif = 1u8;
    while candidates.len() > limit && zdif <= 8 {
        let mut i = 0;
        'pass: while i < candidates.len() {
            let keeper = unpack_argb(candidates[i].0);
            let mut j = i + 1;
            while j < candidates.len() {
                if within_box(keeper, unpack_argb(candidates[j].0), zdif) {
                    candidates.remove(j);
                    if candidates.len() <= limit {
                        break 'pass;
                    }
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        zdif += 1;
    }
}

#[inline]
fn within_box(a: RGBA<u8>, b: RGBA<u8>, zdif: u8) -> bool {
    let z = zdif as i32;
    (a.r as i32 - b.r as i32).abs() <= z
        && (a.g as i32 - b.g as i32).abs() <= z
        && (a.b as i32 - b.b as i32).abs() <= z
        && (a.a as i32 - b.a as i32).abs() <= z
}
