//! First-pass parsers and token-stream rewrites.
//!
//! The greedy LZ77 and RLE parsers turn pixels into cache-free tokens with
//! raw distances. Later passes pick a colour cache size, fold cache hits
//! into the stream and finally re-express distances as 2D plane codes.

use alloc::vec::Vec;

use tracing::debug;

use super::color_cache::ColorCache;
use super::hash_chain::{find_match_length, MatchFinder};
use super::histogram::Histogram;
use super::types::{
    check_cache_bits, BackwardRefs, DistanceCoding, PixOrCopy, MAX_LENGTH, MIN_LENGTH,
};
use crate::encoder::error::{Vp8lError, Vp8lResult};

/// Distance code lookup table for 2D neighborhood.
/// Maps (xoffset, yoffset) pairs to distance codes 1-120.
#[rustfmt::skip]
const DISTANCE_MAP: [(i8, i8); 120] = [
    (0, 1),  (1, 0),  (1, 1),  (-1, 1), (0, 2),  (2, 0),  (1, 2),  (-1, 2),
    (2, 1),  (-2, 1), (2, 2),  (-2, 2), (0, 3),  (3, 0),  (1, 3),  (-1, 3),
    (3, 1),  (-3, 1), (2, 3),  (-2, 3), (3, 2),  (-3, 2), (0, 4),  (4, 0),
    (1, 4),  (-1, 4), (4, 1),  (-4, 1), (3, 3),  (-3, 3), (2, 4),  (-2, 4),
    (4, 2),  (-4, 2), (0, 5),  (3, 4),  (-3, 4), (4, 3),  (-4, 3), (5, 0),
    (1, 5),  (-1, 5), (5, 1),  (-5, 1), (2, 5),  (-2, 5), (5, 2),  (-5, 2),
    (4, 4),  (-4, 4), (3, 5),  (-3, 5), (5, 3),  (-5, 3), (0, 6),  (6, 0),
    (1, 6),  (-1, 6), (6, 1),  (-6, 1), (2, 6),  (-2, 6), (6, 2),  (-6, 2),
    (4, 5),  (-4, 5), (5, 4),  (-5, 4), (3, 6),  (-3, 6), (6, 3),  (-6, 3),
    (0, 7),  (7, 0),  (1, 7),  (-1, 7), (5, 5),  (-5, 5), (7, 1),  (-7, 1),
    (4, 6),  (-4, 6), (6, 4),  (-6, 4), (2, 7),  (-2, 7), (7, 2),  (-7, 2),
    (3, 7),  (-3, 7), (7, 3),  (-7, 3), (5, 6),  (-5, 6), (6, 5),  (-6, 5),
    (8, 0),  (4, 7),  (-4, 7), (7, 4),  (-7, 4), (8, 1),  (8, 2),  (6, 6),
    (-6, 6), (8, 3),  (5, 7),  (-5, 7), (7, 5),  (-7, 5), (8, 4),  (6, 7),
    (-6, 7), (7, 6),  (-7, 6), (8, 5),  (7, 7),  (-7, 7), (8, 6),  (8, 7)
];

/// Reverse lookup table: given (yoffset * 16 + 8 - xoffset), get distance code.
/// Only valid for xoffset in [0, 8] and yoffset in [0, 7].
#[rustfmt::skip]
const PLANE_TO_CODE_LUT: [u8; 128] = [
    96,  73,  55,  39,  23, 13, 5,  1,  255, 255, 255, 255, 255, 255, 255, 255,
    101, 78,  58,  42,  26, 16, 8,  2,  0,   3,   9,   17,  27,  43,  59,  79,
    102, 86,  62,  46,  32, 20, 10, 6,  4,   7,   11,  21,  33,  47,  63,  87,
    105, 90,  70,  52,  37, 28, 18, 14, 12,  15,  19,  29,  38,  53,  71,  91,
    110, 99,  82,  66,  48, 35, 30, 24, 22,  25,  31,  36,  49,  67,  83,  100,
    115, 108, 94,  76,  64, 50, 44, 40, 34,  41,  45,  51,  65,  77,  95,  109,
    118, 113, 103, 92,  80, 68, 60, 56, 54,  57,  61,  69,  81,  93,  104, 114,
    119, 116, 111, 106, 97, 88, 84, 74, 72,  75,  85,  89,  98,  107, 112, 117
];

/// Convert a linear distance to its plane code for an image `xsize` wide.
///
/// Codes 1..=120 address the 2D neighbourhood of the current pixel; larger
/// distances are shifted past them.
pub fn distance_to_plane_code(xsize: usize, dist: usize) -> u32 {
    let yoffset = dist / xsize;
    let xoffset = dist - yoffset * xsize;

    if xoffset <= 8 && yoffset < 8 {
        u32::from(PLANE_TO_CODE_LUT[yoffset * 16 + 8 - xoffset]) + 1
    } else if xoffset + 8 > xsize && yoffset < 7 {
        u32::from(PLANE_TO_CODE_LUT[(yoffset + 1) * 16 + 8 + (xsize - xoffset)]) + 1
    } else {
        (dist + 120) as u32
    }
}

/// Convert a plane code back to a linear distance; inverse of
/// [`distance_to_plane_code`] for the same width.
pub fn plane_code_to_distance(xsize: usize, code: u32) -> usize {
    if code > 120 {
        (code - 120) as usize
    } else {
        let (xoff, yoff) = DISTANCE_MAP[code.max(1) as usize - 1];
        let dist = xoff as i64 + yoff as i64 * xsize as i64;
        if dist < 1 {
            1
        } else {
            dist as usize
        }
    }
}

#[inline]
fn max_copy_length(remaining: usize) -> usize {
    remaining.min(MAX_LENGTH)
}

/// Greedy LZ77 parse with one step of look-ahead.
///
/// When a match is found, the pixels it covers are checked for a match
/// reaching further; the copy is cut short where such a match starts.
pub fn backward_references_lz77<M: MatchFinder>(
    argb: &[u32],
    finder: &M,
) -> Vp8lResult<BackwardRefs> {
    let pix_count = argb.len();
    let mut refs = BackwardRefs::try_with_capacity(pix_count / 2 + 1)?;

    let mut i = 0;
    while i < pix_count {
        let (offset, len_ini) = finder.find_copy(i);
        let mut len = 1;
        if len_ini >= MIN_LENGTH && i + len_ini >= pix_count {
            // Nothing lies beyond a match that ends the image.
            len = len_ini;
        } else if len_ini >= MIN_LENGTH {
            let j_max = i + len_ini;
            let mut max_reach = 0;
            for j in i + 1..=j_max {
                let len_j = finder.find_length(j);
                let reach = j + if len_j >= MIN_LENGTH { len_j } else { 1 };
                if reach > max_reach {
                    len = j - i;
                    max_reach = reach;
                    if max_reach >= pix_count {
                        break;
                    }
                }
            }
        }

        if len == 1 {
            refs.try_push(PixOrCopy::literal(argb[i]))?;
        } else {
            refs.try_push(PixOrCopy::copy(len as u16, offset as u32))?;
        }
        i += len;
    }

    Ok(refs)
}

/// Run-length parse: copies from the previous pixel or the row above,
/// literals elsewhere.
pub fn backward_references_rle(argb: &[u32], xsize: usize) -> Vp8lResult<BackwardRefs> {
    let pix_count = argb.len();
    let mut refs = BackwardRefs::try_with_capacity(pix_count / 2 + 1)?;
    if pix_count == 0 {
        return Ok(refs);
    }

    refs.try_push(PixOrCopy::literal(argb[0]))?;
    let mut i = 1;
    while i < pix_count {
        let max_len = max_copy_length(pix_count - i);
        let rle_len = find_match_length(&argb[i..], &argb[i - 1..], 0, max_len);
        let prev_row_len = if i < xsize {
            0
        } else {
            find_match_length(&argb[i..], &argb[i - xsize..], 0, max_len)
        };

        if rle_len >= prev_row_len && rle_len >= MIN_LENGTH {
            refs.try_push(PixOrCopy::copy(rle_len as u16, 1))?;
            i += rle_len;
        } else if prev_row_len >= MIN_LENGTH {
            refs.try_push(PixOrCopy::copy(prev_row_len as u16, xsize as u32))?;
            i += prev_row_len;
        } else {
            refs.try_push(PixOrCopy::literal(argb[i]))?;
            i += 1;
        }
    }

    Ok(refs)
}

/// Replace literals that hit a colour cache of `cache_bits` bits with
/// cache indices. `refs` must be cache-free.
pub fn with_local_cache(refs: &mut BackwardRefs, argb: &[u32], cache_bits: u8) -> Vp8lResult<()> {
    let Some(mut cache) = ColorCache::optional(cache_bits)? else {
        return Ok(());
    };

    let mut pos = 0usize;
    for token in refs.tokens.iter_mut() {
        match *token {
            PixOrCopy::Literal(argb_val) => {
                match cache.contains(argb_val) {
                    Some(idx) => *token = PixOrCopy::cache_idx(idx),
                    None => cache.insert(argb_val),
                }
                pos += 1;
            }
            PixOrCopy::Copy { len, .. } => {
                let end = pos + len as usize;
                let pixels = argb
                    .get(pos..end)
                    .ok_or(Vp8lError::InvalidReference { position: pos })?;
                for &p in pixels {
                    cache.insert(p);
                }
                pos = end;
            }
            PixOrCopy::CacheIdx(_) => return Err(Vp8lError::InvalidReference { position: pos }),
        }
    }
    Ok(())
}

/// Rewrite every copy distance of a raw-distance stream as its plane code.
pub fn apply_2d_locality(refs: &mut BackwardRefs, xsize: usize) {
    for token in refs.tokens.iter_mut() {
        if let PixOrCopy::Copy { dist, .. } = token {
            *dist = distance_to_plane_code(xsize, *dist as usize);
        }
    }
}

/// Pick the colour cache size, up to `cache_bits_max`, whose histogram
/// over a cache-free raw-distance stream estimates the fewest bits.
///
/// Low qualities skip the search and use no cache.
pub fn calculate_best_cache_size(
    argb: &[u32],
    xsize: usize,
    quality: u8,
    refs: &BackwardRefs,
    cache_bits_max: u8,
) -> Vp8lResult<u8> {
    check_cache_bits(cache_bits_max)?;
    if quality <= 25 || cache_bits_max == 0 || argb.is_empty() {
        return Ok(0);
    }

    let mut best_bits = 0u8;
    let mut best_entropy = u64::MAX;
    for bits in 0..=cache_bits_max {
        let histo = cache_histogram(argb, xsize, refs, bits)?;
        let entropy = histo.estimate_bits();
        if entropy < best_entropy {
            best_entropy = entropy;
            best_bits = bits;
        }
    }
    debug!(best_bits, best_entropy, cache_bits_max, "colour cache size chosen");
    Ok(best_bits)
}

/// Histogram of `refs` as it would be coded with a cache of `cache_bits`.
fn cache_histogram(
    argb: &[u32],
    xsize: usize,
    refs: &BackwardRefs,
    cache_bits: u8,
) -> Vp8lResult<Histogram> {
    let mut histo = Histogram::new(cache_bits)?;
    let mut cache = ColorCache::optional(cache_bits)?;

    let mut pos = 0usize;
    for token in refs.iter() {
        match *token {
            PixOrCopy::Literal(argb_val) => {
                match cache.as_ref().and_then(|c| c.contains(argb_val)) {
                    Some(idx) => histo.add_cache_idx(idx),
                    None => {
                        histo.add_literal(argb_val);
                        if let Some(c) = cache.as_mut() {
                            c.insert(argb_val);
                        }
                    }
                }
                pos += 1;
            }
            PixOrCopy::Copy { len, .. } => {
                histo.add_token_planar(token, xsize);
                let end = pos + len as usize;
                let pixels = argb
                    .get(pos..end)
                    .ok_or(Vp8lError::InvalidReference { position: pos })?;
                if let Some(c) = cache.as_mut() {
                    for &p in pixels {
                        c.insert(p);
                    }
                }
                pos = end;
            }
            PixOrCopy::CacheIdx(_) => return Err(Vp8lError::InvalidReference { position: pos }),
        }
    }
    Ok(histo)
}

impl BackwardRefs {
    /// Decode the token stream back into `pixel_count` pixels, the way a
    /// VP8L decoder would with a cache of `cache_bits` bits.
    ///
    /// Fails with [`Vp8lError::InvalidReference`] at the first token that
    /// copies from before the image start, names a cache slot that does not
    /// exist, or runs past `pixel_count`, and when the stream ends early.
    pub fn replay(
        &self,
        pixel_count: usize,
        cache_bits: u8,
        coding: DistanceCoding,
    ) -> Vp8lResult<Vec<u32>> {
        let mut out = Vec::new();
        out.try_reserve_exact(pixel_count)
            .map_err(|_| Vp8lError::OutOfMemory { what: "replay output" })?;
        let mut cache = ColorCache::optional(cache_bits)?;

        for token in self.iter() {
            let position = out.len();
            match *token {
                PixOrCopy::Literal(argb) => {
                    if position >= pixel_count {
                        return Err(Vp8lError::InvalidReference { position });
                    }
                    out.push(argb);
                    if let Some(c) = cache.as_mut() {
                        c.insert(argb);
                    }
                }
                PixOrCopy::CacheIdx(idx) => {
                    let argb = match cache.as_ref() {
                        Some(c) if (idx as usize) < c.size() && position < pixel_count => {
                            c.lookup(idx)
                        }
                        _ => return Err(Vp8lError::InvalidReference { position }),
                    };
                    out.push(argb);
                }
                PixOrCopy::Copy { len, dist } => {
                    let dist = match coding {
                        DistanceCoding::Raw => dist as usize,
                        DistanceCoding::Plane { xsize } if dist > 0 => {
                            plane_code_to_distance(xsize, dist)
                        }
                        DistanceCoding::Plane { .. } => 0,
                    };
                    let len = len as usize;
                    if dist == 0 || dist > position || len == 0 || position + len > pixel_count {
                        return Err(Vp8lError::InvalidReference { position });
                    }
                    for k in position..position + len {
                        let argb = out[k - dist];
                        out.push(argb);
                        if let Some(c) = cache.as_mut() {
                            c.insert(argb);
                        }
                    }
                }
            }
        }

        if out.len() != pixel_count {
            return Err(Vp8lError::InvalidReference { position: out.len() });
        }
        Ok(out)
    }
}
