//! Hash chain for LZ77 backward reference finding.
//!
//! Uses libwebp's hash function and chain structure for finding matches.
//! The optimizer only sees the result through [`MatchFinder`].

use alloc::vec::Vec;

use super::types::{try_filled, HASH_BITS, HASH_SIZE, MAX_LENGTH, MAX_LENGTH_BITS, WINDOW_SIZE};
use crate::encoder::error::Vp8lResult;

/// Hash multipliers for two-pixel hashing (from libwebp).
const HASH_MULT_HI: u32 = 0xc6a4a793;
const HASH_MULT_LO: u32 = 0x5bd1e996;

/// Per-pixel source of LZ77 copy candidates.
///
/// For every position the finder proposes at most one `(offset, length)`
/// pair. A non-zero length guarantees `1 <= offset <= pos`,
/// `pos + length <= pixel_count`, `length <= MAX_LENGTH`, and that the
/// `length` pixels starting at `pos - offset` equal those starting at `pos`.
pub trait MatchFinder {
    /// Best copy candidate `(offset, length)` starting at `pos`.
    fn find_copy(&self, pos: usize) -> (usize, usize);

    /// Offset of the candidate at `pos`.
    #[inline]
    fn find_offset(&self, pos: usize) -> usize {
        self.find_copy(pos).0
    }

    /// Length of the candidate at `pos`.
    #[inline]
    fn find_length(&self, pos: usize) -> usize {
        self.find_copy(pos).1
    }
}

/// Hash two adjacent pixels to get a bucket index.
#[inline]
fn hash_pix_pair(p0: u32, p1: u32) -> usize {
    let key = p1
        .wrapping_mul(HASH_MULT_HI)
        .wrapping_add(p0.wrapping_mul(HASH_MULT_LO));
    (key >> (32 - HASH_BITS)) as usize
}

/// Hash chain for efficient LZ77 match finding.
#[derive(Debug)]
pub struct HashChain {
    /// For each pixel: (offset << MAX_LENGTH_BITS) | length
    offset_length: Vec<u32>,
}

impl HashChain {
    /// Build hash chain for the given ARGB pixels.
    pub fn new(argb: &[u32], quality: u8, width: usize) -> Vp8lResult<Self> {
        let size = argb.len();
        let mut offset_length = try_filled(size, 0u32, "hash chain")?;

        if size < 2 {
            return Ok(Self { offset_length });
        }

        let iter_max = get_max_iters(quality);
        let window_size = get_window_size(quality, width);

        let chain = build_chain(argb)?;

        // Find best matches working backwards. The left-most pixel has
        // nothing to match against.
        let mut base_pos = size - 1;
        while base_pos > 0 {
            let max_len = (size - base_pos).min(MAX_LENGTH);
            let argb_start = &argb[base_pos..];
            let min_pos = base_pos.saturating_sub(window_size);
            let length_max = max_len.min(256);
            let mut iters = iter_max;
            let mut best_len = 0usize;
            let mut best_dist = 0usize;

            // Heuristic: try row above
            if base_pos >= width {
                let curr_len =
                    find_match_length(&argb[base_pos - width..], argb_start, best_len, max_len);
                if curr_len > best_len {
                    best_len = curr_len;
                    best_dist = width;
                }
                iters -= 1;
            }

            // Heuristic: try previous pixel
            let curr_len = find_match_length(&argb[base_pos - 1..], argb_start, best_len, max_len);
            if curr_len > best_len {
                best_len = curr_len;
                best_dist = 1;
            }
            iters -= 1;

            // Follow hash chain
            if best_len < max_len {
                let mut best_argb = argb_start[best_len];
                let mut pos = chain[base_pos];
                while pos >= min_pos as i32 && iters > 1 {
                    iters -= 1;
                    let p = pos as usize;
                    pos = chain[p];

                    // Quick rejection: the pixel after the current best must match.
                    if argb[p + best_len] != best_argb {
                        continue;
                    }

                    let curr_len = vector_mismatch(&argb[p..], argb_start, max_len);
                    if curr_len > best_len {
                        best_len = curr_len;
                        best_dist = base_pos - p;
                        if best_len >= length_max {
                            break;
                        }
                        best_argb = argb_start[best_len];
                    }
                }
            }

            // Extend the match to the left while the pixels keep agreeing:
            // the best match at `base_pos` yields one at `base_pos - 1`.
            let mut max_base_pos = base_pos;
            loop {
                debug_assert!(best_len <= MAX_LENGTH);
                debug_assert!(best_dist <= WINDOW_SIZE);
                offset_length[base_pos] = ((best_dist as u32) << MAX_LENGTH_BITS) | best_len as u32;
                base_pos -= 1;
                if best_dist == 0 || base_pos == 0 {
                    break;
                }
                if base_pos < best_dist || argb[base_pos - best_dist] != argb[base_pos] {
                    break;
                }
                // A maxed-out match may have a closer equivalent further left.
                if best_len == MAX_LENGTH && best_dist != 1 && base_pos + MAX_LENGTH < max_base_pos
                {
                    break;
                }
                if best_len < MAX_LENGTH {
                    best_len += 1;
                    max_base_pos = base_pos;
                }
            }
        }

        Ok(Self { offset_length })
    }

    /// Get the best match distance at a position.
    #[inline]
    pub fn offset(&self, pos: usize) -> usize {
        (self.offset_length[pos] >> MAX_LENGTH_BITS) as usize
    }

    /// Get the best match length at a position.
    #[inline]
    pub fn length(&self, pos: usize) -> usize {
        (self.offset_length[pos] & ((1 << MAX_LENGTH_BITS) - 1)) as usize
    }
}

impl MatchFinder for HashChain {
    #[inline]
    fn find_copy(&self, pos: usize) -> (usize, usize) {
        (self.offset(pos), self.length(pos))
    }
}

/// Link every position to the previous position with the same pair hash.
/// Runs of one colour hash on (colour, remaining run length) instead.
fn build_chain(argb: &[u32]) -> Vp8lResult<Vec<i32>> {
    let size = argb.len();
    let mut hash_to_first = try_filled(HASH_SIZE, -1i32, "hash chain heads")?;
    let mut chain = try_filled(size, -1i32, "hash chain links")?;

    let mut argb_comp = argb[0] == argb[1];
    let mut pos = 0usize;
    while pos + 2 < size {
        let argb_comp_next = argb[pos + 1] == argb[pos + 2];
        if argb_comp && argb_comp_next {
            let base_color = argb[pos];
            let mut len = 1usize;
            while pos + len + 2 < size && argb[pos + len + 2] == base_color {
                len += 1;
            }
            if len > MAX_LENGTH {
                // Those are reached with distance 1 anyway: no predecessor.
                pos += len - MAX_LENGTH;
                len = MAX_LENGTH;
            }
            while len > 0 {
                let hash = hash_pix_pair(base_color, len as u32);
                chain[pos] = hash_to_first[hash];
                hash_to_first[hash] = pos as i32;
                pos += 1;
                len -= 1;
            }
            argb_comp = false;
        } else {
            let hash = hash_pix_pair(argb[pos], argb[pos + 1]);
            chain[pos] = hash_to_first[hash];
            hash_to_first[hash] = pos as i32;
            pos += 1;
            argb_comp = argb_comp_next;
        }
    }

    // Penultimate pixel
    if pos + 1 < size {
        chain[pos] = hash_to_first[hash_pix_pair(argb[pos], argb[pos + 1])];
    }

    Ok(chain)
}

/// Get max iterations for quality level.
#[inline]
fn get_max_iters(quality: u8) -> usize {
    8 + (quality as usize * quality as usize) / 128
}

/// Get window size for quality level.
#[inline]
fn get_window_size(quality: u8, width: usize) -> usize {
    let max = if quality > 75 {
        WINDOW_SIZE
    } else if quality > 50 {
        width << 8
    } else if quality > 25 {
        width << 6
    } else {
        width << 4
    };
    max.min(WINDOW_SIZE)
}

/// Match length between two sequences, or 0 if they differ at `best_len`.
#[inline]
pub(crate) fn find_match_length(
    array1: &[u32],
    array2: &[u32],
    best_len: usize,
    max_len: usize,
) -> usize {
    if array1.len() <= best_len || array2.len() <= best_len {
        return 0;
    }
    if array1[best_len] != array2[best_len] {
        return 0;
    }
    vector_mismatch(array1, array2, max_len)
}

/// Find first mismatch position (or max_len if all match).
#[inline]
fn vector_mismatch(a: &[u32], b: &[u32], max_len: usize) -> usize {
    let len = a.len().min(b.len()).min(max_len);
    a[..len]
        .iter()
        .zip(&b[..len])
        .position(|(x, y)| x != y)
        .unwrap_or(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_matches_valid(argb: &[u32], chain: &HashChain) {
        for pos in 0..argb.len() {
            let (offset, len) = chain.find_copy(pos);
            if len == 0 {
                continue;
            }
            assert!(offset >= 1 && offset <= pos, "pos={pos} offset={offset}");
            assert!(pos + len <= argb.len());
            assert_eq!(
                &argb[pos - offset..pos - offset + len],
                &argb[pos..pos + len],
                "pos={pos} offset={offset} len={len}"
            );
        }
    }

    #[test]
    fn test_hash_deterministic() {
        let h1 = hash_pix_pair(0xFF112233, 0xFF445566);
        let h2 = hash_pix_pair(0xFF112233, 0xFF445566);
        assert_eq!(h1, h2);
        assert!(h1 < HASH_SIZE);
    }

    #[test]
    fn test_flat_run_reaches_last_pixel() {
        let pixels = vec![0xFF000000u32; 100];
        let chain = HashChain::new(&pixels, 75, 100).unwrap();
        assert_eq!(chain.find_copy(1), (1, 99));
        assert_eq!(chain.find_copy(99), (1, 1));
        assert_eq!(chain.find_copy(0), (0, 0));
    }

    #[test]
    fn test_matches_are_valid() {
        let mut seed = 7u32;
        let pixels: Vec<u32> = (0..4000)
            .map(|i| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                // Mostly repetitive content with some noise.
                if i % 37 < 30 {
                    0xFF000000 | ((i % 13) as u32 * 0x010101)
                } else {
                    seed >> 8
                }
            })
            .collect();
        let chain = HashChain::new(&pixels, 90, 64).unwrap();
        assert_matches_valid(&pixels, &chain);
    }

    #[test]
    fn test_long_run_is_capped() {
        let pixels = vec![0xFF123456u32; MAX_LENGTH * 3];
        let chain = HashChain::new(&pixels, 100, 512).unwrap();
        assert_eq!(chain.length(1), MAX_LENGTH);
        assert_matches_valid(&pixels, &chain);
    }

    #[test]
    fn test_tiny_images() {
        assert!(HashChain::new(&[], 75, 0).unwrap().offset_length.is_empty());
        let one = HashChain::new(&[5], 75, 1).unwrap();
        assert_eq!(one.find_copy(0), (0, 0));
        let two = HashChain::new(&[5, 5], 75, 2).unwrap();
        assert_eq!(two.find_copy(1), (1, 1));
    }

    #[test]
    fn test_vector_mismatch() {
        let a = [1, 2, 3, 4, 5];
        let b = [1, 2, 3, 9, 5];
        assert_eq!(vector_mismatch(&a, &b, 10), 3);

        let c = [1, 2, 3, 4, 5];
        let d = [1, 2, 3, 4, 5];
        assert_eq!(vector_mismatch(&c, &d, 10), 5);
    }
}
