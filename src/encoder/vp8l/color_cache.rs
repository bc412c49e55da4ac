//! Color cache for VP8L encoding.
//!
//! The color cache stores recently used colors and allows referencing them
//! by index instead of encoding the full ARGB value.

use alloc::format;
use alloc::vec::Vec;

use super::types::{try_filled, MAX_COLOR_CACHE_BITS};
use crate::encoder::error::{Vp8lError, Vp8lResult};

/// Color cache hash multiplier (must match decoder exactly).
const COLOR_CACHE_MULT: u32 = 0x1e35a7bd;

/// Hash an ARGB value into a cache slot for a cache of `bits` bits.
#[inline]
pub(crate) fn hash_pix(argb: u32, bits: u8) -> usize {
    (COLOR_CACHE_MULT.wrapping_mul(argb) >> (32 - bits as u32)) as usize
}

/// Color cache with `1 << bits` slots.
#[derive(Debug, Clone)]
pub struct ColorCache {
    /// Cache entries (ARGB values).
    colors: Vec<u32>,
    /// Number of bits (1-10).
    bits: u8,
}

impl ColorCache {
    /// Create a new color cache with the given number of bits (1-10).
    pub fn new(bits: u8) -> Vp8lResult<Self> {
        if !(1..=MAX_COLOR_CACHE_BITS).contains(&bits) {
            return Err(Vp8lError::InvalidConfig(format!(
                "color cache bits {} outside 1..={}",
                bits, MAX_COLOR_CACHE_BITS
            )));
        }
        Ok(Self {
            colors: try_filled(1 << bits, 0, "color cache")?,
            bits,
        })
    }

    /// Create a cache when `bits > 0`, `None` otherwise.
    pub(crate) fn optional(bits: u8) -> Vp8lResult<Option<Self>> {
        if bits == 0 {
            Ok(None)
        } else {
            Self::new(bits).map(Some)
        }
    }

    /// Get the number of cache bits.
    #[inline]
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Get the cache size.
    #[inline]
    pub fn size(&self) -> usize {
        self.colors.len()
    }

    /// Insert a color into the cache.
    #[inline]
    pub fn insert(&mut self, argb: u32) {
        let idx = hash_pix(argb, self.bits);
        self.colors[idx] = argb;
    }

    /// Check if a color is in the cache and return its index.
    #[inline]
    pub fn contains(&self, argb: u32) -> Option<u16> {
        let idx = hash_pix(argb, self.bits);
        if self.colors[idx] == argb {
            Some(idx as u16)
        } else {
            None
        }
    }

    /// Get the color stored at a given index.
    #[inline]
    pub fn lookup(&self, idx: u16) -> u32 {
        self.colors[idx as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_cache_insert_lookup() {
        let mut cache = ColorCache::new(4).unwrap();
        let color = 0xFF112233u32;

        assert!(cache.contains(color).is_none());

        cache.insert(color);
        let idx = cache.contains(color).unwrap();
        assert_eq!(cache.lookup(idx), color);
        assert!((idx as usize) < cache.size());
    }

    #[test]
    fn test_color_cache_collision() {
        let mut cache = ColorCache::new(1).unwrap(); // Only 2 entries
        let c1 = 0xFF000000u32;
        let c2 = 0xFF000001u32;

        cache.insert(c1);
        cache.insert(c2);

        // The last inserted color always survives.
        assert!(cache.contains(c2).is_some());
    }

    #[test]
    fn test_rejects_bad_bits() {
        assert!(ColorCache::new(0).is_err());
        assert!(ColorCache::new(MAX_COLOR_CACHE_BITS + 1).is_err());
        assert!(ColorCache::optional(0).unwrap().is_none());
        assert_eq!(ColorCache::optional(3).unwrap().unwrap().bits(), 3);
    }

    #[test]
    fn test_hash_nests_across_sizes() {
        // A smaller cache's slot is the larger cache's slot shifted down.
        let argb = 0xAABBCCDD;
        assert_eq!(hash_pix(argb, 10) >> 1, hash_pix(argb, 9));
        assert_eq!(hash_pix(argb, 10) >> 9, hash_pix(argb, 1));
    }
}
