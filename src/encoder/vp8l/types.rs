//! Core data structures for VP8L backward references.

use alloc::format;
use alloc::vec::Vec;

use crate::encoder::error::{Vp8lError, Vp8lResult};

/// Hash chain key width (matching libwebp).
pub const HASH_BITS: u32 = 18;
/// Number of hash chain buckets.
pub const HASH_SIZE: usize = 1 << HASH_BITS;
/// Bits used to store a match length.
pub const MAX_LENGTH_BITS: u32 = 12;
/// Bits of the LZ77 window.
pub const WINDOW_SIZE_BITS: u32 = 20;
/// Maximum match length (4095).
pub const MAX_LENGTH: usize = (1 << MAX_LENGTH_BITS) - 1;
/// Maximum window size (1M - 120 for 2D codes).
pub const WINDOW_SIZE: usize = (1 << WINDOW_SIZE_BITS) - 120;
/// Minimum profitable match length for the greedy parsers.
pub const MIN_LENGTH: usize = 4;

/// Largest colour cache the encoder will consider.
pub const MAX_COLOR_CACHE_BITS: u8 = 10;

/// Number of literal codes per channel.
pub const NUM_LITERAL_CODES: usize = 256;
/// Number of length prefix codes.
pub const NUM_LENGTH_CODES: usize = 24;
/// Number of distance prefix codes.
pub const NUM_DISTANCE_CODES: usize = 40;

/// Largest image side accepted by the format.
pub const MAX_DIMENSION: usize = 16384;

/// Smallest histogram tile size, log2.
pub const MIN_HUFFMAN_BITS: u8 = 2;
/// Largest histogram tile size, log2.
pub const MAX_HUFFMAN_BITS: u8 = 9;
/// Upper bound on the number of tiles in the histogram image.
pub const MAX_HUFF_IMAGE_SIZE: usize = 2600;

/// First-pass parse used to seed the cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lz77Variant {
    /// Hash-chain LZ77, optionally refined by the cost-based optimizer.
    Standard,
    /// Runs of the previous pixel or the previous row only.
    Rle,
    /// Try both and keep whichever estimates smaller.
    #[default]
    Auto,
}

/// VP8L lossless planning configuration.
#[derive(Debug, Clone)]
pub struct Vp8lConfig {
    /// Quality level 0-100.
    pub quality: u8,
    /// Method 0-6 (speed/quality tradeoff), drives the histogram tile size.
    pub method: u8,
    /// Maximum colour cache bits to consider (0 disables the cache).
    pub cache_bits: u8,
    /// Cheap parse and clustering only.
    pub low_effort: bool,
    /// First-pass parser selection.
    pub lz77: Lz77Variant,
    /// Histogram tile size bits (`None` = derive from method and image size).
    pub histogram_bits: Option<u8>,
}

impl Default for Vp8lConfig {
    fn default() -> Self {
        Self {
            quality: 75,
            method: 4,
            cache_bits: MAX_COLOR_CACHE_BITS,
            low_effort: false,
            lz77: Lz77Variant::Auto,
            histogram_bits: None,
        }
    }
}

impl Vp8lConfig {
    /// Reject settings outside the documented ranges.
    pub fn validate(&self) -> Vp8lResult<()> {
        if self.quality > 100 {
            return Err(Vp8lError::InvalidConfig(format!(
                "quality {} exceeds 100",
                self.quality
            )));
        }
        if self.method > 6 {
            return Err(Vp8lError::InvalidConfig(format!(
                "method {} exceeds 6",
                self.method
            )));
        }
        check_cache_bits(self.cache_bits)?;
        if let Some(bits) = self.histogram_bits {
            if !(MIN_HUFFMAN_BITS..=MAX_HUFFMAN_BITS).contains(&bits) {
                return Err(Vp8lError::InvalidConfig(format!(
                    "histogram_bits {} outside {}..={}",
                    bits, MIN_HUFFMAN_BITS, MAX_HUFFMAN_BITS
                )));
            }
        }
        Ok(())
    }
}

/// A pixel or copy operation in the backward reference stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixOrCopy {
    /// Literal ARGB pixel value.
    Literal(u32),
    /// Color cache index (`< 1 << cache_bits`).
    CacheIdx(u16),
    /// Backward reference copy.
    Copy {
        /// Copy length (1-4095).
        len: u16,
        /// Distance: raw pixel offset, or plane code after 2D locality.
        dist: u32,
    },
}

impl PixOrCopy {
    /// Create a literal pixel.
    #[inline]
    pub fn literal(argb: u32) -> Self {
        Self::Literal(argb)
    }

    /// Create a cache index reference.
    #[inline]
    pub fn cache_idx(idx: u16) -> Self {
        debug_assert!(idx < 1 << MAX_COLOR_CACHE_BITS);
        Self::CacheIdx(idx)
    }

    /// Create a backward reference copy.
    #[inline]
    pub fn copy(len: u16, dist: u32) -> Self {
        debug_assert!(len >= 1 && len as usize <= MAX_LENGTH);
        debug_assert!(dist >= 1);
        Self::Copy { len, dist }
    }

    /// Is this a literal?
    #[inline]
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Is this a cache reference?
    #[inline]
    pub fn is_cache(&self) -> bool {
        matches!(self, Self::CacheIdx(_))
    }

    /// Is this a copy?
    #[inline]
    pub fn is_copy(&self) -> bool {
        matches!(self, Self::Copy { .. })
    }

    /// Number of pixels this token covers.
    #[inline]
    pub fn pixel_len(&self) -> usize {
        match self {
            Self::Copy { len, .. } => *len as usize,
            _ => 1,
        }
    }
}

/// How `Copy` distances in a token stream are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceCoding {
    /// Linear pixel offsets.
    Raw,
    /// 2D plane codes relative to an image of the given width.
    Plane {
        /// Image width in pixels.
        xsize: usize,
    },
}

/// Backward reference storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackwardRefs {
    /// Tokens (pixels or copies) in emission order.
    pub tokens: Vec<PixOrCopy>,
}

impl BackwardRefs {
    /// Create empty backward refs.
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Create with capacity, reporting allocation failure.
    pub fn try_with_capacity(cap: usize) -> Vp8lResult<Self> {
        let mut tokens = Vec::new();
        tokens
            .try_reserve_exact(cap)
            .map_err(|_| Vp8lError::OutOfMemory { what: "backward refs" })?;
        Ok(Self { tokens })
    }

    /// Add a token.
    #[inline]
    pub fn push(&mut self, token: PixOrCopy) {
        self.tokens.push(token);
    }

    /// Add a token, growing the storage fallibly once it is full.
    #[inline]
    pub(crate) fn try_push(&mut self, token: PixOrCopy) -> Vp8lResult<()> {
        self.tokens
            .try_reserve(1)
            .map_err(|_| Vp8lError::OutOfMemory { what: "backward refs" })?;
        self.tokens.push(token);
        Ok(())
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Is empty?
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate over tokens.
    pub fn iter(&self) -> impl Iterator<Item = &PixOrCopy> {
        self.tokens.iter()
    }

    /// Total number of pixels covered by the tokens.
    pub fn pixel_count(&self) -> usize {
        self.tokens.iter().map(PixOrCopy::pixel_len).sum()
    }
}

/// Alpha channel of an ARGB pixel.
#[inline]
pub const fn argb_alpha(argb: u32) -> u8 {
    (argb >> 24) as u8
}

/// Red channel of an ARGB pixel.
#[inline]
pub const fn argb_red(argb: u32) -> u8 {
    (argb >> 16) as u8
}

/// Green channel of an ARGB pixel.
#[inline]
pub const fn argb_green(argb: u32) -> u8 {
    (argb >> 8) as u8
}

/// Blue channel of an ARGB pixel.
#[inline]
pub const fn argb_blue(argb: u32) -> u8 {
    argb as u8
}

/// Pack channels into an ARGB pixel.
#[inline]
pub const fn make_argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// Subsample size calculation (ceiling division).
#[inline]
pub const fn subsample_size(size: u32, bits: u8) -> u32 {
    (size + (1 << bits) - 1) >> bits
}

/// Reject colour cache sizes above [`MAX_COLOR_CACHE_BITS`]. Zero means no cache.
pub(crate) fn check_cache_bits(bits: u8) -> Vp8lResult<()> {
    if bits > MAX_COLOR_CACHE_BITS {
        return Err(Vp8lError::InvalidConfig(format!(
            "cache_bits {} exceeds {}",
            bits, MAX_COLOR_CACHE_BITS
        )));
    }
    Ok(())
}

/// Allocate a zero-filled buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_filled<T: Clone>(len: usize, value: T, what: &'static str) -> Vp8lResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| Vp8lError::OutOfMemory { what })?;
    v.resize(len, value);
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Vp8lConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_out_of_range() {
        let cfg = Vp8lConfig {
            quality: 101,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Vp8lError::InvalidConfig(_))));

        let cfg = Vp8lConfig {
            cache_bits: 11,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Vp8lError::InvalidConfig(_))));

        let cfg = Vp8lConfig {
            histogram_bits: Some(1),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_pixel_count() {
        let mut refs = BackwardRefs::new();
        refs.push(PixOrCopy::literal(0xFF00_0000));
        refs.push(PixOrCopy::copy(10, 1));
        refs.push(PixOrCopy::cache_idx(3));
        assert_eq!(refs.len(), 3);
        assert_eq!(refs.pixel_count(), 12);
    }

    #[test]
    fn test_check_cache_bits() {
        for bits in 0..=MAX_COLOR_CACHE_BITS {
            assert!(check_cache_bits(bits).is_ok());
        }
        for bits in [11u8, 63, 64, 255] {
            assert!(matches!(check_cache_bits(bits), Err(Vp8lError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_try_push_grows_past_capacity() {
        let mut refs = BackwardRefs::try_with_capacity(1).unwrap();
        for i in 0..100 {
            refs.try_push(PixOrCopy::literal(i)).unwrap();
        }
        assert_eq!(refs.len(), 100);
        assert_eq!(refs.tokens[99], PixOrCopy::literal(99));
    }

    #[test]
    fn test_argb_helpers() {
        let p = make_argb(0xFF, 0x11, 0x22, 0x33);
        assert_eq!(p, 0xFF112233);
        assert_eq!(argb_alpha(p), 0xFF);
        assert_eq!(argb_red(p), 0x11);
        assert_eq!(argb_green(p), 0x22);
        assert_eq!(argb_blue(p), 0x33);
        assert_eq!(subsample_size(100, 3), 13);
    }
}
