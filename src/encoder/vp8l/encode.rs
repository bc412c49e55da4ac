//! Lossless planning pipeline.
//!
//! Turns an ARGB image into everything the entropy-coding stage needs:
//! the final token stream with plane-coded distances, the colour cache size,
//! and the clustered histogram image.

use alloc::vec::Vec;

use tracing::debug;

use super::backward_refs::{
    apply_2d_locality, backward_references_lz77, backward_references_rle,
    calculate_best_cache_size, with_local_cache,
};
use super::hash_chain::HashChain;
use super::histogram::Histogram;
use super::histogram_set::HistogramSet;
use super::meta_huffman::get_histo_image_symbols;
use super::trace_backwards::trace_backwards_optimize;
use super::types::{
    subsample_size, BackwardRefs, DistanceCoding, Lz77Variant, Vp8lConfig, MAX_DIMENSION,
    MAX_HUFFMAN_BITS, MAX_HUFF_IMAGE_SIZE, MIN_HUFFMAN_BITS,
};
use crate::encoder::error::{Vp8lError, Vp8lResult};

/// Everything decided for one image before entropy coding.
#[derive(Debug, Clone)]
pub struct LosslessPlan {
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Final tokens; copy distances are plane codes.
    pub refs: BackwardRefs,
    /// Colour cache bits the tokens were produced with (0 = no cache).
    pub cache_bits: u8,
    /// Histogram tile size, log2.
    pub histo_bits: u8,
    /// Clustered histograms and the tile map.
    pub histogram_set: HistogramSet,
    /// First-pass parser whose result won.
    pub lz77: Lz77Variant,
}

impl LosslessPlan {
    /// Rebuild the pixels from the planned tokens.
    pub fn decode(&self) -> Vp8lResult<Vec<u32>> {
        self.refs.replay(
            self.width * self.height,
            self.cache_bits,
            DistanceCoding::Plane { xsize: self.width },
        )
    }

    /// Estimated size of the coded tokens in 1/1024 bits, summed over all
    /// code groups.
    pub fn estimated_bits(&self) -> u64 {
        self.histogram_set
            .histograms
            .iter()
            .map(Histogram::estimate_bits)
            .sum()
    }
}

/// Clamp bits to keep the sub-image size within limits (libwebp's ClampBits).
fn clamp_bits(
    width: usize,
    height: usize,
    bits: u8,
    min_bits: u8,
    max_bits: u8,
    image_size_max: usize,
) -> u8 {
    let grid = |bits: u8| {
        subsample_size(width as u32, bits) as usize * subsample_size(height as u32, bits) as usize
    };
    let mut bits = bits.clamp(min_bits, max_bits);
    let mut image_size = grid(bits);
    while bits < max_bits && image_size > image_size_max {
        bits += 1;
        image_size = grid(bits);
    }
    // Prefer the smallest bits that still give a single tile.
    while bits > min_bits && image_size == 1 {
        if grid(bits - 1) != 1 {
            break;
        }
        bits -= 1;
    }
    bits
}

/// Histogram tile bits for an image, from the encoding method.
/// Matches libwebp's GetHistoBits.
pub fn histo_bits_for(width: usize, height: usize, method: u8) -> u8 {
    let histo_bits = 7i32 - method as i32;
    clamp_bits(
        width,
        height,
        histo_bits.clamp(MIN_HUFFMAN_BITS as i32, MAX_HUFFMAN_BITS as i32) as u8,
        MIN_HUFFMAN_BITS,
        MAX_HUFFMAN_BITS,
        MAX_HUFF_IMAGE_SIZE,
    )
}

/// Parsers to try for this configuration.
fn candidate_variants(config: &Vp8lConfig) -> &'static [Lz77Variant] {
    if config.low_effort {
        return &[Lz77Variant::Rle];
    }
    match config.lz77 {
        Lz77Variant::Standard => &[Lz77Variant::Standard],
        Lz77Variant::Rle => &[Lz77Variant::Rle],
        Lz77Variant::Auto => &[Lz77Variant::Standard, Lz77Variant::Rle],
    }
}

/// A parsed candidate with its cache applied.
struct Candidate {
    variant: Lz77Variant,
    refs: BackwardRefs,
    cache_bits: u8,
    cost: u64,
}

fn validate_dimensions(argb: &[u32], width: usize, height: usize) -> Vp8lResult<()> {
    let invalid = Vp8lError::InvalidDimensions {
        width,
        height,
        len: argb.len(),
    };
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(invalid);
    }
    match width.checked_mul(height) {
        Some(n) if n == argb.len() => Ok(()),
        _ => Err(invalid),
    }
}

/// Plan the lossless coding of `argb` (row-major, `width * height` pixels).
///
/// Tries the configured first-pass parsers, picks a colour cache size for
/// each, optionally improves the standard parse with cost-based optimal
/// parsing, and clusters the histograms of the winner.
pub fn plan_lossless(
    argb: &[u32],
    width: usize,
    height: usize,
    config: &Vp8lConfig,
) -> Vp8lResult<LosslessPlan> {
    config.validate()?;
    validate_dimensions(argb, width, height)?;

    let histo_bits = config
        .histogram_bits
        .unwrap_or_else(|| histo_bits_for(width, height, config.method));
    let variants = candidate_variants(config);

    if argb.is_empty() {
        let refs = BackwardRefs::new();
        let histogram_set = get_histo_image_symbols(
            width,
            height,
            &refs,
            config.quality,
            config.low_effort,
            histo_bits,
            0,
        )?;
        return Ok(LosslessPlan {
            width,
            height,
            refs,
            cache_bits: 0,
            histo_bits,
            histogram_set,
            lz77: variants[0],
        });
    }

    let chain = if variants.contains(&Lz77Variant::Standard) {
        Some(HashChain::new(argb, config.quality, width)?)
    } else {
        None
    };

    let mut best: Option<Candidate> = None;
    for &variant in variants {
        let raw = match (variant, chain.as_ref()) {
            (Lz77Variant::Rle, _) | (_, None) => backward_references_rle(argb, width)?,
            (_, Some(chain)) => backward_references_lz77(argb, chain)?,
        };
        let cache_bits =
            calculate_best_cache_size(argb, width, config.quality, &raw, config.cache_bits)?;
        let mut refs = raw;
        with_local_cache(&mut refs, argb, cache_bits)?;
        let cost = Histogram::from_refs_planar(&refs, cache_bits, width)?.estimate_bits();
        debug!(?variant, cache_bits, cost, tokens = refs.len(), "lz77 candidate");

        if best.as_ref().map_or(true, |b| cost < b.cost) {
            best = Some(Candidate {
                variant,
                refs,
                cache_bits,
                cost,
            });
        }
    }
    let Some(mut best) = best else {
        return Err(Vp8lError::InvalidConfig("no lz77 variant to try".into()));
    };

    if best.variant == Lz77Variant::Standard && config.quality >= 25 && !config.low_effort {
        if let Some(chain) = chain.as_ref() {
            let optimized =
                trace_backwards_optimize(argb, width, best.cache_bits, chain, &best.refs)?;
            let cost =
                Histogram::from_refs_planar(&optimized, best.cache_bits, width)?.estimate_bits();
            debug!(
                before = best.cost,
                after = cost,
                kept = cost < best.cost,
                "trace backwards"
            );
            if cost < best.cost {
                best.refs = optimized;
                best.cost = cost;
            }
        }
    }

    apply_2d_locality(&mut best.refs, width);

    let histogram_set = get_histo_image_symbols(
        width,
        height,
        &best.refs,
        config.quality,
        config.low_effort,
        histo_bits,
        best.cache_bits,
    )?;
    debug!(
        variant = ?best.variant,
        cache_bits = best.cache_bits,
        histo_bits,
        groups = histogram_set.len(),
        "lossless plan ready"
    );

    Ok(LosslessPlan {
        width,
        height,
        refs: best.refs,
        cache_bits: best.cache_bits,
        histo_bits,
        histogram_set,
        lz77: best.variant,
    })
}
