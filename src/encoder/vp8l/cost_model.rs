//! Per-symbol bit cost model for the backward-reference optimizer.
//!
//! Built from the histogram of a first-pass parse; every entry is an
//! estimate in 1/1024 bit units of what coding one symbol will cost.

use alloc::vec::Vec;

use super::entropy::{fast_log2, LOG_2_PRECISION_BITS};
use super::histogram::{prefix_encode, Histogram};
use super::types::{
    argb_alpha, argb_blue, argb_green, argb_red, try_filled, BackwardRefs, NUM_LENGTH_CODES,
    NUM_LITERAL_CODES,
};
use crate::encoder::error::Vp8lResult;

/// Convert histogram population counts to per-symbol bit cost estimates.
///
/// Each output[i] = log2(sum) - log2(counts[i]); a population with at most
/// one used symbol needs no code and costs nothing.
/// Matches libwebp's ConvertPopulationCountTableToBitEstimates.
fn counts_to_bit_estimates(counts: &[u32]) -> Vp8lResult<Vec<u32>> {
    let mut output = try_filled(counts.len(), 0u32, "cost model")?;

    let nonzeros = counts.iter().filter(|&&c| c > 0).count();
    if nonzeros <= 1 {
        return Ok(output);
    }

    let total: u32 = counts.iter().sum();
    let logsum = fast_log2(total);
    for (out, &count) in output.iter_mut().zip(counts) {
        *out = logsum.saturating_sub(fast_log2(count)) as u32;
    }
    Ok(output)
}

/// Per-symbol bit cost model built from histogram statistics.
#[derive(Debug, Clone)]
pub struct CostModel {
    /// Green/literal/length costs (256 + 24 + cache).
    literal: Vec<u32>,
    /// Red channel costs (256).
    red: Vec<u32>,
    /// Blue channel costs (256).
    blue: Vec<u32>,
    /// Alpha channel costs (256).
    alpha: Vec<u32>,
    /// Distance costs (40).
    distance: Vec<u32>,
}

impl CostModel {
    /// Build cost model from a histogram of initial backward refs with raw
    /// distances; distances are priced by their plane code.
    pub fn build(xsize: usize, cache_bits: u8, refs: &BackwardRefs) -> Vp8lResult<Self> {
        let histo = Histogram::from_refs_planar(refs, cache_bits, xsize)?;
        Self::from_histogram(&histo)
    }

    /// Build cost model directly from symbol counts.
    pub fn from_histogram(histo: &Histogram) -> Vp8lResult<Self> {
        Ok(Self {
            literal: counts_to_bit_estimates(&histo.literal)?,
            red: counts_to_bit_estimates(&histo.red)?,
            blue: counts_to_bit_estimates(&histo.blue)?,
            alpha: counts_to_bit_estimates(&histo.alpha)?,
            distance: counts_to_bit_estimates(&histo.distance)?,
        })
    }

    /// Cost of encoding a literal ARGB pixel.
    #[inline]
    pub fn literal_cost(&self, argb: u32) -> i64 {
        self.alpha[argb_alpha(argb) as usize] as i64
            + self.red[argb_red(argb) as usize] as i64
            + self.literal[argb_green(argb) as usize] as i64
            + self.blue[argb_blue(argb) as usize] as i64
    }

    /// Cost of encoding a color cache index.
    #[inline]
    pub fn cache_cost(&self, idx: u16) -> i64 {
        let literal_idx = NUM_LITERAL_CODES + NUM_LENGTH_CODES + idx as usize;
        debug_assert!(literal_idx < self.literal.len());
        self.literal[literal_idx] as i64
    }

    /// Cost of encoding a copy length, extra bits included.
    #[inline]
    pub fn length_cost(&self, length: u32) -> i64 {
        let (code, extra_bits, _) = prefix_encode(length);
        self.literal[NUM_LITERAL_CODES + code as usize] as i64
            + ((extra_bits as i64) << LOG_2_PRECISION_BITS)
    }

    /// Cost of encoding a distance given as a plane code, extra bits included.
    #[inline]
    pub fn distance_cost(&self, plane_code: u32) -> i64 {
        let (code, extra_bits, _) = prefix_encode(plane_code);
        self.distance[code as usize] as i64 + ((extra_bits as i64) << LOG_2_PRECISION_BITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::vp8l::types::PixOrCopy;

    const ONE_BIT: i64 = 1 << LOG_2_PRECISION_BITS;

    #[test]
    fn test_counts_to_bit_estimates() {
        // Single symbol: all costs zero (trivial code)
        let estimates = counts_to_bit_estimates(&[0, 100, 0, 0]).unwrap();
        assert!(estimates.iter().all(|&e| e == 0));

        // Uniform distribution: two bits each
        let estimates = counts_to_bit_estimates(&[100, 100, 100, 100]).unwrap();
        assert!(estimates.iter().all(|&e| e as i64 == 2 * ONE_BIT));

        // Unused symbols cost the whole log2(sum)
        let estimates = counts_to_bit_estimates(&[3, 1, 0, 0]).unwrap();
        assert_eq!(estimates[2] as i64, 2 * ONE_BIT);
        assert_eq!(estimates[1] as i64, 2 * ONE_BIT);
        assert!(estimates[0] < estimates[1]);
    }

    #[test]
    fn test_costs_follow_frequencies() {
        let mut refs = BackwardRefs::new();
        for _ in 0..30 {
            refs.push(PixOrCopy::literal(0xFF00_1000));
        }
        refs.push(PixOrCopy::literal(0xFF00_2000));
        refs.push(PixOrCopy::copy(5, 1));
        refs.push(PixOrCopy::copy(40, 7));
        let model = CostModel::build(16, 0, &refs).unwrap();

        assert!(model.literal_cost(0xFF00_1000) < model.literal_cost(0xFF00_2000));
        // Alpha, red and blue each have a single symbol and cost nothing.
        assert_eq!(model.literal_cost(0xFF00_1000), model.literal[0x10] as i64);
        // Lengths 33..=48 share one prefix code and pay 4 extra bits.
        assert_eq!(model.length_cost(40), model.length_cost(33));
        assert_eq!(
            model.length_cost(40),
            model.literal[NUM_LITERAL_CODES + 10] as i64 + 4 * ONE_BIT
        );
        // Plane code 2 (previous pixel) was seen, plane code 1 was not.
        assert!(model.distance_cost(2) <= model.distance_cost(1));
    }

    #[test]
    fn test_cache_cost() {
        let mut refs = BackwardRefs::new();
        refs.push(PixOrCopy::literal(1));
        refs.push(PixOrCopy::cache_idx(3));
        refs.push(PixOrCopy::cache_idx(3));
        refs.push(PixOrCopy::cache_idx(1));
        let model = CostModel::build(4, 2, &refs).unwrap();
        assert!(model.cache_cost(3) < model.cache_cost(1));
        // Unused index: log2(4 symbols seen).
        assert_eq!(model.cache_cost(0), 2 * ONE_BIT);
    }
}
