//! Histogram building and manipulation for VP8L encoding.
//!
//! Histograms track symbol frequencies for Huffman code construction and
//! cache their estimated coding cost so clustering can compare merges
//! cheaply.

use alloc::vec::Vec;

use super::backward_refs::distance_to_plane_code;
use super::entropy::{combined_entropy, population_cost, LOG_2_PRECISION_BITS};
use super::types::{
    argb_alpha, argb_blue, argb_green, argb_red, check_cache_bits, try_filled, BackwardRefs,
    PixOrCopy, NUM_DISTANCE_CODES, NUM_LENGTH_CODES, NUM_LITERAL_CODES,
};
use crate::encoder::error::Vp8lResult;

/// Index of the green/length/cache population.
pub const LITERAL: usize = 0;
/// Index of the red population.
pub const RED: usize = 1;
/// Index of the blue population.
pub const BLUE: usize = 2;
/// Index of the alpha population.
pub const ALPHA: usize = 3;
/// Index of the distance population.
pub const DISTANCE: usize = 4;

/// Cost of the union of two histograms, per population and in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedCost {
    /// Total estimated bits of the union, fixed point.
    pub bit_cost: u64,
    /// Per-population costs, indexed by [`LITERAL`]..=[`DISTANCE`].
    pub costs: [u64; 5],
}

/// VP8L histogram for a single Huffman code group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    /// Green channel + length codes + cache codes (256 + 24 + cache_size).
    pub literal: Vec<u32>,
    /// Red channel (256).
    pub red: [u32; NUM_LITERAL_CODES],
    /// Blue channel (256).
    pub blue: [u32; NUM_LITERAL_CODES],
    /// Alpha channel (256).
    pub alpha: [u32; NUM_LITERAL_CODES],
    /// Distance codes (40).
    pub distance: [u32; NUM_DISTANCE_CODES],
    bit_cost: u64,
    costs: [u64; 5],
    trivial_symbol: Option<u32>,
    is_used: [bool; 5],
    cache_bits: u8,
}

impl Histogram {
    /// Create an empty histogram for the given cache bits (0..=10).
    pub fn new(cache_bits: u8) -> Vp8lResult<Self> {
        check_cache_bits(cache_bits)?;
        Ok(Self {
            literal: try_filled(literal_alphabet_size(cache_bits), 0, "histogram")?,
            red: [0; NUM_LITERAL_CODES],
            blue: [0; NUM_LITERAL_CODES],
            alpha: [0; NUM_LITERAL_CODES],
            distance: [0; NUM_DISTANCE_CODES],
            bit_cost: 0,
            costs: [0; 5],
            trivial_symbol: None,
            is_used: [false; 5],
            cache_bits,
        })
    }

    /// Build a histogram from tokens whose distances are counted as stored.
    pub fn from_refs(refs: &BackwardRefs, cache_bits: u8) -> Vp8lResult<Self> {
        let mut h = Self::new(cache_bits)?;
        for token in refs.iter() {
            h.add_token(token);
        }
        Ok(h)
    }

    /// Build a histogram from tokens with raw distances, counting their
    /// plane codes for an image `xsize` pixels wide.
    pub fn from_refs_planar(refs: &BackwardRefs, cache_bits: u8, xsize: usize) -> Vp8lResult<Self> {
        let mut h = Self::new(cache_bits)?;
        for token in refs.iter() {
            h.add_token_planar(token, xsize);
        }
        Ok(h)
    }

    /// Clear all counts.
    pub fn clear(&mut self) {
        self.literal.fill(0);
        self.red.fill(0);
        self.blue.fill(0);
        self.alpha.fill(0);
        self.distance.fill(0);
        self.bit_cost = 0;
        self.costs = [0; 5];
        self.trivial_symbol = None;
        self.is_used = [false; 5];
    }

    /// Add a literal ARGB pixel.
    #[inline]
    pub fn add_literal(&mut self, argb: u32) {
        self.literal[argb_green(argb) as usize] += 1;
        self.red[argb_red(argb) as usize] += 1;
        self.blue[argb_blue(argb) as usize] += 1;
        self.alpha[argb_alpha(argb) as usize] += 1;
    }

    /// Add a cache index.
    #[inline]
    pub fn add_cache_idx(&mut self, idx: u16) {
        let code = NUM_LITERAL_CODES + NUM_LENGTH_CODES + idx as usize;
        debug_assert!(code < self.literal.len());
        self.literal[code] += 1;
    }

    /// Add a backward reference whose distance is already in its final coding.
    #[inline]
    pub fn add_copy(&mut self, len: u16, dist_value: u32) {
        let (len_code, _, _) = prefix_encode(len as u32);
        let (dist_code, _, _) = prefix_encode(dist_value);
        self.literal[NUM_LITERAL_CODES + len_code as usize] += 1;
        self.distance[dist_code as usize] += 1;
    }

    /// Add one token, counting its distance as stored.
    #[inline]
    pub fn add_token(&mut self, token: &PixOrCopy) {
        match *token {
            PixOrCopy::Literal(argb) => self.add_literal(argb),
            PixOrCopy::CacheIdx(idx) => self.add_cache_idx(idx),
            PixOrCopy::Copy { len, dist } => self.add_copy(len, dist),
        }
    }

    /// Add one token with a raw distance, counting its plane code.
    #[inline]
    pub fn add_token_planar(&mut self, token: &PixOrCopy, xsize: usize) {
        match *token {
            PixOrCopy::Copy { len, dist } => {
                self.add_copy(len, distance_to_plane_code(xsize, dist as usize))
            }
            _ => self.add_token(token),
        }
    }

    /// Population `index` ([`LITERAL`]..=[`DISTANCE`]).
    #[inline]
    pub fn population(&self, index: usize) -> &[u32] {
        match index {
            LITERAL => &self.literal[..],
            RED => &self.red[..],
            BLUE => &self.blue[..],
            ALPHA => &self.alpha[..],
            _ => &self.distance[..],
        }
    }

    /// Cached total cost from the last [`update_cost`](Self::update_cost)
    /// or accepted merge.
    #[inline]
    pub fn bit_cost(&self) -> u64 {
        self.bit_cost
    }

    /// Cached per-population costs.
    #[inline]
    pub fn costs(&self) -> &[u64; 5] {
        &self.costs
    }

    /// `(alpha << 24) | (red << 16) | blue` when each of those channels uses
    /// a single symbol.
    #[inline]
    pub fn trivial_symbol(&self) -> Option<u32> {
        self.trivial_symbol
    }

    /// Whether population `index` has any non-zero count.
    #[inline]
    pub fn is_used(&self, index: usize) -> bool {
        self.is_used[index]
    }

    /// Whether every population is empty.
    pub fn is_empty(&self) -> bool {
        !self.is_used.iter().any(|&u| u)
    }

    /// Recompute the cached costs, trivial symbol and usage flags.
    ///
    /// Extra bits of lengths and distances are left out: they do not depend
    /// on how histograms are grouped.
    pub fn update_cost(&mut self) {
        let literal = population_cost(&self.literal);
        let red = population_cost(&self.red);
        let blue = population_cost(&self.blue);
        let alpha = population_cost(&self.alpha);
        let distance = population_cost(&self.distance);

        self.costs = [literal.cost, red.cost, blue.cost, alpha.cost, distance.cost];
        self.bit_cost = self.costs.iter().sum();
        self.is_used = [
            literal.is_used,
            red.is_used,
            blue.is_used,
            alpha.is_used,
            distance.is_used,
        ];
        let channels = (alpha.trivial_symbol, red.trivial_symbol, blue.trivial_symbol);
        self.trivial_symbol = match channels {
            (Some(a), Some(r), Some(b)) => Some((a << 24) | (r << 16) | b),
            _ => None,
        };
    }

    /// Estimated size in bits (fixed point) of coding this histogram,
    /// including length and distance extra bits.
    pub fn estimate_bits(&self) -> u64 {
        let entropy: u64 = (LITERAL..=DISTANCE)
            .map(|i| population_cost(self.population(i)).cost)
            .sum();
        let lengths = &self.literal[NUM_LITERAL_CODES..NUM_LITERAL_CODES + NUM_LENGTH_CODES];
        let extra = extra_cost(lengths) + extra_cost(&self.distance);
        entropy + (extra << LOG_2_PRECISION_BITS)
    }

    /// Merge another histogram into this one.
    ///
    /// The cached costs become stale; the caller either recomputes them or
    /// installs an evaluated [`CombinedCost`].
    pub fn add(&mut self, other: &Histogram) {
        debug_assert_eq!(self.cache_bits, other.cache_bits);
        add_vector(&mut self.literal, &other.literal);
        add_vector(&mut self.red, &other.red);
        add_vector(&mut self.blue, &other.blue);
        add_vector(&mut self.alpha, &other.alpha);
        add_vector(&mut self.distance, &other.distance);
        for (mine, theirs) in self.is_used.iter_mut().zip(other.is_used) {
            *mine |= theirs;
        }
        if self.trivial_symbol != other.trivial_symbol {
            self.trivial_symbol = None;
        }
    }

    /// Merge `other` and adopt the cost computed for the union.
    pub(crate) fn add_with_cost(&mut self, other: &Histogram, combined: &CombinedCost) {
        self.add(other);
        self.bit_cost = combined.bit_cost;
        self.costs = combined.costs;
    }

    /// Whether both histograms are known to use the same single
    /// alpha/red/blue symbol.
    #[inline]
    pub fn shares_trivial_symbol(&self, other: &Histogram) -> bool {
        self.trivial_symbol.is_some() && self.trivial_symbol == other.trivial_symbol
    }

    /// Estimated cost of the union of both histograms. Both must have
    /// up-to-date cached costs.
    pub fn combined_entropy(&self, other: &Histogram) -> u64 {
        self.combined_cost_below(other, i64::MAX)
            .map_or(u64::MAX, |c| c.bit_cost)
    }

    /// Cost of the union, or `None` as soon as it reaches `threshold`.
    pub(crate) fn combined_cost_below(
        &self,
        other: &Histogram,
        threshold: i64,
    ) -> Option<CombinedCost> {
        debug_assert_eq!(self.cache_bits, other.cache_bits);
        if threshold <= 0 {
            return None;
        }
        let threshold = threshold as u64;
        let shared = if self.shares_trivial_symbol(other) {
            self.trivial_symbol
        } else {
            None
        };

        let mut total = 0u64;
        let mut costs = [0u64; 5];
        for (i, cost) in costs.iter_mut().enumerate() {
            let trivial = shared.and_then(|sym| match i {
                RED => Some(((sym >> 16) & 0xff) as usize),
                BLUE => Some((sym & 0xff) as usize),
                ALPHA => Some((sym >> 24) as usize),
                _ => None,
            });
            *cost = combined_entropy(
                self.population(i),
                other.population(i),
                self.is_used[i],
                other.is_used[i],
                trivial,
            );
            total += *cost;
            if total >= threshold {
                return None;
            }
        }
        Some(CombinedCost {
            bit_cost: total,
            costs,
        })
    }

    /// Evaluate `C(a + b) - C(a) - C(b)` against `threshold`.
    ///
    /// Returns the union's cost when the difference is below `threshold`.
    pub fn add_eval(a: &Histogram, b: &Histogram, threshold: i64) -> Option<CombinedCost> {
        let sum_cost = (a.bit_cost + b.bit_cost) as i64;
        a.combined_cost_below(b, threshold.saturating_add(sum_cost))
    }

    /// Evaluate `C(a + b) - C(a)` against `threshold` without merging.
    pub fn add_thresh(a: &Histogram, b: &Histogram, threshold: i64) -> Option<i64> {
        let threshold = threshold.saturating_add(a.bit_cost as i64);
        a.combined_cost_below(b, threshold)
            .map(|c| c.bit_cost as i64 - a.bit_cost as i64)
    }
}

#[inline]
fn add_vector(dst: &mut [u32], src: &[u32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

/// Extra bits paid by a population of prefix codes.
fn extra_cost(population: &[u32]) -> u64 {
    population
        .iter()
        .enumerate()
        .map(|(code, &count)| prefix_extra_bits(code as u8) as u64 * count as u64)
        .sum()
}

/// Literal alphabet size including cache codes. `cache_bits` is already
/// checked against `MAX_COLOR_CACHE_BITS`.
#[inline]
pub(crate) fn literal_alphabet_size(cache_bits: u8) -> usize {
    NUM_LITERAL_CODES + NUM_LENGTH_CODES + if cache_bits > 0 { 1 << cache_bits } else { 0 }
}

/// Split a length or distance value into `(prefix_code, extra_bits, extra_value)`.
/// Uses the same encoding as libwebp's VP8LPrefixEncode.
pub fn prefix_encode(value: u32) -> (u8, u32, u32) {
    debug_assert!(value >= 1);
    if value <= 2 {
        return ((value.max(1) - 1) as u8, 0, 0);
    }
    let value = value - 1;
    let highest_bit = 31 - value.leading_zeros();
    let second_highest_bit = (value >> (highest_bit - 1)) & 1;
    let extra_bits = highest_bit - 1;
    let extra_value = value & ((1u32 << extra_bits) - 1);
    let code = 2 * highest_bit + second_highest_bit;
    (code as u8, extra_bits, extra_value)
}

/// Number of extra bits for a prefix code.
#[inline]
pub fn prefix_extra_bits(code: u8) -> u32 {
    if code < 4 {
        0
    } else {
        (code as u32 >> 1) - 1
    }
}

/// Inverse of [`prefix_encode`].
pub fn prefix_decode(code: u8, extra_value: u32) -> u32 {
    if code < 4 {
        return code as u32 + 1;
    }
    let extra_bits = prefix_extra_bits(code);
    let offset = (2 + (code as u32 & 1)) << extra_bits;
    offset + extra_value + 1
}
