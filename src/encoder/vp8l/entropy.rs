//! Entropy calculation for VP8L encoding.
//!
//! Estimates bit costs for Huffman-coded symbol sequences. All costs are
//! fixed point with [`LOG_2_PRECISION_BITS`] fractional bits, i.e. 1/1024 of
//! a bit.
//!
//! Raw Shannon entropy is refined in two ways, following libwebp:
//! `bits_entropy_refine` corrects for sparse histograms where the Huffman
//! code cannot get close to the entropy, and `final_huffman_cost` adds the
//! cost of transmitting the code lengths, which depends on the runs of
//! zero and non-zero counts ("streaks").

/// Fixed-point precision for entropy and cost calculations.
pub const LOG_2_PRECISION_BITS: u32 = 10;

/// Rounding division matching libwebp's DivRound.
#[inline]
pub(crate) fn div_round(a: i64, b: i64) -> i64 {
    if (a < 0) == (b < 0) {
        (a + b / 2) / b
    } else {
        (a - b / 2) / b
    }
}

/// `log2(v)` in fixed point. Returns 0 for `v <= 1`.
#[inline]
pub fn fast_log2(v: u32) -> u64 {
    if v <= 1 {
        return 0;
    }
    libm::round(libm::log2(v as f64) * (1u64 << LOG_2_PRECISION_BITS) as f64) as u64
}

/// `v * log2(v)` in fixed point. Returns 0 for `v <= 1`.
#[inline]
pub fn fast_slog2(v: u64) -> u64 {
    if v <= 1 {
        return 0;
    }
    let v = v as f64;
    libm::round(v * libm::log2(v) * (1u64 << LOG_2_PRECISION_BITS) as f64) as u64
}

/// Entropy statistics of a population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BitEntropy {
    /// `sum * log2(sum) - sum(c * log2(c))`, fixed point.
    pub entropy: u64,
    /// Total count.
    pub sum: u64,
    /// Number of non-zero symbols.
    pub nonzeros: u32,
    /// Largest single count.
    pub max_val: u32,
    /// Last non-zero symbol seen.
    pub nonzero_code: Option<u32>,
}

/// Run statistics used to price the code-length header.
///
/// Index 0 is for runs of zeros, index 1 for runs of non-zero values. The
/// second index of `streaks` separates runs of at most 3 from longer ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Streaks {
    /// Number of runs longer than 3.
    pub counts: [u32; 2],
    /// Total length of short (`[_][0]`) and long (`[_][1]`) runs.
    pub streaks: [[u32; 2]; 2],
}

impl Streaks {
    /// Statistics of a population where only `symbol` is non-zero.
    pub(crate) fn single_symbol(symbol: usize, length: usize) -> Self {
        let mut stats = Self::default();
        stats.streaks[1][0] = 1;
        stats.add_run(0, symbol);
        stats.add_run(0, length - symbol - 1);
        stats
    }

    #[inline]
    fn add_run(&mut self, nonzero: usize, streak: usize) {
        if streak == 0 {
            return;
        }
        let long = usize::from(streak > 3);
        self.counts[nonzero] += long as u32;
        self.streaks[nonzero][long] += streak as u32;
    }
}

/// Accumulates a run of `streak` symbols that all have count `val`.
#[inline]
fn add_streak(val: u32, sym: usize, streak: usize, entropy: &mut BitEntropy, stats: &mut Streaks) {
    if val != 0 {
        entropy.sum += val as u64 * streak as u64;
        entropy.nonzeros += streak as u32;
        entropy.nonzero_code = Some((sym + streak - 1) as u32);
        entropy.entropy += fast_slog2(val as u64) * streak as u64;
        entropy.max_val = entropy.max_val.max(val);
    }
    stats.add_run(usize::from(val != 0), streak);
}

/// Walks `len` values produced by `value`, grouping equal neighbours.
#[inline]
fn entropy_unrefined_by(len: usize, value: impl Fn(usize) -> u32) -> (BitEntropy, Streaks) {
    let mut entropy = BitEntropy::default();
    let mut stats = Streaks::default();
    if len == 0 {
        return (entropy, stats);
    }

    let mut i_prev = 0usize;
    let mut x_prev = value(0);
    for i in 1..len {
        let x = value(i);
        if x != x_prev {
            add_streak(x_prev, i_prev, i - i_prev, &mut entropy, &mut stats);
            x_prev = x;
            i_prev = i;
        }
    }
    add_streak(x_prev, i_prev, len - i_prev, &mut entropy, &mut stats);

    entropy.entropy = fast_slog2(entropy.sum).saturating_sub(entropy.entropy);
    (entropy, stats)
}

/// Unrefined entropy and streaks of a single population.
pub(crate) fn get_entropy_unrefined(counts: &[u32]) -> (BitEntropy, Streaks) {
    entropy_unrefined_by(counts.len(), |i| counts[i])
}

/// Unrefined entropy and streaks of the element-wise sum of two populations.
pub(crate) fn get_combined_entropy_unrefined(x: &[u32], y: &[u32]) -> (BitEntropy, Streaks) {
    debug_assert_eq!(x.len(), y.len());
    entropy_unrefined_by(x.len(), |i| x[i] + y[i])
}

/// Refine a raw entropy into a closer estimate of the Huffman-coded size.
pub(crate) fn bits_entropy_refine(e: &BitEntropy) -> u64 {
    if e.nonzeros <= 1 {
        return 0;
    }
    // Two symbols: a one-bit code each, slightly better than entropy suggests.
    if e.nonzeros == 2 {
        return div_round(99 * ((e.sum as i64) << LOG_2_PRECISION_BITS) + e.entropy as i64, 100)
            as u64;
    }
    let mix: i64 = match e.nonzeros {
        3 => 950,
        4 => 700,
        _ => 627,
    };
    let min_limit = ((2 * e.sum - e.max_val as u64) as i64) << LOG_2_PRECISION_BITS;
    let min_limit = div_round(mix * min_limit + (1000 - mix) * e.entropy as i64, 1000) as u64;
    e.entropy.max(min_limit)
}

/// Cost of transmitting the Huffman code lengths given the run statistics.
pub(crate) fn final_huffman_cost(stats: &Streaks) -> u64 {
    // The constants come from regression tests on a large image corpus.
    let mut retval: i64 = ((19 * 3) << LOG_2_PRECISION_BITS) as i64
        - div_round((91i64) << LOG_2_PRECISION_BITS, 10);
    let scaled = stats.counts[0] as i64 * 1600
        + 240 * stats.streaks[0][1] as i64
        + stats.counts[1] as i64 * 2640
        + 720 * stats.streaks[1][1] as i64
        + 1840 * stats.streaks[0][0] as i64
        + 3360 * stats.streaks[1][0] as i64;
    retval += scaled << (LOG_2_PRECISION_BITS - 10);
    retval.max(0) as u64
}

/// Result of pricing one population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PopulationCost {
    /// Estimated bits, fixed point.
    pub cost: u64,
    /// The only non-zero symbol, if exactly one exists.
    pub trivial_symbol: Option<u32>,
    /// Whether any count is non-zero.
    pub is_used: bool,
}

/// Estimated cost of Huffman-coding `counts`, including its header.
pub(crate) fn population_cost(counts: &[u32]) -> PopulationCost {
    let (entropy, stats) = get_entropy_unrefined(counts);
    PopulationCost {
        cost: bits_entropy_refine(&entropy) + final_huffman_cost(&stats),
        trivial_symbol: if entropy.nonzeros == 1 {
            entropy.nonzero_code
        } else {
            None
        },
        is_used: stats.streaks[1][0] != 0 || stats.streaks[1][1] != 0,
    }
}

/// Estimated cost of coding `x + y` without materialising the sum.
///
/// `trivial` is the single symbol both populations are known to share;
/// only the header needs pricing then.
pub(crate) fn combined_entropy(
    x: &[u32],
    y: &[u32],
    is_x_used: bool,
    is_y_used: bool,
    trivial: Option<usize>,
) -> u64 {
    if let Some(symbol) = trivial {
        return final_huffman_cost(&Streaks::single_symbol(symbol, x.len()));
    }
    let (entropy, stats) = match (is_x_used, is_y_used) {
        (true, true) => get_combined_entropy_unrefined(x, y),
        (true, false) => get_entropy_unrefined(x),
        (false, true) => get_entropy_unrefined(y),
        (false, false) => {
            let mut stats = Streaks::default();
            stats.add_run(0, x.len());
            (BitEntropy::default(), stats)
        }
    };
    bits_entropy_refine(&entropy) + final_huffman_cost(&stats)
}
