//! Histogram clustering for spatially-varying codes.
//!
//! Tile histograms are merged in up to three passes: a cheap bin-hash pass
//! grouping histograms of similar entropy, a stochastic pass trying random
//! pairs, and an exhaustive greedy pass once few clusters remain. Tiles are
//! finally re-assigned to whichever surviving cluster suits them best.

use alloc::vec::Vec;

use tracing::debug;

use super::entropy::div_round;
use super::histogram::{CombinedCost, Histogram, BLUE, LITERAL, RED};
use super::histogram_set::{
    build_tile_histograms, copy_and_analyze, remap, remove_empty, tile_grid, HistogramSet,
};
use super::types::{check_cache_bits, try_filled, BackwardRefs};
use crate::encoder::error::{Vp8lError, Vp8lResult};

/// Partitions per cost axis in the bin-hash pass.
const NUM_PARTITIONS: usize = 4;
/// Bins when literal, red and blue costs are all partitioned.
const BIN_SIZE: usize = NUM_PARTITIONS * NUM_PARTITIONS * NUM_PARTITIONS;
/// Upper bound of the greedy threshold.
const MAX_HISTO_GREEDY: i64 = 100;
/// Pairs kept by the stochastic pass.
const HISTO_QUEUE_SIZE: usize = 9;
/// Failed merges tolerated per bin before non-trivial merges are accepted.
const MAX_COMBINE_FAILURES: u32 = 32;

/// Merge penalty applied in the bin-hash pass, in percent of a histogram's
/// own cost. Larger images and lower qualities merge more eagerly.
pub fn combine_cost_factor(histo_size: usize, quality: u8) -> i64 {
    let mut factor = 16;
    if quality < 90 {
        if histo_size > 256 {
            factor /= 2;
        }
        if histo_size > 512 {
            factor /= 2;
        }
        if histo_size > 1024 {
            factor /= 2;
        }
        if quality <= 50 {
            factor /= 2;
        }
    }
    factor
}

/// Cluster count below which the greedy pass takes over, ramping
/// cubically from 1 at quality 0 to 100 at quality 100.
pub fn greedy_threshold(quality: u8) -> usize {
    let q = quality as i64;
    (1 + div_round(q * q * q * (MAX_HISTO_GREEDY - 1), 100 * 100 * 100)) as usize
}

/// Build the tile histograms of `refs` and cluster them.
///
/// `refs` must carry plane-coded distances. Every tile of the returned set
/// maps to a histogram, and the histograms together hold exactly the counts
/// of `refs`.
pub fn get_histo_image_symbols(
    xsize: usize,
    ysize: usize,
    refs: &BackwardRefs,
    quality: u8,
    low_effort: bool,
    histo_bits: u8,
    cache_bits: u8,
) -> Vp8lResult<HistogramSet> {
    check_cache_bits(cache_bits)?;
    let (histo_xsize, histo_ysize) = tile_grid(xsize, ysize, histo_bits);
    let image_histo_raw_size = histo_xsize * histo_ysize;

    if refs.is_empty() {
        let mut histograms = Vec::new();
        histograms.push(Histogram::new(cache_bits)?);
        return Ok(HistogramSet {
            histograms,
            symbols: try_filled(image_histo_raw_size, 0, "histogram symbols")?,
            histo_bits,
            histo_xsize,
        });
    }

    let tiles = build_tile_histograms(refs, xsize, ysize, histo_bits, cache_bits)?;
    let analyzed = copy_and_analyze(tiles)?;
    let originals = analyzed.originals;
    let mut symbols = analyzed.symbols;
    let mut clusters = analyzed.clusters;
    let mut num_used = clusters.len();
    let num_tiles_used = num_used;

    let entropy_combine_num_bins = if low_effort { NUM_PARTITIONS } else { BIN_SIZE };
    let entropy_combine = num_used > entropy_combine_num_bins * 2 && quality < 100;

    if entropy_combine {
        let factor = combine_cost_factor(image_histo_raw_size, quality);
        let bin_map = analyze_entropy_bins(&clusters, low_effort);
        combine_entropy_bins(
            &mut clusters,
            &mut num_used,
            &bin_map,
            entropy_combine_num_bins,
            factor,
            low_effort,
        )?;
        debug!(
            before = num_tiles_used,
            after = num_used,
            factor,
            "entropy-bin clustering"
        );
    }

    if !low_effort || !entropy_combine {
        let threshold_size = greedy_threshold(quality);
        let before = num_used;
        let do_greedy = combine_stochastic(&mut clusters, &mut num_used, threshold_size)?;
        debug!(before, after = num_used, threshold_size, "stochastic clustering");
        if do_greedy {
            let before = num_used;
            let mut dense: Vec<Option<Histogram>> =
                remove_empty(clusters).into_iter().map(Some).collect();
            combine_greedy(&mut dense, &mut num_used)?;
            clusters = dense;
            debug!(before, after = num_used, "greedy clustering");
        }
    }

    let mut histograms = remove_empty(clusters);
    remap(&originals, &mut histograms, &mut symbols);
    debug!(
        tiles = image_histo_raw_size,
        used_tiles = num_tiles_used,
        clusters = histograms.len(),
        "histogram image built"
    );

    Ok(HistogramSet {
        histograms,
        symbols,
        histo_bits,
        histo_xsize,
    })
}

/// Cost extents over all live histograms, one per partitioned axis.
#[derive(Debug, Clone, Copy)]
struct CostRange {
    min: u64,
    max: u64,
}

impl CostRange {
    fn new() -> Self {
        Self { min: u64::MAX, max: 0 }
    }

    fn include(&mut self, cost: u64) {
        self.min = self.min.min(cost);
        self.max = self.max.max(cost);
    }

    /// Partition of `cost` within the range, `0..NUM_PARTITIONS`.
    fn bin(&self, cost: u64) -> usize {
        let range = self.max.saturating_sub(self.min);
        if range == 0 {
            return 0;
        }
        let delta = cost.saturating_sub(self.min) as u128;
        let bin = delta * NUM_PARTITIONS as u128 / range as u128;
        (bin as usize).min(NUM_PARTITIONS - 1)
    }
}

/// Bin index of every slot, from its literal (and unless `low_effort`,
/// red and blue) cost relative to the extremes of the set.
fn analyze_entropy_bins(clusters: &[Option<Histogram>], low_effort: bool) -> Vec<usize> {
    let mut literal = CostRange::new();
    let mut red = CostRange::new();
    let mut blue = CostRange::new();
    for h in clusters.iter().flatten() {
        literal.include(h.costs()[LITERAL]);
        red.include(h.costs()[RED]);
        blue.include(h.costs()[BLUE]);
    }

    clusters
        .iter()
        .map(|slot| {
            let Some(h) = slot else { return 0 };
            let mut bin = literal.bin(h.costs()[LITERAL]);
            if !low_effort {
                bin = bin * NUM_PARTITIONS + red.bin(h.costs()[RED]);
                bin = bin * NUM_PARTITIONS + blue.bin(h.costs()[BLUE]);
            }
            bin
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct BinInfo {
    first: Option<usize>,
    num_combine_failures: u32,
}

/// Merge histograms sharing a bin into the bin's first histogram.
fn combine_entropy_bins(
    clusters: &mut [Option<Histogram>],
    num_used: &mut usize,
    bin_map: &[usize],
    num_bins: usize,
    combine_cost_factor: i64,
    low_effort: bool,
) -> Vp8lResult<()> {
    let mut bin_info = try_filled(
        num_bins,
        BinInfo {
            first: None,
            num_combine_failures: 0,
        },
        "histogram bins",
    )?;

    for idx in 0..clusters.len() {
        if clusters[idx].is_none() {
            continue;
        }
        let bin_id = bin_map[idx];
        let Some(first) = bin_info[bin_id].first else {
            bin_info[bin_id].first = Some(idx);
            continue;
        };

        if low_effort {
            if let Some(h) = clusters[idx].take() {
                if let Some(dst) = clusters[first].as_mut() {
                    dst.add(&h);
                }
                *num_used -= 1;
            }
            continue;
        }

        let (Some(h_first), Some(h_idx)) = (clusters[first].as_ref(), clusters[idx].as_ref()) else {
            continue;
        };
        let bit_cost_thresh = -div_round(h_idx.bit_cost() as i64 * combine_cost_factor, 100);
        let Some(combo) = Histogram::add_eval(h_first, h_idx, bit_cost_thresh) else {
            continue;
        };

        // Only merge when the union keeps a trivial symbol or neither side
        // had one, unless this bin keeps failing.
        let try_combine = h_first.shares_trivial_symbol(h_idx)
            || (h_first.trivial_symbol().is_none() && h_idx.trivial_symbol().is_none());
        if try_combine || bin_info[bin_id].num_combine_failures >= MAX_COMBINE_FAILURES {
            merge_into(clusters, first, idx, &combo);
            *num_used -= 1;
        } else {
            bin_info[bin_id].num_combine_failures += 1;
        }
    }

    if low_effort {
        for h in clusters.iter_mut().flatten() {
            h.update_cost();
        }
    }
    Ok(())
}

/// Move slot `src` into slot `dst`, installing the precomputed union cost.
fn merge_into(clusters: &mut [Option<Histogram>], dst: usize, src: usize, combo: &CombinedCost) {
    if let Some(h) = clusters[src].take() {
        if let Some(target) = clusters[dst].as_mut() {
            target.add_with_cost(&h, combo);
        }
    }
}

/// A candidate merge of two live slots, `idx1 < idx2`.
#[derive(Debug, Clone, Copy)]
struct HistogramPair {
    idx1: usize,
    idx2: usize,
    cost_diff: i64,
    combo: CombinedCost,
}

/// Bounded set of candidate merges whose first entry is the best one.
struct HistoQueue {
    queue: Vec<HistogramPair>,
    max_size: usize,
}

impl HistoQueue {
    fn new(max_size: usize) -> Vp8lResult<Self> {
        let mut queue = Vec::new();
        queue
            .try_reserve_exact(max_size)
            .map_err(|_| Vp8lError::OutOfMemory { what: "histogram queue" })?;
        Ok(Self { queue, max_size })
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn is_full(&self) -> bool {
        self.queue.len() == self.max_size
    }

    fn pop(&mut self, j: usize) {
        self.queue.swap_remove(j);
    }

    fn update_head(&mut self, j: usize) {
        if self.queue[j].cost_diff < self.queue[0].cost_diff {
            self.queue.swap(0, j);
        }
    }

    /// Evaluate merging `idx1` and `idx2` and queue the pair if it gains
    /// more than `-threshold`. Returns the gain, or 0 when not queued.
    fn push(
        &mut self,
        clusters: &[Option<Histogram>],
        idx1: usize,
        idx2: usize,
        threshold: i64,
    ) -> i64 {
        if self.is_full() {
            return 0;
        }
        debug_assert!(threshold <= 0);
        let (idx1, idx2) = if idx1 > idx2 { (idx2, idx1) } else { (idx1, idx2) };
        let Some(pair) = evaluate_pair(clusters, idx1, idx2, threshold) else {
            return 0;
        };
        self.queue.push(pair);
        self.update_head(self.queue.len() - 1);
        pair.cost_diff
    }
}

fn evaluate_pair(
    clusters: &[Option<Histogram>],
    idx1: usize,
    idx2: usize,
    threshold: i64,
) -> Option<HistogramPair> {
    let h1 = clusters[idx1].as_ref()?;
    let h2 = clusters[idx2].as_ref()?;
    let sum_cost = (h1.bit_cost() + h2.bit_cost()) as i64;
    let combo = Histogram::add_eval(h1, h2, threshold)?;
    Some(HistogramPair {
        idx1,
        idx2,
        cost_diff: combo.bit_cost as i64 - sum_cost,
        combo,
    })
}

/// Minimal standard (Lehmer) generator; fixed so output is reproducible.
struct MinStdRand {
    seed: u32,
}

impl MinStdRand {
    fn new() -> Self {
        Self { seed: 1 }
    }

    fn next(&mut self) -> u32 {
        self.seed = ((self.seed as u64 * 48271) % 2_147_483_647) as u32;
        self.seed
    }
}

/// Merge random pairs while it pays off. Returns whether the greedy pass
/// should run next.
fn combine_stochastic(
    clusters: &mut [Option<Histogram>],
    num_used: &mut usize,
    min_cluster_size: usize,
) -> Vp8lResult<bool> {
    if *num_used < min_cluster_size {
        return Ok(true);
    }

    let mut rng = MinStdRand::new();
    let outer_iters = *num_used;
    let num_tries_no_success = outer_iters / 2;
    let mut tries_with_no_success = 0usize;

    let mut mappings = Vec::new();
    mappings
        .try_reserve_exact(*num_used)
        .map_err(|_| Vp8lError::OutOfMemory { what: "cluster mappings" })?;
    mappings.extend(
        clusters
            .iter()
            .enumerate()
            .filter_map(|(i, h)| h.as_ref().map(|_| i)),
    );
    debug_assert_eq!(mappings.len(), *num_used);

    let mut queue = HistoQueue::new(HISTO_QUEUE_SIZE)?;

    for _ in 0..outer_iters {
        if *num_used < min_cluster_size {
            break;
        }
        tries_with_no_success += 1;
        if tries_with_no_success >= num_tries_no_success {
            break;
        }

        let mut best_cost = if queue.is_empty() { 0 } else { queue.queue[0].cost_diff };
        let rand_range = ((*num_used as u64).saturating_sub(1)) * *num_used as u64;
        let num_tries = *num_used / 2;

        let mut j = 0;
        while *num_used >= 2 && j < num_tries {
            let tmp = rng.next() as u64 % rand_range;
            let idx1 = (tmp / (*num_used as u64 - 1)) as usize;
            let mut idx2 = (tmp % (*num_used as u64 - 1)) as usize;
            if idx2 >= idx1 {
                idx2 += 1;
            }
            let curr_cost = queue.push(clusters, mappings[idx1], mappings[idx2], best_cost);
            if curr_cost < 0 {
                best_cost = curr_cost;
                if queue.is_full() {
                    break;
                }
            }
            j += 1;
        }

        if queue.is_empty() {
            continue;
        }

        let best = queue.queue[0];
        let (best_idx1, best_idx2) = (best.idx1, best.idx2);
        debug_assert!(best_idx1 < best_idx2);
        if let Ok(pos) = mappings.binary_search(&best_idx2) {
            mappings.remove(pos);
        }
        merge_into(clusters, best_idx1, best_idx2, &best.combo);
        *num_used -= 1;

        // Pairs touching either merged slot now refer to `best_idx1` and
        // need their gain re-evaluated.
        let mut j = 0;
        while j < queue.queue.len() {
            let p = queue.queue[j];
            let is_idx1_best = p.idx1 == best_idx1 || p.idx1 == best_idx2;
            let is_idx2_best = p.idx2 == best_idx1 || p.idx2 == best_idx2;
            if is_idx1_best && is_idx2_best {
                queue.pop(j);
                continue;
            }
            let (a, b) = if is_idx1_best {
                (best_idx1, p.idx2)
            } else if is_idx2_best {
                (p.idx1, best_idx1)
            } else {
                j += 1;
                continue;
            };
            let (a, b) = if a > b { (b, a) } else { (a, b) };
            match evaluate_pair(clusters, a, b, 0) {
                Some(updated) => {
                    queue.queue[j] = updated;
                    queue.update_head(j);
                    j += 1;
                }
                None => queue.pop(j),
            }
        }
        tries_with_no_success = 0;
    }

    Ok(*num_used <= min_cluster_size)
}

/// Repeatedly merge the best pair among all live slots until no merge
/// lowers the total cost.
fn combine_greedy(clusters: &mut [Option<Histogram>], num_used: &mut usize) -> Vp8lResult<()> {
    let size = clusters.len();
    let mut queue = HistoQueue::new(size * size)?;

    for i in 0..size {
        if clusters[i].is_none() {
            continue;
        }
        for j in i + 1..size {
            if clusters[j].is_some() {
                queue.push(clusters, i, j, 0);
            }
        }
    }

    while !queue.is_empty() {
        let best = queue.queue[0];
        let (idx1, idx2) = (best.idx1, best.idx2);
        merge_into(clusters, idx1, idx2, &best.combo);
        *num_used -= 1;

        let mut i = 0;
        while i < queue.queue.len() {
            let p = queue.queue[i];
            if p.idx1 == idx1 || p.idx2 == idx1 || p.idx1 == idx2 || p.idx2 == idx2 {
                queue.pop(i);
            } else {
                queue.update_head(i);
                i += 1;
            }
        }

        for i in 0..size {
            if i != idx1 && clusters[i].is_some() {
                queue.push(clusters, idx1, i, 0);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::vp8l::histogram::DISTANCE;
    use crate::encoder::vp8l::types::PixOrCopy;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Tokens of a `w`x`h` image whose left and right halves use disjoint
    /// palettes, with occasional copies.
    fn two_region_refs(w: usize, h: usize, seed: u64) -> BackwardRefs {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut refs = BackwardRefs::new();
        let mut pos = 0;
        while pos < w * h {
            let x = pos % w;
            let remaining = w * h - pos;
            if pos > w && remaining > 8 && rng.gen_ratio(1, 6) {
                let len = rng.gen_range(2..=8);
                refs.push(PixOrCopy::copy(len as u16, rng.gen_range(1..=20)));
                pos += len;
                continue;
            }
            let base = if x < w / 2 { 0xFF10_2030 } else { 0xFFC0_A090 };
            refs.push(PixOrCopy::literal(base + rng.gen_range(0..4u32) * 0x0001_0101));
            pos += 1;
        }
        refs
    }

    fn population_sums(histos: &[Histogram]) -> [u64; 5] {
        let mut sums = [0u64; 5];
        for h in histos {
            for (i, sum) in sums.iter_mut().enumerate() {
                *sum += h.population(i).iter().map(|&c| c as u64).sum::<u64>();
            }
        }
        sums
    }

    fn check_set(set: &HistogramSet, refs: &BackwardRefs, cache_bits: u8) {
        assert!(!set.histograms.is_empty());
        assert!(set.symbols.iter().all(|&s| (s as usize) < set.histograms.len()));
        let whole = Histogram::from_refs(refs, cache_bits).unwrap();
        assert_eq!(
            population_sums(&set.histograms),
            population_sums(core::slice::from_ref(&whole))
        );
    }

    #[test]
    fn test_combine_cost_factor() {
        assert_eq!(combine_cost_factor(100, 95), 16);
        assert_eq!(combine_cost_factor(300, 75), 8);
        assert_eq!(combine_cost_factor(2000, 75), 2);
        assert_eq!(combine_cost_factor(2000, 50), 1);
    }

    #[test]
    fn test_greedy_threshold() {
        assert_eq!(greedy_threshold(0), 1);
        assert_eq!(greedy_threshold(50), 13);
        assert_eq!(greedy_threshold(100), 100);
    }

    #[test]
    fn test_minstd_sequence() {
        let mut rng = MinStdRand::new();
        assert_eq!(rng.next(), 48271);
        assert_eq!(rng.next(), 182_605_794);
    }

    #[test]
    fn test_mass_conservation_all_paths() {
        let (w, h) = (96, 64);
        let refs = two_region_refs(w, h, 3);
        for (quality, low_effort) in [(100, false), (75, false), (20, false), (75, true)] {
            let set = get_histo_image_symbols(w, h, &refs, quality, low_effort, 3, 0).unwrap();
            assert_eq!(set.tile_count(), 12 * 8);
            check_set(&set, &refs, 0);
            assert!(set.histograms.len() < set.tile_count());
        }
    }

    #[test]
    fn test_distinct_regions_stay_apart() {
        let (w, h) = (64, 32);
        let refs = two_region_refs(w, h, 11);
        let set = get_histo_image_symbols(w, h, &refs, 100, false, 4, 0).unwrap();
        check_set(&set, &refs, 0);
        // Left and right halves should not share a code group.
        let left = set.symbols[0];
        let right = set.symbols[set.histo_xsize - 1];
        assert_ne!(left, right);
    }

    #[test]
    fn test_single_tile() {
        let refs = two_region_refs(8, 8, 1);
        let set = get_histo_image_symbols(8, 8, &refs, 75, false, 4, 0).unwrap();
        assert_eq!(set.symbols, [0]);
        assert_eq!(set.histograms.len(), 1);
        check_set(&set, &refs, 0);
        assert!(set.histogram_at(7, 7).is_some());
    }

    #[test]
    fn test_empty_refs() {
        let set = get_histo_image_symbols(0, 0, &BackwardRefs::new(), 75, false, 3, 0).unwrap();
        assert_eq!(set.histograms.len(), 1);
        assert!(set.symbols.is_empty());
    }

    #[test]
    fn test_clusters_have_current_costs() {
        let (w, h) = (64, 64);
        let refs = two_region_refs(w, h, 7);
        let set = get_histo_image_symbols(w, h, &refs, 90, false, 3, 0).unwrap();
        for histo in &set.histograms {
            let mut fresh = histo.clone();
            fresh.update_cost();
            assert_eq!(fresh.bit_cost(), histo.bit_cost());
            assert!(fresh.is_used(LITERAL) && fresh.is_used(RED));
        }
    }

    #[test]
    fn test_oversized_cache_rejected_up_front() {
        for cache_bits in [11u8, 64] {
            let empty = BackwardRefs::new();
            let empty = get_histo_image_symbols(8, 8, &empty, 75, false, 3, cache_bits);
            assert!(matches!(empty, Err(Vp8lError::InvalidConfig(_))));
            let refs = two_region_refs(8, 8, 2);
            let err = get_histo_image_symbols(8, 8, &refs, 75, false, 3, cache_bits);
            assert!(matches!(err, Err(Vp8lError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_full_effort_entropy_bins() {
        // 32x32 tiles of 4x4: far more than 2 * BIN_SIZE used tiles.
        let (w, h) = (128, 128);
        let refs = two_region_refs(w, h, 5);
        let tiles = build_tile_histograms(&refs, w, h, 2, 0).unwrap();
        let analyzed = copy_and_analyze(tiles).unwrap();
        let mut clusters = analyzed.clusters;
        let used_tiles = clusters.len();
        assert!(used_tiles > 2 * BIN_SIZE);

        let bin_map = analyze_entropy_bins(&clusters, false);
        assert!(bin_map.iter().all(|&b| b < BIN_SIZE));
        let mut num_used = used_tiles;
        let factor = combine_cost_factor(32 * 32, 75);
        combine_entropy_bins(&mut clusters, &mut num_used, &bin_map, BIN_SIZE, factor, false)
            .unwrap();

        assert!(num_used < used_tiles);
        assert_eq!(clusters.iter().flatten().count(), num_used);
        let merged = remove_empty(clusters);
        let whole = Histogram::from_refs(&refs, 0).unwrap();
        assert_eq!(
            population_sums(&merged),
            population_sums(core::slice::from_ref(&whole))
        );

        let set = get_histo_image_symbols(w, h, &refs, 75, false, 2, 0).unwrap();
        assert_eq!(set.tile_count(), 32 * 32);
        assert!(set.histograms.len() < set.tile_count());
        check_set(&set, &refs, 0);
    }

    #[test]
    fn test_entropy_bin_failure_budget() {
        // Copy-only histograms have no trivial symbol; the first one is a
        // single colour and has one. Merging always pays off, but the
        // trivial-symbol rule refuses it until the bin's budget runs out.
        let copies = |h: &mut Histogram| {
            for k in 0..24u16 {
                h.add_copy(2 + k % 7, 1 + u32::from(k % 5));
            }
        };
        let mut first = Histogram::new(0).unwrap();
        first.add_literal(0xFF10_2030);
        copies(&mut first);
        first.update_cost();
        let mut copy_only = Histogram::new(0).unwrap();
        copies(&mut copy_only);
        copy_only.update_cost();
        assert!(first.trivial_symbol().is_some());
        assert!(copy_only.trivial_symbol().is_none());

        let extra = 8;
        let total = 1 + MAX_COMBINE_FAILURES as usize + extra;
        let mut clusters: Vec<Option<Histogram>> = (0..total)
            .map(|i| Some(if i == 0 { first.clone() } else { copy_only.clone() }))
            .collect();
        let mut num_used = total;
        let bin_map = vec![0usize; total];
        combine_entropy_bins(&mut clusters, &mut num_used, &bin_map, BIN_SIZE, 0, false).unwrap();

        // The first MAX_COMBINE_FAILURES candidates were refused, the rest merged.
        assert_eq!(num_used, total - extra);
        let refused = 1..=MAX_COMBINE_FAILURES as usize;
        assert!(clusters[refused].iter().all(Option::is_some));
        assert!(clusters[total - extra..].iter().all(Option::is_none));

        let head = clusters[0].as_ref().unwrap();
        assert!(head.trivial_symbol().is_none());
        let expected_distance: u64 = 24 * (1 + extra as u64);
        assert_eq!(
            head.population(DISTANCE).iter().map(|&c| c as u64).sum::<u64>(),
            expected_distance
        );
    }
}
