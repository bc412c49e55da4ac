//! Interval-based cost manager for the backward-reference optimizer.
//!
//! A copy starting at pixel `p` can end at any of the next `len` pixels, so
//! a naive sweep touches `O(n * MAX_LENGTH)` cells. Since the length cost is
//! piecewise constant, each copy instead becomes a handful of
//! `[start, end)` intervals of constant cost, kept in a sorted,
//! non-overlapping list and applied lazily as the sweep reaches them.
//! Matches libwebp's `CostManager`.

use alloc::vec::Vec;

use super::cost_model::CostModel;
use super::types::{try_filled, MAX_LENGTH};
use crate::encoder::error::{Vp8lError, Vp8lResult};

/// Max active intervals before contributions are written straight to the
/// cost array (matches libwebp).
pub const COST_CACHE_INTERVAL_SIZE_MAX: usize = 500;

/// Interval slots allocated up front.
const COST_MANAGER_MAX_FREE_LIST: usize = 10;

/// Copies shorter than this are written directly instead of tracked.
const SKIP_DISTANCE: usize = 10;

/// Positions `[start, end)` reachable at `cost` by a copy starting at
/// `index`. Linked by arena index.
#[derive(Debug, Clone, Copy)]
struct CostInterval {
    cost: i64,
    start: usize,
    end: usize,
    index: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Run of copy lengths sharing one cost: lengths `start + 1..=end`.
#[derive(Debug, Clone, Copy)]
struct CostCacheInterval {
    cost: i64,
    start: usize,
    end: usize,
}

/// Lazy minimum-cost table for the optimal-parse sweep.
///
/// Intervals live in a growable arena and are threaded into a sorted list
/// by slot index; freed slots go on a stack for reuse.
#[derive(Debug)]
pub struct CostManager {
    /// Arena of interval nodes.
    intervals: Vec<CostInterval>,
    /// Arena slots ready for reuse.
    free_slots: Vec<usize>,
    /// First interval of the active list.
    head: Option<usize>,
    /// Length of the active list.
    count: usize,
    /// Active interval cap; beyond it contributions are materialized.
    max_intervals: usize,
    /// Runs of equal values in `cost_cache`.
    cache_intervals: Vec<CostCacheInterval>,
    /// `cost_cache[k]` is the cost of a copy of length `k + 1`.
    cost_cache: Vec<i64>,
    /// Minimum known cost to reach each pixel.
    costs: Vec<i64>,
    /// Length of the token ending at each pixel on the best known path.
    dist_array: Vec<u16>,
}

impl CostManager {
    /// Initialize the cost manager for `pix_count` pixels.
    pub fn new(pix_count: usize, cost_model: &CostModel, max_intervals: usize) -> Vp8lResult<Self> {
        let cost_cache_size = pix_count.min(MAX_LENGTH);

        let mut cost_cache = try_filled(cost_cache_size, 0i64, "cost cache")?;
        for (k, slot) in cost_cache.iter_mut().enumerate() {
            *slot = cost_model.length_cost(k as u32 + 1);
        }

        let mut cache_intervals: Vec<CostCacheInterval> = Vec::new();
        for (k, &cost) in cost_cache.iter().enumerate() {
            match cache_intervals.last_mut() {
                Some(last) if last.cost == cost => last.end = k + 1,
                _ => {
                    cache_intervals
                        .try_reserve(1)
                        .map_err(|_| Vp8lError::OutOfMemory { what: "cost cache intervals" })?;
                    cache_intervals.push(CostCacheInterval {
                        cost,
                        start: k,
                        end: k + 1,
                    });
                }
            }
        }

        let mut intervals = Vec::new();
        intervals
            .try_reserve_exact(COST_MANAGER_MAX_FREE_LIST)
            .map_err(|_| Vp8lError::OutOfMemory { what: "cost intervals" })?;
        let mut free_slots = Vec::new();
        free_slots
            .try_reserve_exact(COST_MANAGER_MAX_FREE_LIST)
            .map_err(|_| Vp8lError::OutOfMemory { what: "cost intervals" })?;

        Ok(Self {
            intervals,
            free_slots,
            head: None,
            count: 0,
            max_intervals,
            cache_intervals,
            cost_cache,
            costs: try_filled(pix_count, i64::MAX, "costs")?,
            dist_array: try_filled(pix_count, 0u16, "dist array")?,
        })
    }

    /// Minimum known cost to reach each pixel.
    #[inline]
    pub fn costs(&self) -> &[i64] {
        &self.costs
    }

    /// Token length ending at each pixel on the best known path.
    #[inline]
    pub fn dist_array(&self) -> &[u16] {
        &self.dist_array
    }

    /// Give up the back-pointer array once the sweep is over.
    pub fn into_dist_array(self) -> Vec<u16> {
        self.dist_array
    }

    /// Number of intervals currently queued.
    #[inline]
    pub fn active_intervals(&self) -> usize {
        self.count
    }

    /// Number of distinct length-cost runs.
    #[inline]
    pub fn cache_interval_count(&self) -> usize {
        self.cache_intervals.len()
    }

    /// Set the cost of the first pixel. It starts the path, so no token
    /// length is recorded for it.
    pub(crate) fn set_start_cost(&mut self, cost: i64) {
        self.costs[0] = cost;
    }

    /// Offer a single-pixel token ending at `i`.
    #[inline]
    pub(crate) fn offer_literal(&mut self, i: usize, cost: i64) {
        self.update_cost(i, i, cost);
    }

    /// Allocate or reuse an interval slot. `None` when the arena cannot grow.
    fn alloc_interval(&mut self, interval: CostInterval) -> Option<usize> {
        if let Some(slot) = self.free_slots.pop() {
            self.intervals[slot] = interval;
            return Some(slot);
        }
        // Every slot must fit on the free stack once released.
        if self.intervals.try_reserve(1).is_err()
            || self.free_slots.try_reserve(self.intervals.len() + 1).is_err()
        {
            return None;
        }
        self.intervals.push(interval);
        Some(self.intervals.len() - 1)
    }

    /// Update cost at pixel `i` if `cost` is better, recording a token that
    /// starts at `position`.
    #[inline]
    fn update_cost(&mut self, i: usize, position: usize, cost: i64) {
        let k = i - position;
        debug_assert!(k < MAX_LENGTH);
        if self.costs[i] > cost {
            self.costs[i] = cost;
            self.dist_array[i] = (k + 1) as u16;
        }
    }

    /// Offer `cost` to every pixel of `start..end`, all reached from `position`.
    fn update_cost_per_interval(&mut self, start: usize, end: usize, position: usize, cost: i64) {
        for i in start..end {
            self.update_cost(i, position, cost);
        }
    }

    /// Make `prev_slot` and `next_slot` neighbours. Either may be the list end.
    fn connect(&mut self, prev_slot: Option<usize>, next_slot: Option<usize>) {
        if let Some(p) = prev_slot {
            self.intervals[p].next = next_slot;
        } else {
            self.head = next_slot;
        }
        if let Some(n) = next_slot {
            self.intervals[n].prev = prev_slot;
        }
    }

    /// Unlink `slot` and push it on the free stack.
    fn pop_interval(&mut self, slot: usize) {
        let CostInterval { prev, next, .. } = self.intervals[slot];
        self.connect(prev, next);
        self.free_slots.push(slot);
        self.count -= 1;
    }

    /// Link `new_slot` into the sorted list, searching from `hint`.
    fn position_orphan(&mut self, new_slot: usize, hint: Option<usize>) {
        let new_start = self.intervals[new_slot].start;
        let mut prev = hint.or(self.head);

        while let Some(p) = prev {
            if new_start >= self.intervals[p].start {
                break;
            }
            prev = self.intervals[p].prev;
        }

        while let Some(p) = prev {
            match self.intervals[p].next {
                Some(nxt) if self.intervals[nxt].start < new_start => prev = Some(nxt),
                _ => break,
            }
        }

        let after = match prev {
            Some(p) => self.intervals[p].next,
            None => self.head,
        };
        self.connect(Some(new_slot), after);
        self.connect(prev, Some(new_slot));
    }

    /// Queue `start..end` at `cost`, or write it into `costs` right away once
    /// the list holds `max_intervals` entries.
    fn insert_interval(
        &mut self,
        hint: Option<usize>,
        cost: i64,
        position: usize,
        start: usize,
        end: usize,
    ) {
        if start >= end {
            return;
        }
        if self.count >= self.max_intervals {
            self.update_cost_per_interval(start, end, position, cost);
            return;
        }

        let interval = CostInterval {
            cost,
            start,
            end,
            index: position,
            prev: None,
            next: None,
        };
        let Some(slot) = self.alloc_interval(interval) else {
            self.update_cost_per_interval(start, end, position, cost);
            return;
        };
        self.position_orphan(slot, hint);
        self.count += 1;
    }

    /// Record a copy starting at `position` and covering up to `len` pixels,
    /// `distance_cost` being the cost of everything but the length.
    pub fn push_interval(&mut self, distance_cost: i64, position: usize, len: usize) {
        debug_assert!(len <= self.cost_cache.len());
        debug_assert!(position + len <= self.costs.len());

        if len < SKIP_DISTANCE {
            for k in 0..len {
                let cost = distance_cost.saturating_add(self.cost_cache[k]);
                self.update_cost(position + k, position, cost);
            }
            return;
        }

        let mut interval = self.head;

        for ci_idx in 0..self.cache_intervals.len() {
            let ci = self.cache_intervals[ci_idx];
            if ci.start >= len {
                break;
            }

            let mut start = position + ci.start;
            let end = position + ci.end.min(len);
            let cost = distance_cost.saturating_add(ci.cost);

            while let Some(slot) = interval {
                let cur = self.intervals[slot];
                if cur.start >= end {
                    break;
                }
                let next = cur.next;

                if start >= cur.end {
                    interval = next;
                    continue;
                }

                if cost >= cur.cost {
                    // The queued interval is at least as good: keep ours only
                    // in front of it.
                    self.insert_interval(Some(slot), cost, position, start, cur.start);
                    start = cur.end;
                    if start >= end {
                        break;
                    }
                    interval = next;
                    continue;
                }

                if start <= cur.start {
                    if cur.end <= end {
                        self.pop_interval(slot);
                    } else {
                        self.intervals[slot].start = end;
                        break;
                    }
                } else if end < cur.end {
                    // Ours sits strictly inside: split the queued one.
                    self.intervals[slot].end = start;
                    self.insert_interval(Some(slot), cur.cost, cur.index, end, cur.end);
                    interval = self.intervals[slot].next;
                    break;
                } else {
                    self.intervals[slot].end = start;
                }

                interval = next;
            }

            self.insert_interval(interval, cost, position, start, end);
        }
    }

    /// Apply every queued interval covering pixel `i`. With `do_clean`,
    /// intervals that end at or before `i` are dropped.
    pub fn update_cost_at_index(&mut self, i: usize, do_clean: bool) {
        let mut current = self.head;
        while let Some(slot) = current {
            let cur = self.intervals[slot];
            if cur.start > i {
                break;
            }
            if cur.end <= i {
                if do_clean {
                    self.pop_interval(slot);
                }
            } else {
                self.update_cost(i, cur.index, cur.cost);
            }
            current = cur.next;
        }
    }
}
