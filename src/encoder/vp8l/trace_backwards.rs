//! Cost-based optimal parsing (TraceBackwards).
//!
//! Improves a first-pass parse by a forward dynamic-programming sweep that
//! finds the cheapest way to reach every pixel under a [`CostModel`] built
//! from that parse, then walks the back-pointers to rebuild the token
//! stream. Matches libwebp's `BackwardReferencesTraceBackwards`.

use alloc::vec::Vec;

use tracing::{debug, trace};

use super::backward_refs::distance_to_plane_code;
use super::color_cache::ColorCache;
use super::cost_manager::{CostManager, COST_CACHE_INTERVAL_SIZE_MAX};
use super::cost_model::CostModel;
use super::entropy::div_round;
use super::hash_chain::MatchFinder;
use super::types::{check_cache_bits, BackwardRefs, PixOrCopy};
use crate::encoder::error::{Vp8lError, Vp8lResult};

/// Compute cost-based optimal backward references.
///
/// `refs_src` is a first-pass parse of `argb` with raw distances; it only
/// seeds the cost model. Returns refs with raw distances, cache indices
/// resolved for `cache_bits`.
pub fn trace_backwards_optimize<M: MatchFinder>(
    argb: &[u32],
    xsize: usize,
    cache_bits: u8,
    finder: &M,
    refs_src: &BackwardRefs,
) -> Vp8lResult<BackwardRefs> {
    trace_backwards_with_interval_cap(
        argb,
        xsize,
        cache_bits,
        finder,
        refs_src,
        COST_CACHE_INTERVAL_SIZE_MAX,
    )
}

/// [`trace_backwards_optimize`] with an explicit cap on queued cost
/// intervals. Intervals over the cap are applied eagerly, so any cap
/// (including 0) yields the same costs.
pub fn trace_backwards_with_interval_cap<M: MatchFinder>(
    argb: &[u32],
    xsize: usize,
    cache_bits: u8,
    finder: &M,
    refs_src: &BackwardRefs,
    max_intervals: usize,
) -> Vp8lResult<BackwardRefs> {
    check_cache_bits(cache_bits)?;
    if argb.is_empty() {
        return Ok(BackwardRefs::new());
    }
    let cost_model = CostModel::build(xsize, cache_bits, refs_src)?;
    let dist_array = cost_sweep(argb, xsize, cache_bits, finder, &cost_model, max_intervals)?;
    let path = trace_path(&dist_array)?;
    let refs = follow_chosen_path(argb, cache_bits, &path, finder)?;
    debug!(
        pixels = argb.len(),
        tokens = refs.len(),
        source_tokens = refs_src.len(),
        "trace backwards done"
    );
    Ok(refs)
}

/// Literal or cache-hit cost of `color`, added on top of `prev_cost`.
/// Matches libwebp's AddSingleLiteralWithCostModel; the cache sees every
/// pixel exactly once, in order.
#[inline]
fn single_literal_cost(
    color: u32,
    cost_model: &CostModel,
    cache: &mut Option<ColorCache>,
    prev_cost: i64,
) -> i64 {
    let hit = cache.as_ref().and_then(|c| c.contains(color));
    let cost = match hit {
        Some(idx) => div_round(cost_model.cache_cost(idx) * 68, 100),
        None => {
            if let Some(c) = cache.as_mut() {
                c.insert(color);
            }
            div_round(cost_model.literal_cost(color) * 82, 100)
        }
    };
    prev_cost.saturating_add(cost)
}

/// Forward sweep: minimal cost to reach every pixel and, for each, the
/// length of the last token on that path. `dist_array[0]` is 0: the first
/// pixel always starts the path.
pub(crate) fn cost_sweep<M: MatchFinder>(
    argb: &[u32],
    xsize: usize,
    cache_bits: u8,
    finder: &M,
    cost_model: &CostModel,
    max_intervals: usize,
) -> Vp8lResult<Vec<u16>> {
    let pix_count = argb.len();
    let mut manager = CostManager::new(pix_count, cost_model, max_intervals)?;
    let mut cache = ColorCache::optional(cache_bits)?;

    if pix_count == 0 {
        return Ok(manager.into_dist_array());
    }

    let first = single_literal_cost(argb[0], cost_model, &mut cache, 0);
    manager.set_start_cost(first);

    // Consecutive pixels often share one offset (flat areas, repeated
    // rows); their contributions are pushed once per run via `reach`.
    let mut offset_prev: Option<usize> = None;
    let mut len_prev = 0usize;
    let mut offset_cost = 0i64;
    let mut first_offset_is_constant = false;
    let mut reach = 0usize;
    let mut max_active = 0usize;

    for i in 1..pix_count {
        let prev_cost = manager.costs()[i - 1];
        let (offset, len) = finder.find_copy(i);

        let literal = single_literal_cost(argb[i], cost_model, &mut cache, prev_cost);
        manager.offer_literal(i, literal);

        if len >= 2 {
            if offset_prev != Some(offset) || len_prev < 2 {
                offset_cost = cost_model.distance_cost(distance_to_plane_code(xsize, offset));
                first_offset_is_constant = true;
                manager.push_interval(prev_cost.saturating_add(offset_cost), i, len);
            } else {
                if first_offset_is_constant {
                    reach = i - 1 + len_prev - 1;
                    first_offset_is_constant = false;
                }

                if i + len - 1 > reach {
                    // Find the last pixel within [i, reach + 1] still using
                    // this offset and push its copy.
                    let mut j = i;
                    while j <= reach && finder.find_offset(j + 1) == offset {
                        j += 1;
                    }
                    let len_j = finder.find_length(j);

                    manager.update_cost_at_index(j - 1, false);
                    manager.update_cost_at_index(j, false);

                    let base = manager.costs()[j - 1].saturating_add(offset_cost);
                    manager.push_interval(base, j, len_j);
                    reach = j + len_j - 1;
                }
            }
        }

        manager.update_cost_at_index(i, true);
        max_active = max_active.max(manager.active_intervals());
        offset_prev = Some(offset);
        len_prev = len;
    }

    trace!(
        pixels = pix_count,
        max_active,
        cache_intervals = manager.cache_interval_count(),
        "cost sweep intervals"
    );
    Ok(manager.into_dist_array())
}

/// Walk the back-pointers from the last pixel and return the token
/// lengths in emission order.
pub(crate) fn trace_path(dist_array: &[u16]) -> Vp8lResult<Vec<u16>> {
    let mut path = Vec::new();
    let mut end = dist_array.len();
    while end > 0 {
        let len = if end == 1 { 1 } else { dist_array[end - 1] };
        if len == 0 || len as usize > end {
            return Err(Vp8lError::InvalidReference { position: end - 1 });
        }
        path.try_reserve(1)
            .map_err(|_| Vp8lError::OutOfMemory { what: "chosen path" })?;
        path.push(len);
        end -= len as usize;
    }
    path.reverse();
    Ok(path)
}

/// Re-walk the image along `path`, emitting literals, cache hits and
/// copies with the match finder's offsets.
pub(crate) fn follow_chosen_path<M: MatchFinder>(
    argb: &[u32],
    cache_bits: u8,
    path: &[u16],
    finder: &M,
) -> Vp8lResult<BackwardRefs> {
    let mut cache = ColorCache::optional(cache_bits)?;
    let mut refs = BackwardRefs::try_with_capacity(path.len())?;

    let mut i = 0usize;
    for &len in path {
        let len = len as usize;
        if len == 1 {
            let color = argb[i];
            let hit = cache.as_ref().and_then(|c| c.contains(color));
            match hit {
                Some(idx) => refs.push(PixOrCopy::cache_idx(idx)),
                None => {
                    if let Some(c) = cache.as_mut() {
                        c.insert(color);
                    }
                    refs.push(PixOrCopy::literal(color));
                }
            }
        } else {
            let offset = finder.find_offset(i);
            if offset == 0 || offset > i {
                return Err(Vp8lError::InvalidReference { position: i });
            }
            refs.push(PixOrCopy::copy(len as u16, offset as u32));
            if let Some(c) = cache.as_mut() {
                for &color in &argb[i..i + len] {
                    c.insert(color);
                }
            }
        }
        i += len;
    }

    Ok(refs)
}
