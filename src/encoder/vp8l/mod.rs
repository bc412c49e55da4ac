//! VP8L (lossless WebP) backward references and histogram clustering.
//!
//! The pipeline behind [`plan_lossless`]:
//!
//! 1. [`HashChain`] proposes one LZ77 copy per pixel.
//! 2. Greedy LZ77 or RLE parsers produce a first token stream.
//! 3. A colour cache size is picked by entropy estimation.
//! 4. [`trace_backwards_optimize`] re-parses the image against a
//!    [`CostModel`] built from the first stream, using the interval engine in
//!    [`CostManager`].
//! 5. Distances become 2D plane codes and per-tile [`Histogram`]s are
//!    clustered into a [`HistogramSet`].
//!
//! Bitstream details follow
//! <https://developers.google.com/speed/webp/docs/webp_lossless_bitstream_specification>

mod backward_refs;
mod color_cache;
mod cost_manager;
mod cost_model;
mod encode;
mod entropy;
mod hash_chain;
mod histogram;
mod histogram_set;
mod meta_huffman;
mod trace_backwards;
mod types;

pub use backward_refs::{
    apply_2d_locality, backward_references_lz77, backward_references_rle,
    calculate_best_cache_size, distance_to_plane_code, plane_code_to_distance, with_local_cache,
};
pub use color_cache::ColorCache;
pub use cost_manager::{CostManager, COST_CACHE_INTERVAL_SIZE_MAX};
pub use cost_model::CostModel;
pub use encode::{histo_bits_for, plan_lossless, LosslessPlan};
pub use entropy::{fast_log2, fast_slog2, LOG_2_PRECISION_BITS};
pub use hash_chain::{HashChain, MatchFinder};
pub use histogram::{
    prefix_decode, prefix_encode, prefix_extra_bits, CombinedCost, Histogram, ALPHA, BLUE,
    DISTANCE, LITERAL, RED,
};
pub use histogram_set::HistogramSet;
pub use meta_huffman::{combine_cost_factor, get_histo_image_symbols, greedy_threshold};
pub use trace_backwards::{trace_backwards_optimize, trace_backwards_with_interval_cap};
pub use types::{
    argb_alpha, argb_blue, argb_green, argb_red, make_argb, subsample_size, BackwardRefs,
    DistanceCoding, Lz77Variant, PixOrCopy, Vp8lConfig, MAX_COLOR_CACHE_BITS, MAX_DIMENSION,
    MAX_HUFFMAN_BITS, MAX_HUFF_IMAGE_SIZE, MAX_LENGTH, MIN_HUFFMAN_BITS, MIN_LENGTH,
    NUM_DISTANCE_CODES, NUM_LENGTH_CODES, NUM_LITERAL_CODES, WINDOW_SIZE,
};
