//! VP8L lossless core: optimal backward references and histogram clustering
//!
//! This crate implements the entropy-driven half of a WebP lossless encoder.
//! Given ARGB pixels it finds LZ77 copies, picks a colour cache size, refines
//! the parse with a cost-based dynamic programme, and clusters per-tile
//! symbol histograms so few Huffman code groups need to be sent.
//!
//! # Features
//!
//! - `std` (default): `std::error::Error` for [`Vp8lError`]. The algorithms
//!   only need `alloc`.
//!
//! # no_std Support
//!
//! ```toml
//! [dependencies]
//! zenvp8l = { version = "...", default-features = false }
//! ```
//!
//! # Planning an image
//!
//! ```rust
//! use zenvp8l::{plan_lossless, Vp8lConfig};
//!
//! let argb = vec![0xFF20_4060u32; 64 * 64];
//! let plan = plan_lossless(&argb, 64, 64, &Vp8lConfig::default())?;
//! assert_eq!(plan.decode()?, argb);
//! # Ok::<(), zenvp8l::Vp8lError>(())
//! ```
//!
//! Lower-level pieces ([`encoder::vp8l::trace_backwards_optimize`],
//! [`encoder::vp8l::get_histo_image_symbols`], the cost model and the
//! hash chain) are public under [`encoder::vp8l`].
//!
//! # Logging
//!
//! Decisions are reported through `tracing` at `debug` level and interval
//! statistics at `trace` level. No subscriber is installed.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

pub mod encoder;

pub use encoder::{
    plan_lossless, BackwardRefs, LosslessPlan, Lz77Variant, PixOrCopy, Vp8lConfig, Vp8lError,
    Vp8lResult,
};
