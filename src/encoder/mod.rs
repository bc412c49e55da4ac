//! Lossless encoder core.

mod error;
/// VP8L backward references and histogram clustering.
pub mod vp8l;

pub use error::{Vp8lError, Vp8lResult};
pub use vp8l::{plan_lossless, BackwardRefs, LosslessPlan, Lz77Variant, PixOrCopy, Vp8lConfig};
