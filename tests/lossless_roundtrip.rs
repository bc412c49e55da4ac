//! Lossless planning roundtrip tests.
//!
//! Verifies that replaying the planned tokens reproduces the input exactly,
//! that token lengths cover every pixel once, and that clustering keeps
//! every symbol count, for synthetic images and configuration combinations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zenvp8l::encoder::vp8l::{
    backward_references_lz77, get_histo_image_symbols, trace_backwards_optimize,
    trace_backwards_with_interval_cap, DistanceCoding, HashChain, Histogram, DISTANCE, LITERAL,
};
use zenvp8l::{plan_lossless, BackwardRefs, Lz77Variant, PixOrCopy, Vp8lConfig, Vp8lError};

/// Plan, replay, and verify pixel-identical output plus token conservation.
fn assert_lossless_roundtrip(argb: &[u32], w: usize, h: usize, config: &Vp8lConfig) {
    let plan = plan_lossless(argb, w, h, config).expect("planning failed");
    assert_eq!(plan.width, w);
    assert_eq!(plan.height, h);

    let covered: usize = plan
        .refs
        .iter()
        .map(|t| match *t {
            PixOrCopy::Copy { len, .. } => len as usize,
            PixOrCopy::Literal(_) | PixOrCopy::CacheIdx(_) => 1,
        })
        .sum();
    assert_eq!(covered, w * h, "tokens must cover each pixel once");

    let decoded = plan.decode().expect("replay failed");
    let mismatches = decoded.iter().zip(argb).filter(|(a, b)| a != b).count();
    assert_eq!(mismatches, 0, "{mismatches}/{} pixel mismatches", w * h);
}

/// Per-population totals over a set of histograms.
fn population_totals<'a>(histos: impl IntoIterator<Item = &'a Histogram>) -> [u64; 5] {
    let mut totals = [0u64; 5];
    for h in histos {
        for (i, t) in totals.iter_mut().enumerate() {
            *t += h.population(i).iter().map(|&c| c as u64).sum::<u64>();
        }
    }
    totals
}

fn deterministic_noise(w: usize, h: usize) -> Vec<u32> {
    let mut seed = 42u64;
    (0..w * h)
        .map(|_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            0xFF00_0000 | (seed >> 40) as u32
        })
        .collect()
}

fn horizontal_gradient(w: usize, h: usize) -> Vec<u32> {
    (0..w * h)
        .map(|i| {
            let x = (i % w) as u32;
            let v = x * 256 / w as u32;
            0xFF00_0000 | v << 16 | 100 << 8 | 100
        })
        .collect()
}

fn bidirectional_gradient(w: usize, h: usize) -> Vec<u32> {
    (0..w * h)
        .map(|i| {
            let (x, y) = ((i % w) as u32, (i / w) as u32);
            let r = x * 255 / w as u32;
            let g = y * 255 / h as u32;
            0xFF00_0000 | r << 16 | g << 8 | ((r + g) / 2)
        })
        .collect()
}

fn stripes(w: usize, h: usize, period: usize) -> Vec<u32> {
    const COLORS: [u32; 3] = [0xFF20_3040, 0xFFE0_D0C0, 0x8011_2233];
    (0..w * h)
        .map(|i| COLORS[((i % w) / period + i / w) % COLORS.len()])
        .collect()
}

/// Mostly flat with a noisy band, so both copies and literals matter.
fn two_halves(w: usize, h: usize) -> Vec<u32> {
    let noise = deterministic_noise(w, h);
    (0..w * h)
        .map(|i| if (i / w) < h / 2 { 0xFF40_8020 } else { noise[i] })
        .collect()
}

#[test]
fn flat_image_default_config() {
    let argb = vec![0xFF12_3456u32; 64 * 48];
    assert_lossless_roundtrip(&argb, 64, 48, &Vp8lConfig::default());
}

#[test]
fn single_pixel() {
    let argb = [0xFF11_2233u32];
    let plan = plan_lossless(&argb, 1, 1, &Vp8lConfig::default()).unwrap();
    assert_eq!(plan.refs.tokens, [PixOrCopy::literal(0xFF11_2233)]);
    assert_eq!(plan.decode().unwrap(), argb);
}

#[test]
fn flat_row_is_literal_then_copy() {
    let argb = vec![0xFF80_8080u32; 100];
    for cache_bits in [0u8, 4] {
        let config = Vp8lConfig {
            cache_bits,
            ..Default::default()
        };
        let plan = plan_lossless(&argb, 100, 1, &config).unwrap();
        assert_eq!(plan.refs.len(), 2, "cache_bits={cache_bits}");
        assert!(plan.refs.tokens[0].is_literal());
        assert!(matches!(plan.refs.tokens[1], PixOrCopy::Copy { len: 99, .. }));
        assert_eq!(plan.histogram_set.len(), 1);
        assert!(plan.histogram_set.histograms[0].trivial_symbol().is_some());
    }
}

#[test]
fn empty_image() {
    let plan = plan_lossless(&[], 0, 0, &Vp8lConfig::default()).unwrap();
    assert!(plan.refs.is_empty());
    assert_eq!(plan.refs.pixel_count(), 0);
}

#[test]
fn noise_all_variants() {
    let (w, h) = (96, 64);
    let argb = deterministic_noise(w, h);
    for lz77 in [Lz77Variant::Standard, Lz77Variant::Rle, Lz77Variant::Auto] {
        let config = Vp8lConfig {
            lz77,
            ..Default::default()
        };
        assert_lossless_roundtrip(&argb, w, h, &config);
    }
}

#[test]
fn gradients_all_methods() {
    let (w, h) = (80, 60);
    for argb in [horizontal_gradient(w, h), bidirectional_gradient(w, h)] {
        for method in 0..=6 {
            let config = Vp8lConfig {
                method,
                ..Default::default()
            };
            assert_lossless_roundtrip(&argb, w, h, &config);
        }
    }
}

#[test]
fn stripes_quality_sweep() {
    let (w, h) = (77, 41);
    let argb = stripes(w, h, 5);
    for quality in [0, 25, 26, 50, 90, 100] {
        let config = Vp8lConfig {
            quality,
            ..Default::default()
        };
        assert_lossless_roundtrip(&argb, w, h, &config);
    }
}

#[test]
fn two_halves_low_effort_and_histogram_bits() {
    let (w, h) = (128, 64);
    let argb = two_halves(w, h);
    for histogram_bits in [Some(2), Some(5), Some(9), None] {
        for low_effort in [false, true] {
            let config = Vp8lConfig {
                low_effort,
                histogram_bits,
                ..Default::default()
            };
            assert_lossless_roundtrip(&argb, w, h, &config);
        }
    }
}

#[test]
fn odd_sizes() {
    for (w, h) in [(1, 37), (37, 1), (2, 2), (7, 3), (9, 13), (130, 3)] {
        let argb = stripes(w, h, 2);
        assert_lossless_roundtrip(&argb, w, h, &Vp8lConfig::default());
        let noise = deterministic_noise(w, h);
        assert_lossless_roundtrip(&noise, w, h, &Vp8lConfig::default());
    }
}

#[test]
fn random_palette_images() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..6 {
        let w = rng.gen_range(1..=70);
        let h = rng.gen_range(1..=50);
        let palette: Vec<u32> = (0..rng.gen_range(1..=12)).map(|_| rng.gen()).collect();
        let argb: Vec<u32> = (0..w * h)
            .map(|_| palette[rng.gen_range(0..palette.len())])
            .collect();
        let config = Vp8lConfig {
            quality: rng.gen_range(0..=100),
            method: rng.gen_range(0..=6),
            cache_bits: rng.gen_range(0..=10),
            ..Default::default()
        };
        assert_lossless_roundtrip(&argb, w, h, &config);
    }
}

#[test]
fn histogram_mass_is_conserved() {
    let (w, h) = (120, 90);
    let argb = two_halves(w, h);
    for quality in [10, 75, 100] {
        let config = Vp8lConfig {
            quality,
            histogram_bits: Some(3),
            ..Default::default()
        };
        let plan = plan_lossless(&argb, w, h, &config).unwrap();
        let whole = Histogram::from_refs(&plan.refs, plan.cache_bits).unwrap();
        assert_eq!(
            population_totals(&plan.histogram_set.histograms),
            population_totals([&whole]),
            "quality={quality}"
        );
        assert_eq!(plan.histogram_set.tile_count(), 15 * 12);
    }
}

#[test]
fn estimate_bits_is_idempotent() {
    let argb = bidirectional_gradient(40, 40);
    let plan = plan_lossless(&argb, 40, 40, &Vp8lConfig::default()).unwrap();
    for histo in &plan.histogram_set.histograms {
        assert_eq!(histo.estimate_bits(), histo.estimate_bits());
    }
    assert_eq!(plan.estimated_bits(), plan.estimated_bits());
}

#[test]
fn optimizer_with_single_interval_roundtrips() {
    let (w, h) = (64, 48);
    let argb = two_halves(w, h);
    let chain = HashChain::new(&argb, 90, w).unwrap();
    let seed = backward_references_lz77(&argb, &chain).unwrap();
    for cache_bits in [0u8, 6] {
        let capped =
            trace_backwards_with_interval_cap(&argb, w, cache_bits, &chain, &seed, 1).unwrap();
        let decoded = capped.replay(w * h, cache_bits, DistanceCoding::Raw).unwrap();
        assert_eq!(decoded, argb);

        let uncapped = trace_backwards_optimize(&argb, w, cache_bits, &chain, &seed).unwrap();
        assert_eq!(uncapped.pixel_count(), capped.pixel_count());
        assert_eq!(
            uncapped.replay(w * h, cache_bits, DistanceCoding::Raw).unwrap(),
            argb
        );
    }
}

#[test]
fn clustering_public_entry_point() {
    let (w, h) = (64, 64);
    let argb = stripes(w, h, 3);
    let chain = HashChain::new(&argb, 75, w).unwrap();
    let mut refs = backward_references_lz77(&argb, &chain).unwrap();
    zenvp8l::encoder::vp8l::apply_2d_locality(&mut refs, w);
    let set = get_histo_image_symbols(w, h, &refs, 75, false, 4, 0).unwrap();
    assert_eq!(set.tile_count(), 16);
    assert!(set.histograms.iter().all(|h| h.is_used(LITERAL)));
    let distance_total: u64 = set
        .histograms
        .iter()
        .map(|h| h.population(DISTANCE).iter().map(|&c| c as u64).sum::<u64>())
        .sum();
    let copies = refs.iter().filter(|t| t.is_copy()).count() as u64;
    assert_eq!(distance_total, copies);
}

#[test]
fn malformed_streams_are_rejected() {
    let mut refs = BackwardRefs::new();
    refs.push(PixOrCopy::literal(1));
    refs.push(PixOrCopy::copy(3, 2));
    assert_eq!(
        refs.replay(4, 0, DistanceCoding::Raw),
        Err(Vp8lError::InvalidReference { position: 1 })
    );

    let err = plan_lossless(&[0; 10], 3, 3, &Vp8lConfig::default()).unwrap_err();
    assert!(matches!(err, Vp8lError::InvalidDimensions { len: 10, .. }));
}
