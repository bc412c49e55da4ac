//! Per-tile histograms and the histogram image.
//!
//! The image is split into `1 << histo_bits` square tiles. Each tile gets
//! the histogram of the tokens starting inside it; clustering then maps
//! every tile to one of a few shared histograms.

use alloc::vec::Vec;

use super::histogram::Histogram;
use super::types::{subsample_size, BackwardRefs};
use crate::encoder::error::{Vp8lError, Vp8lResult};

/// Clustered histograms plus the tile-to-histogram map.
#[derive(Debug, Clone)]
pub struct HistogramSet {
    /// One histogram per Huffman code group.
    pub histograms: Vec<Histogram>,
    /// Index into `histograms` for every tile, in raster order.
    pub symbols: Vec<u32>,
    /// Tile size, log2.
    pub histo_bits: u8,
    /// Tiles per row.
    pub histo_xsize: usize,
}

impl HistogramSet {
    /// Number of code groups.
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    /// True when there are no code groups.
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    /// Number of tiles in the histogram image.
    pub fn tile_count(&self) -> usize {
        self.symbols.len()
    }

    /// Histogram used by the tile containing pixel `(x, y)`.
    pub fn histogram_at(&self, x: usize, y: usize) -> Option<&Histogram> {
        let tile = (y >> self.histo_bits) * self.histo_xsize + (x >> self.histo_bits);
        let symbol = *self.symbols.get(tile)?;
        self.histograms.get(symbol as usize)
    }
}

/// Tiles per row and per column for `histo_bits`.
pub(crate) fn tile_grid(xsize: usize, ysize: usize, histo_bits: u8) -> (usize, usize) {
    (
        subsample_size(xsize as u32, histo_bits) as usize,
        subsample_size(ysize as u32, histo_bits) as usize,
    )
}

/// Build one histogram per tile from a plane-coded token stream.
///
/// A token is attributed to the tile of its first pixel.
pub(crate) fn build_tile_histograms(
    refs: &BackwardRefs,
    xsize: usize,
    ysize: usize,
    histo_bits: u8,
    cache_bits: u8,
) -> Vp8lResult<Vec<Histogram>> {
    let (histo_xsize, histo_ysize) = tile_grid(xsize, ysize, histo_bits);
    let tile_count = histo_xsize * histo_ysize;

    let mut tiles = Vec::new();
    tiles
        .try_reserve_exact(tile_count)
        .map_err(|_| Vp8lError::OutOfMemory { what: "tile histograms" })?;
    for _ in 0..tile_count {
        tiles.push(Histogram::new(cache_bits)?);
    }

    let (mut x, mut y) = (0usize, 0usize);
    let mut position = 0usize;
    for token in refs.iter() {
        let ix = (y >> histo_bits) * histo_xsize + (x >> histo_bits);
        let tile = tiles
            .get_mut(ix)
            .ok_or(Vp8lError::InvalidReference { position })?;
        tile.add_token(token);

        let len = token.pixel_len();
        position += len;
        x += len;
        while x >= xsize && xsize > 0 {
            x -= xsize;
            y += 1;
        }
    }
    Ok(tiles)
}

/// Result of separating used tiles from empty ones.
pub(crate) struct AnalyzedTiles {
    /// Per-tile histograms with up-to-date costs; `None` for empty tiles.
    pub originals: Vec<Option<Histogram>>,
    /// Working copies of the used tiles, densely packed.
    pub clusters: Vec<Option<Histogram>>,
    /// Cluster index of every tile. Empty tiles reuse their predecessor's.
    pub symbols: Vec<u32>,
}

/// Compute costs of every tile and copy the non-empty ones into a dense
/// working set, one cluster per tile.
pub(crate) fn copy_and_analyze(tiles: Vec<Histogram>) -> Vp8lResult<AnalyzedTiles> {
    let mut originals = Vec::new();
    let mut clusters = Vec::new();
    let mut symbols = Vec::new();
    originals
        .try_reserve_exact(tiles.len())
        .map_err(|_| Vp8lError::OutOfMemory { what: "tile histograms" })?;
    clusters
        .try_reserve_exact(tiles.len())
        .map_err(|_| Vp8lError::OutOfMemory { what: "histogram clusters" })?;
    symbols
        .try_reserve_exact(tiles.len())
        .map_err(|_| Vp8lError::OutOfMemory { what: "histogram symbols" })?;

    for mut histo in tiles {
        histo.update_cost();
        if histo.is_empty() {
            let prev = symbols.last().copied().unwrap_or(0);
            symbols.push(prev);
            originals.push(None);
        } else {
            symbols.push(clusters.len() as u32);
            clusters.push(Some(histo.clone()));
            originals.push(Some(histo));
        }
    }

    Ok(AnalyzedTiles {
        originals,
        clusters,
        symbols,
    })
}

/// Drop the slots emptied by merges, keeping the survivors in order.
pub(crate) fn remove_empty(clusters: Vec<Option<Histogram>>) -> Vec<Histogram> {
    clusters.into_iter().flatten().collect()
}

/// Assign every tile to the cluster its histogram joins most cheaply, then
/// rebuild the clusters from the original tile counts.
pub(crate) fn remap(
    originals: &[Option<Histogram>],
    clusters: &mut [Histogram],
    symbols: &mut [u32],
) {
    debug_assert_eq!(originals.len(), symbols.len());
    if clusters.len() > 1 {
        for i in 0..originals.len() {
            let Some(tile) = originals[i].as_ref() else {
                symbols[i] = if i == 0 { 0 } else { symbols[i - 1] };
                continue;
            };
            let mut best_out = 0usize;
            let mut best_bits = i64::MAX;
            for (k, cluster) in clusters.iter().enumerate() {
                if let Some(cur_bits) = Histogram::add_thresh(cluster, tile, best_bits) {
                    best_bits = cur_bits;
                    best_out = k;
                }
            }
            symbols[i] = best_out as u32;
        }
    } else {
        symbols.fill(0);
    }

    for cluster in clusters.iter_mut() {
        cluster.clear();
    }
    for (tile, &symbol) in originals.iter().zip(symbols.iter()) {
        if let Some(tile) = tile {
            clusters[symbol as usize].add(tile);
        }
    }
    for cluster in clusters.iter_mut() {
        cluster.update_cost();
    }
}
