//! Terrain subsystem: the stochastic cellular automaton that produces the
//! base layer.
//!
//! A small random seed grid is repeatedly doubled and refined. Each
//! refinement pass lets every cell look at its clipped 3×3 neighbourhood in
//! the freshly expanded grid and re-roll itself, biased toward the local
//! majority. Higher smoothing thresholds give larger, rounder landmasses.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::tiles::{TileId, TileKind};

/// Largest accepted side length; keeps `cols * rows` well inside `usize`.
pub const MAX_SIDE: usize = 1 << 14;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerrainParams {
    /// Side length of the initial random grid.
    pub seed_size: usize,
    /// Tile the automaton grows (usually land).
    pub main_tile: TileId,
    /// Tile everything else becomes (usually water).
    pub fill_tile: TileId,
    /// Probability a seed cell starts as `main_tile`.
    pub main_tile_chance: f64,
    /// Number of doubling + refinement passes.
    pub passes: u32,
    /// Maximum non-main neighbours a cell tolerates before turning to fill.
    pub smoothing: u32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed_size: 8,
            main_tile: TileKind::Land.id(),
            fill_tile: TileKind::Water.id(),
            main_tile_chance: 0.45,
            passes: 4,
            smoothing: 5,
        }
    }
}

impl TerrainParams {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.seed_size < 1 {
            return Err(GenerationError::SeedSize(self.seed_size));
        }
        if !(0.0..=1.0).contains(&self.main_tile_chance) {
            return Err(GenerationError::MainTileChance(self.main_tile_chance));
        }
        if self.smoothing > 9 {
            return Err(GenerationError::Smoothing(self.smoothing));
        }
        if self.main_tile == self.fill_tile {
            return Err(GenerationError::SameTiles(self.main_tile));
        }
        if self.side().is_none() {
            return Err(GenerationError::TooManyPasses {
                seed_size: self.seed_size,
                passes: self.passes,
            });
        }
        Ok(())
    }

    /// `seed_size * 2^passes`, or `None` when that exceeds [`MAX_SIDE`].
    pub fn side(&self) -> Option<usize> {
        let factor = 1usize.checked_shl(self.passes)?;
        self.seed_size
            .checked_mul(factor)
            .filter(|side| *side <= MAX_SIDE)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A square, row-major base layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainLayer {
    pub cols: usize,
    pub rows: usize,
    pub tiles: Vec<TileId>,
}

impl TerrainLayer {
    pub fn get(&self, col: usize, row: usize) -> TileId {
        self.tiles[row * self.cols + col]
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct TerrainGenerator {
    params: TerrainParams,
}

impl TerrainGenerator {
    /// Validates `params`; invalid parameters are a configuration error.
    pub fn new(params: TerrainParams) -> Result<Self, GenerationError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Run the automaton. Deterministic for a given RNG stream.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> TerrainLayer {
        let p = &self.params;

        let mut side = p.seed_size;
        let mut cells: Vec<TileId> = (0..side * side)
            .map(|_| {
                if rng.gen::<f64>() < p.main_tile_chance {
                    p.main_tile
                } else {
                    p.fill_tile
                }
            })
            .collect();

        for _ in 0..p.passes {
            let expanded = expand(&cells, side);
            side *= 2;
            cells = self.refine(&expanded, side, rng);
        }

        TerrainLayer {
            cols: side,
            rows: side,
            tiles: cells,
        }
    }

    fn refine<R: Rng + ?Sized>(&self, grid: &[TileId], side: usize, rng: &mut R) -> Vec<TileId> {
        let p = &self.params;
        let mut out = Vec::with_capacity(grid.len());

        for row in 0..side {
            for col in 0..side {
                let (main, total) = neighbourhood(grid, side, col, row, p.main_tile);
                let draw = rng.gen::<f64>() * total as f64;
                let tile = if total - main > p.smoothing || draw >= main as f64 {
                    p.fill_tile
                } else {
                    p.main_tile
                };
                out.push(tile);
            }
        }

        out
    }
}

/// Every cell becomes a 2×2 block.
fn expand(cells: &[TileId], side: usize) -> Vec<TileId> {
    let wide = side * 2;
    let mut out = vec![0; wide * wide];
    for row in 0..wide {
        for col in 0..wide {
            out[row * wide + col] = cells[(row / 2) * side + col / 2];
        }
    }
    out
}

/// `(main cells, in-bounds cells)` in the 3×3 block centred on (col, row).
fn neighbourhood(grid: &[TileId], side: usize, col: usize, row: usize, main: TileId) -> (u32, u32) {
    let mut main_count = 0;
    let mut total = 0;

    let c0 = col.saturating_sub(1);
    let r0 = row.saturating_sub(1);
    let c1 = (col + 1).min(side - 1);
    let r1 = (row + 1).min(side - 1);

    for r in r0..=r1 {
        for c in c0..=c1 {
            total += 1;
            if grid[r * side + c] == main {
                main_count += 1;
            }
        }
    }

    (main_count, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_doubles_each_cell() {
        let out = expand(&[1, 2, 3, 4], 2);
        assert_eq!(
            out,
            vec![
                1, 1, 2, 2, //
                1, 1, 2, 2, //
                3, 3, 4, 4, //
                3, 3, 4, 4,
            ]
        );
    }

    #[test]
    fn neighbourhood_clips_at_edges() {
        let grid = vec![7; 9];
        assert_eq!(neighbourhood(&grid, 3, 0, 0, 7), (4, 4));
        assert_eq!(neighbourhood(&grid, 3, 1, 0, 7), (6, 6));
        assert_eq!(neighbourhood(&grid, 3, 1, 1, 7), (9, 9));
        assert_eq!(neighbourhood(&grid, 3, 2, 2, 1), (0, 4));
    }

    #[test]
    fn side_overflow_is_rejected() {
        let params = TerrainParams {
            seed_size: 4,
            passes: 40,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(GenerationError::TooManyPasses { .. })
        ));
    }
}
