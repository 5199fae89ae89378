//! World assembly: terrain → objects → islands → [`WorldGrid`], plus the
//! two runtime generators that keep acting on a live grid (spawn selection
//! and tree regrowth).

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::grid::WorldGrid;
use crate::islands;
use crate::objects::{try_place, ObjectPlacer, ObjectSpec, PlacedTile};
use crate::terrain::{TerrainGenerator, TerrainParams};
use crate::tiles::{TileId, TileKind};

/// How many random cells `pick_spawn` probes before scanning.
const SPAWN_PROBES: usize = 256;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub terrain: TerrainParams,
    pub objects: Vec<ObjectSpec>,
    /// Total layers including the base.
    pub layer_count: usize,
    pub tile_size: u32,
    pub display_size: u32,
    /// Fixed RNG seed; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainParams::default(),
            objects: ObjectSpec::defaults(),
            layer_count: 3,
            tile_size: 16,
            display_size: 48,
            seed: None,
        }
    }
}

impl WorldConfig {
    pub fn land_tile(&self) -> TileId {
        self.terrain.main_tile
    }

    /// Specs regrowth is allowed to plant: the configured objects that are
    /// trees (a trunk with a crown satellite).
    pub fn tree_specs(&self) -> Vec<ObjectSpec> {
        self.objects
            .iter()
            .filter(|s| {
                matches!(
                    TileKind::from_id(s.tile),
                    Some(TileKind::TreeBottom | TileKind::AppleTreeBottom)
                )
            })
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Build a complete world. Configuration errors are fatal to the caller.
pub fn generate_world<R: Rng + ?Sized>(
    config: &WorldConfig,
    rng: &mut R,
) -> Result<WorldGrid, GenerationError> {
    let terrain = TerrainGenerator::new(config.terrain.clone())?;
    let placer = ObjectPlacer::new(config.objects.clone(), config.layer_count)?;

    let base = terrain.generate(rng);
    let objects = placer.place(&base.tiles, base.cols, base.rows, config.land_tile(), rng);
    let (island_grid, island_count) =
        islands::label(&base.tiles, base.cols, base.rows, config.land_tile());

    info!(
        "Generated {}x{} world with {} islands",
        base.cols, base.rows, island_count
    );

    let mut layers = Vec::with_capacity(config.layer_count);
    layers.push(base.tiles);
    layers.extend(objects.into_inner());

    let grid = WorldGrid::from_parts(
        base.cols,
        base.rows,
        config.tile_size,
        config.display_size,
        layers,
        island_grid,
        island_count,
    )?;
    Ok(grid)
}

// ---------------------------------------------------------------------------
// Spawn selection
// ---------------------------------------------------------------------------

fn is_spawnable(grid: &WorldGrid, land: TileId, col: usize, row: usize) -> bool {
    grid.tile(0, col, row) == land && !grid.is_solid(col, row)
}

/// A random walkable land cell, or `None` if the map has none.
pub fn pick_spawn<R: Rng + ?Sized>(
    grid: &WorldGrid,
    land: TileId,
    rng: &mut R,
) -> Option<(usize, usize)> {
    if grid.cols() == 0 || grid.rows() == 0 {
        return None;
    }

    for _ in 0..SPAWN_PROBES {
        let col = rng.gen_range(0..grid.cols());
        let row = rng.gen_range(0..grid.rows());
        if is_spawnable(grid, land, col, row) {
            return Some((col, row));
        }
    }

    (0..grid.rows())
        .flat_map(|row| (0..grid.cols()).map(move |col| (col, row)))
        .find(|&(col, row)| is_spawnable(grid, land, col, row))
}

// ---------------------------------------------------------------------------
// Regrowth
// ---------------------------------------------------------------------------

/// Plant trees over empty land with probability `chance` per cell and return
/// every tile written so it can be sent as one patch.
pub fn grow_trees<R: Rng + ?Sized>(
    grid: &mut WorldGrid,
    specs: &[ObjectSpec],
    land: TileId,
    chance: f64,
    rng: &mut R,
) -> Vec<PlacedTile> {
    let mut patch = Vec::new();
    if specs.is_empty() || chance <= 0.0 {
        return patch;
    }

    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            if grid.tile(0, col, row) != land || !grid.objects_empty_at(col, row) {
                continue;
            }
            if rng.gen::<f64>() >= chance {
                continue;
            }
            let spec = &specs[rng.gen_range(0..specs.len())];
            if spec.layer >= grid.layer_count()
                || spec.satellites.iter().any(|s| s.layer >= grid.layer_count())
            {
                continue;
            }
            if let Some(written) = try_place(grid, spec, col, row) {
                patch.extend(written);
            }
        }
    }

    debug!("Regrowth planted {} tiles", patch.len());
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::EMPTY;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_config() -> WorldConfig {
        WorldConfig {
            terrain: TerrainParams {
                seed_size: 4,
                passes: 2,
                ..Default::default()
            },
            seed: Some(11),
            ..Default::default()
        }
    }

    #[test]
    fn generated_world_has_consistent_layers() {
        let config = small_config();
        let grid = generate_world(&config, &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(grid.cols(), 16);
        assert_eq!(grid.rows(), 16);
        assert_eq!(grid.layer_count(), 3);
        for layer in grid.layers() {
            assert_eq!(layer.len(), 256);
        }
    }

    #[test]
    fn same_seed_same_world() {
        let config = small_config();
        let a = generate_world(&config, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = generate_world(&config, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn bad_config_is_fatal() {
        let mut config = small_config();
        config.terrain.smoothing = 10;
        assert_eq!(
            generate_world(&config, &mut StdRng::seed_from_u64(0)).unwrap_err(),
            GenerationError::Smoothing(10)
        );
    }

    #[test]
    fn spawn_is_walkable_land() {
        let config = small_config();
        let mut rng = StdRng::seed_from_u64(9);
        let grid = generate_world(&config, &mut rng).unwrap();
        if let Some((col, row)) = pick_spawn(&grid, config.land_tile(), &mut rng) {
            assert_eq!(grid.tile(0, col, row), config.land_tile());
            assert!(!grid.is_solid(col, row));
        } else {
            assert!((0..grid.rows())
                .all(|r| (0..grid.cols()).all(|c| grid.tile(0, c, r) != config.land_tile())));
        }
    }

    #[test]
    fn regrowth_only_touches_empty_land() {
        let mut config = small_config();
        config.terrain.main_tile_chance = 1.0;
        config.objects = Vec::new();
        let mut rng = StdRng::seed_from_u64(4);
        let mut grid = generate_world(&config, &mut rng).unwrap();
        let specs = vec![ObjectSpec::tree(TileKind::TreeBottom, TileKind::TreeTop, 1.0)];

        let patch = grow_trees(&mut grid, &specs, config.land_tile(), 1.0, &mut rng);
        assert!(!patch.is_empty());
        for t in &patch {
            assert_eq!(grid.tile(t.layer, t.col, t.row), t.tile);
        }

        // Second pass: nothing grows where trunks already stand.
        let again = grow_trees(&mut grid, &specs, config.land_tile(), 1.0, &mut rng);
        for t in again.iter().filter(|t| t.layer == 1) {
            assert!(!patch.iter().any(|p| p.layer == 1 && p.col == t.col && p.row == t.row));
        }
    }

    #[test]
    fn regrowth_crowns_never_cover_existing_objects() {
        let mut config = small_config();
        config.terrain.main_tile_chance = 1.0;
        config.objects = vec![ObjectSpec::single(TileKind::YellowFlower, 0.5)];
        let mut rng = StdRng::seed_from_u64(6);
        let mut grid = generate_world(&config, &mut rng).unwrap();
        let flowers: Vec<(usize, usize)> = (0..grid.rows())
            .flat_map(|r| (0..grid.cols()).map(move |c| (c, r)))
            .filter(|&(c, r)| grid.tile(1, c, r) == TileKind::YellowFlower.id())
            .collect();
        assert!(!flowers.is_empty());

        let specs = vec![ObjectSpec::tree(TileKind::TreeBottom, TileKind::TreeTop, 1.0)];
        grow_trees(&mut grid, &specs, config.land_tile(), 1.0, &mut rng);
        for (c, r) in flowers {
            assert_eq!(grid.tile(1, c, r), TileKind::YellowFlower.id());
            assert_eq!(grid.tile(2, c, r), EMPTY);
        }
    }
}
