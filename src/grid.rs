//! `WorldGrid` – the runtime-mutable, multi-layer tile store.
//!
//! Layer 0 is terrain, layers 1..N are objects and overlays. The grid is a
//! plain data structure: it never broadcasts; whoever mutates it is
//! responsible for telling everyone else.

use crate::error::WorldError;
use crate::islands::{self, IslandId, IslandRemap};
use crate::objects::TileCanvas;
use crate::tiles::{collision_of, fits_layer, Collision, TileId, EMPTY};

#[derive(Debug, Clone, PartialEq)]
pub struct WorldGrid {
    cols: usize,
    rows: usize,
    /// Source tile size in the sprite atlas.
    tile_size: u32,
    /// On-screen tile size; all pixel conversions use this.
    display_size: u32,
    layers: Vec<Vec<TileId>>,
    islands: Vec<IslandId>,
    island_count: u32,
}

impl WorldGrid {
    /// Assemble a grid from already generated parts, checking every layer
    /// and the island grid have `cols * rows` cells.
    pub fn from_parts(
        cols: usize,
        rows: usize,
        tile_size: u32,
        display_size: u32,
        layers: Vec<Vec<TileId>>,
        islands: Vec<IslandId>,
        island_count: u32,
    ) -> Result<Self, WorldError> {
        let expected = cols * rows;
        if layers.is_empty() {
            return Err(WorldError::NoLayers);
        }
        for (layer, cells) in layers.iter().enumerate() {
            if cells.len() != expected {
                return Err(WorldError::LayerSize {
                    layer,
                    len: cells.len(),
                    expected,
                });
            }
        }
        if islands.len() != expected {
            return Err(WorldError::IslandSize {
                len: islands.len(),
                expected,
            });
        }

        Ok(Self {
            cols,
            rows,
            tile_size,
            display_size: display_size.max(1),
            layers,
            islands,
            island_count,
        })
    }

    // -----------------------------------------------------------------------
    // Dimensions
    // -----------------------------------------------------------------------

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn display_size(&self) -> u32 {
        self.display_size
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, layer: usize) -> &[TileId] {
        &self.layers[layer]
    }

    pub fn layers(&self) -> &[Vec<TileId>] {
        &self.layers
    }

    pub fn pixel_width(&self) -> f64 {
        (self.cols as u64 * self.display_size as u64) as f64
    }

    pub fn pixel_height(&self) -> f64 {
        (self.rows as u64 * self.display_size as u64) as f64
    }

    pub fn in_bounds(&self, col: usize, row: usize) -> bool {
        col < self.cols && row < self.rows
    }

    // -----------------------------------------------------------------------
    // Tile access
    // -----------------------------------------------------------------------

    /// Unchecked hot-path read. Panics on out-of-range indices; callers
    /// validate first.
    #[inline]
    pub fn tile(&self, layer: usize, col: usize, row: usize) -> TileId {
        self.layers[layer][row * self.cols + col]
    }

    /// Unchecked hot-path write.
    #[inline]
    pub fn set_tile(&mut self, layer: usize, col: usize, row: usize, tile: TileId) {
        self.layers[layer][row * self.cols + col] = tile;
    }

    pub fn get_tile(&self, layer: usize, col: usize, row: usize) -> Option<TileId> {
        if layer < self.layers.len() && self.in_bounds(col, row) {
            Some(self.tile(layer, col, row))
        } else {
            None
        }
    }

    /// Bounds- and layer-checked write used at the protocol boundary.
    /// Returns the previous tile.
    pub fn try_set_tile(
        &mut self,
        layer: usize,
        col: usize,
        row: usize,
        tile: TileId,
    ) -> Result<TileId, WorldError> {
        let previous = self.get_tile(layer, col, row).ok_or(WorldError::OutOfBounds {
            layer,
            col,
            row,
            cols: self.cols,
            rows: self.rows,
        })?;
        if !fits_layer(tile, layer) {
            return Err(WorldError::WrongLayer { tile, layer });
        }
        self.set_tile(layer, col, row, tile);
        Ok(previous)
    }

    /// True when no object or overlay tile occupies (col, row).
    pub fn objects_empty_at(&self, col: usize, row: usize) -> bool {
        (1..self.layers.len()).all(|layer| self.tile(layer, col, row) == EMPTY)
    }

    // -----------------------------------------------------------------------
    // Solidity
    // -----------------------------------------------------------------------

    /// Object layers are scanned top-down and the first tile that takes part
    /// in collision decides; otherwise the base tile does. A passable object
    /// (bridge) over a solid base (water) is walkable. Outside the grid is
    /// solid.
    pub fn is_solid(&self, col: usize, row: usize) -> bool {
        if !self.in_bounds(col, row) {
            return true;
        }
        for layer in (1..self.layers.len()).rev() {
            let tile = self.tile(layer, col, row);
            if tile == EMPTY {
                continue;
            }
            match collision_of(tile) {
                Collision::Solid => return true,
                Collision::Passable => return false,
                Collision::Ignored => {}
            }
        }
        collision_of(self.tile(0, col, row)) == Collision::Solid
    }

    // -----------------------------------------------------------------------
    // Pixel conversion
    // -----------------------------------------------------------------------

    pub fn pixel_to_col(&self, x: f64) -> i64 {
        (x / self.display_size as f64).floor() as i64
    }

    pub fn pixel_to_row(&self, y: f64) -> i64 {
        (y / self.display_size as f64).floor() as i64
    }

    pub fn col_to_pixel(&self, col: usize) -> f64 {
        col as f64 * self.display_size as f64
    }

    pub fn row_to_pixel(&self, row: usize) -> f64 {
        row as f64 * self.display_size as f64
    }

    /// Cell containing pixel (x, y), if it is on the map.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = self.pixel_to_col(x);
        let row = self.pixel_to_row(y);
        if col < 0 || row < 0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        self.in_bounds(col, row).then_some((col, row))
    }

    // -----------------------------------------------------------------------
    // Islands
    // -----------------------------------------------------------------------

    pub fn island_count(&self) -> u32 {
        self.island_count
    }

    pub fn islands(&self) -> &[IslandId] {
        &self.islands
    }

    pub fn island_at(&self, col: usize, row: usize) -> IslandId {
        if self.in_bounds(col, row) {
            self.islands[row * self.cols + col]
        } else {
            0
        }
    }

    /// Recompute island labels after base-layer edits. Ids are reassigned
    /// from scratch; the returned map says where each old id went.
    pub fn relabel_islands(&mut self, land_tile: TileId) -> IslandRemap {
        let (islands, count) = islands::label(&self.layers[0], self.cols, self.rows, land_tile);
        let remap = islands::remap(&self.islands, &islands);
        self.islands = islands;
        self.island_count = count;
        remap
    }

    // -----------------------------------------------------------------------
    // Digest
    // -----------------------------------------------------------------------

    /// md5 over dimensions and every layer. Two grids with equal digests hold
    /// the same tiles.
    pub fn digest(&self) -> String {
        let cells: usize = self.layers.iter().map(Vec::len).sum();
        let mut buf = Vec::with_capacity(16 + cells * 2);
        buf.extend_from_slice(&(self.cols as u64).to_le_bytes());
        buf.extend_from_slice(&(self.rows as u64).to_le_bytes());
        for layer in &self.layers {
            for tile in layer {
                buf.extend_from_slice(&tile.to_le_bytes());
            }
        }
        format!("{:x}", md5::compute(&buf))
    }
}

impl TileCanvas for WorldGrid {
    fn cols(&self) -> usize {
        self.cols
    }
    fn rows(&self) -> usize {
        self.rows
    }
    fn layer_count(&self) -> usize {
        WorldGrid::layer_count(self)
    }
    fn read(&self, layer: usize, col: usize, row: usize) -> TileId {
        self.tile(layer, col, row)
    }
    fn write(&mut self, layer: usize, col: usize, row: usize, tile: TileId) {
        self.set_tile(layer, col, row, tile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::TileKind;

    fn grid_3x3() -> WorldGrid {
        let water = TileKind::Water.id();
        let land = TileKind::Land.id();
        #[rustfmt::skip]
        let base = vec![
            land, land, water,
            land, water, water,
            land, land, land,
        ];
        let (islands, count) = islands::label(&base, 3, 3, land);
        WorldGrid::from_parts(3, 3, 16, 32, vec![base, vec![EMPTY; 9], vec![EMPTY; 9]], islands, count)
            .unwrap()
    }

    #[test]
    fn rejects_mismatched_layers() {
        let err = WorldGrid::from_parts(2, 2, 16, 16, vec![vec![1; 4], vec![0; 3]], vec![0; 4], 0)
            .unwrap_err();
        assert_eq!(
            err,
            WorldError::LayerSize {
                layer: 1,
                len: 3,
                expected: 4
            }
        );
    }

    #[test]
    fn base_solidity() {
        let g = grid_3x3();
        assert!(!g.is_solid(0, 0));
        assert!(g.is_solid(2, 0));
        assert!(g.is_solid(5, 5), "outside the map is solid");
    }

    #[test]
    fn bridge_makes_water_walkable() {
        let mut g = grid_3x3();
        g.set_tile(1, 1, 1, TileKind::Bridge.id());
        assert!(!g.is_solid(1, 1));
    }

    #[test]
    fn trunk_blocks_land_but_crown_does_not() {
        let mut g = grid_3x3();
        g.set_tile(1, 0, 2, TileKind::TreeBottom.id());
        g.set_tile(2, 0, 1, TileKind::TreeTop.id());
        assert!(g.is_solid(0, 2));
        assert!(!g.is_solid(0, 1), "overlay over land stays walkable");

        g.set_tile(2, 2, 0, TileKind::TreeTop.id());
        assert!(g.is_solid(2, 0), "overlay over water stays solid");
    }

    #[test]
    fn pixel_conversions_use_display_size() {
        let g = grid_3x3();
        assert_eq!(g.pixel_to_col(63.9), 1);
        assert_eq!(g.pixel_to_row(64.0), 2);
        assert_eq!(g.pixel_to_col(-0.5), -1);
        assert_eq!(g.col_to_pixel(2), 64.0);
        assert_eq!(g.row_to_pixel(1), 32.0);
        assert_eq!(g.cell_at(95.0, 10.0), Some((2, 0)));
        assert_eq!(g.cell_at(96.0, 10.0), None);
    }

    #[test]
    fn checked_write_validates() {
        let mut g = grid_3x3();
        assert!(matches!(
            g.try_set_tile(1, 3, 0, TileKind::YellowFlower.id()),
            Err(WorldError::OutOfBounds { .. })
        ));
        assert!(matches!(
            g.try_set_tile(0, 0, 0, TileKind::YellowFlower.id()),
            Err(WorldError::WrongLayer { .. })
        ));
        assert_eq!(g.try_set_tile(1, 0, 0, TileKind::YellowFlower.id()), Ok(EMPTY));
    }

    #[test]
    fn relabel_after_base_edit() {
        let mut g = grid_3x3();
        assert_eq!(g.island_count(), 1);
        g.set_tile(0, 0, 1, TileKind::Water.id());
        g.set_tile(0, 0, 2, TileKind::Water.id());
        g.relabel_islands(TileKind::Land.id());
        assert_eq!(g.island_count(), 2);
        assert_eq!(g.island_at(1, 1), 0);
    }

    #[test]
    fn digest_tracks_tile_changes() {
        let mut g = grid_3x3();
        let before = g.digest();
        assert_eq!(before, grid_3x3().digest());
        g.set_tile(1, 0, 0, TileKind::YellowFlower.id());
        assert_ne!(before, g.digest());
    }
}
