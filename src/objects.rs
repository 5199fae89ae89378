//! Object placement over a generated base layer.
//!
//! An [`ObjectSpec`] names a primary tile, the layer it lands on, a
//! placement probability and an optional set of satellites: extra tiles
//! written at fixed offsets from the anchor (a tree trunk with its crown one
//! row up). A placement commits only when the anchor and every satellite
//! cell are in bounds and free on every object layer, so objects never share
//! a cell. World creation and regrowth both place through [`try_place`].

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::tiles::{fits_layer, TileId, TileKind, EMPTY};

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Satellite {
    pub tile: TileId,
    pub layer: usize,
    pub row_offset: isize,
    pub col_offset: isize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectSpec {
    pub tile: TileId,
    #[serde(default = "default_object_layer")]
    pub layer: usize,
    pub probability: f64,
    #[serde(default)]
    pub satellites: Vec<Satellite>,
}

fn default_object_layer() -> usize {
    1
}

impl ObjectSpec {
    pub fn single(kind: TileKind, probability: f64) -> Self {
        Self {
            tile: kind.id(),
            layer: 1,
            probability,
            satellites: Vec::new(),
        }
    }

    /// Two-tile-tall tree: trunk on layer 1, crown on layer 2 one row up.
    pub fn tree(bottom: TileKind, top: TileKind, probability: f64) -> Self {
        Self {
            tile: bottom.id(),
            layer: 1,
            probability,
            satellites: vec![Satellite {
                tile: top.id(),
                layer: 2,
                row_offset: -1,
                col_offset: 0,
            }],
        }
    }

    /// Default decoration set used when the configuration names none.
    pub fn defaults() -> Vec<ObjectSpec> {
        vec![
            ObjectSpec::tree(TileKind::TreeBottom, TileKind::TreeTop, 0.08),
            ObjectSpec::tree(TileKind::AppleTreeBottom, TileKind::AppleTreeTop, 0.03),
            ObjectSpec::single(TileKind::YellowFlower, 0.05),
        ]
    }

    fn validate(&self, layer_count: usize) -> Result<(), GenerationError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(GenerationError::ObjectProbability {
                tile: self.tile,
                probability: self.probability,
            });
        }
        check_layer(self.tile, self.layer, layer_count)?;
        for sat in &self.satellites {
            check_layer(sat.tile, sat.layer, layer_count)?;
        }
        Ok(())
    }
}

fn check_layer(tile: TileId, layer: usize, layer_count: usize) -> Result<(), GenerationError> {
    if layer == 0 || layer >= layer_count || tile == EMPTY || !fits_layer(tile, layer) {
        return Err(GenerationError::ObjectLayer { tile, layer });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Object layers
// ---------------------------------------------------------------------------

/// Layers 1..N of a world, indexed by their world layer number.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLayers {
    pub cols: usize,
    pub rows: usize,
    /// `layers[i]` is world layer `i + 1`.
    pub layers: Vec<Vec<TileId>>,
}

impl ObjectLayers {
    pub fn empty(cols: usize, rows: usize, layer_count: usize) -> Self {
        Self {
            cols,
            rows,
            layers: vec![vec![EMPTY; cols * rows]; layer_count.saturating_sub(1)],
        }
    }

    pub fn get(&self, layer: usize, col: usize, row: usize) -> TileId {
        self.layers[layer - 1][row * self.cols + col]
    }

    pub fn into_inner(self) -> Vec<Vec<TileId>> {
        self.layers
    }
}

/// Anything object placement can write into: freshly built layers or the
/// live world grid during regrowth.
pub trait TileCanvas {
    fn cols(&self) -> usize;
    fn rows(&self) -> usize;
    /// Layer count including the base layer.
    fn layer_count(&self) -> usize;
    fn read(&self, layer: usize, col: usize, row: usize) -> TileId;
    fn write(&mut self, layer: usize, col: usize, row: usize, tile: TileId);

    /// True when no object layer holds a tile at (col, row).
    fn objects_empty(&self, col: usize, row: usize) -> bool {
        (1..self.layer_count()).all(|layer| self.read(layer, col, row) == EMPTY)
    }
}

impl TileCanvas for ObjectLayers {
    fn cols(&self) -> usize {
        self.cols
    }
    fn rows(&self) -> usize {
        self.rows
    }
    fn layer_count(&self) -> usize {
        self.layers.len() + 1
    }
    fn read(&self, layer: usize, col: usize, row: usize) -> TileId {
        self.get(layer, col, row)
    }
    fn write(&mut self, layer: usize, col: usize, row: usize, tile: TileId) {
        self.layers[layer - 1][row * self.cols + col] = tile;
    }
}

/// One tile written by a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedTile {
    pub layer: usize,
    pub col: usize,
    pub row: usize,
    #[serde(rename = "type")]
    pub tile: TileId,
}

/// Try to place `spec` anchored at (col, row). Writes nothing unless the
/// anchor and every satellite cell are in bounds and empty on all object
/// layers.
pub fn try_place<C: TileCanvas + ?Sized>(
    canvas: &mut C,
    spec: &ObjectSpec,
    col: usize,
    row: usize,
) -> Option<Vec<PlacedTile>> {
    if col >= canvas.cols() || row >= canvas.rows() {
        return None;
    }
    if !canvas.objects_empty(col, row) {
        return None;
    }

    let mut writes = Vec::with_capacity(1 + spec.satellites.len());
    writes.push(PlacedTile {
        layer: spec.layer,
        col,
        row,
        tile: spec.tile,
    });

    for sat in &spec.satellites {
        let c = col.checked_add_signed(sat.col_offset)?;
        let r = row.checked_add_signed(sat.row_offset)?;
        if c >= canvas.cols() || r >= canvas.rows() {
            return None;
        }
        if !canvas.objects_empty(c, r) {
            return None;
        }
        if writes.iter().any(|w| w.col == c && w.row == r) {
            return None;
        }
        writes.push(PlacedTile {
            layer: sat.layer,
            col: c,
            row: r,
            tile: sat.tile,
        });
    }

    for w in &writes {
        canvas.write(w.layer, w.col, w.row, w.tile);
    }
    Some(writes)
}

// ---------------------------------------------------------------------------
// Placer
// ---------------------------------------------------------------------------

pub struct ObjectPlacer {
    specs: Vec<ObjectSpec>,
    layer_count: usize,
}

impl ObjectPlacer {
    /// `layer_count` counts the base layer too.
    pub fn new(specs: Vec<ObjectSpec>, layer_count: usize) -> Result<Self, GenerationError> {
        if layer_count < 2 {
            return Err(GenerationError::LayerCount {
                layers: layer_count,
                required: 2,
            });
        }
        for spec in &specs {
            spec.validate(layer_count)?;
        }
        Ok(Self { specs, layer_count })
    }

    pub fn specs(&self) -> &[ObjectSpec] {
        &self.specs
    }

    /// Decorate every `main_tile` cell of `base` (row-major).
    pub fn place<R: Rng + ?Sized>(
        &self,
        base: &[TileId],
        cols: usize,
        rows: usize,
        main_tile: TileId,
        rng: &mut R,
    ) -> ObjectLayers {
        let mut out = ObjectLayers::empty(cols, rows, self.layer_count);
        if self.specs.is_empty() {
            return out;
        }

        for row in 0..rows {
            for col in 0..cols {
                if base[row * cols + col] != main_tile {
                    continue;
                }
                let spec = &self.specs[rng.gen_range(0..self.specs.len())];
                if !out.objects_empty(col, row) {
                    continue;
                }
                if rng.gen::<f64>() < spec.probability {
                    try_place(&mut out, spec, col, row);
                }
            }
        }

        out
    }
}
