//! Tile catalogue: every tile id the world knows about, which layer it
//! belongs on, and how it behaves under collision.

use serde::{Deserialize, Serialize};

/// Raw tile identifier as stored in a layer and sent on the wire.
pub type TileId = u16;

/// Object/overlay layers use 0 for "nothing here".
pub const EMPTY: TileId = 0;

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

/// Which kind of layer a tile may be written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerClass {
    /// Layer 0 only.
    Base,
    /// Layers 1..N, takes part in collision.
    Object,
    /// Layers 1..N, drawn above players and ignored by collision.
    Overlay,
}

/// How a tile takes part in collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    Solid,
    Passable,
    /// Not considered at all; the layers below decide.
    Ignored,
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Water,
    Land,
    TreeBottom,
    TreeTop,
    AppleTreeBottom,
    AppleTreeTop,
    YellowFlower,
    Bridge,
}

impl TileKind {
    pub const ALL: [TileKind; 8] = [
        TileKind::Water,
        TileKind::Land,
        TileKind::TreeBottom,
        TileKind::TreeTop,
        TileKind::AppleTreeBottom,
        TileKind::AppleTreeTop,
        TileKind::YellowFlower,
        TileKind::Bridge,
    ];

    pub fn id(self) -> TileId {
        match self {
            TileKind::Water => 1,
            TileKind::Land => 2,
            TileKind::TreeBottom => 15,
            TileKind::TreeTop => 16,
            TileKind::AppleTreeBottom => 17,
            TileKind::AppleTreeTop => 18,
            TileKind::YellowFlower => 5,
            TileKind::Bridge => 8,
        }
    }

    pub fn from_id(id: TileId) -> Option<TileKind> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    pub fn layer_class(self) -> LayerClass {
        match self {
            TileKind::Water | TileKind::Land => LayerClass::Base,
            TileKind::TreeTop | TileKind::AppleTreeTop => LayerClass::Overlay,
            _ => LayerClass::Object,
        }
    }

    pub fn collision(self) -> Collision {
        match self {
            TileKind::Water | TileKind::TreeBottom | TileKind::AppleTreeBottom => Collision::Solid,
            TileKind::TreeTop | TileKind::AppleTreeTop => Collision::Ignored,
            TileKind::Land | TileKind::YellowFlower | TileKind::Bridge => Collision::Passable,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TileKind::Water => "water",
            TileKind::Land => "land",
            TileKind::TreeBottom => "tree_bottom",
            TileKind::TreeTop => "tree_top",
            TileKind::AppleTreeBottom => "apple_tree_bottom",
            TileKind::AppleTreeTop => "apple_tree_top",
            TileKind::YellowFlower => "yellow_flower",
            TileKind::Bridge => "bridge",
        }
    }
}

impl std::fmt::Display for TileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Collision class of a raw id. Unknown ids are treated as solid.
pub fn collision_of(id: TileId) -> Collision {
    match TileKind::from_id(id) {
        Some(kind) => kind.collision(),
        None => Collision::Solid,
    }
}

/// Can `id` be written to layer `layer`? 0 is valid on every object layer.
pub fn fits_layer(id: TileId, layer: usize) -> bool {
    if layer == 0 {
        return TileKind::from_id(id).is_some_and(|k| k.layer_class() == LayerClass::Base);
    }
    if id == EMPTY {
        return true;
    }
    TileKind::from_id(id).is_some_and(|k| k.layer_class() != LayerClass::Base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_nonzero() {
        let mut ids: Vec<TileId> = TileKind::ALL.iter().map(|k| k.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), TileKind::ALL.len());
        assert!(!ids.contains(&EMPTY));
    }

    #[test]
    fn from_id_roundtrips_every_kind() {
        for kind in TileKind::ALL {
            assert_eq!(TileKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(TileKind::from_id(9999), None);
    }

    #[test]
    fn layer_fitting() {
        assert!(fits_layer(TileKind::Water.id(), 0));
        assert!(!fits_layer(EMPTY, 0));
        assert!(!fits_layer(TileKind::TreeBottom.id(), 0));
        assert!(fits_layer(EMPTY, 1));
        assert!(fits_layer(TileKind::TreeTop.id(), 2));
        assert!(!fits_layer(TileKind::Land.id(), 1));
        assert!(!fits_layer(4242, 1));
    }
}
