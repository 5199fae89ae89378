//! Error taxonomy.
//!
//! | Type              | Raised by                          | Recovery                      |
//! |-------------------|------------------------------------|-------------------------------|
//! | `GenerationError` | terrain / object / world config    | fatal, abort world creation   |
//! | `WorldError`      | grid construction, checked access  | caller rejects the request    |
//! | `ProtocolError`   | envelope decode + validation       | drop that single message      |
//! | `ServerError`     | session state machine              | logged, session torn down     |

use thiserror::Error;

use crate::tiles::TileId;

#[derive(Debug, Error, PartialEq)]
pub enum GenerationError {
    #[error("seed size must be at least 1, got {0}")]
    SeedSize(usize),

    #[error("main tile chance must be within [0, 1], got {0}")]
    MainTileChance(f64),

    #[error("smoothing threshold must be within [0, 9], got {0}")]
    Smoothing(u32),

    #[error("{passes} passes on a seed of {seed_size} overflows the grid size")]
    TooManyPasses { seed_size: usize, passes: u32 },

    #[error("main and fill tile must differ (both {0})")]
    SameTiles(TileId),

    #[error("object probability for tile {tile} must be within [0, 1], got {probability}")]
    ObjectProbability { tile: TileId, probability: f64 },

    #[error("tile {tile} cannot be placed on layer {layer}")]
    ObjectLayer { tile: TileId, layer: usize },

    #[error("world needs at least {required} layers, configured {layers}")]
    LayerCount { layers: usize, required: usize },

    #[error("generated parts do not fit together: {0}")]
    Assembly(#[from] WorldError),
}

#[derive(Debug, Error, PartialEq)]
pub enum WorldError {
    #[error("layer {layer} has {len} cells, expected {expected}")]
    LayerSize {
        layer: usize,
        len: usize,
        expected: usize,
    },

    #[error("island grid has {len} cells, expected {expected}")]
    IslandSize { len: usize, expected: usize },

    #[error("grid needs at least one layer")]
    NoLayers,

    #[error("cell ({col}, {row}) on layer {layer} is outside the {cols}x{rows} grid")]
    OutOfBounds {
        layer: usize,
        col: usize,
        row: usize,
        cols: usize,
        rows: usize,
    },

    #[error("tile {tile} does not belong on layer {layer}")]
    WrongLayer { tile: TileId, layer: usize },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("invalid '{kind}' payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("field '{field}' rejected: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error(transparent)]
    World(#[from] WorldError),
}

impl ProtocolError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unknown session {0}")]
    UnknownSession(u64),

    #[error("session {0} is not active")]
    NotActive(u64),

    #[error("session {0} has no registered player")]
    NoPlayer(u64),

    #[error("session {0} already registered a player")]
    AlreadyRegistered(u64),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}
