//! Archipelago
//!
//! A real-time multiplayer 2D tile world: procedurally generated islands,
//! one authoritative server, clients that mirror the world and predict their
//! own movement.
//!
//! ## Architecture
//!
//! ```text
//! WorldServer  (net.rs)          ← websocket accept loop, heartbeat, regrowth
//!   └── SyncServer  (service.rs) ← sessions, validation, broadcast
//!         ├── Session  (session.rs)
//!         └── WorldGrid  (grid.rs) ← layers + island labels
//!               ├── TerrainGenerator  (terrain.rs)
//!               ├── ObjectPlacer      (objects.rs)
//!               └── islands::label    (islands.rs)
//!
//! ClientMirror  (mirror.rs)      ← client-side copy, same collision code
//! ```
//!
//! `collision::move_axis_aligned` is shared by server validation and
//! client prediction. Everything except `session`, `service` and `net` is
//! available without the `server` feature.

pub mod collision;
pub mod config;
pub mod error;
pub mod grid;
pub mod islands;
pub mod mirror;
pub mod objectives;
pub mod objects;
pub mod player;
pub mod protocol;
pub mod terrain;
pub mod tiles;
pub mod world;

// Server-side modules require the `server` feature.
#[cfg(feature = "server")]
pub mod net;
#[cfg(feature = "server")]
pub mod service;
#[cfg(feature = "server")]
pub mod session;

pub use collision::{move_axis_aligned, PixelBox};
pub use config::ServerSettings;
pub use error::{GenerationError, ProtocolError, ServerError, WorldError};
pub use grid::WorldGrid;
pub use mirror::ClientMirror;
pub use objectives::Objective;
pub use objects::{ObjectPlacer, ObjectSpec, Satellite};
pub use player::{Direction, Player, SessionId};
pub use protocol::{ClientMessage, ServerMessage};
pub use terrain::{TerrainGenerator, TerrainParams};
pub use tiles::{TileId, TileKind};
pub use world::{generate_world, WorldConfig};

// Convenience re-exports (server only)
#[cfg(feature = "server")]
pub use net::{ServerHandle, WorldServer};
#[cfg(feature = "server")]
pub use service::{ServerStats, SyncServer};
#[cfg(feature = "server")]
pub use session::{Outbound, SessionState};
