//! `ClientMirror`: a client's local copy of the world and roster.
//!
//! Inbound [`ServerMessage`]s are applied in arrival order. The client's own
//! player is predicted locally with the same collision code the server uses,
//! so a relayed move from the server never disagrees with what was drawn.
//! Lives on the client's main thread; no locking.

use std::collections::BTreeMap;

use log::{debug, warn};
use rand::Rng;

use crate::collision::PixelBox;
use crate::grid::WorldGrid;
use crate::objectives::Objective;
use crate::player::{Player, SessionId};
use crate::protocol::{ClientMessage, NewPlayer, PlayerMoved, ServerMessage, TileUpdate};
use crate::tiles::TileId;

/// Notes (`info` and chat) kept for the chat collaborator to display.
const MAX_NOTES: usize = 64;

#[derive(Debug, Default)]
pub struct ClientMirror {
    pub self_id: Option<SessionId>,
    pub name: Option<String>,
    /// Spawn position announced in `self`.
    pub spawn: Option<(f64, f64)>,
    pub grid: Option<WorldGrid>,
    /// Other players, keyed by session id.
    pub players: BTreeMap<SessionId, Player>,
    /// This client's own, locally predicted player.
    pub local: Option<Player>,
    pub objective: Option<Objective>,
    pub notes: Vec<String>,
}

impl ClientMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.grid.is_some() && self.self_id.is_some()
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Apply one server message. Messages that reference state the mirror
    /// does not have yet (a tile update before the map) are skipped.
    pub fn apply(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Map(payload) => match payload.into_grid() {
                Ok(grid) => self.grid = Some(grid),
                Err(e) => warn!("Discarding invalid map: {}", e),
            },
            ServerMessage::Players(roster) => {
                self.players = roster;
                if let Some(id) = self.self_id {
                    self.players.remove(&id);
                }
            }
            ServerMessage::SelfInfo(info) => {
                self.players.remove(&info.id);
                self.self_id = Some(info.id);
                self.name = Some(info.name);
                self.spawn = Some((info.pos.x, info.pos.y));
                if let Some(local) = self.local.as_mut() {
                    local.session_id = info.id;
                    local.x = info.pos.x;
                    local.y = info.pos.y;
                }
            }
            ServerMessage::NewPlayer(joined) => {
                if Some(joined.session_id) != self.self_id {
                    self.players.insert(joined.session_id, joined.player);
                }
            }
            ServerMessage::PlayerMoved(relay) => {
                if let Some(p) = self.players.get_mut(&relay.session_id) {
                    p.x = relay.moved.x;
                    p.y = relay.moved.y;
                    p.dir = relay.moved.dir;
                    p.moving = relay.moved.moving;
                } else {
                    debug!("Move for unknown player {}", relay.session_id);
                }
            }
            ServerMessage::TileUpdate(update) => self.apply_tile(update),
            ServerMessage::SpawnTrees(patch) => {
                for update in patch {
                    self.apply_tile(update);
                }
            }
            ServerMessage::DeletePlayer(id) => {
                self.players.remove(&id);
            }
            ServerMessage::Info(text) => self.note(text),
            ServerMessage::ChatMessage(chat) => {
                let who = self
                    .players
                    .get(&chat.session_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| format!("Player{}", chat.session_id));
                self.note(format!("{}: {}", who, chat.text));
            }
        }
    }

    fn apply_tile(&mut self, update: TileUpdate) {
        let Some(grid) = self.grid.as_mut() else {
            return;
        };
        if let Err(e) = grid.try_set_tile(update.layer, update.col, update.row, update.tile) {
            warn!("Ignoring tile update: {}", e);
        }
    }

    fn note(&mut self, text: String) {
        if self.notes.len() == MAX_NOTES {
            self.notes.remove(0);
        }
        self.notes.push(text);
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Create the local player at the spawn the server announced and return
    /// the registration message to send.
    pub fn register(&mut self, width: f64, height: f64) -> Option<ClientMessage> {
        let id = self.self_id?;
        let (x, y) = self.local_spawn()?;
        let name = self.name.clone().unwrap_or_else(|| format!("Player{}", id));
        let player = Player::new(id, name, PixelBox::new(x, y, width, height));
        let msg = ClientMessage::NewPlayer(NewPlayer {
            x: player.x,
            y: player.y,
            width,
            height,
            dir: player.dir,
            moving: false,
        });
        self.local = Some(player);
        Some(msg)
    }

    fn local_spawn(&self) -> Option<(f64, f64)> {
        match &self.local {
            Some(p) => Some((p.x, p.y)),
            None => self.spawn,
        }
    }

    /// Predict one frame of local motion and return the `playerMoved` to
    /// send, or `None` when nothing changed.
    pub fn predict(
        &mut self,
        dirx: i32,
        diry: i32,
        speed: f64,
        delta: f64,
    ) -> Option<ClientMessage> {
        let grid = self.grid.as_ref()?;
        let local = self.local.as_mut()?;

        let before = (local.x, local.y, local.dir, local.moving);
        local.step(dirx, diry, speed, delta, grid);

        let bounds = local.bounds();
        for (id, other) in &self.players {
            if bounds.intersects(&other.bounds()) {
                local.contacted_players.insert(*id);
            }
        }

        if before == (local.x, local.y, local.dir, local.moving) {
            return None;
        }
        Some(ClientMessage::PlayerMoved(PlayerMoved {
            x: local.x,
            y: local.y,
            dir: local.dir,
            moving: local.moving,
            dir_offset: local.dir.offset(),
        }))
    }

    /// Write a tile locally and return the update to send. Rejected writes
    /// produce nothing.
    pub fn set_tile(
        &mut self,
        layer: usize,
        col: usize,
        row: usize,
        tile: TileId,
    ) -> Option<ClientMessage> {
        let grid = self.grid.as_mut()?;
        grid.try_set_tile(layer, col, row, tile).ok()?;
        Some(ClientMessage::TileUpdate(TileUpdate {
            layer,
            col,
            row,
            tile,
        }))
    }

    // ------------------------------------------------------------------
    // Objectives
    // ------------------------------------------------------------------

    pub fn assign_objective<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Objective> {
        let grid = self.grid.as_ref()?;
        let current = self
            .local
            .as_ref()
            .map(|p| p.current_island(grid))
            .unwrap_or(0);
        let objective = Objective::generate(rng, grid.island_count(), current);
        self.objective = Some(objective);
        Some(objective)
    }

    /// Mark the objective complete once the local player satisfies it.
    pub fn check_objective(&mut self) -> bool {
        let (Some(objective), Some(local)) = (self.objective, self.local.as_ref()) else {
            return false;
        };
        if objective.is_complete(local) {
            self.objective = Some(Objective::Complete);
            true
        } else {
            false
        }
    }

    /// Reset all state (called on disconnect).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
