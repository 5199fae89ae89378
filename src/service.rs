//! SyncServer – authoritative world state, sessions, broadcast and timers.
//!
//! Transport-free: sessions hand in text frames and receive [`Outbound`]
//! frames through their channel, so the whole state machine runs in tests
//! without a socket. [`crate::net::WorldServer`] wires it to websockets.
//!
//! Moves are taken as the client resolved them and relayed unchanged. Base
//! layer writes that flip land relabel the islands, and every player's
//! visited set is carried over to the new ids.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::collision::{max_position, PixelBox};
use crate::config::ServerSettings;
use crate::error::{GenerationError, ProtocolError, ServerError};
use crate::grid::WorldGrid;
use crate::objects::ObjectSpec;
use crate::player::{Player, SessionId};
use crate::protocol::{
    ChatRelay, ClientMessage, MapPayload, NewPlayer, PlayerJoined, PlayerMoved, PlayerMovedRelay,
    Position, SelfInfo, ServerMessage, TileUpdate, MAX_BOX_TILES,
};
use crate::session::{Outbound, Session, SessionState};
use crate::world::{generate_world, grow_trees, pick_spawn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStats {
    pub sessions: usize,
    pub active_sessions: usize,
    pub players: usize,
    pub island_count: u32,
    pub regrowth_runs: u64,
}

pub struct SyncServer {
    settings: ServerSettings,
    grid: WorldGrid,
    sessions: BTreeMap<SessionId, Session>,
    players: HashMap<SessionId, Player>,
    tree_specs: Vec<ObjectSpec>,
    next_session_id: SessionId,
    rng: StdRng,
    regrowth_runs: u64,
}

impl SyncServer {
    /// Generate the world described by `settings.world` and start empty.
    pub fn new(settings: ServerSettings) -> Result<Self, GenerationError> {
        let mut rng = match settings.world.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let grid = generate_world(&settings.world, &mut rng)?;
        Ok(Self::with_grid(settings, grid, rng))
    }

    /// Serve an already built grid.
    pub fn with_grid(settings: ServerSettings, grid: WorldGrid, rng: StdRng) -> Self {
        let tree_specs = settings.world.tree_specs();
        Self {
            settings,
            grid,
            sessions: BTreeMap::new(),
            players: HashMap::new(),
            tree_specs,
            next_session_id: 1,
            rng,
            regrowth_runs: 0,
        }
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn grid(&self) -> &WorldGrid {
        &self.grid
    }

    pub fn player(&self, id: SessionId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn session_state(&self, id: SessionId) -> Option<SessionState> {
        self.sessions.get(&id).map(Session::state)
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Register a new connection in the `Connecting` state.
    pub fn connect(&mut self, tx: UnboundedSender<Outbound>) -> SessionId {
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.sessions.insert(id, Session::new(id, tx));
        debug!("Session {} connecting", id);
        id
    }

    /// Promote a session to `Active` and send it the join sequence
    /// (`map`, `players`, `self`). Other active sessions get an `info` line.
    pub fn activate(&mut self, id: SessionId) -> Result<(), ServerError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(ServerError::UnknownSession(id))?;
        if !session.activate() {
            return Err(ServerError::NotActive(id));
        }

        let land = self.settings.world.land_tile();
        let (col, row) = pick_spawn(&self.grid, land, &mut self.rng).unwrap_or((0, 0));
        let name = format!("Player{}", id);
        let pos = Position {
            x: self.grid.col_to_pixel(col),
            y: self.grid.row_to_pixel(row),
        };
        let roster: BTreeMap<SessionId, Player> =
            self.players.iter().map(|(k, p)| (*k, p.clone())).collect();

        self.send_to(id, &ServerMessage::Map(MapPayload::from_grid(&self.grid)))?;
        self.send_to(id, &ServerMessage::Players(roster))?;
        self.send_to(
            id,
            &ServerMessage::SelfInfo(SelfInfo {
                id,
                name: name.clone(),
                pos,
            }),
        )?;
        self.broadcast_others(id, &ServerMessage::Info(format!("{} joined the server!", name)))?;

        info!("{} joined at tile ({}, {})", name, col, row);
        Ok(())
    }

    /// Tear a session down. Its player, if it ever registered one, is
    /// removed and announced with `deletePlayer`. Unknown ids are ignored.
    pub fn disconnect(&mut self, id: SessionId) {
        let Some(mut session) = self.sessions.remove(&id) else {
            return;
        };
        session.close();

        if self.players.remove(&id).is_some() {
            if let Err(e) = self.broadcast_others(id, &ServerMessage::DeletePlayer(id)) {
                warn!("Failed to announce departure of session {}: {}", id, e);
            }
        }
        info!("Session {} closed", id);
    }

    /// Disconnect every session (server shutdown).
    pub fn close_all(&mut self) {
        let ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        for id in ids {
            self.disconnect(id);
        }
    }

    /// Reset the missed-ping count; called for every inbound frame.
    pub fn note_traffic(&mut self, id: SessionId) {
        if let Some(s) = self.sessions.get_mut(&id) {
            s.note_traffic();
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Entry point for one text frame. Malformed or rejected messages are
    /// logged and dropped; the connection stays up.
    pub fn handle_text(&mut self, id: SessionId, text: &str) {
        self.note_traffic(id);
        let msg = match ClientMessage::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Dropping frame from session {}: {}", id, e);
                return;
            }
        };
        let kind = msg.kind();
        if let Err(e) = self.handle_message(id, msg) {
            warn!("Rejected '{}' from session {}: {}", kind, id, e);
        }
    }

    /// Apply a decoded message and relay the result to every other active
    /// session.
    pub fn handle_message(&mut self, id: SessionId, msg: ClientMessage) -> Result<(), ServerError> {
        self.require_active(id)?;
        match msg {
            ClientMessage::NewPlayer(p) => self.register_player(id, p),
            ClientMessage::PlayerMoved(m) => self.move_player(id, m),
            ClientMessage::TileUpdate(u) => self.update_tile(id, u),
            ClientMessage::ChatMessage(c) => self.broadcast_others(
                id,
                &ServerMessage::ChatMessage(ChatRelay {
                    session_id: id,
                    text: c.text.trim().to_string(),
                }),
            )
            .map(|_| ()),
        }
    }

    fn require_active(&self, id: SessionId) -> Result<(), ServerError> {
        match self.sessions.get(&id) {
            None => Err(ServerError::UnknownSession(id)),
            Some(s) if !s.is_active() => Err(ServerError::NotActive(id)),
            Some(_) => Ok(()),
        }
    }

    fn register_player(&mut self, id: SessionId, p: NewPlayer) -> Result<(), ServerError> {
        if self.players.contains_key(&id) {
            return Err(ServerError::AlreadyRegistered(id));
        }
        let max_side = MAX_BOX_TILES * self.grid.display_size() as f64;
        if p.width > max_side || p.height > max_side {
            return Err(ProtocolError::field(
                "width",
                format!("box {}x{} exceeds {} px", p.width, p.height, max_side),
            )
            .into());
        }

        let (max_x, max_y) = max_position(&self.grid, p.width, p.height);
        let bounds = PixelBox::new(
            p.x.clamp(0.0, max_x),
            p.y.clamp(0.0, max_y),
            p.width,
            p.height,
        );
        let mut player = Player::new(id, format!("Player{}", id), bounds);
        player.dir = p.dir;
        player.moving = p.moving;
        player.record_island(&self.grid);

        let joined = ServerMessage::NewPlayer(PlayerJoined {
            session_id: id,
            player: player.clone(),
        });
        self.players.insert(id, player);
        self.broadcast_others(id, &joined)?;
        debug!("Session {} registered its player", id);
        Ok(())
    }

    /// The sender already resolved the move against its own grid. The
    /// position is taken as claimed once it is on the map and relayed
    /// unchanged.
    fn move_player(&mut self, id: SessionId, m: PlayerMoved) -> Result<(), ServerError> {
        let player = self.players.get_mut(&id).ok_or(ServerError::NoPlayer(id))?;
        let (max_x, max_y) = max_position(&self.grid, player.width, player.height);
        if !(0.0..=max_x).contains(&m.x) || !(0.0..=max_y).contains(&m.y) {
            return Err(ProtocolError::field(
                "x",
                format!("({}, {}) is outside [0, {}]x[0, {}]", m.x, m.y, max_x, max_y),
            )
            .into());
        }
        player.x = m.x;
        player.y = m.y;
        player.dir = m.dir;
        player.moving = m.moving;
        player.record_island(&self.grid);

        let bounds = player.bounds();
        let relay = PlayerMovedRelay {
            session_id: id,
            moved: m,
        };

        let touched: Vec<SessionId> = self
            .players
            .iter()
            .filter(|(other, p)| **other != id && bounds.intersects(&p.bounds()))
            .map(|(other, _)| *other)
            .collect();
        for other in touched {
            if let Some(p) = self.players.get_mut(&other) {
                p.contacted_players.insert(id);
            }
            if let Some(p) = self.players.get_mut(&id) {
                p.contacted_players.insert(other);
            }
        }

        self.broadcast_others(id, &ServerMessage::PlayerMoved(relay))?;
        Ok(())
    }

    fn update_tile(&mut self, id: SessionId, u: TileUpdate) -> Result<(), ServerError> {
        let previous = self
            .grid
            .try_set_tile(u.layer, u.col, u.row, u.tile)
            .map_err(ProtocolError::from)?;

        let land = self.settings.world.land_tile();
        if u.layer == 0 && (previous == land) != (u.tile == land) {
            let remap = self.grid.relabel_islands(land);
            for player in self.players.values_mut() {
                player.remap_islands(&remap);
                player.record_island(&self.grid);
            }
            debug!("Relabelled islands: {}", self.grid.island_count());
        }

        self.broadcast_others(id, &ServerMessage::TileUpdate(u))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    fn send_to(&self, id: SessionId, msg: &ServerMessage) -> Result<(), ServerError> {
        let text = msg.encode()?;
        if let Some(session) = self.sessions.get(&id) {
            session.send_text(text);
        }
        Ok(())
    }

    /// Encode once and queue for every active session. Returns how many
    /// sessions accepted the frame; unreachable ones are skipped.
    pub fn broadcast(&self, msg: &ServerMessage) -> Result<usize, ServerError> {
        self.fan_out(None, msg)
    }

    /// As [`broadcast`](Self::broadcast) but never to `sender`.
    pub fn broadcast_others(
        &self,
        sender: SessionId,
        msg: &ServerMessage,
    ) -> Result<usize, ServerError> {
        self.fan_out(Some(sender), msg)
    }

    fn fan_out(&self, skip: Option<SessionId>, msg: &ServerMessage) -> Result<usize, ServerError> {
        let text = msg.encode()?;
        let delivered = self
            .sessions
            .values()
            .filter(|s| s.is_active() && Some(s.id()) != skip)
            .filter(|s| s.send_text(text.clone()))
            .count();
        Ok(delivered)
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// One heartbeat sweep. Sessions that already missed the allowed number
    /// of pings are timed out and closed; the rest are pinged. Returns the
    /// ids that were dropped.
    pub fn heartbeat(&mut self) -> Vec<SessionId> {
        let limit = self.settings.max_missed_pings;
        let mut expired = Vec::new();
        for session in self.sessions.values_mut() {
            if session.missed_pings() >= limit {
                session.time_out();
                expired.push(session.id());
            } else {
                session.ping();
            }
        }

        for id in &expired {
            info!("Session {} timed out", id);
            self.disconnect(*id);
        }
        expired
    }

    /// Grow trees over empty land and broadcast the patch. Skipped while no
    /// session is active. Returns the number of tiles written.
    pub fn regrow(&mut self) -> usize {
        if !self.sessions.values().any(Session::is_active) {
            return 0;
        }

        let land = self.settings.world.land_tile();
        let chance = self.settings.regrowth_chance;
        let patch = grow_trees(&mut self.grid, &self.tree_specs, land, chance, &mut self.rng);
        self.regrowth_runs += 1;
        if patch.is_empty() {
            return 0;
        }

        let written = patch.len();
        let updates = patch.into_iter().map(TileUpdate::from).collect();
        if let Err(e) = self.broadcast(&ServerMessage::SpawnTrees(updates)) {
            warn!("Failed to broadcast regrowth: {}", e);
        }
        written
    }

    /// Random delay until the next regrowth run.
    pub fn next_regrowth_delay(&mut self) -> Duration {
        let (min, max) = self.settings.regrowth_window();
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            sessions: self.sessions.len(),
            active_sessions: self.sessions.values().filter(|s| s.is_active()).count(),
            players: self.players.len(),
            island_count: self.grid.island_count(),
            regrowth_runs: self.regrowth_runs,
        }
    }
}
