//! Player state and the shared motion model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::collision::{move_axis_aligned, PixelBox};
use crate::grid::WorldGrid;
use crate::islands::{IslandId, IslandRemap};

/// Session identifier, assigned by the server in connection order.
pub type SessionId = u64;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Facing direction; travels on the wire as 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Direction {
    Up,
    Left,
    Right,
    #[default]
    Down,
}

impl Direction {
    /// Unit grid offset of the cell the player faces.
    pub fn offset(self) -> [i32; 2] {
        match self {
            Direction::Up => [0, -1],
            Direction::Left => [-1, 0],
            Direction::Right => [1, 0],
            Direction::Down => [0, 1],
        }
    }

    /// Facing for an input vector; vertical input wins over horizontal.
    pub fn from_input(dirx: i32, diry: i32) -> Option<Direction> {
        match (dirx.signum(), diry.signum()) {
            (_, -1) => Some(Direction::Up),
            (_, 1) => Some(Direction::Down),
            (-1, _) => Some(Direction::Left),
            (1, _) => Some(Direction::Right),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Direction::Up),
            1 => Ok(Direction::Left),
            2 => Ok(Direction::Right),
            3 => Ok(Direction::Down),
            other => Err(format!("direction must be 0..=3, got {}", other)),
        }
    }
}

impl From<Direction> for u8 {
    fn from(d: Direction) -> u8 {
        match d {
            Direction::Up => 0,
            Direction::Left => 1,
            Direction::Right => 2,
            Direction::Down => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub session_id: SessionId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub dir: Direction,
    pub moving: bool,
    #[serde(default)]
    pub visited_islands: BTreeSet<IslandId>,
    #[serde(default)]
    pub contacted_players: BTreeSet<SessionId>,
}

impl Player {
    pub fn new(session_id: SessionId, name: impl Into<String>, bounds: PixelBox) -> Self {
        Self {
            session_id,
            name: name.into(),
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            dir: Direction::default(),
            moving: false,
            visited_islands: BTreeSet::new(),
            contacted_players: BTreeSet::new(),
        }
    }

    pub fn bounds(&self) -> PixelBox {
        PixelBox::new(self.x, self.y, self.width, self.height)
    }

    /// Island under the box centre (0 when over water or off the map).
    pub fn current_island(&self, grid: &WorldGrid) -> IslandId {
        let (cx, cy) = self.bounds().center();
        grid.cell_at(cx, cy)
            .map(|(col, row)| grid.island_at(col, row))
            .unwrap_or(0)
    }

    /// Record the current island as visited. Returns true if it is new.
    pub fn record_island(&mut self, grid: &WorldGrid) -> bool {
        match self.current_island(grid) {
            0 => false,
            id => self.visited_islands.insert(id),
        }
    }

    /// Carry visited islands over a relabel. A visited island that split
    /// counts every part as visited; one that sank is forgotten.
    pub fn remap_islands(&mut self, remap: &IslandRemap) {
        self.visited_islands = self
            .visited_islands
            .iter()
            .filter_map(|id| remap.get(id))
            .flatten()
            .copied()
            .collect();
    }

    /// Move to where collision lets a displacement of (dx, dy) end up.
    pub fn move_by(&mut self, dx: f64, dy: f64, grid: &WorldGrid) {
        let resolved = move_axis_aligned(self.bounds(), dx, dy, grid);
        self.x = resolved.x;
        self.y = resolved.y;
    }

    /// One frame of input-driven motion: `dirx`/`diry` in -1..=1, `speed`
    /// in pixels per second, `delta` in seconds. Diagonals are normalised so
    /// they are no faster than straight moves.
    pub fn step(&mut self, dirx: i32, diry: i32, speed: f64, delta: f64, grid: &WorldGrid) {
        let (dirx, diry) = (dirx.signum(), diry.signum());
        match Direction::from_input(dirx, diry) {
            Some(dir) => {
                self.dir = dir;
                self.moving = true;
            }
            None => {
                self.moving = false;
                return;
            }
        }

        let scale = if dirx != 0 && diry != 0 {
            std::f64::consts::FRAC_1_SQRT_2
        } else {
            1.0
        };
        let dx = dirx as f64 * scale * speed * delta;
        let dy = diry as f64 * scale * speed * delta;
        self.move_by(dx, dy, grid);
        self.record_island(grid);
    }
}
