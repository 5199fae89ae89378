//! Player objectives built on island and contact tracking.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::islands::IslandId;
use crate::player::Player;

/// Distinct islands a wanderer must visit.
pub const ISLANDS_TO_VISIT: usize = 3;
/// Distinct other players a social objective must meet.
pub const PLAYERS_TO_CONTACT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "camelCase")]
pub enum Objective {
    VisitIsland(IslandId),
    VisitIslands(usize),
    ContactPlayers(usize),
    Complete,
}

impl Objective {
    /// Pick a random objective. A specific-island target is drawn from the
    /// islands other than `current`; with no such island the objective
    /// falls back to visiting several islands.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, island_count: u32, current: IslandId) -> Self {
        match rng.gen_range(0..3) {
            0 => {
                let others = island_count - u32::from(current >= 1 && current <= island_count);
                if others == 0 {
                    return Objective::VisitIslands(ISLANDS_TO_VISIT);
                }
                // Sample an index into the remaining ids and skip over `current`.
                let mut pick = rng.gen_range(1..=others);
                if current >= 1 && pick >= current {
                    pick += 1;
                }
                Objective::VisitIsland(pick)
            }
            1 => Objective::VisitIslands(ISLANDS_TO_VISIT),
            _ => Objective::ContactPlayers(PLAYERS_TO_CONTACT),
        }
    }

    pub fn is_complete(&self, player: &Player) -> bool {
        match *self {
            Objective::Complete => false,
            Objective::VisitIsland(id) => player.visited_islands.contains(&id),
            Objective::VisitIslands(n) => player.visited_islands.len() >= n,
            Objective::ContactPlayers(n) => player.contacted_players.len() >= n,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Objective::Complete => "Objective Complete",
            Objective::VisitIsland(_) => "The Wanderer",
            Objective::VisitIslands(_) => "Mr. Worldwide",
            Objective::ContactPlayers(_) => "Social Butterfly",
        }
    }

    pub fn description(&self) -> String {
        match self {
            Objective::Complete => "You've completed your objective".to_string(),
            Objective::VisitIsland(id) => format!("Find and visit island {}", id),
            Objective::VisitIslands(n) => format!("Visit {} different islands", n),
            Objective::ContactPlayers(n) => format!("Come into contact with {} other players", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::PixelBox;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn single_island_never_targets_current() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let o = Objective::generate(&mut rng, 1, 1);
            assert_ne!(o, Objective::VisitIsland(1));
        }
    }

    #[test]
    fn island_targets_stay_in_range_and_skip_current() {
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..500 {
            if let Objective::VisitIsland(id) = Objective::generate(&mut rng, 4, 2) {
                assert!((1..=4).contains(&id));
                assert_ne!(id, 2);
            }
        }
    }

    #[test]
    fn no_islands_falls_back() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(!matches!(
                Objective::generate(&mut rng, 0, 0),
                Objective::VisitIsland(_)
            ));
        }
    }

    #[test]
    fn completion_checks() {
        let mut p = Player::new(1, "Player1", PixelBox::new(0.0, 0.0, 10.0, 10.0));
        assert!(!Objective::VisitIsland(2).is_complete(&p));
        p.visited_islands.extend([1, 2, 3]);
        assert!(Objective::VisitIsland(2).is_complete(&p));
        assert!(Objective::VisitIslands(3).is_complete(&p));
        assert!(!Objective::ContactPlayers(2).is_complete(&p));
        p.contacted_players.extend([7, 9]);
        assert!(Objective::ContactPlayers(2).is_complete(&p));
        assert!(!Objective::Complete.is_complete(&p));
    }
}
