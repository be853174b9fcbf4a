//! Stimulus positions for one match

use crate::types::{ArenaConfig, Position, ROUNDS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The fixed sequence of stimulus positions shared by both players of a room.
///
/// Built once when the room fills and never regenerated for that match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundPlan {
    seed: u64,
    positions: [Position; ROUNDS],
}

impl RoundPlan {
    /// Derive the plan from `seed`. Each index is drawn independently; two
    /// rounds may land on the same spot.
    pub fn generate(seed: u64, config: &ArenaConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let max_x = config.canvas_width.saturating_sub(config.stimulus_size);
        let max_y = config.canvas_height.saturating_sub(config.stimulus_size);

        let positions = std::array::from_fn(|_| Position {
            x: rng.gen_range(0..=max_x),
            y: rng.gen_range(0..=max_y),
        });

        Self { seed, positions }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Position for round `index` (0-based)
    pub fn position(&self, index: usize) -> Option<Position> {
        self.positions.get(index).copied()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }
}
