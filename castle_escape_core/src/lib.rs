use std::fmt;

use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod environment;
pub mod episode;
pub mod error;
pub mod evaluation;
pub mod hashing;
pub mod map;
pub mod monte_carlo;
pub mod observer;
pub mod q_learning;

pub use error::{Error, Result};

/// Side length of the square castle grid.
pub const GRID_SIZE: usize = 5;

/// Number of guards patrolling the castle.
pub const GUARD_COUNT: usize = 4;

/// Room the player starts every episode in (top-left corner).
pub const START_ROOM: Room = Room { row: 0, col: 0 };

/// Exit room (bottom-right corner).
pub const GOAL_ROOM: Room = Room {
    row: GRID_SIZE - 1,
    col: GRID_SIZE - 1,
};

/// A room on the castle grid, addressed by `(row, col)`.
///
/// Row 0 is the top of the castle, so moving `UP` decreases `row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Room {
    pub row: usize,
    pub col: usize,
}

impl Room {
    pub const fn new(row: usize, col: usize) -> Self {
        Room { row, col }
    }

    /// Returns true if the room lies on the castle grid.
    #[inline]
    pub fn in_bounds(&self) -> bool {
        self.row < GRID_SIZE && self.col < GRID_SIZE
    }

    /// Applies a signed offset, returning `None` if the result leaves the grid.
    pub fn offset(&self, d_row: isize, d_col: isize) -> Option<Room> {
        let row = self.row.checked_add_signed(d_row)?;
        let col = self.col.checked_add_signed(d_col)?;
        let room = Room { row, col };
        room.in_bounds().then_some(room)
    }

    /// All in-bounds rooms sharing an edge with this one, in UP, DOWN, LEFT, RIGHT order.
    pub fn neighbors(&self) -> Vec<Room> {
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .iter()
            .filter_map(|&(dr, dc)| self.offset(dr, dc))
            .collect()
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Player health, ordered from worst to best.
///
/// The integer codes (`Critical = 0`, `Injured = 1`, `Full = 2`) are part of
/// the observation and feed directly into the state hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Health {
    Critical,
    Injured,
    Full,
}

impl Health {
    /// Number of distinct health levels.
    pub const COUNT: usize = 3;

    pub fn code(self) -> usize {
        match self {
            Health::Critical => 0,
            Health::Injured => 1,
            Health::Full => 2,
        }
    }

    pub fn from_code(code: usize) -> Option<Health> {
        match code {
            0 => Some(Health::Critical),
            1 => Some(Health::Injured),
            2 => Some(Health::Full),
            _ => None,
        }
    }

    /// One severity step worse. Critical stays Critical.
    pub fn worsened(self) -> Health {
        match self {
            Health::Full => Health::Injured,
            Health::Injured | Health::Critical => Health::Critical,
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Health::Full => "Full",
            Health::Injured => "Injured",
            Health::Critical => "Critical",
        };
        f.write_str(name)
    }
}

/// Identity of one of the castle guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GuardId {
    G1,
    G2,
    G3,
    G4,
}

impl GuardId {
    /// All guards in their fixed order.
    pub const ALL: [GuardId; GUARD_COUNT] = [GuardId::G1, GuardId::G2, GuardId::G3, GuardId::G4];

    /// Zero-based position in [`GuardId::ALL`].
    pub fn index(self) -> usize {
        match self {
            GuardId::G1 => 0,
            GuardId::G2 => 1,
            GuardId::G3 => 2,
            GuardId::G4 => 3,
        }
    }

    /// One-based code used in the state hash (0 is reserved for "no guard").
    pub fn code(self) -> usize {
        self.index() + 1
    }

    pub fn from_code(code: usize) -> Option<GuardId> {
        code.checked_sub(1).and_then(|i| GuardId::ALL.get(i).copied())
    }

    /// Combat and stealth parameters of this guard.
    pub fn profile(self) -> GuardProfile {
        match self {
            GuardId::G1 => GuardProfile::new(0.8, 0.1),
            GuardId::G2 => GuardProfile::new(0.6, 0.3),
            GuardId::G3 => GuardProfile::new(0.9, 0.2),
            GuardId::G4 => GuardProfile::new(0.7, 0.5),
        }
    }
}

impl fmt::Display for GuardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.code())
    }
}

/// Fixed parameters of a guard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardProfile {
    /// Probability that the guard wins a fight against the player.
    pub strength: f64,
    /// Probability that the guard spots the player trying to hide.
    pub keenness: f64,
}

impl GuardProfile {
    pub const fn new(strength: f64, keenness: f64) -> Self {
        GuardProfile { strength, keenness }
    }
}
