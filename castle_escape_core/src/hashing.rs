//! Dense integer encoding of observations.
//!
//! Every tabular structure in the crate is keyed by [`StateHash`], so this is
//! the single place an [`Observation`] is turned into a table index.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GRID_SIZE, GUARD_COUNT, GuardId, Health, Room, environment::Observation};

/// Number of guard codes: "no guard" plus one per guard.
const GUARD_CODES: usize = GUARD_COUNT + 1;

/// Number of distinct observations, and so the exclusive upper bound of every hash.
pub const STATE_COUNT: usize = GRID_SIZE * GRID_SIZE * Health::COUNT * GUARD_CODES;

/// Index of an observation in `[0, STATE_COUNT)`.
///
/// Computed as `row * 75 + col * 15 + health * 5 + guard_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct StateHash(u16);

/// Raw value that does not name any observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("state hash {0} is outside [0, {max})", max = STATE_COUNT)]
pub struct StateHashOutOfRange(pub u16);

impl StateHash {
    pub fn value(self) -> usize {
        self.0 as usize
    }

    /// Wraps a raw value, rejecting anything outside the state space.
    pub fn from_value(value: usize) -> Option<StateHash> {
        (value < STATE_COUNT).then_some(StateHash(value as u16))
    }

    /// Recovers the observation this hash was computed from.
    pub fn decode(self) -> Observation {
        let value = self.value();
        let guard_code = value % GUARD_CODES;
        let health_code = (value / GUARD_CODES) % Health::COUNT;
        let col = (value / (GUARD_CODES * Health::COUNT)) % GRID_SIZE;
        let row = value / (GUARD_CODES * Health::COUNT * GRID_SIZE);
        Observation {
            room: Room::new(row, col),
            // Both codes are reduced modulo their ranges above.
            health: Health::from_code(health_code).unwrap_or(Health::Critical),
            guard: GuardId::from_code(guard_code),
        }
    }
}

impl TryFrom<u16> for StateHash {
    type Error = StateHashOutOfRange;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        StateHash::from_value(value as usize).ok_or(StateHashOutOfRange(value))
    }
}

impl From<StateHash> for u16 {
    fn from(hash: StateHash) -> u16 {
        hash.0
    }
}

impl fmt::Display for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hashes an observation.
pub fn hash_observation(obs: &Observation) -> StateHash {
    let guard_code = obs.guard.map_or(0, GuardId::code);
    let value = obs.room.row * (GRID_SIZE * Health::COUNT * GUARD_CODES)
        + obs.room.col * (Health::COUNT * GUARD_CODES)
        + obs.health.code() * GUARD_CODES
        + guard_code;
    debug_assert!(value < STATE_COUNT, "observation {obs:?} is off the grid");
    StateHash(value as u16)
}

impl From<&Observation> for StateHash {
    fn from(obs: &Observation) -> Self {
        hash_observation(obs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn all_observations() -> Vec<Observation> {
        let mut observations = Vec::new();
        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                for health_code in 0..Health::COUNT {
                    for guard_code in 0..GUARD_CODES {
                        observations.push(Observation {
                            room: Room::new(row, col),
                            health: Health::from_code(health_code).unwrap(),
                            guard: GuardId::from_code(guard_code),
                        });
                    }
                }
            }
        }
        observations
    }

    #[test]
    fn hash_is_a_bijection_onto_the_state_range() {
        let observations = all_observations();
        assert_eq!(observations.len(), 375);
        assert_eq!(STATE_COUNT, 375);

        let hashes: HashSet<usize> = observations
            .iter()
            .map(|obs| hash_observation(obs).value())
            .collect();
        assert_eq!(hashes.len(), STATE_COUNT);
        assert!(hashes.iter().all(|&h| h < STATE_COUNT));
    }

    #[test]
    fn decode_inverts_the_hash() {
        for obs in all_observations() {
            assert_eq!(hash_observation(&obs).decode(), obs);
        }
    }

    #[test]
    fn worked_example_matches_the_formula() {
        let obs = Observation {
            room: Room::new(1, 2),
            health: Health::Full,
            guard: Some(GuardId::G4),
        };
        assert_eq!(hash_observation(&obs).value(), 119);

        let start = Observation {
            room: Room::new(0, 0),
            health: Health::Full,
            guard: None,
        };
        assert_eq!(StateHash::from(&start).value(), 10);
    }

    #[test]
    fn from_value_rejects_out_of_range() {
        assert!(StateHash::from_value(374).is_some());
        assert!(StateHash::from_value(375).is_none());
        assert_eq!(StateHash::try_from(374u16).map(StateHash::value), Ok(374));
        assert_eq!(StateHash::try_from(375u16), Err(StateHashOutOfRange(375)));
    }
}
