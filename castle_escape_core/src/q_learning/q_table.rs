//! Q-table with per-pair update counters

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{environment::Action, hashing::StateHash};

/// Action values and update counts for one state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QEntry {
    /// Q-value per action, indexed by [`Action::index`].
    pub values: [f64; Action::COUNT],
    /// Number of updates applied to each action's value.
    pub updates: [u32; Action::COUNT],
}

impl QEntry {
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Q-table mapping hashed states to their action values
///
/// Rows are created lazily, all-zero, the first time a state is seen, and
/// are never removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    entries: BTreeMap<StateHash, QEntry>,
}

/// One step of the incremental update: moves `current` a fraction `eta` of the
/// way towards `target`.
#[inline]
pub fn interpolate(current: f64, target: f64, eta: f64) -> f64 {
    (1.0 - eta) * current + eta * target
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row for `state`, inserting a zero row if it is new.
    pub fn ensure(&mut self, state: StateHash) -> &mut QEntry {
        self.entries.entry(state).or_default()
    }

    pub fn entry(&self, state: StateHash) -> Option<&QEntry> {
        self.entries.get(&state)
    }

    /// Action values for `state`, if the state has been seen.
    pub fn values(&self, state: StateHash) -> Option<[f64; Action::COUNT]> {
        self.entries.get(&state).map(|entry| entry.values)
    }

    /// Q-value of a pair. Unseen states read as zero.
    pub fn get(&self, state: StateHash, action: Action) -> f64 {
        self.entries
            .get(&state)
            .map_or(0.0, |entry| entry.values[action.index()])
    }

    /// Overwrites a Q-value, creating the row if needed. Update counters are untouched.
    pub fn set(&mut self, state: StateHash, action: Action, value: f64) {
        self.ensure(state).values[action.index()] = value;
    }

    pub fn update_count(&self, state: StateHash, action: Action) -> u32 {
        self.entries
            .get(&state)
            .map_or(0, |entry| entry.updates[action.index()])
    }

    /// Best value available from `state`. Unseen states read as zero.
    pub fn max_value(&self, state: StateHash) -> f64 {
        self.entries.get(&state).map_or(0.0, QEntry::max_value)
    }

    /// Action with the highest value; ties go to the lowest action index.
    pub fn greedy_action(values: &[f64; Action::COUNT]) -> Action {
        let mut best = 0;
        for (index, &value) in values.iter().enumerate().skip(1) {
            if value > values[best] {
                best = index;
            }
        }
        Action::ALL[best]
    }

    /// Q-learning update with a per-pair decaying learning rate.
    ///
    /// Ensures rows for both states, bumps the pair's update counter and sets
    /// `Q(s,a) = (1 - η) Q(s,a) + η (r + γ max_a' Q(s',a'))` with
    /// `η = 1 / (1 + updates(s,a))`. Returns the new value.
    pub fn learn(
        &mut self,
        state: StateHash,
        action: Action,
        reward: f64,
        next_state: StateHash,
        gamma: f64,
    ) -> f64 {
        let max_next = self.ensure(next_state).max_value();
        let entry = self.ensure(state);
        let slot = action.index();
        entry.updates[slot] += 1;
        let eta = 1.0 / (1.0 + f64::from(entry.updates[slot]));
        entry.values[slot] = interpolate(entry.values[slot], reward + gamma * max_next, eta);
        entry.values[slot]
    }

    /// Number of states with a row.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows in ascending state order.
    pub fn iter(&self) -> impl Iterator<Item = (StateHash, &QEntry)> {
        self.entries.iter().map(|(&state, entry)| (state, entry))
    }
}
