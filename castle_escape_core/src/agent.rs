use rand::{Rng, RngCore, seq::IndexedRandom};

use crate::{
    environment::{Action, Observation},
    hashing::hash_observation,
    q_learning::QTable,
};

/// Trait defining the behavior of an agent.
/// Agents decide which action to take based on the current observation.
pub trait Agent {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;

    /// Determines the next action. Any randomness must come from `rng`, the
    /// run's shared stream, so that episodes replay exactly under a fixed seed.
    fn get_action(&mut self, observation: &Observation, rng: &mut dyn RngCore) -> Action;
}

/// Wanders the castle with uniformly random movements, whatever is in the room.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomWalker;

impl Agent for RandomWalker {
    fn name(&self) -> &str {
        "random"
    }

    fn get_action(&mut self, _observation: &Observation, rng: &mut dyn RngCore) -> Action {
        *Action::MOVES.choose(rng).unwrap_or(&Action::Up)
    }
}

/// Fights every guard it meets and otherwise moves at random.
#[derive(Debug, Default, Clone, Copy)]
pub struct FightWhenPossible;

impl Agent for FightWhenPossible {
    fn name(&self) -> &str {
        "fight"
    }

    fn get_action(&mut self, observation: &Observation, rng: &mut dyn RngCore) -> Action {
        if observation.guard.is_some() {
            Action::Fight
        } else {
            Action::MOVES[rng.random_range(0..Action::MOVES.len())]
        }
    }
}

/// Follows a trained Q-table without exploring.
///
/// States the table has never seen fall back to the first action, the same
/// tie-break an all-zero row gets.
#[derive(Debug, Clone, Copy)]
pub struct GreedyAgent<'a> {
    table: &'a QTable,
}

impl<'a> GreedyAgent<'a> {
    pub fn new(table: &'a QTable) -> Self {
        Self { table }
    }
}

impl Agent for GreedyAgent<'_> {
    fn name(&self) -> &str {
        "greedy"
    }

    fn get_action(&mut self, observation: &Observation, _rng: &mut dyn RngCore) -> Action {
        let state = hash_observation(observation);
        self.table
            .values(state)
            .map(|values| QTable::greedy_action(&values))
            .unwrap_or(Action::ALL[0])
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{GuardId, Health, Room};

    fn observation(guard: Option<GuardId>) -> Observation {
        Observation {
            room: Room::new(2, 2),
            health: Health::Full,
            guard,
        }
    }

    #[test]
    fn fighter_always_fights_a_present_guard() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut agent = FightWhenPossible;
        for _ in 0..50 {
            assert_eq!(agent.get_action(&observation(Some(GuardId::G1)), &mut rng), Action::Fight);
            assert!(agent.get_action(&observation(None), &mut rng).is_movement());
        }
    }

    #[test]
    fn random_walker_only_moves() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut agent = RandomWalker;
        for _ in 0..50 {
            assert!(agent.get_action(&observation(Some(GuardId::G2)), &mut rng).is_movement());
        }
    }

    #[test]
    fn greedy_agent_follows_the_best_value() {
        let mut table = QTable::new();
        let obs = observation(Some(GuardId::G3));
        let state = hash_observation(&obs);
        table.ensure(state);
        table.set(state, Action::Hide, 5.0);
        table.set(state, Action::Fight, 2.0);

        let mut rng = StdRng::seed_from_u64(1);
        let mut agent = GreedyAgent::new(&table);
        assert_eq!(agent.get_action(&obs, &mut rng), Action::Hide);
        assert_eq!(agent.get_action(&observation(None), &mut rng), Action::Up);
    }
}
