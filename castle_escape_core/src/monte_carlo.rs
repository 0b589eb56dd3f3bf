//! Monte Carlo estimation of the odds of beating each guard.
//!
//! Episodes are played by [`FightWhenPossible`]; every fight it starts is a
//! trial for the guard it faced, and a trial succeeds when the step's reward
//! is exactly the combat-win reward.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    GUARD_COUNT, GuardId,
    agent::FightWhenPossible,
    environment::{Action, EpisodicEnvironment, REWARDS, Step, TurnOutcome},
    episode::run_episode,
    observer::StepObserver,
};

/// Per-guard fight tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryEstimate {
    /// Fights started against each guard, indexed by [`GuardId::index`].
    pub fights: [u64; GUARD_COUNT],
    /// Fights won against each guard.
    pub wins: [u64; GUARD_COUNT],
}

impl VictoryEstimate {
    pub fn record(&mut self, guard: GuardId, won: bool) {
        self.fights[guard.index()] += 1;
        if won {
            self.wins[guard.index()] += 1;
        }
    }

    /// Empirical win rate against `guard`, or `None` if it was never fought.
    pub fn probability(&self, guard: GuardId) -> Option<f64> {
        let fights = self.fights[guard.index()];
        (fights > 0).then(|| self.wins[guard.index()] as f64 / fights as f64)
    }

    /// Win rate per guard; guards never fought read as zero.
    pub fn probabilities(&self) -> [f64; GUARD_COUNT] {
        GuardId::ALL.map(|guard| self.probability(guard).unwrap_or(0.0))
    }

    pub fn total_fights(&self) -> u64 {
        self.fights.iter().sum()
    }
}

impl StepObserver for VictoryEstimate {
    fn on_step(&mut self, _episode: usize, step: &Step) {
        if step.info.action != Some(Action::Fight) {
            return;
        }
        match step.info.outcome {
            TurnOutcome::FightWon { guard, .. } | TurnOutcome::FightLost { guard, .. } => {
                self.record(guard, step.reward == REWARDS.combat_win);
            }
            _ => {}
        }
    }
}

/// Plays `num_episodes` fight-when-possible episodes and tallies every fight.
pub fn estimate<E, R>(env: &mut E, num_episodes: usize, rng: &mut R) -> VictoryEstimate
where
    E: EpisodicEnvironment,
    R: Rng,
{
    let mut estimate = VictoryEstimate::default();
    let mut agent = FightWhenPossible;
    for episode in 0..num_episodes {
        run_episode(env, &mut agent, rng, &mut estimate, episode, None);
    }
    info!(
        episodes = num_episodes,
        fights = ?estimate.fights,
        wins = ?estimate.wins,
        "monte carlo estimation finished"
    );
    estimate
}

/// Estimated probability of beating each guard, in guard order.
pub fn estimate_victory_probability<E, R>(
    env: &mut E,
    num_episodes: usize,
    rng: &mut R,
) -> [f64; GUARD_COUNT]
where
    E: EpisodicEnvironment,
    R: Rng,
{
    estimate(env, num_episodes, rng).probabilities()
}
