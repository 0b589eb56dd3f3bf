//! Evaluation of fixed policies.

use rand::Rng;
use tracing::info;

use crate::{
    agent::Agent,
    config::EvaluationConfig,
    environment::{EpisodicEnvironment, Observation, Step, Terminal},
    episode::run_episode,
    map::Grid,
    observer::StepObserver,
};

/// Aggregate results of playing a policy for many episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub policy: String,
    pub episodes: usize,
    pub mean_reward: f64,
    pub mean_steps: f64,
    pub goals: usize,
    pub defeats: usize,
    /// Episodes abandoned at the step limit.
    pub truncated: usize,
    /// How often the player stood in each room, counting the start of every episode.
    pub visits: Grid<u64>,
}

impl EvaluationReport {
    pub fn goal_rate(&self) -> f64 {
        self.rate(self.goals)
    }

    pub fn defeat_rate(&self) -> f64 {
        self.rate(self.defeats)
    }

    fn rate(&self, count: usize) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            count as f64 / self.episodes as f64
        }
    }
}

#[derive(Debug, Default)]
struct VisitCounter {
    visits: Grid<u64>,
}

impl StepObserver for VisitCounter {
    fn on_episode_start(&mut self, _episode: usize, observation: &Observation) {
        self.visits[observation.room] += 1;
    }

    fn on_step(&mut self, _episode: usize, step: &Step) {
        self.visits[step.observation.room] += 1;
    }
}

/// Plays `agent` for `config.episodes` episodes of at most `config.max_steps` steps.
pub fn evaluate_policy<E, A, R>(
    env: &mut E,
    agent: &mut A,
    config: &EvaluationConfig,
    rng: &mut R,
) -> EvaluationReport
where
    E: EpisodicEnvironment,
    A: Agent + ?Sized,
    R: Rng,
{
    let mut counter = VisitCounter::default();
    let mut total_reward = 0.0;
    let mut total_steps = 0usize;
    let (mut goals, mut defeats, mut truncated) = (0, 0, 0);

    for episode in 0..config.episodes {
        let summary = run_episode(env, agent, rng, &mut counter, episode, Some(config.max_steps));
        total_reward += summary.total_reward;
        total_steps += summary.steps;
        match summary.terminal {
            Some(Terminal::Goal) => goals += 1,
            Some(Terminal::Defeat) => defeats += 1,
            None => truncated += 1,
        }
    }

    let episodes = config.episodes.max(1) as f64;
    let report = EvaluationReport {
        policy: agent.name().to_string(),
        episodes: config.episodes,
        mean_reward: total_reward / episodes,
        mean_steps: total_steps as f64 / episodes,
        goals,
        defeats,
        truncated,
        visits: counter.visits,
    };
    info!(
        policy = %report.policy,
        episodes = report.episodes,
        mean_reward = report.mean_reward,
        goal_rate = report.goal_rate(),
        defeat_rate = report.defeat_rate(),
        truncated = report.truncated,
        "evaluation finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        START_ROOM,
        agent::{FightWhenPossible, GreedyAgent, RandomWalker},
        environment::CastleEscape,
        q_learning::QTable,
    };

    fn config(episodes: usize, max_steps: usize) -> EvaluationConfig {
        EvaluationConfig {
            episodes,
            seed: 0,
            max_steps,
        }
    }

    #[test]
    fn every_episode_is_classified_once() {
        let mut env = CastleEscape::new();
        let mut rng = StdRng::seed_from_u64(6);
        let report = evaluate_policy(
            &mut env,
            &mut FightWhenPossible,
            &config(300, 10_000),
            &mut rng,
        );

        assert_eq!(report.policy, "fight");
        assert_eq!(report.goals + report.defeats + report.truncated, 300);
        assert_eq!(report.truncated, 0);
        assert!((report.goal_rate() + report.defeat_rate() - 1.0).abs() < 1e-9);
        assert!(report.visits[START_ROOM] >= 300);
        let visits: u64 = report.visits.iter().sum();
        assert!((visits as f64 - 300.0 * (report.mean_steps + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn stuck_policies_are_truncated() {
        // An empty table always chooses UP, which never leaves the start room.
        let table = QTable::new();
        let mut env = CastleEscape::new();
        let mut rng = StdRng::seed_from_u64(6);
        let mut agent = GreedyAgent::new(&table);
        let report = evaluate_policy(&mut env, &mut agent, &config(5, 50), &mut rng);

        assert_eq!(report.truncated, 5);
        assert_eq!(report.mean_steps, 50.0);
        assert_eq!(report.mean_reward, 0.0);
        assert_eq!(report.visits[START_ROOM], 5 * 51);
    }

    #[test]
    fn empty_evaluations_report_zero_rates() {
        let mut env = CastleEscape::new();
        let mut rng = StdRng::seed_from_u64(6);
        let report = evaluate_policy(&mut env, &mut RandomWalker, &config(0, 10), &mut rng);
        assert_eq!(report.goal_rate(), 0.0);
        assert_eq!(report.mean_reward, 0.0);
    }
}
