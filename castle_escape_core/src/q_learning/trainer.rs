//! ε-greedy Q-learning trainer

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    Result,
    config::TrainingConfig,
    environment::{Action, EpisodicEnvironment, Terminal},
    episode::EpisodeSummary,
    hashing::{StateHash, hash_observation},
    observer::{NoopObserver, StepObserver},
    q_learning::q_table::QTable,
};

/// Totals of a training run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub episodes: usize,
    pub total_steps: u64,
    pub final_epsilon: f64,
    pub states: usize,
    pub goals: usize,
    pub defeats: usize,
}

/// Learns a Q-table by playing episodes against an environment.
///
/// The trainer owns the table and the exploration rate; the random stream is
/// passed in so that the environment and the trainer draw from the same one.
#[derive(Debug, Clone)]
pub struct QLearningTrainer {
    config: TrainingConfig,
    table: QTable,
    epsilon: f64,
}

impl QLearningTrainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            epsilon: config.epsilon,
            table: QTable::new(),
            config,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn into_table(self) -> QTable {
        self.table
    }

    /// ε-greedy action selection
    ///
    /// Always consumes one draw to decide between exploring and exploiting,
    /// and a second one when exploring. Rows for unseen states are created.
    pub fn select_action<R: Rng + ?Sized>(&mut self, state: StateHash, rng: &mut R) -> Action {
        let values = self.table.ensure(state).values;
        if rng.random::<f64>() < self.epsilon {
            Action::ALL[rng.random_range(0..Action::COUNT)]
        } else {
            QTable::greedy_action(&values)
        }
    }

    /// Decay epsilon after an episode
    pub fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.config.decay_rate).max(self.config.epsilon_floor);
    }

    /// Plays one episode, updating the table after every transition, then decays ε.
    pub fn run_episode<E, R, O>(
        &mut self,
        env: &mut E,
        rng: &mut R,
        observer: &mut O,
        episode: usize,
    ) -> EpisodeSummary
    where
        E: EpisodicEnvironment,
        R: Rng,
        O: StepObserver + ?Sized,
    {
        let observation = env.reset(rng);
        observer.on_episode_start(episode, &observation);
        let mut state = hash_observation(&observation);

        let mut summary = EpisodeSummary {
            steps: 0,
            total_reward: 0.0,
            terminal: None,
        };
        loop {
            let action = self.select_action(state, rng);
            let step = env.step(action, rng);
            observer.on_step(episode, &step);

            let next_state = hash_observation(&step.observation);
            self.table
                .learn(state, action, step.reward, next_state, self.config.gamma);

            summary.steps += 1;
            summary.total_reward += step.reward;
            state = next_state;
            if step.done {
                summary.terminal = step.info.terminal;
                break;
            }
        }

        observer.on_episode_end(episode, summary.total_reward);
        self.decay_epsilon();
        summary
    }

    /// Runs the configured number of episodes.
    pub fn train<E, R, O>(&mut self, env: &mut E, rng: &mut R, observer: &mut O) -> TrainingReport
    where
        E: EpisodicEnvironment,
        R: Rng,
        O: StepObserver + ?Sized,
    {
        let mut report = TrainingReport::default();
        for episode in 0..self.config.episodes {
            if self.config.log_every > 0 && episode % self.config.log_every == 0 {
                info!(
                    episode,
                    episodes = self.config.episodes,
                    states = self.table.len(),
                    epsilon = self.epsilon,
                    "training progress"
                );
            }

            let summary = self.run_episode(env, rng, observer, episode);
            debug!(
                episode,
                steps = summary.steps,
                reward = summary.total_reward,
                terminal = ?summary.terminal,
                "episode finished"
            );

            report.episodes += 1;
            report.total_steps += summary.steps as u64;
            match summary.terminal {
                Some(Terminal::Goal) => report.goals += 1,
                Some(Terminal::Defeat) => report.defeats += 1,
                None => {}
            }
        }

        report.final_epsilon = self.epsilon;
        report.states = self.table.len();
        info!(
            episodes = report.episodes,
            steps = report.total_steps,
            states = report.states,
            goals = report.goals,
            defeats = report.defeats,
            epsilon = report.final_epsilon,
            "training finished"
        );
        report
    }
}

/// Trains a Q-table for `num_episodes` episodes and returns it.
///
/// Uses the default ε floor of 0.001 and no progress logging beyond the
/// final summary.
pub fn q_learning<E, R>(
    env: &mut E,
    num_episodes: usize,
    gamma: f64,
    epsilon: f64,
    decay_rate: f64,
    rng: &mut R,
) -> Result<QTable>
where
    E: EpisodicEnvironment,
    R: Rng,
{
    let config = TrainingConfig {
        episodes: num_episodes,
        gamma,
        epsilon,
        decay_rate,
        log_every: 0,
        ..TrainingConfig::default()
    };
    let mut trainer = QLearningTrainer::new(config)?;
    trainer.train(env, rng, &mut NoopObserver);
    Ok(trainer.into_table())
}
