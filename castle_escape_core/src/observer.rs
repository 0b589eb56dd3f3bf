//! Step observer port.
//!
//! Episode drivers notify an observer after every transition so that
//! rendering, statistics and recording stay out of the simulation loop.
//! Observers never influence outcomes.

use crate::environment::{Observation, Step};

/// Receives episode lifecycle events.
///
/// Call order per episode: `on_episode_start`, then `on_step` once per
/// transition, then `on_episode_end`.
pub trait StepObserver {
    fn on_episode_start(&mut self, _episode: usize, _observation: &Observation) {}

    fn on_step(&mut self, _episode: usize, _step: &Step) {}

    fn on_episode_end(&mut self, _episode: usize, _total_reward: f64) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {}

/// Records every transition of the most recent episode.
#[derive(Debug, Default, Clone)]
pub struct TrajectoryRecorder {
    pub initial: Option<Observation>,
    pub steps: Vec<Step>,
    pub total_reward: f64,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl StepObserver for TrajectoryRecorder {
    fn on_episode_start(&mut self, _episode: usize, observation: &Observation) {
        self.initial = Some(*observation);
        self.steps.clear();
        self.total_reward = 0.0;
    }

    fn on_step(&mut self, _episode: usize, step: &Step) {
        self.steps.push(*step);
    }

    fn on_episode_end(&mut self, _episode: usize, total_reward: f64) {
        self.total_reward = total_reward;
    }
}
