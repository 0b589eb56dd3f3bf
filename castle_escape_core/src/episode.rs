//! Shared episode driver for fixed policies.

use rand::Rng;

use crate::{
    agent::Agent,
    environment::{EpisodicEnvironment, Terminal},
    observer::StepObserver,
};

/// How a single episode went.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    pub steps: usize,
    pub total_reward: f64,
    /// `None` when the episode was cut off by the step limit.
    pub terminal: Option<Terminal>,
}

/// Plays one episode of `agent` in `env`, from reset until a terminal step.
///
/// With `max_steps` set, the episode is abandoned after that many steps.
pub fn run_episode<E, A, R, O>(
    env: &mut E,
    agent: &mut A,
    rng: &mut R,
    observer: &mut O,
    episode: usize,
    max_steps: Option<usize>,
) -> EpisodeSummary
where
    E: EpisodicEnvironment,
    A: Agent + ?Sized,
    R: Rng,
    O: StepObserver + ?Sized,
{
    let mut observation = env.reset(rng);
    observer.on_episode_start(episode, &observation);

    let mut summary = EpisodeSummary {
        steps: 0,
        total_reward: 0.0,
        terminal: None,
    };
    while max_steps.is_none_or(|limit| summary.steps < limit) {
        let action = agent.get_action(&observation, &mut *rng);
        let step = env.step(action, rng);
        observer.on_step(episode, &step);

        summary.steps += 1;
        summary.total_reward += step.reward;
        observation = step.observation;
        if step.done {
            summary.terminal = step.info.terminal;
            break;
        }
    }

    observer.on_episode_end(episode, summary.total_reward);
    summary
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        agent::{FightWhenPossible, RandomWalker},
        environment::CastleEscape,
        observer::TrajectoryRecorder,
    };

    #[test]
    fn episode_runs_until_a_terminal_step() {
        let mut env = CastleEscape::new();
        let mut rng = StdRng::seed_from_u64(12);
        let mut recorder = TrajectoryRecorder::new();

        let summary = run_episode(
            &mut env,
            &mut FightWhenPossible,
            &mut rng,
            &mut recorder,
            0,
            None,
        );

        assert!(summary.terminal.is_some());
        assert_eq!(summary.steps, recorder.len());
        assert!(recorder.steps.last().is_some_and(|step| step.done));
        assert!(recorder.steps[..recorder.len() - 1].iter().all(|step| !step.done));
        let total: f64 = recorder.steps.iter().map(|step| step.reward).sum();
        assert_eq!(summary.total_reward, total);
        assert_eq!(recorder.total_reward, total);
    }

    #[test]
    fn step_limit_cuts_episodes_short() {
        let mut env = CastleEscape::new();
        let mut rng = StdRng::seed_from_u64(12);
        let mut recorder = TrajectoryRecorder::new();

        let summary = run_episode(&mut env, &mut RandomWalker, &mut rng, &mut recorder, 0, Some(1));
        assert_eq!(summary.steps, 1);
        // One step from the start room can never finish the episode.
        assert_eq!(summary.terminal, None);
    }

    #[test]
    fn same_seed_replays_the_same_episode() {
        let play = |seed| {
            let mut env = CastleEscape::new();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut recorder = TrajectoryRecorder::new();
            run_episode(&mut env, &mut FightWhenPossible, &mut rng, &mut recorder, 0, None);
            recorder.steps
        };
        assert_eq!(play(77), play(77));
    }
}
