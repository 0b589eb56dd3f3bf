use std::{fmt, str::FromStr};

use rand::{
    Rng,
    seq::{IndexedRandom, index},
};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{GOAL_ROOM, GRID_SIZE, GUARD_COUNT, GuardId, Health, Room, START_ROOM, map::Grid};

// Guards are drawn without replacement from every room except start and goal.
const _: () = assert!(GRID_SIZE * GRID_SIZE - 2 >= GUARD_COUNT);

/// Probability that a movement goes where it was aimed.
pub const MOVE_SUCCESS_PROBABILITY: f64 = 0.9;

/// Represents the actions available to the player, in their integer-code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Fight,
    Hide,
}

impl Action {
    pub const COUNT: usize = 6;

    /// All actions, indexed by their integer code.
    pub const ALL: [Action; Action::COUNT] = [
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
        Action::Fight,
        Action::Hide,
    ];

    /// The four movement directions.
    pub const MOVES: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    pub fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Left => 2,
            Action::Right => 3,
            Action::Fight => 4,
            Action::Hide => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Action> {
        Action::ALL.get(index).copied()
    }

    pub fn is_movement(self) -> bool {
        self.direction().is_some()
    }

    /// Row/column offset of a movement action.
    pub fn direction(self) -> Option<(isize, isize)> {
        match self {
            Action::Up => Some((-1, 0)),
            Action::Down => Some((1, 0)),
            Action::Left => Some((0, -1)),
            Action::Right => Some((0, 1)),
            Action::Fight | Action::Hide => None,
        }
    }

    /// Room this action would move into from `room`, if it is a movement that stays on the grid.
    pub fn target_from(self, room: Room) -> Option<Room> {
        let (d_row, d_col) = self.direction()?;
        room.offset(d_row, d_col)
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
            Action::Fight => "FIGHT",
            Action::Hide => "HIDE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when an integer code or name does not denote an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseActionError {
    #[error("action code {0} is not in 0..=5")]
    Code(u8),
    #[error("unknown action name '{0}'")]
    Name(String),
}

impl TryFrom<u8> for Action {
    type Error = ParseActionError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Action::from_index(code as usize).ok_or(ParseActionError::Code(code))
    }
}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseActionError::Name(s.to_string()))
    }
}

/// Reward constants of the castle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rewards {
    /// Reaching the exit.
    pub goal: f64,
    /// Defeating a guard.
    pub combat_win: f64,
    /// Losing a fight.
    pub combat_loss: f64,
    /// Being reduced to critical health.
    pub defeat: f64,
}

pub const REWARDS: Rewards = Rewards {
    goal: 10000.0,
    combat_win: 10.0,
    combat_loss: -1000.0,
    defeat: -1000.0,
};

/// What the player sees: its own room and health, and the guard sharing its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    pub room: Room,
    pub health: Health,
    pub guard: Option<GuardId>,
}

/// The full world state of one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    pub player: Room,
    pub health: Health,
    /// Room of each guard, indexed by [`GuardId::index`].
    pub guards: [Room; GUARD_COUNT],
}

impl WorldState {
    /// The guard occupying `room`. If several do, the first in guard order wins.
    pub fn guard_at(&self, room: Room) -> Option<GuardId> {
        GuardId::ALL
            .into_iter()
            .find(|guard| self.guards[guard.index()] == room)
    }

    pub fn guard_room(&self, guard: GuardId) -> Room {
        self.guards[guard.index()]
    }

    /// Projection of the state visible to the player.
    pub fn observation(&self) -> Observation {
        Observation {
            room: self.player,
            health: self.health,
            guard: self.guard_at(self.player),
        }
    }

    /// Grid marking which guard (if any) stands in each room.
    pub fn occupancy(&self) -> Grid<Option<GuardId>> {
        Grid::from_generator(|room| self.guard_at(room))
    }
}

/// How the chosen action played out, before terminal checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Moved { to: Room },
    /// The floor was slippery: the player ended up in `to` instead of `intended`.
    Slipped { intended: Room, to: Room },
    OutOfBounds,
    /// A guard is in the room, so the player must fight or hide.
    Blocked { guard: GuardId },
    /// `spotted` is set when the fight followed a failed hide attempt.
    FightWon { guard: GuardId, to: Room, spotted: bool },
    FightLost {
        guard: GuardId,
        to: Room,
        health: Health,
        spotted: bool,
    },
    Hid { guard: GuardId, to: Room },
    NoGuardToFight,
    NoGuardToHide,
    InvalidAction { code: u8 },
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnOutcome::Moved { to } => write!(f, "Moved to {to}"),
            TurnOutcome::Slipped { intended, to } => {
                write!(f, "Slipped on the way to {intended}, ended up in {to}")
            }
            TurnOutcome::OutOfBounds => f.write_str("Out of bounds!"),
            TurnOutcome::Blocked { guard } => {
                write!(f, "Guard {guard} is in the room! You must fight or hide.")
            }
            TurnOutcome::FightWon { guard, spotted, .. } => {
                if *spotted {
                    write!(f, "Spotted by {guard}, fought and won!")
                } else {
                    write!(f, "Fought {guard} and won!")
                }
            }
            TurnOutcome::FightLost { guard, spotted, .. } => {
                if *spotted {
                    write!(f, "Spotted by {guard}, fought and lost!")
                } else {
                    write!(f, "Fought {guard} and lost!")
                }
            }
            TurnOutcome::Hid { guard, .. } => write!(f, "Successfully hid from {guard}!"),
            TurnOutcome::NoGuardToFight => f.write_str("No guard to fight!"),
            TurnOutcome::NoGuardToHide => f.write_str("No guard to hide from!"),
            TurnOutcome::InvalidAction { code } => write!(f, "Invalid action {code}!"),
        }
    }
}

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminal {
    Goal,
    Defeat,
}

/// Diagnostic record attached to every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepInfo {
    /// `None` when the step was requested with an unknown action code.
    pub action: Option<Action>,
    pub outcome: TurnOutcome,
    pub terminal: Option<Terminal>,
}

impl fmt::Display for StepInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.outcome)?;
        match self.terminal {
            Some(Terminal::Goal) => write!(f, " You've reached the goal! {} points!", REWARDS.goal),
            Some(Terminal::Defeat) => write!(f, " You've been caught! {} points!", REWARDS.defeat),
            None => Ok(()),
        }
    }
}

/// Result of a single environment transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// A single-agent episodic environment driven by an explicit random stream.
pub trait EpisodicEnvironment {
    /// Starts a new episode and returns its first observation.
    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Observation;

    /// Applies one action and returns the resulting transition.
    fn step<R: Rng + ?Sized>(&mut self, action: Action, rng: &mut R) -> Step;
}

/// The castle: a 5x5 grid of rooms, four guards and an exit in the far corner.
#[derive(Debug, Clone)]
pub struct CastleEscape {
    state: WorldState,
}

impl Default for CastleEscape {
    fn default() -> Self {
        Self::new()
    }
}

impl CastleEscape {
    /// Creates the castle with guards in their first free rooms.
    ///
    /// Call [`EpisodicEnvironment::reset`] before playing to randomise them.
    pub fn new() -> Self {
        let pool = Self::placement_pool();
        let mut guards = [START_ROOM; GUARD_COUNT];
        for (slot, room) in guards.iter_mut().zip(pool) {
            *slot = room;
        }
        CastleEscape {
            state: WorldState {
                player: START_ROOM,
                health: Health::Full,
                guards,
            },
        }
    }

    /// Rooms a guard may be placed in: every room except the start and the exit.
    pub fn placement_pool() -> Vec<Room> {
        Grid::<()>::new()
            .enumerate()
            .map(|(room, _)| room)
            .filter(|&room| room != START_ROOM && room != GOAL_ROOM)
            .collect()
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Replaces the world state wholesale, e.g. to set up a specific encounter.
    pub fn restore(&mut self, state: WorldState) {
        self.state = state;
    }

    pub fn observation(&self) -> Observation {
        self.state.observation()
    }

    /// Steps with a raw integer action code. Unknown codes are a no-op with zero reward.
    pub fn step_code<R: Rng + ?Sized>(&mut self, code: u8, rng: &mut R) -> Step {
        match Action::try_from(code) {
            Ok(action) => self.step(action, rng),
            Err(_) => self.finish_turn(None, TurnOutcome::InvalidAction { code }, 0.0),
        }
    }

    fn move_player<R: Rng + ?Sized>(&mut self, action: Action, rng: &mut R) -> TurnOutcome {
        if let Some(guard) = self.state.guard_at(self.state.player) {
            return TurnOutcome::Blocked { guard };
        }

        let current = self.state.player;
        let Some(intended) = action.target_from(current) else {
            return TurnOutcome::OutOfBounds;
        };

        if rng.random::<f64>() < MOVE_SUCCESS_PROBABILITY {
            self.state.player = intended;
            return TurnOutcome::Moved { to: intended };
        }

        let alternatives: Vec<Room> = Action::MOVES
            .into_iter()
            .filter(|&other| other != action)
            .filter_map(|other| other.target_from(current))
            .collect();
        if let Some(&room) = alternatives.choose(rng) {
            self.state.player = room;
        }
        TurnOutcome::Slipped {
            intended,
            to: self.state.player,
        }
    }

    /// Moves the player to a random in-bounds neighbouring room.
    fn relocate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Room {
        if let Some(&room) = self.state.player.neighbors().choose(rng) {
            self.state.player = room;
        }
        self.state.player
    }

    fn fight<R: Rng + ?Sized>(
        &mut self,
        guard: GuardId,
        spotted: bool,
        rng: &mut R,
    ) -> (TurnOutcome, f64) {
        if rng.random::<f64>() > guard.profile().strength {
            let to = self.relocate(rng);
            (TurnOutcome::FightWon { guard, to, spotted }, REWARDS.combat_win)
        } else {
            self.state.health = self.state.health.worsened();
            let to = self.relocate(rng);
            let outcome = TurnOutcome::FightLost {
                guard,
                to,
                health: self.state.health,
                spotted,
            };
            (outcome, REWARDS.combat_loss)
        }
    }

    fn hide<R: Rng + ?Sized>(&mut self, guard: GuardId, rng: &mut R) -> (TurnOutcome, f64) {
        if rng.random::<f64>() > guard.profile().keenness {
            let to = self.relocate(rng);
            (TurnOutcome::Hid { guard, to }, 0.0)
        } else {
            self.fight(guard, true, rng)
        }
    }

    fn is_terminal(&self) -> Option<Terminal> {
        if self.state.player == GOAL_ROOM {
            Some(Terminal::Goal)
        } else if self.state.health == Health::Critical {
            Some(Terminal::Defeat)
        } else {
            None
        }
    }

    fn finish_turn(&mut self, action: Option<Action>, outcome: TurnOutcome, reward: f64) -> Step {
        let terminal = self.is_terminal();
        let reward = match terminal {
            Some(Terminal::Goal) => reward + REWARDS.goal,
            Some(Terminal::Defeat) => reward + REWARDS.defeat,
            None => reward,
        };
        let info = StepInfo {
            action,
            outcome,
            terminal,
        };
        trace!(%info, reward, "step");
        Step {
            observation: self.state.observation(),
            reward,
            done: terminal.is_some(),
            info,
        }
    }
}

impl EpisodicEnvironment for CastleEscape {
    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Observation {
        let pool = Self::placement_pool();
        let picks = index::sample(rng, pool.len(), GUARD_COUNT);
        let mut guards = [START_ROOM; GUARD_COUNT];
        for (slot, i) in guards.iter_mut().zip(picks.iter()) {
            *slot = pool[i];
        }
        self.state = WorldState {
            player: START_ROOM,
            health: Health::Full,
            guards,
        };
        self.state.observation()
    }

    fn step<R: Rng + ?Sized>(&mut self, action: Action, rng: &mut R) -> Step {
        let guard = self.state.guard_at(self.state.player);
        let (outcome, reward) = match (action, guard) {
            (Action::Fight, Some(guard)) => self.fight(guard, false, rng),
            (Action::Fight, None) => (TurnOutcome::NoGuardToFight, 0.0),
            (Action::Hide, Some(guard)) => self.hide(guard, rng),
            (Action::Hide, None) => (TurnOutcome::NoGuardToHide, 0.0),
            (movement, _) => (self.move_player(movement, rng), 0.0),
        };
        self.finish_turn(Some(action), outcome, reward)
    }
}
