//! Tabular Q-learning over hashed castle observations
//!
//! The trainer plays episodes with an ε-greedy policy and applies the
//! off-policy update after every transition:
//!
//! ```text
//! Q(s,a) ← (1 - η) Q(s,a) + η [r + γ max_a' Q(s',a')]
//! ```
//!
//! where `η = 1 / (1 + n(s,a))` and `n(s,a)` counts the updates applied to
//! that pair so far. Each pair therefore keeps its own step-size schedule,
//! which turns the update into a running average of its targets.
//!
//! ## Usage Example
//!
//! ```no_run
//! use castle_escape_core::{environment::CastleEscape, q_learning::q_learning};
//! use rand::{SeedableRng, rngs::StdRng};
//!
//! let mut env = CastleEscape::new();
//! let mut rng = StdRng::seed_from_u64(0);
//! let table = q_learning(&mut env, 100_000, 0.9, 1.0, 0.999999, &mut rng)?;
//! println!("learned {} states", table.len());
//! # Ok::<(), castle_escape_core::Error>(())
//! ```

pub mod q_table;
pub mod serialization;
pub mod trainer;

// Public re-exports
pub use q_table::{QEntry, QTable, interpolate};
pub use serialization::{SavedQTable, TrainingMetadata};
pub use trainer::{QLearningTrainer, TrainingReport, q_learning};
