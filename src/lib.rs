//! Agents foraging on a random grid of food and poison.
//!
//! A [`GridWorld`](environment::GridWorld) is walled in on every side; walking
//! into a wall ends the trial. Agents sense the cells in front, to the left and
//! to the right and pick one of those three moves, either by a fixed greedy
//! rule or with a linear scorer trained by imitation or by temporal
//! differences.

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod perception;
pub mod policy;
pub mod rl;

pub use crate::agent::{Activation, Agent, StepOutcome};
pub use crate::config::{Config, Hyperparameters};
pub use crate::environment::{Cell, Direction, GridWorld, Pos, RewardTable, WALL_REWARD};
pub use crate::error::{Error, Result};
pub use crate::perception::{Perception, PerceptionModel};
pub use crate::policy::{Action, AgentKind, LearningEngine};
pub use crate::rl::{compare_agents, run_trial, write_learning_curves, EpisodeRunner};
