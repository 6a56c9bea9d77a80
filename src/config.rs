use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::environment::RewardTable;
use crate::error::{Error, Result};
use crate::policy::AgentKind;

/// Learning parameters of one agent.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hyperparameters {
    pub learning_rate: f64,
    /// TD only.
    pub discount: f64,
    /// Multiplies the TD learning rate each time the agent gets a new board.
    pub decay: f64,
}

impl Hyperparameters {
    pub fn for_kind(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Greedy => Self { learning_rate: 0.0, discount: 0.0, decay: 1.0 },
            AgentKind::Supervised => Self { learning_rate: 0.01, discount: 0.0, decay: 1.0 },
            AgentKind::Reinforcement | AgentKind::Enhanced => Self {
                learning_rate: 0.005,
                discount: 0.99,
                decay: 1.0,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate >= 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "learning rate {} must be finite and non-negative", self.learning_rate)));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(Error::InvalidConfig(
                format!("discount {} must lie in [0, 1]", self.discount)));
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(Error::InvalidConfig(format!("decay {} must lie in (0, 1]", self.decay)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub rows: usize,
    pub cols: usize,
    /// Step bound of one trial.
    pub max_steps: usize,
    pub episodes: usize,
    pub trials_per_episode: usize,
    pub rewards: RewardTable,
    /// Initial weights are drawn from `[-weight_init, weight_init]`.
    pub weight_init: f64,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rows: 10,
            cols: 10,
            max_steps: 50,
            episodes: 50,
            trials_per_episode: 100,
            rewards: RewardTable::default(),
            weight_init: 0.001,
            seed: None,
        }
    }
}

impl Config {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::InvalidConfig(format!("board {}x{} is empty", self.rows, self.cols)));
        }
        if self.max_steps == 0 || self.episodes == 0 || self.trials_per_episode == 0 {
            return Err(Error::InvalidConfig(
                "steps, episodes and trials must be positive".to_string()));
        }
        if !(self.weight_init >= 0.0 && self.weight_init.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "weight_init {} must be finite and non-negative", self.weight_init)));
        }
        Ok(())
    }

    /// Seeded when `seed` is set, from entropy otherwise.
    pub fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}
