use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A trial or step was requested before the agent was given a board.
    #[error("precondition violated: agent is not bound to an environment")]
    Unbound,
    /// A reward arrived before the engine perceived anything this trial.
    #[error("precondition violated: learning update before any perception")]
    NoPerception,
    /// A decision was requested while the previous one still waits for
    /// its reward.
    #[error("precondition violated: previous decision has not been rewarded")]
    AwaitingReward,
    /// The agent already hit a wall this trial.
    #[error("precondition violated: trial already ended on a wall")]
    Terminated,
    #[error("invalid board: {0}")]
    InvalidBoard(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
