use log::debug;
use ndarray::{Array1, Array2};
use rand::Rng;

use crate::config::Hyperparameters;
use crate::environment::{
    Direction,
    GridWorld,
    Pos,
    RewardTable,
};
use crate::error::{Error, Result};
use crate::policy::{Action, AgentKind, LearningEngine};

/// Network state recorded for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    pub inputs: Array1<f64>,
    pub outputs: Option<Array1<f64>>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StepOutcome {
    pub action: Action,
    pub reward: f64,
    /// The agent walked into a wall; no further moves are allowed.
    pub terminal: bool,
}

pub struct Agent {
    engine: LearningEngine,
    environment: Option<GridWorld>,
    pos: Pos,
    facing: Direction,
    reward: f64,
    terminated: bool,
    trace: Vec<Pos>,
    activations: Vec<Activation>,
    actions: Vec<Action>,
}

impl Agent {
    /// Fails with `InvalidConfig` when `params` or `weight_init` are out of
    /// range.
    pub fn new<R: Rng + ?Sized>(
        kind: AgentKind,
        params: Hyperparameters,
        weight_init: f64,
        rng: &mut R,
    ) -> Result<Self>
    {
        Ok(Self {
            engine: LearningEngine::new(kind, params, weight_init, rng)?,
            environment: None,
            pos: Pos::new(0, 0),
            facing: Direction::North,
            reward: 0.0,
            terminated: false,
            trace: Vec::new(),
            activations: Vec::new(),
            actions: Vec::new(),
        })
    }

    /// Starts a trial on `environment`. The agent faces north at the board's
    /// start cell with an empty trace; weights carry over and a TD learning
    /// rate decays once per rebinding.
    pub fn bind(&mut self, environment: GridWorld) {
        self.pos = environment.agent_pos();
        let rebinding = self.environment.replace(environment).is_some();
        self.engine.begin_trial(rebinding);
        self.facing = Direction::North;
        self.reward = 0.0;
        self.terminated = false;
        self.trace.clear();
        self.activations.clear();
        self.actions.clear();
    }

    pub fn face(&mut self, direction: Direction) {
        self.facing = direction;
    }

    pub fn is_bound(&self) -> bool {
        self.environment.is_some()
    }

    /// Perceives, decides, moves and learns from the outcome.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let environment = self.environment.as_ref().ok_or(Error::Unbound)?;
        if self.terminated {
            return Err(Error::Terminated);
        }
        let perception = self.engine.perception().perceive(environment, self.pos, self.facing);
        let decision = self.engine.decide(&perception)?;
        let direction = perception.directions[decision.action.index()];

        let reward = self.r#move(direction)?;
        self.engine.observe(reward)?;

        self.actions.push(decision.action);
        self.activations.push(Activation {
            inputs: perception.features,
            outputs: decision.outputs,
        });
        let terminal = RewardTable::is_terminal(reward);
        self.terminated = terminal;

        debug!("{:?} {:?} => {:?} reward {} total {}",
               decision.action, direction, self.pos, reward, self.reward);
        Ok(StepOutcome { action: decision.action, reward, terminal })
    }

    fn r#move(&mut self, direction: Direction) -> Result<f64>
    {
        let environment = self.environment.as_mut().ok_or(Error::Unbound)?;
        let target = self.pos.offset(direction, 1);
        let reward = environment.move_agent(target.x, target.y);
        self.reward += reward;
        self.pos = target;
        self.facing = direction;
        self.trace.push(target);
        Ok(reward)
    }

    pub fn kind(&self) -> AgentKind { self.engine.kind() }

    pub fn environment(&self) -> Option<&GridWorld> { self.environment.as_ref() }

    pub fn position(&self) -> Pos { self.pos }

    pub fn facing(&self) -> Direction { self.facing }

    pub fn reward(&self) -> f64 { self.reward }

    pub fn is_terminated(&self) -> bool { self.terminated }

    pub fn trace(&self) -> &[Pos] { &self.trace }

    pub fn activations(&self) -> &[Activation] { &self.activations }

    pub fn actions(&self) -> &[Action] { &self.actions }

    pub fn weights(&self) -> Option<&Array2<f64>> { self.engine.weights() }

    pub fn learning_rate(&self) -> f64 { self.engine.learning_rate() }
}
