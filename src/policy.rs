use ndarray::{Array1, Array2};
use ordered_float::OrderedFloat;
use rand::Rng;

use crate::config::Hyperparameters;
use crate::environment::{Cell, RewardTable, WALL_REWARD};
use crate::error::{Error, Result};
use crate::perception::{Perception, PerceptionModel};

// Action, relative to the current facing
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Left,
    Right,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Forward, Action::Left, Action::Right];

    pub fn index(self) -> usize {
        match self {
            Action::Forward => 0,
            Action::Left => 1,
            Action::Right => 2,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AgentKind {
    /// Fixed preference Food > Empty > Poison > Wall.
    Greedy,
    /// Linear scorer trained to imitate the greedy choice.
    Supervised,
    /// Linear action values learned from reward by one-step TD.
    Reinforcement,
    /// Reinforcement with three-deep perception.
    Enhanced,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Greedy,
        AgentKind::Supervised,
        AgentKind::Reinforcement,
        AgentKind::Enhanced,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AgentKind::Greedy => "greedy",
            AgentKind::Supervised => "supervised",
            AgentKind::Reinforcement => "reinforcement",
            AgentKind::Enhanced => "enhanced",
        }
    }

    pub fn perception(self) -> PerceptionModel {
        match self {
            AgentKind::Enhanced => PerceptionModel::extended(),
            _ => PerceptionModel::basic(),
        }
    }

    pub fn learns(self) -> bool {
        self != AgentKind::Greedy
    }
}

// How the weights change after a decision
#[derive(Debug, Copy, Clone, PartialEq)]
enum UpdateRule {
    Fixed,
    Imitation,
    TemporalDifference { discount: f64, decay: f64 },
}

/// Preferred neighbour by the greedy rule; ties go to the first of
/// front, left, right.
pub fn greedy_action(primary: &[Cell; 3]) -> Action {
    for preferred in [Cell::Food, Cell::Empty, Cell::Poison].iter() {
        if let Some(slot) = primary.iter().position(|cell| cell == preferred) {
            return Action::ALL[slot];
        }
    }
    // boxed in by walls
    Action::Forward
}

/// Index of the largest output, first one on ties.
pub fn argmax(outputs: &Array1<f64>) -> usize {
    (0..outputs.len()).fold(0, |best, i| {
        if outputs[i] > outputs[best] { i }
        else { best }
    })
}

pub fn softmax(outputs: &Array1<f64>) -> Array1<f64> {
    let max = outputs.iter()
        .map(|&o| OrderedFloat(o))
        .max()
        .map_or(0.0, |m| m.into_inner());
    let exp = outputs.mapv(|o| (o - max).exp());
    let z = exp.sum();
    exp / z
}

/// One softmax cross-entropy gradient step toward `teacher`, over every
/// action row.
pub fn imitation_update(
    weights: &mut Array2<f64>,
    features: &Array1<f64>,
    outputs: &Array1<f64>,
    teacher: Action,
    learning_rate: f64,
) {
    let probs = softmax(outputs);
    for action in Action::ALL.iter() {
        let a = action.index();
        let target = if *action == teacher { 1.0 } else { 0.0 };
        weights.row_mut(a).scaled_add(learning_rate * (target - probs[a]), features);
    }
}

/// Moves the `action` row toward `target` and returns the TD error
/// `target - estimate` that drove the step.
pub fn td_update(
    weights: &mut Array2<f64>,
    action: Action,
    features: &Array1<f64>,
    target: f64,
    estimate: f64,
    learning_rate: f64,
) -> f64 {
    let td_error = target - estimate;
    weights.row_mut(action.index()).scaled_add(learning_rate * td_error, features);
    td_error
}

/// The output of one decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// Action scores before any update this step; `None` for the greedy rule.
    pub outputs: Option<Array1<f64>>,
}

// Previous step, kept until its outcome is known.
#[derive(Debug, Clone)]
struct Transition {
    features: Array1<f64>,
    action: Action,
    value: f64,
}

pub struct LearningEngine {
    kind: AgentKind,
    perception: PerceptionModel,
    rule: UpdateRule,
    weights: Option<Array2<f64>>,
    learning_rate: f64,
    previous: Option<Transition>,
    pending_reward: Option<f64>,
    // a decision is out and its reward has not come back yet
    awaiting_reward: bool,
}

impl LearningEngine {
    /// Weights start uniform in `[-weight_init, weight_init]`.
    pub fn new<R: Rng + ?Sized>(
        kind: AgentKind,
        params: Hyperparameters,
        weight_init: f64,
        rng: &mut R,
    ) -> Result<Self> {
        params.validate()?;
        if !(weight_init >= 0.0 && weight_init.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "weight_init {} must be finite and non-negative", weight_init)));
        }
        let perception = kind.perception();
        let rule = match kind {
            AgentKind::Greedy => UpdateRule::Fixed,
            AgentKind::Supervised => UpdateRule::Imitation,
            AgentKind::Reinforcement | AgentKind::Enhanced => UpdateRule::TemporalDifference {
                discount: params.discount,
                decay: params.decay,
            },
        };
        let weights = if kind.learns() {
            let shape = (Action::ALL.len(), perception.feature_len());
            Some(Array2::from_shape_fn(shape, |_| rng.gen_range(-weight_init..=weight_init)))
        } else {
            None
        };

        Ok(Self {
            kind,
            perception,
            rule,
            weights,
            learning_rate: params.learning_rate,
            previous: None,
            pending_reward: None,
            awaiting_reward: false,
        })
    }

    pub fn kind(&self) -> AgentKind { self.kind }

    pub fn perception(&self) -> PerceptionModel { self.perception }

    pub fn weights(&self) -> Option<&Array2<f64>> { self.weights.as_ref() }

    pub fn learning_rate(&self) -> f64 { self.learning_rate }

    /// Forgets the previous step. When `decay_rate` is set the TD rule also
    /// shrinks its learning rate.
    pub fn begin_trial(&mut self, decay_rate: bool) {
        self.previous = None;
        self.pending_reward = None;
        self.awaiting_reward = false;
        if let UpdateRule::TemporalDifference { decay, .. } = self.rule {
            if decay_rate {
                self.learning_rate *= decay;
            }
        }
    }

    /// Picks an action for `perception`. Every decision must be answered by
    /// [`LearningEngine::observe`] before the next one.
    pub fn decide(&mut self, perception: &Perception) -> Result<Decision> {
        if self.awaiting_reward {
            return Err(Error::AwaitingReward);
        }
        self.awaiting_reward = true;
        let learning_rate = self.learning_rate;
        let weights = match self.weights.as_mut() {
            Some(weights) => weights,
            None => {
                let action = greedy_action(&perception.primary);
                return Ok(Decision { action, outputs: None });
            }
        };

        let outputs = weights.dot(&perception.features);
        let action = Action::ALL[argmax(&outputs)];

        match self.rule {
            UpdateRule::Imitation => {
                let teacher = greedy_action(&perception.primary);
                imitation_update(weights, &perception.features, &outputs, teacher, learning_rate);
            }
            UpdateRule::TemporalDifference { discount, .. } => {
                let max_q = outputs[action.index()];
                let pending = (self.previous.take(), self.pending_reward.take());
                if let (Some(prev), Some(reward)) = pending {
                    let target = reward + discount * max_q;
                    td_update(weights, prev.action, &prev.features, target, prev.value,
                              learning_rate);
                }
                self.previous = Some(Transition {
                    features: perception.features.clone(),
                    action,
                    value: max_q,
                });
            }
            UpdateRule::Fixed => {}
        }

        Ok(Decision { action, outputs: Some(outputs) })
    }

    /// Feeds back the reward of the move just made.
    ///
    /// A wall reward closes the trial with the fixed terminal target
    /// `WALL + discount * WALL`.
    pub fn observe(&mut self, reward: f64) -> Result<()> {
        if !self.awaiting_reward {
            return Err(Error::NoPerception);
        }
        self.awaiting_reward = false;
        if let UpdateRule::TemporalDifference { discount, .. } = self.rule {
            let prev = self.previous.take().ok_or(Error::NoPerception)?;
            if RewardTable::is_terminal(reward) {
                if let Some(weights) = self.weights.as_mut() {
                    let target = WALL_REWARD + discount * WALL_REWARD;
                    td_update(weights, prev.action, &prev.features, target, prev.value,
                              self.learning_rate);
                }
            } else {
                self.previous = Some(prev);
                self.pending_reward = Some(reward);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use crate::environment::{Direction, GridWorld, Pos};

    fn engine(kind: AgentKind, learning_rate: f64) -> LearningEngine {
        let params = Hyperparameters { learning_rate, discount: 0.9, decay: 0.5 };
        LearningEngine::new(kind, params, 0.0, &mut ChaCha8Rng::seed_from_u64(1)).unwrap()
    }

    fn perceive(cells: Vec<Cell>) -> Perception {
        let world =
            GridWorld::from_cells(vec![cells], Pos::new(0, 1), RewardTable::basic()).unwrap();
        PerceptionModel::basic().perceive(&world, Pos::new(0, 1), Direction::West)
    }

    #[test]
    fn greedy_preference_order() {
        use Cell::*;
        assert_eq!(greedy_action(&[Poison, Empty, Food]), Action::Right);
        assert_eq!(greedy_action(&[Poison, Empty, Empty]), Action::Left);
        assert_eq!(greedy_action(&[Wall, Poison, Wall]), Action::Left);
        assert_eq!(greedy_action(&[Food, Food, Food]), Action::Forward);
        assert_eq!(greedy_action(&[Wall, Wall, Wall]), Action::Forward);
    }

    #[test]
    fn argmax_takes_first_maximum() {
        assert_eq!(argmax(&array![1.0, 3.0, 3.0]), 1);
        assert_eq!(argmax(&array![0.0, 0.0, 0.0]), 0);
        assert_eq!(argmax(&array![-1.0, -2.0, -0.5]), 2);
    }

    #[test]
    fn softmax_is_stable_for_large_outputs() {
        let p = softmax(&array![1000.0, 1000.0, -1000.0]);
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!((p[1] - 0.5).abs() < 1e-12);
        assert!(p[2] < 1e-12);
    }

    #[test]
    fn imitation_moves_toward_teacher() {
        let mut weights = Array2::<f64>::zeros((3, 4));
        let features = array![1.0, 0.0, 1.0, 0.0];
        let outputs = weights.dot(&features);
        imitation_update(&mut weights, &features, &outputs, Action::Left, 0.3);

        let after = weights.dot(&features);
        assert_eq!(argmax(&after), Action::Left.index());
        // inactive features never move
        assert_eq!(weights.column(1).sum(), 0.0);
        assert_eq!(weights.column(3).sum(), 0.0);
        // uniform softmax: teacher gains lr * (1 - 1/3), the others lose lr / 3
        assert!((weights[[1, 0]] - 0.3 * (1.0 - 1.0 / 3.0)).abs() < 1e-12);
        assert!((weights[[1, 2]] - 0.2).abs() < 1e-12);
        assert!((weights[[0, 0]] + 0.3 / 3.0).abs() < 1e-12);
        assert!((weights[[2, 2]] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn td_update_sign() {
        let features = array![1.0, 0.0, 0.0, 1.0];
        let mut weights = Array2::<f64>::zeros((3, 4));
        let err = td_update(&mut weights, Action::Right, &features, 2.0, 0.0, 0.1);
        assert_eq!(err, 2.0);
        assert!((weights.row(2).dot(&features) - 0.4).abs() < 1e-12);
        assert_eq!(weights.row(0).sum(), 0.0);

        let mut frozen = Array2::<f64>::zeros((3, 4));
        td_update(&mut frozen, Action::Right, &features, 2.0, 0.0, 0.0);
        assert_eq!(frozen, Array2::<f64>::zeros((3, 4)));
    }

    #[test]
    fn greedy_engine_has_no_weights() {
        let mut e = engine(AgentKind::Greedy, 0.1);
        assert!(e.weights().is_none());
        let d = e.decide(&perceive(vec![Cell::Food, Cell::Empty, Cell::Poison])).unwrap();
        assert_eq!(d.action, Action::Forward);
        assert!(d.outputs.is_none());
    }

    #[test]
    fn weight_shapes_follow_perception() {
        assert_eq!(engine(AgentKind::Supervised, 0.1).weights().unwrap().dim(), (3, 12));
        assert_eq!(engine(AgentKind::Reinforcement, 0.1).weights().unwrap().dim(), (3, 12));
        assert_eq!(engine(AgentKind::Enhanced, 0.1).weights().unwrap().dim(), (3, 36));
    }

    #[test]
    fn reward_before_perception_is_rejected() {
        for kind in AgentKind::ALL.iter() {
            let mut e = engine(*kind, 0.1);
            assert!(matches!(e.observe(1.0), Err(Error::NoPerception)));
        }
    }

    #[test]
    fn first_td_step_does_not_learn() {
        let mut e = engine(AgentKind::Reinforcement, 0.1);
        let before = e.weights().unwrap().clone();
        e.decide(&perceive(vec![Cell::Food, Cell::Empty, Cell::Poison])).unwrap();
        assert_eq!(e.weights().unwrap(), &before);
    }

    #[test]
    fn td_learns_from_previous_transition() {
        let mut e = engine(AgentKind::Reinforcement, 0.1);
        let p = perceive(vec![Cell::Food, Cell::Empty, Cell::Poison]);
        let first = e.decide(&p).unwrap();
        e.observe(1.0).unwrap();
        e.decide(&p).unwrap();

        // zero weights: target 1 + 0.9 * 0, estimate 0
        let w = e.weights().unwrap();
        let row = w.row(first.action.index());
        assert!((row.dot(&p.features) - 0.1 * 3.0).abs() < 1e-12);
    }

    #[test]
    fn wall_collision_uses_fixed_terminal_target() {
        let mut e = engine(AgentKind::Reinforcement, 0.1);
        let p = perceive(vec![Cell::Food, Cell::Empty, Cell::Poison]);
        let d = e.decide(&p).unwrap();
        e.observe(WALL_REWARD).unwrap();

        let target = WALL_REWARD + 0.9 * WALL_REWARD;
        let w = e.weights().unwrap();
        assert!((w.row(d.action.index()).dot(&p.features) - 0.1 * target * 3.0).abs() < 1e-9);
        // the transition is closed
        assert!(matches!(e.observe(0.0), Err(Error::NoPerception)));
    }

    #[test]
    fn second_decision_needs_a_reward_first() {
        for kind in AgentKind::ALL.iter() {
            let mut e = engine(*kind, 0.1);
            let p = perceive(vec![Cell::Food, Cell::Empty, Cell::Poison]);
            e.decide(&p).unwrap();
            assert!(matches!(e.decide(&p), Err(Error::AwaitingReward)));
            e.observe(1.0).unwrap();
            assert!(e.decide(&p).is_ok());
        }
    }

    #[test]
    fn rejected_decision_keeps_the_pending_transition() {
        let mut e = engine(AgentKind::Reinforcement, 0.1);
        let p = perceive(vec![Cell::Food, Cell::Empty, Cell::Poison]);
        let first = e.decide(&p).unwrap();
        assert!(e.decide(&p).is_err());
        e.observe(1.0).unwrap();
        e.decide(&p).unwrap();

        let w = e.weights().unwrap();
        assert!((w.row(first.action.index()).dot(&p.features) - 0.1 * 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_construction_arguments() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let params = Hyperparameters::for_kind(AgentKind::Reinforcement);
        for w in [-0.1, f64::NAN, f64::INFINITY].iter() {
            let built = LearningEngine::new(AgentKind::Reinforcement, params, *w, &mut rng);
            assert!(matches!(built, Err(Error::InvalidConfig(_))));
        }

        let bad = [
            Hyperparameters { learning_rate: -1.0, ..params },
            Hyperparameters { discount: 3.0, ..params },
            Hyperparameters { decay: 7.0, ..params },
            Hyperparameters { learning_rate: f64::NAN, ..params },
        ];
        for params in bad.iter() {
            let built = LearningEngine::new(AgentKind::Reinforcement, *params, 0.001, &mut rng);
            assert!(matches!(built, Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn decay_only_for_td_rule() {
        let mut td = engine(AgentKind::Enhanced, 0.1);
        td.begin_trial(true);
        assert!((td.learning_rate() - 0.05).abs() < 1e-12);
        td.begin_trial(false);
        assert!((td.learning_rate() - 0.05).abs() < 1e-12);

        let mut sup = engine(AgentKind::Supervised, 0.1);
        sup.begin_trial(true);
        assert_eq!(sup.learning_rate(), 0.1);
    }
}
