use std::io;

use csv::Writer;
use log::{debug, info};
use rand::Rng;

use crate::agent::Agent;
use crate::config::{Config, Hyperparameters};
use crate::environment::{GridWorld, RewardTable};
use crate::error::{Error, Result};
use crate::policy::AgentKind;

/// Drives trials and training episodes on freshly generated boards.
#[derive(Debug, Clone)]
pub struct EpisodeRunner {
    rows: usize,
    cols: usize,
    max_steps: usize,
    rewards: RewardTable,
}

impl EpisodeRunner {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rows: config.rows,
            cols: config.cols,
            max_steps: config.max_steps,
            rewards: config.rewards,
        })
    }

    pub fn max_steps(&self) -> usize { self.max_steps }

    pub fn new_board<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<GridWorld> {
        GridWorld::random(self.rows, self.cols, self.rewards, rng)
    }

    /// Runs the bound agent until the step bound or a wall, returning its
    /// cumulative reward. A greedy agent that already walked this board is
    /// not run again.
    pub fn run_trial(&self, agent: &mut Agent) -> Result<f64> {
        run_trial(agent, self.max_steps)
    }

    /// Average final reward over `trials` fresh boards.
    pub fn run_episode<R: Rng + ?Sized>(
        &self,
        agent: &mut Agent,
        trials: usize,
        rng: &mut R,
    ) -> Result<f64> {
        let mut total = 0.0;
        for _ in 0..trials {
            agent.bind(self.new_board(rng)?);
            total += self.run_trial(agent)?;
        }
        Ok(total / trials as f64)
    }

    /// Learning curve: one average reward per episode.
    ///
    /// A greedy agent cannot improve, so a single episode is measured and
    /// repeated for every point.
    pub fn train<R: Rng + ?Sized>(
        &self,
        agent: &mut Agent,
        episodes: usize,
        trials_per_episode: usize,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        if trials_per_episode == 0 {
            return Err(Error::InvalidConfig("an episode needs at least one trial".to_string()));
        }
        if !agent.kind().learns() {
            let average = self.run_episode(agent, trials_per_episode, rng)?;
            info!("{} agent averages {:.3} over {} trials",
                  agent.kind().name(), average, trials_per_episode);
            return Ok(vec![average; episodes]);
        }

        let mut curve = Vec::with_capacity(episodes);
        for episode_num in 0..episodes {
            let average = self.run_episode(agent, trials_per_episode, rng)?;
            info!("{} episode {}: average reward {:.3}, learning rate {}",
                  agent.kind().name(), episode_num, average, agent.learning_rate());
            curve.push(average);
        }
        Ok(curve)
    }
}

pub fn run_trial(agent: &mut Agent, max_steps: usize) -> Result<f64> {
    if !agent.is_bound() {
        return Err(Error::Unbound);
    }
    if !agent.kind().learns() && !agent.trace().is_empty() {
        return Ok(agent.reward());
    }
    for step in 0..max_steps {
        let outcome = agent.step()?;
        if outcome.terminal {
            debug!("hit a wall after {} steps", step + 1);
            break;
        }
    }
    Ok(agent.reward())
}

/// Trains one fresh agent of every kind under the same configuration.
pub fn compare_agents(config: &Config) -> Result<Vec<(AgentKind, Vec<f64>)>> {
    let runner = EpisodeRunner::new(config)?;
    let mut rng = config.rng();
    let mut curves = Vec::new();
    for kind in AgentKind::ALL.iter() {
        let params = Hyperparameters::for_kind(*kind);
        let mut agent = Agent::new(*kind, params, config.weight_init, &mut rng)?;
        let curve = runner.train(&mut agent, config.episodes, config.trials_per_episode, &mut rng)?;
        curves.push((*kind, curve));
    }
    Ok(curves)
}

/// Writes learning curves as CSV: an `episode` column then one column per
/// agent kind.
pub fn write_learning_curves<W: io::Write>(
    writer: W,
    curves: &[(AgentKind, Vec<f64>)],
) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    let mut header = vec!["episode".to_string()];
    header.extend(curves.iter().map(|(kind, _)| kind.name().to_string()));
    wtr.write_record(&header)?;

    let rows = curves.iter().map(|(_, curve)| curve.len()).max().unwrap_or(0);
    for episode_num in 0..rows {
        let mut record = vec![episode_num.to_string()];
        record.extend(curves.iter().map(|(_, curve)| {
            curve.get(episode_num).map_or_else(String::new, |r| r.to_string())
        }));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use crate::environment::{Cell, Pos};

    fn small_config() -> Config {
        Config {
            rows: 5,
            cols: 5,
            max_steps: 20,
            episodes: 3,
            trials_per_episode: 4,
            ..Config::default()
        }.with_seed(9)
    }

    fn agent(kind: AgentKind, rng: &mut ChaCha8Rng) -> Agent {
        Agent::new(kind, Hyperparameters::for_kind(kind), 0.001, rng).unwrap()
    }

    #[test]
    fn unbound_trial_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut a = agent(AgentKind::Reinforcement, &mut rng);
        assert!(matches!(run_trial(&mut a, 10), Err(Error::Unbound)));
    }

    #[test]
    fn trial_respects_step_bound() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let runner = EpisodeRunner::new(&small_config()).unwrap();
        for kind in AgentKind::ALL.iter() {
            let mut a = agent(*kind, &mut rng);
            for _ in 0..10 {
                a.bind(runner.new_board(&mut rng).unwrap());
                let reward = runner.run_trial(&mut a).unwrap();
                assert!(a.trace().len() <= runner.max_steps());
                assert_eq!(reward, a.reward());
                if a.is_terminated() {
                    assert!(!a.environment().unwrap().in_bounds(a.position()));
                } else {
                    assert_eq!(a.trace().len(), runner.max_steps());
                }
            }
        }
    }

    #[test]
    fn greedy_trial_is_idempotent() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut a = agent(AgentKind::Greedy, &mut rng);
        let world = GridWorld::from_cells(
            vec![vec![Cell::Food, Cell::Food, Cell::Empty]],
            Pos::new(0, 2),
            RewardTable::basic(),
        ).unwrap();
        a.bind(world);
        let first = run_trial(&mut a, 10).unwrap();
        let trace = a.trace().to_vec();
        let second = run_trial(&mut a, 10).unwrap();
        assert_eq!(first, second);
        assert_eq!(trace, a.trace());
    }

    #[test]
    fn greedy_curve_is_flat() {
        let config = small_config();
        let runner = EpisodeRunner::new(&config).unwrap();
        let mut rng = config.rng();
        let mut a = agent(AgentKind::Greedy, &mut rng);
        let curve = runner.train(&mut a, 5, 8, &mut rng).unwrap();
        assert_eq!(curve.len(), 5);
        assert!(curve.iter().all(|r| *r == curve[0]));
    }

    #[test]
    fn training_is_reproducible() {
        let config = small_config();
        let a = compare_agents(&config).unwrap();
        let b = compare_agents(&config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert!(a.iter().all(|(_, curve)| curve.len() == config.episodes));
    }

    #[test]
    fn csv_has_one_column_per_agent() {
        let curves = vec![
            (AgentKind::Greedy, vec![1.5, 1.5]),
            (AgentKind::Enhanced, vec![-3.0]),
        ];
        let mut out = Vec::new();
        write_learning_curves(&mut out, &curves).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "episode,greedy,enhanced\n0,1.5,-3\n1,1.5,\n");
    }
}
