use std::env;
use std::fs::File;

use log::{info, warn};

use flatland_agents::{compare_agents, write_learning_curves, Config, Result};

const CURVES_PATH: &str = "learning_curves.csv";

fn main() -> Result<()> {
    env_logger::init();

    let mut config = Config::default();
    if let Ok(seed) = env::var("FLATLAND_SEED") {
        match seed.parse() {
            Ok(seed) => config.seed = Some(seed),
            Err(_) => warn!("ignoring FLATLAND_SEED={:?}, not an integer", seed),
        }
    }
    info!("comparing agents on {}x{} boards, seed {:?}", config.rows, config.cols, config.seed);

    let curves = compare_agents(&config)?;
    for (kind, curve) in curves.iter() {
        let last = curve.last().copied().unwrap_or(0.0);
        println!("{:<14} final average reward {:.3}", kind.name(), last);
    }

    write_learning_curves(File::create(CURVES_PATH)?, &curves)?;
    println!("Learning curves written to {}", CURVES_PATH);
    Ok(())
}
