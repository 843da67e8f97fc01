use ferroneat::evaluation::{EvaluatorError, PooledFitnessComputer};
use ferroneat::genomics::{GeneticConfig, Genome};
use ferroneat::populations::logging::Stats;
use ferroneat::populations::{InitialTopology, Population, PopulationConfig};
use ferroneat::ConfigLoader;

use log::{info, warn};

use std::env;
use std::error::Error;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::thread;

const ERROR_MARGIN: f32 = 0.3;
const PERFECT_FITNESS: f32 = 16.0;
const DEFAULT_CONFIG: &str = include_str!("../neat.toml");
const DEFAULT_SNAPSHOT: &str = "xor_population.json";

fn evaluate_xor(genome: &Genome) -> Result<f32, EvaluatorError> {
    let values = [
        ([0.0, 0.0], 0.0),
        ([0.0, 1.0], 1.0),
        ([1.0, 0.0], 1.0),
        ([1.0, 1.0], 0.0),
    ];

    let mut errors = [0.0, 0.0, 0.0, 0.0];
    for (i, (input, output)) in values.iter().enumerate() {
        let answer = genome.propagate(input)[0];
        if !answer.is_finite() {
            return Err(format!("non-finite output {} for input {:?}", answer, input).into());
        }
        errors[i] = (answer - output).abs();
        if errors[i] < ERROR_MARGIN {
            errors[i] = 0.0;
        }
    }

    Ok((4.0 - errors.iter().copied().sum::<f32>()).powf(2.0))
}

/// Usage: `xor [config.toml] [snapshot.json|snapshot.ron]`
///
/// Resumes from the snapshot if it holds a compatible population,
/// and writes the evolved population back to it.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let snapshot_path = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_SNAPSHOT.into()));

    let loader = match &config_path {
        Some(path) => ConfigLoader::from_file(path)?,
        None => DEFAULT_CONFIG.parse()?,
    };
    let genetic_config = GeneticConfig::from_loader(&loader)?;
    let population_config = PopulationConfig::from_loader(&loader)?;
    let generations = loader.get_int("generations").max(0) as usize;

    let mut population = match Population::import(&snapshot_path, genetic_config.clone(), population_config.clone()) {
        Some(population) => {
            info!(
                "resuming from generation {} stored in {}",
                population.generation(),
                snapshot_path.display()
            );
            population
        }
        None => Population::new(
            genetic_config,
            population_config.clone(),
            InitialTopology::CompletelyConnected,
        ),
    };
    population.set_config_source(config_path);
    population.set_export_path(Some(snapshot_path));

    let pool_size = NonZeroUsize::new(population_config.pool_size)
        .or_else(|| thread::available_parallelism().ok())
        .unwrap_or(NonZeroUsize::MIN);
    let mut computer = PooledFitnessComputer::new(pool_size, evaluate_xor);

    let target = population.generation() + generations;
    population.run(target, &mut computer)?;

    let champion = population.champion();
    if (champion.fitness() - PERFECT_FITNESS).abs() < f32::EPSILON {
        info!("solution found: {}", champion);
    } else {
        warn!(
            "no solution after {} generations, best fitness {}",
            population.generation(),
            champion.fitness()
        );
    }
    info!(
        "highest fitness per generation: {:?}",
        Stats::from(population.logger().iter().map(|log| log.fitness.maximum))
    );
    Ok(())
}
