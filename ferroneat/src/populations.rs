//! A Population is a collection of individuals.
//! These are grouped into species every generation,
//! and evolved using externally computed fitness
//! scores as the source of selective pressure.
mod allotment;
mod config;
mod errors;
pub mod logging;
mod offspring_factory;
mod species;

pub use config::PopulationConfig;
pub use errors::RunError;
pub use species::{genetic_distance, speciate, Speciation, Species};

use crate::config::ConfigLoader;
use crate::evaluation::{EvaluationRound, FitnessComputer};
use crate::genomics::{GeneticConfig, Genome, InnovationHistory};
use crate::individuals::Individual;
use crate::persistence::PopulationSnapshot;
use logging::{EvolutionLogger, GenerationLog, ReportingLevel};
use offspring_factory::OffspringFactory;
use species::Grouping;

use log::{error, info, warn};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use std::path::PathBuf;
use std::sync::Arc;

/// How the genomes of a new population are wired
/// before their initial mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialTopology {
    /// Inputs and outputs only.
    Unconnected,
    /// Every input linked to every output.
    CompletelyConnected,
}

/// The stages a population cycles through
/// while driven by [`Population::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationState {
    /// Not running.
    Idle,
    /// Waiting on the fitness computer.
    Evaluating,
    /// Speciating and breeding the next generation.
    Reproducing,
    /// Writing the final snapshot.
    Exporting,
}

/// A population of individuals.
///
/// The population owns the innovation history shared by
/// all of its genomes and a single random number generator
/// that every mutation and reproduction step draws from.
pub struct Population {
    individuals: Vec<Individual>,
    history: InnovationHistory,
    generation: usize,
    until_generation: usize,
    highest_fitness: f32,
    average_fitness: f32,
    species_count: usize,
    largest_delta: f32,
    highest_delta_below_threshold: f32,
    grouping: Option<Grouping>,
    genetic_config: GeneticConfig,
    population_config: PopulationConfig,
    rng: StdRng,
    state: GenerationState,
    logger: EvolutionLogger,
    export_path: Option<PathBuf>,
    config_source: Option<PathBuf>,
}

impl Population {
    /// Creates a new population using the passed configurations.
    /// Every individual starts from the chosen topology and
    /// is then mutated [`mutation_rolls`] times.
    ///
    /// [`mutation_rolls`]: GeneticConfig::mutation_rolls
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::GeneticConfig;
    /// use ferroneat::populations::{InitialTopology, Population, PopulationConfig};
    /// use std::num::NonZeroUsize;
    ///
    /// let population = Population::new(
    ///     GeneticConfig::zero(),
    ///     PopulationConfig {
    ///         size: NonZeroUsize::new(10).unwrap(),
    ///         ..PopulationConfig::zero()
    ///     },
    ///     InitialTopology::Unconnected,
    /// );
    ///
    /// assert_eq!(population.individuals().len(), 10);
    /// assert_eq!(population.generation(), 0);
    /// ```
    pub fn new(
        genetic_config: GeneticConfig,
        population_config: PopulationConfig,
        topology: InitialTopology,
    ) -> Population {
        Self::with_rng(genetic_config, population_config, topology, StdRng::from_entropy())
    }

    /// Creates a new population drawing from `rng`.
    /// Populations built from equally seeded generators
    /// evolve identically.
    pub fn with_rng(
        genetic_config: GeneticConfig,
        population_config: PopulationConfig,
        topology: InitialTopology,
        mut rng: StdRng,
    ) -> Population {
        let mut history = InnovationHistory::new(&genetic_config);
        let individuals = (0..population_config.size.get())
            .map(|id| {
                let genome = match topology {
                    InitialTopology::Unconnected => Genome::new(&genetic_config, &mut rng),
                    InitialTopology::CompletelyConnected => Genome::completely_connected(&genetic_config, &mut rng),
                };
                let mut individual = Individual::new(id, genome);
                individual.mutate(genetic_config.mutation_rolls, false, &mut history, &genetic_config, &mut rng);
                individual
            })
            .collect();

        Population {
            individuals,
            history,
            generation: 0,
            until_generation: 0,
            highest_fitness: 0.0,
            average_fitness: 0.0,
            species_count: 0,
            largest_delta: 0.0,
            highest_delta_below_threshold: 0.0,
            grouping: None,
            genetic_config,
            population_config,
            rng,
            state: GenerationState::Idle,
            logger: EvolutionLogger::default(),
            export_path: None,
            config_source: None,
        }
    }

    /// Rebuilds a population from a snapshot.
    /// The snapshot's population size replaces the configured one.
    pub(crate) fn from_snapshot(
        snapshot: PopulationSnapshot,
        genetic_config: GeneticConfig,
        population_config: PopulationConfig,
    ) -> Population {
        let mut population = Population {
            individuals: snapshot.individuals,
            history: snapshot.history,
            generation: snapshot.generation,
            until_generation: snapshot.until_generation,
            highest_fitness: 0.0,
            average_fitness: 0.0,
            species_count: 0,
            largest_delta: 0.0,
            highest_delta_below_threshold: 0.0,
            grouping: None,
            genetic_config,
            population_config: PopulationConfig {
                size: snapshot.population_size,
                ..population_config
            },
            rng: StdRng::from_entropy(),
            state: GenerationState::Idle,
            logger: EvolutionLogger::default(),
            export_path: None,
            config_source: None,
        };
        population.record_fitness();
        population
    }

    /// Returns the data needed to restore the population later.
    pub fn snapshot(&self) -> PopulationSnapshot {
        PopulationSnapshot {
            population_size: self.population_config.size,
            generation: self.generation,
            until_generation: self.until_generation,
            individuals: self.individuals.clone(),
            history: self.history.clone(),
        }
    }

    /// Evaluates the fitness of each individual in the
    /// population using the passed evaluator.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::GeneticConfig;
    /// use ferroneat::populations::{InitialTopology, Population, PopulationConfig};
    ///
    /// let mut population = Population::new(
    ///     GeneticConfig::zero(),
    ///     PopulationConfig::zero(),
    ///     InitialTopology::CompletelyConnected,
    /// );
    ///
    /// population.evaluate_fitness(|genome| {
    ///     // Networks with outputs closer to 0 are given higher scores.
    ///     1.0 - genome.propagate(&[1.0])[0].abs()
    /// });
    /// ```
    pub fn evaluate_fitness<E>(&mut self, mut evaluator: E)
    where
        E: FnMut(&Genome) -> f32,
    {
        for individual in &mut self.individuals {
            let fitness = evaluator(individual.genome());
            individual.set_fitness(fitness);
        }
        self.grouping = None;
    }

    /// Closes the current generation once every individual has
    /// been scored: records fitness and speciation statistics,
    /// advances the generation counter and logs the results.
    ///
    /// The species formed here are reused by the next call to
    /// [`reproduce`](Population::reproduce), unless fitness is
    /// re-evaluated in between.
    pub fn complete_generation(&mut self) {
        self.record_fitness();
        let grouping = Grouping::of(&self.individuals, &self.genetic_config, &self.population_config);
        self.record_speciation(&grouping);
        self.grouping = Some(grouping);
        self.generation += 1;

        let log = GenerationLog::capture(self, self.logger.reporting_level());
        self.logger.record(log);
        info!(
            "generation {} complete: highest fitness {}, average fitness {}, {} species",
            self.generation, self.highest_fitness, self.average_fitness, self.species_count
        );
    }

    /// Replaces the population with the next generation.
    ///
    /// Individuals are grouped into species, each species is
    /// allotted a share of the offspring by its size-penalized
    /// fitness, and the offspring are bred from the species'
    /// best members. The population size never changes.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::GeneticConfig;
    /// use ferroneat::populations::{InitialTopology, Population, PopulationConfig};
    /// use std::num::NonZeroUsize;
    ///
    /// let mut population = Population::new(
    ///     GeneticConfig {
    ///         weight_mutation_prob: 1.0,
    ///         mutation_rolls: 1,
    ///         ..GeneticConfig::zero()
    ///     },
    ///     PopulationConfig {
    ///         size: NonZeroUsize::new(8).unwrap(),
    ///         delta_threshold: 1.0,
    ///         keeping_part: 0.5,
    ///         ..PopulationConfig::zero()
    ///     },
    ///     InitialTopology::CompletelyConnected,
    /// );
    ///
    /// population.evaluate_fitness(|genome| genome.propagate(&[1.0])[0] + 1.0);
    /// population.reproduce();
    ///
    /// assert_eq!(population.individuals().len(), 8);
    /// ```
    pub fn reproduce(&mut self) {
        let grouping = match self.grouping.take() {
            Some(grouping) => grouping,
            None => {
                let grouping = Grouping::of(&self.individuals, &self.genetic_config, &self.population_config);
                self.record_speciation(&grouping);
                grouping
            }
        };
        let species = grouping.species(&self.individuals);
        let allotted = allotment::allot_offspring(&species, &self.population_config, &mut self.rng);
        self.individuals = OffspringFactory::new(
            &species,
            &mut self.history,
            &self.genetic_config,
            &self.population_config,
            &mut self.rng,
        )
        .generate_offspring(&allotted);
    }

    /// Completes the current generation and breeds the next one.
    /// Call after scoring every individual, e.g. through
    /// [`evaluate_fitness`](Population::evaluate_fitness).
    pub fn evolve(&mut self) {
        self.complete_generation();
        self.reproduce();
    }

    /// Evolves the population until `until_generation` generations
    /// have been completed, scoring each generation through
    /// `computer`. The computer is stopped at the end, and the
    /// population is exported if an export path is set.
    ///
    /// Before each evaluation round the hyperparameters are
    /// re-read from the config source, if one is set.
    ///
    /// # Errors
    /// Returns an error if `computer` fails to start a round.
    /// The population is left idle, and may be run again.
    pub fn run(&mut self, until_generation: usize, computer: &mut dyn FitnessComputer) -> Result<(), RunError> {
        self.until_generation = until_generation;
        loop {
            match self.state {
                GenerationState::Idle => {
                    self.state = if self.generation < self.until_generation {
                        GenerationState::Evaluating
                    } else {
                        GenerationState::Exporting
                    };
                }
                GenerationState::Evaluating => {
                    self.reload_config();
                    let round = EvaluationRound::new(
                        self.individuals
                            .iter()
                            .map(|i| (i.id(), Arc::new(i.genome().clone()))),
                    );
                    let completion = round.completion();
                    if let Err(e) = computer.start(round) {
                        self.state = GenerationState::Idle;
                        return Err(e.into());
                    }
                    let results = completion.wait();
                    for (individual, fitness) in self.individuals.iter_mut().zip(results) {
                        individual.set_fitness(fitness);
                    }
                    self.grouping = None;
                    self.complete_generation();
                    self.state = if self.generation < self.until_generation {
                        GenerationState::Reproducing
                    } else {
                        GenerationState::Exporting
                    };
                }
                GenerationState::Reproducing => {
                    self.reproduce();
                    self.state = GenerationState::Evaluating;
                }
                GenerationState::Exporting => {
                    computer.stop();
                    if let Some(path) = &self.export_path {
                        if let Err(e) = self.export(path) {
                            error!("failed to export population to {}: {}", path.display(), e);
                        }
                    }
                    self.state = GenerationState::Idle;
                    return Ok(());
                }
            }
        }
    }

    /// Sets the file the population is exported to
    /// when [`run`](Population::run) finishes.
    pub fn set_export_path(&mut self, path: Option<PathBuf>) {
        self.export_path = path;
    }

    /// Sets a TOML file that hyperparameters are re-read
    /// from before every evaluation round.
    pub fn set_config_source(&mut self, path: Option<PathBuf>) {
        self.config_source = path;
    }

    /// Sets how much of each generation the logger keeps.
    /// Clears previously logged generations.
    pub fn set_reporting_level(&mut self, reporting_level: ReportingLevel) {
        self.logger = EvolutionLogger::new(reporting_level);
    }

    /// Re-reads the hyperparameters from the config source.
    /// The population's shape is never changed by a reload,
    /// and a source that fails to load keeps the current values.
    fn reload_config(&mut self) {
        let path = match &self.config_source {
            Some(path) => path,
            None => return,
        };
        match ConfigLoader::from_file(path) {
            Ok(loader) => {
                self.genetic_config = self.genetic_config.reload(&loader);
                self.population_config = self.population_config.reload(&loader);
                self.grouping = None;
            }
            Err(e) => warn!("keeping current configuration, reload from {} failed: {}", path.display(), e),
        }
    }

    fn record_fitness(&mut self) {
        self.highest_fitness = self.champion().fitness();
        self.average_fitness =
            self.individuals.iter().map(Individual::fitness).sum::<f32>() / self.individuals.len() as f32;
    }

    fn record_speciation(&mut self, grouping: &Grouping) {
        self.species_count = grouping.species_count();
        self.largest_delta = grouping.largest_delta;
        self.highest_delta_below_threshold = grouping.highest_delta_below_threshold;
    }

    /// Groups the current individuals into species.
    pub fn species(&self) -> Speciation<'_> {
        speciate(&self.individuals, &self.genetic_config, &self.population_config)
    }

    /// Returns `amount` distinct individuals chosen at random.
    /// `amount` is clamped to the population size.
    pub fn samples(&mut self, amount: usize) -> Vec<&Individual> {
        self.individuals.choose_multiple(&mut self.rng, amount).collect()
    }

    /// Returns the `amount` fittest individuals, in
    /// decreasing order of fitness. `amount` is clamped
    /// to the population size.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::GeneticConfig;
    /// use ferroneat::populations::{InitialTopology, Population, PopulationConfig};
    /// use std::num::NonZeroUsize;
    ///
    /// let mut population = Population::new(
    ///     GeneticConfig::zero(),
    ///     PopulationConfig {
    ///         size: NonZeroUsize::new(20).unwrap(),
    ///         ..PopulationConfig::zero()
    ///     },
    ///     InitialTopology::Unconnected,
    /// );
    ///
    /// let mut fitness = 0.0;
    /// population.evaluate_fitness(move |_| {
    ///     fitness += 10.0;
    ///     fitness
    /// });
    ///
    /// let best: Vec<f32> = population.best_samples_sorted(3).iter().map(|i| i.fitness()).collect();
    /// assert_eq!(best, vec![200.0, 190.0, 180.0]);
    /// assert_eq!(population.champion().fitness(), 200.0);
    /// ```
    pub fn best_samples_sorted(&self, amount: usize) -> Vec<&Individual> {
        let mut sorted: Vec<&Individual> = self.individuals.iter().collect();
        sorted.sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));
        sorted.truncate(amount);
        sorted
    }

    /// Returns the currently best-performing individual.
    pub fn champion(&self) -> &Individual {
        self.individuals
            .iter()
            .max_by(|a, b| a.fitness().total_cmp(&b.fitness()))
            .expect("empty population has no champion")
    }

    /// Returns the current individuals.
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Returns the population's innovation history.
    pub fn history(&self) -> &InnovationHistory {
        &self.history
    }

    /// Returns the number of completed generations.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Returns the generation the last [`run`](Population::run) targeted.
    pub fn until_generation(&self) -> usize {
        self.until_generation
    }

    /// Returns the highest fitness of the last completed generation.
    pub fn highest_fitness(&self) -> f32 {
        self.highest_fitness
    }

    /// Returns the average fitness of the last completed generation.
    pub fn average_fitness(&self) -> f32 {
        self.average_fitness
    }

    /// Returns the number of species found by the latest speciation.
    pub fn species_count(&self) -> usize {
        self.species_count
    }

    /// Returns the largest genetic distance measured
    /// by the latest speciation.
    pub fn largest_delta(&self) -> f32 {
        self.largest_delta
    }

    /// Returns the largest genetic distance below the species
    /// threshold measured by the latest speciation.
    pub fn highest_delta_below_threshold(&self) -> f32 {
        self.highest_delta_below_threshold
    }

    pub fn genetic_config(&self) -> &GeneticConfig {
        &self.genetic_config
    }

    pub fn population_config(&self) -> &PopulationConfig {
        &self.population_config
    }

    /// Returns the current stage of the generation loop.
    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Returns the per-generation statistics logged so far.
    pub fn logger(&self) -> &EvolutionLogger {
        &self.logger
    }
}
