//! An implementation of NeuroEvolution of Augmenting Topologies,
//! following the 2002 paper: <http://nn.cs.utexas.edu/keyword?stanley:ec02>
//!
//! Genomes are directed graphs of neurons and links that are evaluated
//! directly as neural networks. A [`Population`] mutates them, groups them
//! into species by genetic distance, and breeds each generation in
//! proportion to size-penalized fitness. Fitness is supplied from outside,
//! either synchronously through [`Population::evaluate_fitness`] or by a
//! [`FitnessComputer`] that scores a whole generation in parallel while
//! [`Population::run`] waits on it.
//!
//! Hyperparameters can be read from TOML files with a [`ConfigLoader`],
//! and populations can be exported and imported as JSON or RON.
//!
//! [`Population`]: populations::Population
//! [`Population::evaluate_fitness`]: populations::Population::evaluate_fitness
//! [`Population::run`]: populations::Population::run
//! [`FitnessComputer`]: evaluation::FitnessComputer
//! [`ConfigLoader`]: config::ConfigLoader
//!
//! # Example usage: Evolution of XOR function approximator
//! ```
//! use ferroneat::genomics::{GeneticConfig, Genome};
//! use ferroneat::populations::{InitialTopology, Population, PopulationConfig};
//! use std::num::NonZeroUsize;
//!
//! // Allowed error margin for neural net answers.
//! const ERROR_MARGIN: f32 = 0.3;
//!
//! fn evaluate_xor(genome: &Genome) -> f32 {
//!     let values = [
//!         ([0.0, 0.0], 0.0),
//!         ([0.0, 1.0], 1.0),
//!         ([1.0, 0.0], 1.0),
//!         ([1.0, 1.0], 0.0),
//!     ];
//!
//!     let mut errors = [0.0, 0.0, 0.0, 0.0];
//!     for (i, (input, output)) in values.iter().enumerate() {
//!         errors[i] = (genome.propagate(input)[0] - output).abs();
//!         if errors[i] < ERROR_MARGIN {
//!             errors[i] = 0.0;
//!         }
//!     }
//!
//!     (4.0 - errors.iter().copied().sum::<f32>()).powf(2.0)
//! }
//!
//! let genetic_config = GeneticConfig {
//!     input_count: NonZeroUsize::new(2).unwrap(),
//!     output_count: NonZeroUsize::new(1).unwrap(),
//!     mutation_rolls: 2,
//!     max_enabled_links_per_mutation: 2,
//!     max_neurons_per_mutation: 1,
//!     extreme_mutation_chance: 0.1,
//!     mutation_speed: 0.5,
//!     weight_mutation_prob: 0.7,
//!     bias_mutation_prob: 0.15,
//!     add_neuron_mutation_prob: 0.03,
//!     add_link_mutation_prob: 0.1,
//!     activation_mutation_prob: 0.02,
//!     neuron_bias_start_range: 1.0,
//!     cycle_detection_neuron_threshold: 30,
//!     cycle_detection_link_threshold: 60,
//!     excess_neurons_constant: 1.0,
//!     disjoint_neurons_constant: 1.0,
//!     average_delta_weight_constant: 0.4,
//!     crossover_mutation_speed: 0.1,
//!     ..GeneticConfig::zero()
//! };
//!
//! let population_config = PopulationConfig {
//!     size: NonZeroUsize::new(50).unwrap(),
//!     delta_threshold: 0.6,
//!     species_size_penalty_steepness: 0.3,
//!     average_number_of_species: 5.0,
//!     max_fitness_variance: 1.0,
//!     min_threshold: 0.2,
//!     max_threshold: 0.6,
//!     keeping_part: 0.5,
//!     ..PopulationConfig::zero()
//! };
//!
//! let mut population = Population::new(genetic_config, population_config, InitialTopology::CompletelyConnected);
//! for _ in 0..20 {
//!     population.evaluate_fitness(evaluate_xor);
//!     if (population.champion().fitness() - 16.0).abs() < f32::EPSILON {
//!         println!("Solution found!: {}", population.champion());
//!         break;
//!     }
//!     population.evolve();
//! }
//! ```
pub mod config;
pub mod evaluation;
pub mod genomics;
pub mod individuals;
pub mod persistence;
pub mod populations;

/// Identifier of a neuron within a genome.
/// Input and output neurons use the lowest ids.
pub type NeuronId = usize;

pub use config::ConfigLoader;
pub use evaluation::{FitnessComputer, PooledFitnessComputer};
pub use genomics::{GeneticConfig, Genome};
pub use individuals::Individual;
pub use populations::{InitialTopology, Population, PopulationConfig};
