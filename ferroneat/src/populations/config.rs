use crate::config::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};

use std::num::NonZeroUsize;

/// Configuration data for population speciation
/// and reproduction.
///
/// # Note
/// All quantities expressing fractions of a species
/// should be in the range [0.0, 1.0]. Using values that
/// are not in this bound may result in odd behaviours
/// and/or incorrect programs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Size of the population.
    pub size: NonZeroUsize,
    /// Genetic distance threshold, beyond which
    /// individuals are considered as belonging to
    /// different species.
    pub delta_threshold: f32,
    /// Steepness of the logistic penalty applied
    /// to the fitness of oversized species.
    pub species_size_penalty_steepness: f32,
    /// Target number of species. Species larger than
    /// `size / average_number_of_species` are penalized.
    /// Zero or less disables the penalty.
    pub average_number_of_species: f32,
    /// Fitness variance at which a species reaches
    /// its maximum crossover threshold.
    pub max_fitness_variance: f32,
    /// Crossover threshold of a species with no
    /// fitness variance.
    pub min_threshold: f32,
    /// Crossover threshold of a species whose variance
    /// reaches [`max_fitness_variance`].
    ///
    /// [`max_fitness_variance`]: PopulationConfig::max_fitness_variance
    pub max_threshold: f32,
    /// Part of each species' elite band that is
    /// copied unchanged into the next generation.
    pub keeping_part: f32,
    /// Number of threads used for fitness evaluation.
    /// Zero leaves the choice to the fitness computer.
    pub pool_size: usize,
}

impl PopulationConfig {
    /// Returns a "zero-valued" default configuration.
    /// All values are 0, or in the case of
    /// `NonZeroUsize`s, 1.
    ///
    /// # Note
    /// This value is not suitable for use in most experiments.
    /// It is meant as a way to abbreviate configuration
    /// instantiation, or to fill in unused values.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::populations::PopulationConfig;
    ///
    /// let cfg = PopulationConfig {
    ///     // Specify some values here...
    ///     delta_threshold: 3.0,
    ///     // Default the rest...
    ///     ..PopulationConfig::zero()
    /// };
    /// ```
    pub const fn zero() -> PopulationConfig {
        PopulationConfig {
            size: NonZeroUsize::MIN,
            delta_threshold: 0.0,
            species_size_penalty_steepness: 0.0,
            average_number_of_species: 0.0,
            max_fitness_variance: 0.0,
            min_threshold: 0.0,
            max_threshold: 0.0,
            keeping_part: 0.0,
            pool_size: 0,
        }
    }

    /// Reads the configuration from a key-value source.
    /// Missing keys read as zero.
    ///
    /// # Errors
    /// Returns an error if `populationSize` is not
    /// a positive integer.
    pub fn from_loader(loader: &ConfigLoader) -> Result<PopulationConfig, ConfigError> {
        let sized = PopulationConfig {
            size: loader.get_non_zero("populationSize")?,
            ..PopulationConfig::zero()
        };
        Ok(sized.reload(loader))
    }

    /// Re-reads the speciation and reproduction parameters
    /// from `loader`, keeping this configuration's size.
    pub fn reload(&self, loader: &ConfigLoader) -> PopulationConfig {
        PopulationConfig {
            size: self.size,
            delta_threshold: loader.get_double("deltaThreshold") as f32,
            species_size_penalty_steepness: loader.get_double("speciesSizePenaltySteepness") as f32,
            average_number_of_species: loader.get_double("averageNumberOfSpecies") as f32,
            max_fitness_variance: loader.get_double("maxFitnessVariance") as f32,
            min_threshold: loader.get_double("minThreshold") as f32,
            max_threshold: loader.get_double("maxThreshold") as f32,
            keeping_part: loader.get_double("keepingPart") as f32,
            pool_size: loader.get_count("poolSize"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_loader() {
        let loader: ConfigLoader = r#"
            populationSize = 150
            deltaThreshold = 0.8
            averageNumberOfSpecies = 10
            keepingPart = 0.5
        "#
        .parse()
        .unwrap();
        let config = PopulationConfig::from_loader(&loader).unwrap();
        assert_eq!(config.size.get(), 150);
        assert_eq!(config.delta_threshold, 0.8);
        assert_eq!(config.average_number_of_species, 10.0);
        assert_eq!(config.keeping_part, 0.5);
        assert_eq!(config.pool_size, 0);
    }

    #[test]
    fn from_loader_requires_size() {
        assert!(PopulationConfig::from_loader(&ConfigLoader::empty()).is_err());
    }

    #[test]
    fn reload_keeps_size() {
        let current = PopulationConfig {
            size: NonZeroUsize::new(40).unwrap(),
            ..PopulationConfig::zero()
        };
        let loader: ConfigLoader = "deltaThreshold = 0.7".parse().unwrap();
        let reloaded = current.reload(&loader);
        assert_eq!(reloaded.size.get(), 40);
        assert_eq!(reloaded.delta_threshold, 0.7);
    }
}
