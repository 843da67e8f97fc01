//! Saving and restoring populations.
//!
//! A [`PopulationSnapshot`] holds everything needed to resume
//! evolution: the individuals with their fitness and genomes,
//! the generation counters and the innovation history. Species
//! are rebuilt on demand and are not stored. Snapshots are
//! written as pretty-printed JSON or as RON, chosen by the
//! file extension.
use crate::genomics::{GeneticConfig, InnovationHistory};
use crate::individuals::Individual;
use crate::populations::{Population, PopulationConfig};

use log::{info, warn};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// The persisted state of a population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub population_size: NonZeroUsize,
    pub generation: usize,
    pub until_generation: usize,
    pub individuals: Vec<Individual>,
    pub history: InnovationHistory,
}

impl PopulationSnapshot {
    /// Checks that the snapshot describes a population
    /// that `genetic_config` can keep evolving.
    fn validate(&self, genetic_config: &GeneticConfig) -> Result<(), PersistenceError> {
        if self.individuals.len() != self.population_size.get() {
            return Err(PersistenceError::Inconsistent(format!(
                "population size is {} but {} individuals are stored",
                self.population_size,
                self.individuals.len()
            )));
        }
        for individual in &self.individuals {
            let genome = individual.genome();
            if genome.input_count() != genetic_config.input_count
                || genome.output_count() != genetic_config.output_count
            {
                return Err(PersistenceError::Inconsistent(format!(
                    "individual {} has {} inputs and {} outputs, expected {} and {}",
                    individual.id(),
                    genome.input_count(),
                    genome.output_count(),
                    genetic_config.input_count,
                    genetic_config.output_count
                )));
            }
            if genome.max_neuron_id() >= self.history.next_innovation() {
                return Err(PersistenceError::Inconsistent(format!(
                    "individual {} uses neuron id {} beyond the innovation history",
                    individual.id(),
                    genome.max_neuron_id()
                )));
            }
        }
        Ok(())
    }
}

/// Errors raised while saving or restoring a population.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),
    /// The file extension is neither `json` nor `ron`.
    #[error("unknown snapshot format for {}", .0.display())]
    UnknownFormat(PathBuf),
    /// The snapshot decoded, but does not describe a usable population.
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Ron,
}

impl Format {
    fn of(path: &Path) -> Result<Format, PersistenceError> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Ok(Format::Json),
            Some("ron") => Ok(Format::Ron),
            _ => Err(PersistenceError::UnknownFormat(path.to_path_buf())),
        }
    }
}

impl Population {
    /// Writes a snapshot of the population to `path`, as
    /// JSON for `.json` files and as RON for `.ron` files.
    ///
    /// # Errors
    /// Returns an error if the extension is not recognized,
    /// or if the file cannot be written.
    ///
    /// # Examples
    /// ```no_run
    /// use ferroneat::genomics::GeneticConfig;
    /// use ferroneat::populations::{InitialTopology, Population, PopulationConfig};
    ///
    /// let population = Population::new(
    ///     GeneticConfig::zero(),
    ///     PopulationConfig::zero(),
    ///     InitialTopology::CompletelyConnected,
    /// );
    /// population.export("population.json").unwrap();
    /// ```
    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        let text = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(&snapshot)?,
            Format::Ron => ron::ser::to_string_pretty(&snapshot, PrettyConfig::default())?,
        };
        fs::write(path, text)?;
        info!("exported generation {} to {}", self.generation(), path.display());
        Ok(())
    }

    /// Reads a population previously written by [`export`].
    /// The configurations are used to continue evolution; the
    /// stored population size takes precedence over the
    /// configured one.
    ///
    /// Returns `None` if the file cannot be read or does not
    /// hold a consistent snapshot, in which case the caller
    /// should start a fresh population.
    ///
    /// [`export`]: Population::export
    pub fn import(
        path: impl AsRef<Path>,
        genetic_config: GeneticConfig,
        population_config: PopulationConfig,
    ) -> Option<Population> {
        let path = path.as_ref();
        match Self::read_snapshot(path, &genetic_config) {
            Ok(snapshot) => Some(Population::from_snapshot(snapshot, genetic_config, population_config)),
            Err(e) => {
                warn!("no prior population loaded from {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read_snapshot(path: &Path, genetic_config: &GeneticConfig) -> Result<PopulationSnapshot, PersistenceError> {
        let format = Format::of(path)?;
        let text = fs::read_to_string(path)?;
        let snapshot: PopulationSnapshot = match format {
            Format::Json => serde_json::from_str(&text)?,
            Format::Ron => ron::from_str(&text)?,
        };
        snapshot.validate(genetic_config)?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::populations::InitialTopology;

    use rand::{rngs::StdRng, SeedableRng};

    fn genetic_config() -> GeneticConfig {
        GeneticConfig {
            input_count: NonZeroUsize::new(2).unwrap(),
            output_count: NonZeroUsize::new(1).unwrap(),
            mutation_rolls: 6,
            max_neurons_per_mutation: 2,
            max_enabled_links_per_mutation: 2,
            weight_mutation_prob: 0.4,
            add_neuron_mutation_prob: 0.3,
            add_link_mutation_prob: 0.3,
            mutation_speed: 0.5,
            neuron_bias_start_range: 1.0,
            ..GeneticConfig::zero()
        }
    }

    fn population() -> Population {
        let mut population = Population::with_rng(
            genetic_config(),
            PopulationConfig {
                size: NonZeroUsize::new(6).unwrap(),
                delta_threshold: 1.0,
                keeping_part: 0.5,
                ..PopulationConfig::zero()
            },
            InitialTopology::CompletelyConnected,
            StdRng::seed_from_u64(11),
        );
        population.evaluate_fitness(|genome| genome.neurons().count() as f32);
        population.evolve();
        population.evaluate_fitness(|genome| genome.links().count() as f32);
        population
    }

    fn round_trip(extension: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("population.{}", extension));
        let original = population();
        original.export(&path).unwrap();

        let restored = Population::import(&path, genetic_config(), PopulationConfig::zero()).unwrap();
        assert_eq!(restored.snapshot(), original.snapshot());
        assert_eq!(restored.generation(), 1);
        assert_eq!(restored.population_config().size.get(), 6);
        assert_eq!(restored.highest_fitness(), original.champion().fitness());
    }

    #[test]
    fn json_round_trip() {
        round_trip("json");
    }

    #[test]
    fn ron_round_trip() {
        round_trip("ron");
    }

    #[test]
    fn missing_file_is_no_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(Population::import(&path, genetic_config(), PopulationConfig::zero()).is_none());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.yaml");
        assert!(matches!(population().export(&path), Err(PersistenceError::UnknownFormat(_))));
        assert!(!path.exists());
    }

    #[test]
    fn mismatched_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.json");
        population().export(&path).unwrap();
        let other = GeneticConfig {
            input_count: NonZeroUsize::new(3).unwrap(),
            ..genetic_config()
        };
        assert!(Population::import(&path, other, PopulationConfig::zero()).is_none());
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.json");
        population().export(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, &text[..text.len() / 2]).unwrap();
        assert!(Population::import(&path, genetic_config(), PopulationConfig::zero()).is_none());
    }
}
