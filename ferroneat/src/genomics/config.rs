use crate::config::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};

use std::num::NonZeroUsize;

/// Configuration data for genome generation, mutation
/// and inter-genome operations.
///
/// # Note
/// All quantities expressing probabilities
/// should be in the range [0.0, 1.0]. Using
/// values that are not in this bound may result
/// in odd behaviours and/or incorrect programs.
/// Mutation operator weights are exempt: they are
/// normalized before use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Number of inputs in a genome.
    pub input_count: NonZeroUsize,
    /// Number of outputs in a genome.
    pub output_count: NonZeroUsize,
    /// Number of mutation operators drawn per mutation.
    pub mutation_rolls: usize,
    /// Maximum number of links a single mutation
    /// call may add.
    pub max_enabled_links_per_mutation: usize,
    /// Maximum number of neurons a single mutation
    /// call may add.
    pub max_neurons_per_mutation: usize,
    /// Maximum number of links a single mutation
    /// call may disable.
    pub max_removed_links_per_mutation: usize,
    /// Chance that a weight or bias mutation
    /// reinitializes the value instead of nudging it.
    pub extreme_mutation_chance: f32,
    /// Magnitude of bound on weight and bias nudges.
    pub mutation_speed: f32,
    /// Relative weight of the weight mutation operator.
    pub weight_mutation_prob: f32,
    /// Relative weight of the bias mutation operator.
    pub bias_mutation_prob: f32,
    /// Relative weight of the neuron addition operator.
    pub add_neuron_mutation_prob: f32,
    /// Relative weight of the link addition operator.
    pub add_link_mutation_prob: f32,
    /// Relative weight of the activation mutation operator.
    pub activation_mutation_prob: f32,
    /// Relative weight of the link disabling operator.
    pub disable_link_mutation_prob: f32,
    /// Bound on initial neuron biases.
    pub neuron_bias_start_range: f32,
    /// Neuron count above which cycle detection
    /// switches from depth-first to breadth-first search.
    pub cycle_detection_neuron_threshold: usize,
    /// Link count above which cycle detection
    /// switches from depth-first to breadth-first search.
    pub cycle_detection_link_threshold: usize,
    /// Weight of excess neurons in genetic distance.
    pub excess_neurons_constant: f32,
    /// Weight of disjoint neurons in genetic distance.
    pub disjoint_neurons_constant: f32,
    /// Weight of the average common link weight
    /// difference in genetic distance.
    pub average_delta_weight_constant: f32,
    /// Magnitude of bound on the jitter applied to
    /// blended genes during crossover.
    pub crossover_mutation_speed: f32,
}

impl GeneticConfig {
    /// Returns a "zero-valued" default configuration.
    /// All values are 0, or in the case of
    /// `NonZeroUsize`s, 1.
    ///
    /// # Note
    /// This value is not suitable for use in most experiments.
    /// It is meant as a way to fill in unused values during
    /// configuration instantiation.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::GeneticConfig;
    ///
    /// let cfg = GeneticConfig {
    ///     // Specify some values here...
    ///     mutation_rolls: 3,
    ///     weight_mutation_prob: 1.0,
    ///     // Default the rest...
    ///     ..GeneticConfig::zero()
    /// };
    /// ```
    pub const fn zero() -> GeneticConfig {
        GeneticConfig {
            input_count: NonZeroUsize::MIN,
            output_count: NonZeroUsize::MIN,
            mutation_rolls: 0,
            max_enabled_links_per_mutation: 0,
            max_neurons_per_mutation: 0,
            max_removed_links_per_mutation: 0,
            extreme_mutation_chance: 0.0,
            mutation_speed: 0.0,
            weight_mutation_prob: 0.0,
            bias_mutation_prob: 0.0,
            add_neuron_mutation_prob: 0.0,
            add_link_mutation_prob: 0.0,
            activation_mutation_prob: 0.0,
            disable_link_mutation_prob: 0.0,
            neuron_bias_start_range: 0.0,
            cycle_detection_neuron_threshold: 0,
            cycle_detection_link_threshold: 0,
            excess_neurons_constant: 0.0,
            disjoint_neurons_constant: 0.0,
            average_delta_weight_constant: 0.0,
            crossover_mutation_speed: 0.0,
        }
    }

    /// Reads the configuration from a key-value source.
    /// Missing keys read as zero.
    ///
    /// # Errors
    /// Returns an error if `inputCount` or `outputCount`
    /// is not a positive integer.
    pub fn from_loader(loader: &ConfigLoader) -> Result<GeneticConfig, ConfigError> {
        let shape = GeneticConfig {
            input_count: loader.get_non_zero("inputCount")?,
            output_count: loader.get_non_zero("outputCount")?,
            ..GeneticConfig::zero()
        };
        Ok(shape.reload(loader))
    }

    /// Re-reads every hyperparameter from `loader`, keeping
    /// this configuration's input and output counts. The
    /// shape keys need not be present.
    pub fn reload(&self, loader: &ConfigLoader) -> GeneticConfig {
        GeneticConfig {
            input_count: self.input_count,
            output_count: self.output_count,
            mutation_rolls: loader.get_count("amountOfMutationRolls"),
            max_enabled_links_per_mutation: loader.get_count("maxEnabledLinksPerMutation"),
            max_neurons_per_mutation: loader.get_count("maxNeuronsPerMutation"),
            max_removed_links_per_mutation: loader.get_count("maxRemovedLinksPerMutation"),
            extreme_mutation_chance: loader.get_double("extremeMutationChance") as f32,
            mutation_speed: loader.get_double("mutationSpeed") as f32,
            weight_mutation_prob: loader.get_double("weightMutationProb") as f32,
            bias_mutation_prob: loader.get_double("biasMutationProb") as f32,
            add_neuron_mutation_prob: loader.get_double("addNeuronMutationProb") as f32,
            add_link_mutation_prob: loader.get_double("addLinkMutationProb") as f32,
            activation_mutation_prob: loader.get_double("activationMutationProb") as f32,
            disable_link_mutation_prob: loader.get_double("disableLinkMutationProb") as f32,
            neuron_bias_start_range: loader.get_double("neuronBiasStartRange") as f32,
            cycle_detection_neuron_threshold: loader.get_count("cycleDetectionNeuronThreshold"),
            cycle_detection_link_threshold: loader.get_count("cycleDetectionLinkThreshold"),
            excess_neurons_constant: loader.get_double("excessNeuronsConstant") as f32,
            disjoint_neurons_constant: loader.get_double("disjointNeuronsConstant") as f32,
            average_delta_weight_constant: loader.get_double("averageDeltaWeightConstant") as f32,
            crossover_mutation_speed: loader.get_double("crossoverMutationSpeed") as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_loader_reads_camel_case_keys() {
        let loader: ConfigLoader = r#"
            inputCount = 2
            outputCount = 1
            amountOfMutationRolls = 4
            mutationSpeed = 0.5
            addNeuronMutationProb = 0.1
            cycleDetectionNeuronThreshold = 30
        "#
        .parse()
        .unwrap();
        let config = GeneticConfig::from_loader(&loader).unwrap();
        assert_eq!(config.input_count.get(), 2);
        assert_eq!(config.mutation_rolls, 4);
        assert_eq!(config.mutation_speed, 0.5);
        assert_eq!(config.add_neuron_mutation_prob, 0.1);
        assert_eq!(config.cycle_detection_neuron_threshold, 30);
        // Missing keys default to zero.
        assert_eq!(config.crossover_mutation_speed, 0.0);
    }

    #[test]
    fn from_loader_rejects_empty_shape() {
        let loader: ConfigLoader = "inputCount = 0\noutputCount = 1".parse().unwrap();
        assert!(GeneticConfig::from_loader(&loader).is_err());
    }

    #[test]
    fn reload_keeps_shape_without_shape_keys() {
        let current = GeneticConfig {
            input_count: NonZeroUsize::new(3).unwrap(),
            output_count: NonZeroUsize::new(2).unwrap(),
            mutation_speed: 1.0,
            ..GeneticConfig::zero()
        };
        let loader: ConfigLoader = "mutationSpeed = 0.25\ninputCount = 9".parse().unwrap();
        let reloaded = current.reload(&loader);
        assert_eq!(reloaded.input_count.get(), 3);
        assert_eq!(reloaded.output_count.get(), 2);
        assert_eq!(reloaded.mutation_speed, 0.25);
    }
}
