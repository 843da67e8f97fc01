use crate::genomics::Activation;
use crate::NeuronId;

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Neurons are the structural elements of genomes
/// between which links are created. Within a genome
/// a neuron is identified by its [`id`] alone.
///
/// `==` compares every field, bias and activation
/// included. Compare ids to match neurons across genomes.
///
/// [`id`]: NeuronGene::id
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct NeuronGene {
    id: NeuronId,
    bias: f32,
    activation: Activation,
}

impl NeuronGene {
    /// Returns a new neuron with the specified parameters.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::{Activation, NeuronGene};
    ///
    /// let neuron = NeuronGene::new(7, 0.25, Activation::Tanh);
    /// assert_eq!(neuron.id(), 7);
    /// ```
    pub fn new(id: NeuronId, bias: f32, activation: Activation) -> NeuronGene {
        NeuronGene {
            id,
            bias,
            activation,
        }
    }

    /// Returns a neuron with identity activation and a
    /// bias drawn uniformly from ±`bias_range`.
    pub fn with_random_bias<R: Rng + ?Sized>(id: NeuronId, bias_range: f32, rng: &mut R) -> NeuronGene {
        NeuronGene::new(id, Self::random_bias(bias_range, rng), Activation::Identity)
    }

    pub(crate) fn random_bias<R: Rng + ?Sized>(bias_range: f32, rng: &mut R) -> f32 {
        bias_range * rng.gen_range(-1.0..=1.0)
    }

    /// Returns the neuron's id.
    pub fn id(&self) -> NeuronId {
        self.id
    }

    /// Returns the neuron's bias.
    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Sets the neuron's bias.
    pub fn set_bias(&mut self, bias: f32) {
        self.bias = bias;
    }

    /// Returns the neuron's activation function.
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Sets the neuron's activation function.
    pub fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
    }

    /// Applies the neuron's activation function to `x`.
    pub fn activate(&self, x: f32) -> f32 {
        self.activation.apply(x)
    }
}

impl fmt::Display for NeuronGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:+.3}, {}]", self.id, self.bias, self.activation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn random_bias_within_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for id in 0..100 {
            let neuron = NeuronGene::with_random_bias(id, 0.5, &mut rng);
            assert!(neuron.bias().abs() <= 0.5);
            assert_eq!(neuron.activation(), Activation::Identity);
        }
    }

    #[test]
    fn equality_compares_values_not_just_id() {
        let neuron = NeuronGene::new(5, 0.5, Activation::Tanh);
        let mutated = NeuronGene::new(5, -0.5, Activation::Tanh);
        assert_eq!(neuron.id(), mutated.id());
        assert_ne!(neuron, mutated);
        assert_eq!(neuron, neuron.clone());
    }

    #[test]
    fn activate_uses_own_function() {
        let mut neuron = NeuronGene::new(3, 0.0, Activation::ReLU);
        assert_eq!(neuron.activate(-1.0), 0.0);
        neuron.set_activation(Activation::Identity);
        assert_eq!(neuron.activate(-1.0), -1.0);
    }

    #[test]
    fn display() {
        let neuron = NeuronGene::new(4, 0.5, Activation::Sigmoid);
        assert_eq!(neuron.to_string(), "4[+0.500, sigmoid]");
    }
}
