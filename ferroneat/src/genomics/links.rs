use crate::NeuronId;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Links are directed, weighted connections between
/// two neurons of a genome. A genome holds at most one
/// link per ordered `(input, output)` pair, so the pair
/// doubles as the link's identity when genomes are compared.
/// `==` compares every field, weight and enabled flag
/// included; match links across genomes by [`endpoints`].
///
/// [`endpoints`]: LinkGene::endpoints
///
/// Links are never removed from a genome once added; they
/// are disabled instead, so they remain available for
/// re-enabling and for crossover alignment.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LinkGene {
    input: NeuronId,
    output: NeuronId,
    weight: f32,
    enabled: bool,
}

impl LinkGene {
    /// Returns a new link with the specified parameters.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::LinkGene;
    ///
    /// let link = LinkGene::new(0, 3, -1.5, true);
    /// assert_eq!(link.endpoints(), (0, 3));
    /// ```
    pub fn new(input: NeuronId, output: NeuronId, weight: f32, enabled: bool) -> LinkGene {
        LinkGene {
            input,
            output,
            weight,
            enabled,
        }
    }

    /// Returns the id of the link's source neuron.
    pub fn input(&self) -> NeuronId {
        self.input
    }

    /// Returns the id of the link's target neuron.
    pub fn output(&self) -> NeuronId {
        self.output
    }

    /// Returns the link's identity pair.
    pub fn endpoints(&self) -> (NeuronId, NeuronId) {
        (self.input, self.output)
    }

    /// Returns the link's weight.
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Sets the link's weight.
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    /// Returns whether the link takes part in propagation.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the link's enabled status.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::LinkGene;
    ///
    /// let mut link = LinkGene::new(0, 3, 1.0, true);
    /// link.set_enabled(false);
    /// assert!(!link.enabled());
    /// ```
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl fmt::Display for LinkGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{:?}->{:?}, {:.3}]{}",
            if self.enabled { "" } else { "(" },
            self.input,
            self.output,
            self.weight,
            if self.enabled { "" } else { ")" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_compares_values_not_just_endpoints() {
        let link = LinkGene::new(1, 2, 0.5, true);
        let mut other = link.clone();
        other.set_enabled(false);
        assert_eq!(link.endpoints(), other.endpoints());
        assert_ne!(link, other);
        assert_ne!(link, LinkGene::new(1, 2, 0.75, true));
    }

    #[test]
    fn display_marks_disabled_links() {
        let mut link = LinkGene::new(1, 2, 0.5, true);
        assert_eq!(link.to_string(), "[1->2, 0.500]");
        link.set_enabled(false);
        assert_eq!(link.to_string(), "([1->2, 0.500])");
    }
}
