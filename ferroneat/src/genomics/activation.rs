use rand::Rng;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// The activation function applied to a neuron's
/// accumulated value when it is first read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    // x
    Identity,
    // 1 / (1 + exp(-x))
    Sigmoid,
    // tanh(x)
    Tanh,
    // 0   if x < 0
    // x   if x ≥ 0
    ReLU,
    // 0.01x if x < 0
    // x     if x ≥ 0
    LeakyReLU,
}

impl Activation {
    /// Every activation variant, in declaration order.
    pub const ALL: [Activation; 5] = [
        Activation::Identity,
        Activation::Sigmoid,
        Activation::Tanh,
        Activation::ReLU,
        Activation::LeakyReLU,
    ];

    /// Applies the activation function to `x`.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::Activation;
    ///
    /// assert_eq!(Activation::Identity.apply(-3.0), -3.0);
    /// assert_eq!(Activation::ReLU.apply(-3.0), 0.0);
    /// assert_eq!(Activation::Sigmoid.apply(0.0), 0.5);
    /// ```
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Identity => x,
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::ReLU => x.max(0.0),
            Activation::LeakyReLU => {
                if x >= 0.0 {
                    x
                } else {
                    0.01 * x
                }
            }
        }
    }

    /// Returns an activation different from `self`,
    /// chosen uniformly among the remaining variants.
    pub fn random_other<R: Rng + ?Sized>(self, rng: &mut R) -> Activation {
        let others: Vec<Activation> = Self::ALL.iter().copied().filter(|a| *a != self).collect();
        others[rng.gen_range(0..others.len())]
    }
}

impl Default for Activation {
    fn default() -> Self {
        Activation::Identity
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::Identity => "identity",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::ReLU => "relu",
            Activation::LeakyReLU => "leakyrelu",
        };
        f.write_str(name)
    }
}

/// Error returned when parsing an unknown activation name.
#[derive(Debug, thiserror::Error)]
#[error("no activation function named {0:?}")]
pub struct UnknownActivation(pub String);

impl FromStr for Activation {
    type Err = UnknownActivation;

    /// Parses an activation by name, ignoring case.
    /// `"none"` is accepted as an alias of identity.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "identity" | "none" => Ok(Activation::Identity),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "relu" => Ok(Activation::ReLU),
            "leakyrelu" | "leaky_relu" => Ok(Activation::LeakyReLU),
            _ => Err(UnknownActivation(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{rngs::StdRng, SeedableRng};

    fn almost_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn apply() {
        for &x in &[-2.0f32, 1.0, 0.0, -0.5, 4.0] {
            assert_eq!(Activation::Identity.apply(x), x);
            assert_eq!(Activation::ReLU.apply(x), if x < 0.0 { 0.0 } else { x });
            assert!(almost_eq(Activation::Tanh.apply(x), x.tanh()));
            assert!(almost_eq(
                Activation::Sigmoid.apply(x) + Activation::Sigmoid.apply(-x),
                1.0
            ));
        }
        assert!(almost_eq(Activation::LeakyReLU.apply(-2.0), -0.02));
        assert_eq!(Activation::LeakyReLU.apply(3.0), 3.0);
        assert!(almost_eq(Activation::Sigmoid.apply(4.0), 0.98201));
    }

    #[test]
    fn parse_ignores_case() {
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::ReLU);
        assert_eq!("NONE".parse::<Activation>().unwrap(), Activation::Identity);
        assert_eq!("LeakyReLU".parse::<Activation>().unwrap(), Activation::LeakyReLU);
        assert!("softplus".parse::<Activation>().is_err());
        for a in Activation::ALL {
            assert_eq!(a.to_string().parse::<Activation>().unwrap(), a);
        }
    }

    #[test]
    fn random_other_never_repeats() {
        let mut rng = StdRng::seed_from_u64(7);
        for a in Activation::ALL {
            for _ in 0..50 {
                assert_ne!(a.random_other(&mut rng), a);
            }
        }
    }
}
