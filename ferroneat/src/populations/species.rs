use crate::genomics::{GeneticConfig, Genome};
use crate::individuals::Individual;
use crate::populations::PopulationConfig;

use log::debug;

/// Returns the genetic distance between a species
/// representative and another genome:
///
/// `(c1 * excess + c2 * disjoint) / N + c3 * average weight difference`
///
/// where `N` is the larger neuron count of the two, and
/// excess neurons are those of `other` beyond the highest
/// neuron id of `representative`.
///
/// # Examples
/// ```
/// use ferroneat::genomics::{GeneticConfig, Genome};
/// use ferroneat::populations::genetic_distance;
///
/// let config = GeneticConfig {
///     excess_neurons_constant: 1.0,
///     disjoint_neurons_constant: 1.0,
///     average_delta_weight_constant: 0.4,
///     ..GeneticConfig::zero()
/// };
/// let genome = Genome::new(&config, &mut rand::thread_rng());
///
/// assert_eq!(genetic_distance(&genome, &genome, &config), 0.0);
/// ```
pub fn genetic_distance(representative: &Genome, other: &Genome, config: &GeneticConfig) -> f32 {
    let neuron_count = representative.neurons().count().max(other.neurons().count()) as f32;
    let excess = representative.excess_neurons(other) as f32;
    let disjoint = representative.disjoint_neurons(other) as f32;
    (config.excess_neurons_constant * excess + config.disjoint_neurons_constant * disjoint) / neuron_count
        + config.average_delta_weight_constant * representative.average_weight_difference(other)
}

/// A group of genetically similar individuals.
///
/// Species are rebuilt from scratch every generation and
/// borrow their members from the population. Members are
/// kept in decreasing order of fitness, and the first,
/// fittest member is the species' representative.
#[derive(Clone, Debug)]
pub struct Species<'a> {
    members: Vec<&'a Individual>,
}

impl<'a> Species<'a> {
    /// Returns the species' representative, which
    /// is also its fittest member.
    pub fn representative(&self) -> &'a Individual {
        self.members[0]
    }

    /// Returns an iterator over the species' members,
    /// in decreasing order of fitness.
    pub fn members(&self) -> impl Iterator<Item = &'a Individual> + '_ {
        self.members.iter().copied()
    }

    pub(super) fn member(&self, index: usize) -> &'a Individual {
        self.members[index]
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`: a species is founded by its representative.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the population variance of the members' fitness.
    pub fn fitness_variance(&self) -> f32 {
        let count = self.members.len() as f32;
        let mean = self.members.iter().map(|i| i.fitness()).sum::<f32>() / count;
        self.members
            .iter()
            .map(|i| (i.fitness() - mean).powi(2))
            .sum::<f32>()
            / count
    }

    /// Returns the fraction of the species that is bred by
    /// crossover rather than carried over from its elite.
    /// Grows from [`min_threshold`] to [`max_threshold`]
    /// as fitness variance approaches [`max_fitness_variance`].
    ///
    /// [`min_threshold`]: PopulationConfig::min_threshold
    /// [`max_threshold`]: PopulationConfig::max_threshold
    /// [`max_fitness_variance`]: PopulationConfig::max_fitness_variance
    pub fn crossover_threshold(&self, config: &PopulationConfig) -> f32 {
        let variance = self.fitness_variance();
        let normalized_variance = if config.max_fitness_variance > 0.0 {
            (variance / config.max_fitness_variance).min(1.0)
        } else if variance > 0.0 {
            1.0
        } else {
            0.0
        };
        config.min_threshold + (config.max_threshold - config.min_threshold) * normalized_variance
    }
}

/// The result of grouping a population into species.
#[derive(Clone, Debug)]
pub struct Speciation<'a> {
    /// Species in order of creation.
    pub species: Vec<Species<'a>>,
    /// Largest distance measured to any representative,
    /// floored to two decimals.
    pub largest_delta: f32,
    /// Largest distance below the species threshold,
    /// floored to two decimals.
    pub highest_delta_below_threshold: f32,
}

/// Groups individuals into species.
///
/// Individuals are visited in decreasing order of fitness,
/// and each joins the first species whose representative is
/// closer than [`delta_threshold`], or founds a new species.
///
/// [`delta_threshold`]: PopulationConfig::delta_threshold
pub fn speciate<'a>(
    individuals: &'a [Individual],
    genetic_config: &GeneticConfig,
    population_config: &PopulationConfig,
) -> Speciation<'a> {
    let grouping = Grouping::of(individuals, genetic_config, population_config);
    Speciation {
        species: grouping.species(individuals),
        largest_delta: grouping.largest_delta,
        highest_delta_below_threshold: grouping.highest_delta_below_threshold,
    }
}

/// Species membership as indices into the individuals it
/// was computed from, so it can outlive a borrow of them.
#[derive(Clone, Debug, PartialEq)]
pub(super) struct Grouping {
    members: Vec<Vec<usize>>,
    pub largest_delta: f32,
    pub highest_delta_below_threshold: f32,
}

impl Grouping {
    pub fn of(
        individuals: &[Individual],
        genetic_config: &GeneticConfig,
        population_config: &PopulationConfig,
    ) -> Grouping {
        let mut sorted: Vec<usize> = (0..individuals.len()).collect();
        sorted.sort_by(|&a, &b| individuals[b].fitness().total_cmp(&individuals[a].fitness()));

        let mut members: Vec<Vec<usize>> = vec![];
        let mut largest_delta = 0.0f32;
        let mut highest_delta_below_threshold = 0.0f32;
        for index in sorted {
            let genome = individuals[index].genome();
            let mut home = None;
            for (i, species) in members.iter().enumerate() {
                let representative = individuals[species[0]].genome();
                let delta = genetic_distance(representative, genome, genetic_config);
                let floored = (delta * 100.0).floor() / 100.0;
                largest_delta = largest_delta.max(floored);
                if delta < population_config.delta_threshold {
                    highest_delta_below_threshold = highest_delta_below_threshold.max(floored);
                    home = Some(i);
                    break;
                }
            }
            match home {
                Some(i) => members[i].push(index),
                None => members.push(vec![index]),
            }
        }
        debug!(
            "formed {} species (largest delta {:.2}, highest below threshold {:.2})",
            members.len(),
            largest_delta,
            highest_delta_below_threshold
        );

        Grouping {
            members,
            largest_delta,
            highest_delta_below_threshold,
        }
    }

    pub fn species_count(&self) -> usize {
        self.members.len()
    }

    /// Resolves the grouping against the individuals it was computed from.
    pub fn species<'a>(&self, individuals: &'a [Individual]) -> Vec<Species<'a>> {
        self.members
            .iter()
            .map(|indices| Species {
                members: indices.iter().map(|&i| &individuals[i]).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::genomics::{Activation, LinkGene, NeuronGene};

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use std::num::NonZeroUsize;

    fn genetic_config() -> GeneticConfig {
        GeneticConfig {
            input_count: NonZeroUsize::new(2).unwrap(),
            output_count: NonZeroUsize::new(1).unwrap(),
            excess_neurons_constant: 1.0,
            disjoint_neurons_constant: 1.0,
            average_delta_weight_constant: 0.5,
            ..GeneticConfig::zero()
        }
    }

    fn individual(id: usize, fitness: f32, weight: f32, hidden: &[usize]) -> Individual {
        let config = genetic_config();
        let mut genome = Genome::new(&config, &mut StdRng::seed_from_u64(id as u64));
        genome.add_link(LinkGene::new(0, 2, weight, true));
        for id in hidden {
            genome.add_neuron(NeuronGene::new(*id, 0.0, Activation::Identity));
        }
        let mut individual = Individual::new(id, genome);
        individual.set_fitness(fitness);
        individual
    }

    #[test]
    fn distance_combines_structure_and_weights() {
        let config = genetic_config();
        let a = individual(0, 0.0, 1.0, &[3]);
        let b = individual(1, 0.0, 0.0, &[4, 5]);
        // 4 and 5 are excess, 3 is disjoint; N = 5.
        let expected = (2.0 + 1.0) / 5.0 + 0.5 * 1.0;
        assert!((genetic_distance(a.genome(), b.genome(), &config) - expected).abs() < 1e-6);
        assert_eq!(genetic_distance(a.genome(), a.genome(), &config), 0.0);
    }

    #[test]
    fn representatives_anchor_species() {
        let population_config = PopulationConfig {
            delta_threshold: 0.55,
            ..PopulationConfig::zero()
        };
        let individuals = vec![
            individual(0, 1.0, 0.0, &[]),
            individual(1, 5.0, 0.0, &[]),
            individual(2, 3.0, 0.0, &[3, 4, 5, 6]),
            individual(3, 2.0, 1.0, &[]),
        ];
        let speciation = speciate(&individuals, &genetic_config(), &population_config);

        let ids: Vec<Vec<usize>> = speciation
            .species
            .iter()
            .map(|s| s.members().map(Individual::id).collect())
            .collect();
        assert_eq!(ids, vec![vec![1, 3, 0], vec![2]]);
        assert_eq!(speciation.species[0].representative().id(), 1);
        assert_eq!(speciation.highest_delta_below_threshold, 0.5);
        assert_eq!(speciation.largest_delta, 0.57);
    }

    #[test]
    fn every_individual_lands_in_exactly_one_species() {
        let mut rng = StdRng::seed_from_u64(21);
        let population_config = PopulationConfig {
            delta_threshold: 0.4,
            ..PopulationConfig::zero()
        };
        let individuals: Vec<Individual> = (0..60)
            .map(|id| {
                let hidden: Vec<usize> = (3..10).filter(|_| rng.gen::<bool>()).collect();
                individual(id, rng.gen_range(0.0..10.0), rng.gen_range(-1.0..1.0), &hidden)
            })
            .collect();
        let speciation = speciate(&individuals, &genetic_config(), &population_config);

        let mut seen: Vec<usize> = speciation
            .species
            .iter()
            .flat_map(|s| s.members().map(Individual::id))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..60).collect::<Vec<_>>());
        for species in &speciation.species {
            let fitness: Vec<f32> = species.members().map(Individual::fitness).collect();
            assert!(fitness.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn crossover_threshold_scales_with_variance() {
        let population_config = PopulationConfig {
            delta_threshold: 10.0,
            min_threshold: 0.2,
            max_threshold: 0.6,
            max_fitness_variance: 4.0,
            ..PopulationConfig::zero()
        };
        let individuals = vec![individual(0, 1.0, 0.0, &[]), individual(1, 3.0, 0.0, &[])];
        let speciation = speciate(&individuals, &genetic_config(), &population_config);
        let species = &speciation.species[0];
        assert_eq!(species.fitness_variance(), 1.0);
        assert!((species.crossover_threshold(&population_config) - 0.3).abs() < 1e-6);

        let unbounded = PopulationConfig {
            max_fitness_variance: 0.0,
            ..population_config
        };
        assert!((species.crossover_threshold(&unbounded) - 0.6).abs() < 1e-6);
    }
}
