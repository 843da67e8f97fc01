use super::{PopulationConfig, Species};
use crate::genomics::{GeneticConfig, Genome, InnovationHistory, LinkGene, NeuronGene};
use crate::individuals::Individual;

use rand::prelude::Rng;

use std::cmp::Ordering;

/// Auxiliary type for offspring generation.
/// Handles all the tasks of generating a population's
/// offspring according to the specified configs
/// and allotted offspring.
pub(super) struct OffspringFactory<'a, 'p, R: ?Sized> {
    species: &'a [Species<'p>],
    history: &'a mut InnovationHistory,
    genetic_config: &'a GeneticConfig,
    population_config: &'a PopulationConfig,
    rng: &'a mut R,
    next_id: usize,
}

impl<'a, 'p, R: Rng + ?Sized> OffspringFactory<'a, 'p, R> {
    pub(super) fn new(
        species: &'a [Species<'p>],
        history: &'a mut InnovationHistory,
        genetic_config: &'a GeneticConfig,
        population_config: &'a PopulationConfig,
        rng: &'a mut R,
    ) -> OffspringFactory<'a, 'p, R> {
        OffspringFactory {
            species,
            history,
            genetic_config,
            population_config,
            rng,
            next_id: 0,
        }
    }

    /// Generate the allotted offspring, with ids
    /// assigned sequentially from 0.
    pub(super) fn generate_offspring(&mut self, allotted_offspring: &[usize]) -> Vec<Individual> {
        let all_species = self.species;
        let mut offspring = Vec::with_capacity(allotted_offspring.iter().sum());
        for (species, allotted) in all_species.iter().zip(allotted_offspring) {
            let cutoff = self.crossover_cutoff(species);
            let elite = cutoff.min(*allotted);

            self.add_species_elite(&mut offspring, species, cutoff, elite);
            match allotted - elite {
                0 => {}
                1 => {
                    let champion = species.representative().genome().clone();
                    offspring.push(self.child(champion));
                }
                mated => self.add_mated_offspring(&mut offspring, species, cutoff, mated),
            }
        }
        offspring
    }

    /// Number of members that are carried over rather
    /// than replaced by crossover offspring.
    fn crossover_cutoff(&self, species: &Species) -> usize {
        let threshold = species.crossover_threshold(self.population_config);
        ((species.len() as f32 * (1.0 - threshold)).floor().max(0.0) as usize).min(species.len())
    }

    /// Add the top `elite` members of the species to the offspring.
    /// The first `keeping_part` of the band are copied unchanged, the
    /// rest are mutated copies of the best members.
    fn add_species_elite(&mut self, offspring: &mut Vec<Individual>, species: &Species, cutoff: usize, elite: usize) {
        let kept = ((cutoff as f32 * self.population_config.keeping_part).floor().max(0.0) as usize).min(cutoff);
        for i in 0..elite {
            if i < kept {
                let genome = species.member(i).genome().clone();
                offspring.push(self.child(genome));
            } else {
                let genome = species.member(i - kept).genome().clone();
                let mut child = self.child(genome);
                self.mutate(&mut child);
                offspring.push(child);
            }
        }
    }

    /// Cross pairs of parents from the species' elite
    /// band and mutate the children.
    fn add_mated_offspring(&mut self, offspring: &mut Vec<Individual>, species: &Species, cutoff: usize, mated: usize) {
        let breeders = if cutoff >= 2 { cutoff } else { species.len().min(2) };
        for i in 0..mated {
            let parent1 = species.member(i % breeders);
            let parent2 = if breeders > 1 {
                let mut index = self.rng.gen_range(0..breeders - 1);
                if index >= i % breeders {
                    index += 1;
                }
                species.member(index)
            } else {
                parent1
            };
            let genome = crossover(parent1, parent2, self.genetic_config, self.rng);
            let mut child = self.child(genome);
            self.mutate(&mut child);
            offspring.push(child);
        }
    }

    fn child(&mut self, genome: Genome) -> Individual {
        let child = Individual::new(self.next_id, genome);
        self.next_id += 1;
        child
    }

    fn mutate(&mut self, child: &mut Individual) {
        child.mutate(
            self.genetic_config.mutation_rolls,
            false,
            self.history,
            self.genetic_config,
            self.rng,
        );
    }
}

/// Produces a child genome from two parents.
///
/// The dominant parent is the fitter one, or the less complex
/// one on equal fitness, or a random one. The child inherits the
/// dominant parent's shape and every hidden neuron and link of it.
/// Genes that the recessive parent shares are blended: one parent's
/// value is picked at random and nudged by up to
/// ±[`crossover_mutation_speed`]. Shared links are enabled only if
/// enabled in both parents.
///
/// [`crossover_mutation_speed`]: GeneticConfig::crossover_mutation_speed
pub(super) fn crossover<R: Rng + ?Sized>(
    parent1: &Individual,
    parent2: &Individual,
    config: &GeneticConfig,
    rng: &mut R,
) -> Genome {
    let parent1_dominates = match parent1.fitness().total_cmp(&parent2.fitness()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match parent1.genome().complexity().cmp(&parent2.genome().complexity()) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => rng.gen(),
        },
    };
    let (dominant, recessive) = if parent1_dominates {
        (parent1.genome(), parent2.genome())
    } else {
        (parent2.genome(), parent1.genome())
    };

    let mut child = Genome::with_shape(
        dominant.input_count(),
        dominant.output_count(),
        config.neuron_bias_start_range,
        rng,
    );
    for output in dominant.output_neurons() {
        let bias = match recessive.neuron(output.id()) {
            Some(other) => blend(output.bias(), other.bias(), config, rng),
            None => output.bias(),
        };
        if let Some(neuron) = child.neuron_mut(output.id()) {
            neuron.set_bias(bias);
            neuron.set_activation(output.activation());
        }
    }
    for neuron in dominant.hidden_neurons() {
        let inherited = match recessive.neuron(neuron.id()) {
            Some(other) => {
                let bias = blend(neuron.bias(), other.bias(), config, rng);
                let activation = if rng.gen() {
                    neuron.activation()
                } else {
                    other.activation()
                };
                NeuronGene::new(neuron.id(), bias, activation)
            }
            None => neuron.clone(),
        };
        child.add_neuron(inherited);
    }
    for link in dominant.links() {
        let inherited = match recessive.find_link(link.input(), link.output()) {
            Some(other) => LinkGene::new(
                link.input(),
                link.output(),
                blend(link.weight(), other.weight(), config, rng),
                link.enabled() && other.enabled(),
            ),
            None => link.clone(),
        };
        child.add_link(inherited);
    }
    child
}

fn blend<R: Rng + ?Sized>(a: f32, b: f32, config: &GeneticConfig, rng: &mut R) -> f32 {
    let picked = if rng.gen() { a } else { b };
    picked + rng.gen_range(-1.0..=1.0) * config.crossover_mutation_speed
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::populations::species::speciate;

    use rand::{rngs::StdRng, SeedableRng};

    use std::num::NonZeroUsize;

    fn genetic_config() -> GeneticConfig {
        GeneticConfig {
            input_count: NonZeroUsize::new(2).unwrap(),
            output_count: NonZeroUsize::new(1).unwrap(),
            mutation_rolls: 2,
            max_enabled_links_per_mutation: 2,
            max_neurons_per_mutation: 1,
            mutation_speed: 0.1,
            weight_mutation_prob: 0.5,
            add_neuron_mutation_prob: 0.25,
            add_link_mutation_prob: 0.25,
            crossover_mutation_speed: 0.05,
            average_delta_weight_constant: 1.0,
            excess_neurons_constant: 1.0,
            disjoint_neurons_constant: 1.0,
            ..GeneticConfig::zero()
        }
    }

    fn individual(id: usize, fitness: f32, genome: Genome) -> Individual {
        let mut individual = Individual::new(id, genome);
        individual.set_fitness(fitness);
        individual
    }

    #[test]
    fn crossover_keeps_dominant_shape() {
        let config = genetic_config();
        let mut rng = StdRng::seed_from_u64(4);
        let mut history = InnovationHistory::new(&config);

        let mut fit = individual(0, 2.0, Genome::completely_connected(&config, &mut rng));
        fit.mutate_add_neuron(&mut history, &config, &mut rng);
        let weak = individual(1, 1.0, Genome::completely_connected(&config, &mut rng));

        for (a, b) in [(&fit, &weak), (&weak, &fit)] {
            let child = crossover(a, b, &config, &mut rng);
            assert_eq!(child.input_count(), fit.genome().input_count());
            assert_eq!(child.output_count(), fit.genome().output_count());
            let ids: Vec<_> = child.neurons().map(NeuronGene::id).collect();
            let dominant_ids: Vec<_> = fit.genome().neurons().map(NeuronGene::id).collect();
            assert_eq!(ids, dominant_ids);
            assert_eq!(child.links().count(), fit.genome().links().count());
        }
    }

    #[test]
    fn shared_links_are_blended_and_disabled_if_either_is() {
        let config = GeneticConfig {
            crossover_mutation_speed: 0.0,
            ..genetic_config()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut a = Genome::new(&config, &mut rng);
        a.add_link(LinkGene::new(0, 2, 1.0, true));
        a.add_link(LinkGene::new(1, 2, 1.0, true));
        let mut b = Genome::new(&config, &mut rng);
        b.add_link(LinkGene::new(0, 2, -1.0, false));
        let a = individual(0, 5.0, a);
        let b = individual(1, 1.0, b);

        let child = crossover(&a, &b, &config, &mut rng);
        let shared = child.find_link(0, 2).unwrap();
        assert!(shared.weight() == 1.0 || shared.weight() == -1.0);
        assert!(!shared.enabled());
        let own = child.find_link(1, 2).unwrap();
        assert_eq!(own.weight(), 1.0);
        assert!(own.enabled());
    }

    #[test]
    fn equal_fitness_prefers_simpler_parent() {
        let config = genetic_config();
        let mut rng = StdRng::seed_from_u64(6);
        let simple = individual(0, 1.0, Genome::new(&config, &mut rng));
        let complex = individual(1, 1.0, Genome::completely_connected(&config, &mut rng));
        let child = crossover(&complex, &simple, &config, &mut rng);
        assert_eq!(child.links().count(), 0);
    }

    #[test]
    fn offspring_matches_allotment() {
        let genetic_config = genetic_config();
        let population_config = PopulationConfig {
            size: NonZeroUsize::new(12).unwrap(),
            delta_threshold: 0.3,
            min_threshold: 0.25,
            max_threshold: 0.75,
            max_fitness_variance: 4.0,
            keeping_part: 0.5,
            ..PopulationConfig::zero()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let mut history = InnovationHistory::new(&genetic_config);
        let individuals: Vec<Individual> = (0..12)
            .map(|id| {
                let genome = Genome::completely_connected(&genetic_config, &mut rng);
                individual(id, rng.gen_range(0.0..4.0), genome)
            })
            .collect();
        let speciation = speciate(&individuals, &genetic_config, &population_config);
        let count = speciation.species.len();

        for allotted in [vec![12 / count; count], {
            let mut skewed = vec![0; count];
            skewed[0] = 12;
            skewed
        }] {
            let offspring = OffspringFactory::new(
                &speciation.species,
                &mut history,
                &genetic_config,
                &population_config,
                &mut rng,
            )
            .generate_offspring(&allotted);
            assert_eq!(offspring.len(), allotted.iter().sum::<usize>());
            let ids: Vec<usize> = offspring.iter().map(Individual::id).collect();
            assert_eq!(ids, (0..offspring.len()).collect::<Vec<_>>());
            assert!(offspring.iter().all(|i| i.fitness() == 0.0));
            assert!(offspring
                .iter()
                .all(|i| i.genome().input_count().get() == 2 && i.genome().output_count().get() == 1));
        }
    }

    #[test]
    fn kept_elite_is_copied_unchanged() {
        let genetic_config = genetic_config();
        let population_config = PopulationConfig {
            size: NonZeroUsize::new(4).unwrap(),
            delta_threshold: 100.0,
            keeping_part: 1.0,
            ..PopulationConfig::zero()
        };
        let mut rng = StdRng::seed_from_u64(8);
        let mut history = InnovationHistory::new(&genetic_config);
        let individuals: Vec<Individual> = (0..4)
            .map(|id| individual(id, id as f32, Genome::completely_connected(&genetic_config, &mut rng)))
            .collect();
        let speciation = speciate(&individuals, &genetic_config, &population_config);

        let offspring = OffspringFactory::new(
            &speciation.species,
            &mut history,
            &genetic_config,
            &population_config,
            &mut rng,
        )
        .generate_offspring(&[4]);
        let expected: Vec<&Genome> = individuals.iter().rev().map(Individual::genome).collect();
        assert_eq!(offspring.iter().map(Individual::genome).collect::<Vec<_>>(), expected);
    }
}
