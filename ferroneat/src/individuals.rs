//! An `Individual` is a genome together with its
//! fitness score, and carries the mutation operators
//! that evolve it.
use crate::genomics::{Activation, GeneticConfig, Genome, InnovationHistory, LinkGene, NeuronGene};

use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::{IteratorRandom, Rng};
use serde::{Deserialize, Serialize};

use std::fmt;

/// The mutation operators an individual can apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mutation {
    /// Nudge or reinitialize a link weight.
    Weight,
    /// Nudge or reinitialize a neuron bias.
    Bias,
    /// Split an enabled link with a new hidden neuron.
    AddNeuron,
    /// Link two previously unlinked neurons.
    AddLink,
    /// Swap a hidden neuron's activation function.
    Activation,
    /// Disable an enabled link.
    DisableLink,
}

impl Mutation {
    /// All operators, in the order their weights are read.
    pub const ALL: [Mutation; 6] = [
        Mutation::Weight,
        Mutation::Bias,
        Mutation::AddNeuron,
        Mutation::AddLink,
        Mutation::Activation,
        Mutation::DisableLink,
    ];

    /// Operators drawn from when every configured weight is zero.
    const UNIFORM_FALLBACK: [Mutation; 5] = [
        Mutation::Weight,
        Mutation::Bias,
        Mutation::AddNeuron,
        Mutation::AddLink,
        Mutation::Activation,
    ];

    fn weight_in(self, config: &GeneticConfig) -> f32 {
        match self {
            Mutation::Weight => config.weight_mutation_prob,
            Mutation::Bias => config.bias_mutation_prob,
            Mutation::AddNeuron => config.add_neuron_mutation_prob,
            Mutation::AddLink => config.add_link_mutation_prob,
            Mutation::Activation => config.activation_mutation_prob,
            Mutation::DisableLink => config.disable_link_mutation_prob,
        }
    }
}

/// Structural changes made since the budgets were last reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct MutationBudget {
    added_links: usize,
    added_neurons: usize,
    removed_links: usize,
}

/// A genome with an identifier and a fitness score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Individual {
    id: usize,
    fitness: f32,
    genome: Genome,
    #[serde(skip)]
    budget: MutationBudget,
}

impl Individual {
    /// Wraps `genome` in a new individual with zero fitness.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::{GeneticConfig, Genome};
    /// use ferroneat::individuals::Individual;
    ///
    /// let genome = Genome::new(&GeneticConfig::zero(), &mut rand::thread_rng());
    /// let individual = Individual::new(7, genome.clone());
    ///
    /// assert_eq!(individual.id(), 7);
    /// assert_eq!(individual.fitness(), 0.0);
    /// assert_eq!(individual.genome(), &genome);
    /// ```
    pub fn new(id: usize, genome: Genome) -> Individual {
        Individual {
            id,
            fitness: 0.0,
            genome,
            budget: MutationBudget::default(),
        }
    }

    /// Returns the individual's identifier.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the individual's fitness.
    pub fn fitness(&self) -> f32 {
        self.fitness
    }

    /// Sets the individual's fitness.
    pub fn set_fitness(&mut self, fitness: f32) {
        self.fitness = fitness;
    }

    /// Returns the individual's genome.
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Returns the individual's genome mutably.
    pub fn genome_mut(&mut self) -> &mut Genome {
        &mut self.genome
    }

    /// Applies `rolls` randomly drawn mutation operators.
    ///
    /// Operators are drawn with probability proportional to
    /// their configured weights, or uniformly among the five
    /// core operators if every weight is zero. Structural
    /// operators respect per-call budgets, which are reset
    /// first unless `repeat` is set. An operator that cannot
    /// apply falls back to a weight mutation, so every roll
    /// changes the genome.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::{GeneticConfig, Genome, InnovationHistory};
    /// use ferroneat::individuals::Individual;
    /// use std::num::NonZeroUsize;
    ///
    /// let config = GeneticConfig {
    ///     input_count: NonZeroUsize::new(2).unwrap(),
    ///     add_neuron_mutation_prob: 1.0,
    ///     max_neurons_per_mutation: 2,
    ///     ..GeneticConfig::zero()
    /// };
    /// let mut rng = rand::thread_rng();
    /// let mut history = InnovationHistory::new(&config);
    /// let mut individual = Individual::new(0, Genome::completely_connected(&config, &mut rng));
    ///
    /// individual.mutate(10, false, &mut history, &config, &mut rng);
    ///
    /// assert_eq!(individual.genome().hidden_neurons().count(), 2);
    /// ```
    pub fn mutate<R: Rng + ?Sized>(
        &mut self,
        rolls: usize,
        repeat: bool,
        history: &mut InnovationHistory,
        config: &GeneticConfig,
        rng: &mut R,
    ) {
        if !repeat {
            self.budget = MutationBudget::default();
        }
        let distribution = operator_distribution(config);
        for _ in 0..rolls {
            let operator = draw_operator(distribution.as_ref(), rng);
            self.apply(operator, history, config, rng);
        }
    }

    /// Applies a single operator. Returns the
    /// operator that actually took effect.
    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        operator: Mutation,
        history: &mut InnovationHistory,
        config: &GeneticConfig,
        rng: &mut R,
    ) -> Mutation {
        match operator {
            Mutation::Weight => self.mutate_change_weight(config, rng),
            Mutation::Bias => self.mutate_change_bias(config, rng),
            Mutation::AddNeuron => self.mutate_add_neuron(history, config, rng),
            Mutation::AddLink => self.mutate_add_link(config, rng),
            Mutation::Activation => self.mutate_change_activation(config, rng),
            Mutation::DisableLink => self.mutate_disable_link(config, rng),
        }
    }

    /// Reinitializes a random enabled link's weight with
    /// probability [`extreme_mutation_chance`], and otherwise
    /// nudges it by up to ±[`mutation_speed`]. Falls back to
    /// a bias mutation if no link is enabled.
    ///
    /// [`extreme_mutation_chance`]: GeneticConfig::extreme_mutation_chance
    /// [`mutation_speed`]: GeneticConfig::mutation_speed
    pub fn mutate_change_weight<R: Rng + ?Sized>(&mut self, config: &GeneticConfig, rng: &mut R) -> Mutation {
        let (input, output) = match self.genome.random_enabled_link(rng) {
            Some(endpoints) => endpoints,
            None => return self.mutate_change_bias(config, rng),
        };
        if rng.gen::<f32>() < config.extreme_mutation_chance {
            self.genome.reinitialize_link_with_xavier(input, output, rng);
        } else if let Some(link) = self.genome.find_link_mut(input, output) {
            link.set_weight(link.weight() + rng.gen_range(-1.0..=1.0) * config.mutation_speed);
        }
        Mutation::Weight
    }

    /// Same policy as [`mutate_change_weight`](Individual::mutate_change_weight),
    /// applied to the bias of a random hidden or output neuron.
    pub fn mutate_change_bias<R: Rng + ?Sized>(&mut self, config: &GeneticConfig, rng: &mut R) -> Mutation {
        let extreme = rng.gen::<f32>() < config.extreme_mutation_chance;
        let target = self.genome.random_hidden_or_output(None, rng);
        if let Some(neuron) = target.and_then(|id| self.genome.neuron_mut(id)) {
            if extreme {
                neuron.set_bias(NeuronGene::random_bias(config.neuron_bias_start_range, rng));
            } else {
                neuron.set_bias(neuron.bias() + rng.gen_range(-1.0..=1.0) * config.mutation_speed);
            }
        }
        Mutation::Bias
    }

    /// Splits a random enabled link with a new hidden neuron.
    ///
    /// Only links whose historical split neuron is not already in
    /// the genome qualify. The link is disabled, the split neuron
    /// id is taken from (or recorded in) `history`, and the neuron
    /// is wired in with an Xavier-initialized incoming link and an
    /// outgoing link inheriting the split link's weight.
    pub fn mutate_add_neuron<R: Rng + ?Sized>(
        &mut self,
        history: &mut InnovationHistory,
        config: &GeneticConfig,
        rng: &mut R,
    ) -> Mutation {
        if self.budget.added_neurons >= config.max_neurons_per_mutation {
            return self.mutate_change_weight(config, rng);
        }
        let genome = &self.genome;
        let candidate = genome
            .enabled_links()
            .map(LinkGene::endpoints)
            .filter(|(input, output)| {
                history
                    .split_neuron(*input, *output)
                    .map_or(true, |id| genome.neuron(id).is_none())
            })
            .choose(rng);
        let (input, output) = match candidate {
            Some(endpoints) => endpoints,
            None => return self.mutate_change_weight(config, rng),
        };

        let neuron_id = history.record_split(input, output);
        let weight = match self.genome.find_link_mut(input, output) {
            Some(link) => {
                link.set_enabled(false);
                link.weight()
            }
            None => return self.mutate_change_weight(config, rng),
        };
        self.genome.add_neuron(NeuronGene::with_random_bias(
            neuron_id,
            config.neuron_bias_start_range,
            rng,
        ));
        self.genome.add_link_with_xavier(input, neuron_id, rng);
        self.genome.add_link(LinkGene::new(neuron_id, output, weight, true));
        self.budget.added_neurons += 1;
        Mutation::AddNeuron
    }

    /// Links a random input or hidden neuron to a random
    /// hidden or output neuron.
    ///
    /// An existing disabled link is re-enabled instead. Falls
    /// back to a weight mutation if the link already exists
    /// enabled, would close a cycle, or the per-call link
    /// budget is spent.
    pub fn mutate_add_link<R: Rng + ?Sized>(&mut self, config: &GeneticConfig, rng: &mut R) -> Mutation {
        let source = self.genome.random_input_or_hidden(rng);
        let target = match self.genome.random_hidden_or_output(Some(source), rng) {
            Some(target) => target,
            None => return self.mutate_change_weight(config, rng),
        };

        if let Some(link) = self.genome.find_link_mut(source, target) {
            if link.enabled() {
                return self.mutate_change_weight(config, rng);
            }
            link.set_enabled(true);
            return Mutation::AddLink;
        }

        if self.budget.added_links >= config.max_enabled_links_per_mutation
            || self.genome.creates_cycle(source, target, config)
        {
            return self.mutate_change_weight(config, rng);
        }
        self.genome.add_link_with_xavier(source, target, rng);
        self.budget.added_links += 1;
        Mutation::AddLink
    }

    /// Disables a random enabled link. Falls back to a weight
    /// mutation if none is enabled or the per-call removal
    /// budget is spent.
    pub fn mutate_disable_link<R: Rng + ?Sized>(&mut self, config: &GeneticConfig, rng: &mut R) -> Mutation {
        if self.budget.removed_links >= config.max_removed_links_per_mutation {
            return self.mutate_change_weight(config, rng);
        }
        let link = self
            .genome
            .random_enabled_link(rng)
            .and_then(|(input, output)| self.genome.find_link_mut(input, output));
        match link {
            Some(link) => {
                link.set_enabled(false);
                self.budget.removed_links += 1;
                Mutation::DisableLink
            }
            None => self.mutate_change_weight(config, rng),
        }
    }

    /// Gives a random hidden neuron a different activation
    /// function. Falls back to a weight mutation if there
    /// are no hidden neurons.
    pub fn mutate_change_activation<R: Rng + ?Sized>(
        &mut self,
        config: &GeneticConfig,
        rng: &mut R,
    ) -> Mutation {
        let hidden = self.genome.random_hidden(rng);
        match hidden.and_then(|id| self.genome.neuron_mut(id)) {
            Some(neuron) => {
                let activation: Activation = neuron.activation().random_other(rng);
                neuron.set_activation(activation);
                Mutation::Activation
            }
            None => self.mutate_change_weight(config, rng),
        }
    }
}

/// Weighted operator distribution, or `None` if the
/// configured weights cannot be normalized.
fn operator_distribution(config: &GeneticConfig) -> Option<WeightedIndex<f32>> {
    WeightedIndex::new(Mutation::ALL.iter().map(|m| m.weight_in(config))).ok()
}

fn draw_operator<R: Rng + ?Sized>(distribution: Option<&WeightedIndex<f32>>, rng: &mut R) -> Mutation {
    match distribution {
        Some(weighted) => Mutation::ALL[weighted.sample(rng)],
        None => *Mutation::UNIFORM_FALLBACK
            .iter()
            .choose(rng)
            .unwrap_or(&Mutation::Weight),
    }
}

impl PartialEq for Individual {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.fitness == other.fitness && self.genome == other.genome
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Individual")
            .field("ID", &self.id)
            .field("Fitness", &self.fitness)
            .field("Genome", &format_args!("{}", self.genome))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ahash::RandomState;
    use rand::{rngs::StdRng, SeedableRng};

    use std::collections::HashSet;
    use std::num::NonZeroUsize;

    fn config() -> GeneticConfig {
        GeneticConfig {
            input_count: NonZeroUsize::new(2).unwrap(),
            output_count: NonZeroUsize::new(1).unwrap(),
            mutation_speed: 0.5,
            neuron_bias_start_range: 1.0,
            max_enabled_links_per_mutation: 3,
            max_neurons_per_mutation: 5,
            max_removed_links_per_mutation: 1,
            cycle_detection_neuron_threshold: 10,
            cycle_detection_link_threshold: 10,
            ..GeneticConfig::zero()
        }
    }

    fn connected(config: &GeneticConfig, rng: &mut StdRng) -> Individual {
        Individual::new(0, Genome::completely_connected(config, rng))
    }

    #[test]
    fn add_neuron_rolls_respect_budget() {
        let config = GeneticConfig {
            add_neuron_mutation_prob: 1.0,
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let mut history = InnovationHistory::new(&config);
        let mut individual = connected(&config, &mut rng);

        individual.mutate(1000, false, &mut history, &config, &mut rng);

        assert_eq!(individual.genome().hidden_neurons().count(), config.max_neurons_per_mutation);
        assert_eq!(history.next_innovation(), 3 + config.max_neurons_per_mutation);
        // Every split disables one link and adds two.
        assert_eq!(individual.genome().links().filter(|l| !l.enabled()).count(), 5);
        assert_eq!(individual.genome().links().count(), 2 + 2 * 5);

        // Budgets persist across repeated calls...
        individual.mutate(10, true, &mut history, &config, &mut rng);
        assert_eq!(individual.genome().hidden_neurons().count(), 5);
        // ...and are reset otherwise.
        individual.mutate(10, false, &mut history, &config, &mut rng);
        assert_eq!(individual.genome().hidden_neurons().count(), 10);
    }

    #[test]
    fn identical_splits_reuse_history() {
        let config = GeneticConfig {
            input_count: NonZeroUsize::new(1).unwrap(),
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(4);
        let mut history = InnovationHistory::new(&config);
        let mut first = connected(&config, &mut rng);
        let mut second = Individual::new(1, first.genome().clone());

        assert_eq!(first.mutate_add_neuron(&mut history, &config, &mut rng), Mutation::AddNeuron);
        assert_eq!(second.mutate_add_neuron(&mut history, &config, &mut rng), Mutation::AddNeuron);
        assert!(first.genome().neuron(2).is_some());
        assert!(second.genome().neuron(2).is_some());
        assert_eq!(history.next_innovation(), 3);

        // The split link is disabled and bypassed.
        let split = first.genome().find_link(0, 1).unwrap();
        assert!(!split.enabled());
        assert_eq!(first.genome().find_link(2, 1).unwrap().weight(), split.weight());
    }

    #[test]
    fn add_link_never_duplicates() {
        let config = GeneticConfig {
            add_link_mutation_prob: 1.0,
            add_neuron_mutation_prob: 1.0,
            disable_link_mutation_prob: 0.5,
            max_enabled_links_per_mutation: 100,
            max_removed_links_per_mutation: 100,
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut history = InnovationHistory::new(&config);
        let mut individual = Individual::new(0, Genome::new(&config, &mut rng));

        for _ in 0..50 {
            individual.mutate(20, false, &mut history, &config, &mut rng);
            let mut seen: HashSet<_, RandomState> = HashSet::default();
            for link in individual.genome().links() {
                assert!(seen.insert(link.endpoints()), "duplicate link in {}", individual);
            }
        }
    }

    #[test]
    fn add_link_re_enables_disabled_links() {
        let config = GeneticConfig {
            input_count: NonZeroUsize::new(1).unwrap(),
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(6);
        let mut individual = connected(&config, &mut rng);
        individual.genome_mut().find_link_mut(0, 1).unwrap().set_enabled(false);

        // With one input and one output, the only candidate is 0 -> 1.
        assert_eq!(individual.mutate_add_link(&config, &mut rng), Mutation::AddLink);
        assert!(individual.genome().find_link(0, 1).unwrap().enabled());
        assert_eq!(individual.genome().links().count(), 1);

        // Now it exists enabled, so the roll becomes a weight mutation.
        assert_eq!(individual.mutate_add_link(&config, &mut rng), Mutation::Weight);
    }

    #[test]
    fn fallbacks_always_mutate_something() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(7);
        let mut history = InnovationHistory::new(&config);
        let mut individual = Individual::new(0, Genome::new(&config, &mut rng));

        // No links and no hidden neurons: everything lands on bias.
        assert_eq!(individual.mutate_change_weight(&config, &mut rng), Mutation::Bias);
        assert_eq!(individual.mutate_change_activation(&config, &mut rng), Mutation::Bias);
        assert_eq!(individual.mutate_disable_link(&config, &mut rng), Mutation::Bias);
        assert_eq!(individual.mutate_add_neuron(&mut history, &config, &mut rng), Mutation::Bias);
    }

    #[test]
    fn disable_link_budget() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(8);
        let mut individual = connected(&config, &mut rng);

        assert_eq!(individual.mutate_disable_link(&config, &mut rng), Mutation::DisableLink);
        assert_eq!(individual.mutate_disable_link(&config, &mut rng), Mutation::Weight);
        assert_eq!(individual.genome().enabled_links().count(), 1);
    }

    #[test]
    fn activation_mutation_changes_hidden_neuron() {
        let config = config();
        let mut rng = StdRng::seed_from_u64(9);
        let mut history = InnovationHistory::new(&config);
        let mut individual = connected(&config, &mut rng);
        individual.mutate_add_neuron(&mut history, &config, &mut rng);

        for _ in 0..10 {
            let before = individual.genome().hidden_neurons().next().unwrap().activation();
            assert_eq!(individual.mutate_change_activation(&config, &mut rng), Mutation::Activation);
            let after = individual.genome().hidden_neurons().next().unwrap().activation();
            assert_ne!(before, after);
        }
    }

    #[test]
    fn extreme_weight_mutation_stays_in_xavier_bound() {
        let config = GeneticConfig {
            extreme_mutation_chance: 1.0,
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(10);
        let mut individual = connected(&config, &mut rng);
        for _ in 0..100 {
            individual.mutate_change_weight(&config, &mut rng);
            assert!(individual.genome().links().all(|l| l.weight().abs() <= 0.1));
        }
    }

    #[test]
    fn zero_weights_draw_uniformly_from_core_operators() {
        let mut rng = StdRng::seed_from_u64(11);
        let distribution = operator_distribution(&config());
        assert!(distribution.is_none());

        let mut drawn: HashSet<Mutation, RandomState> = HashSet::default();
        for _ in 0..1000 {
            drawn.insert(draw_operator(distribution.as_ref(), &mut rng));
        }
        assert_eq!(drawn.len(), 5);
        assert!(!drawn.contains(&Mutation::DisableLink));
    }

    #[test]
    fn weighted_draws_follow_config() {
        let mut rng = StdRng::seed_from_u64(12);
        let config = GeneticConfig {
            disable_link_mutation_prob: 2.0,
            ..config()
        };
        let distribution = operator_distribution(&config);
        for _ in 0..100 {
            assert_eq!(draw_operator(distribution.as_ref(), &mut rng), Mutation::DisableLink);
        }
    }
}
