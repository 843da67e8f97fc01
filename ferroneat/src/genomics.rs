//! Genomes are the focus of evolution in NEAT.
//! They are a directed graph of neurons and links that is
//! evaluated directly as a neural network. Genomes can be
//! progressively mutated, thus adding complexity and functionality.

mod activation;
mod config;
mod errors;
mod history;
mod links;
mod neurons;

pub use activation::{Activation, UnknownActivation};
pub use config::GeneticConfig;
pub use errors::GenomeError;
pub use history::InnovationHistory;
pub use links::LinkGene;
pub use neurons::NeuronGene;

use crate::NeuronId;

use ahash::RandomState;
use rand::prelude::{IteratorRandom, Rng};
use serde::{Deserialize, Serialize};

use std::collections::{HashMap, HashSet, VecDeque};
use std::convert::TryFrom;
use std::fmt;
use std::num::NonZeroUsize;

/// Largest `f32` below 1. Outputs are clamped to it, since
/// `f32::tanh` saturates to exactly 1 for inputs above about 9.
const MAX_OUTPUT: f32 = 1.0 - f32::EPSILON / 2.0;

/// A directed graph of neurons and links.
///
/// Neurons are kept in insertion order: ids `0..input_count`
/// are the inputs, the next `output_count` ids are the outputs,
/// and hidden neurons follow. Links are kept in an order that
/// approximates a topological one, as each new link is placed
/// right after the last link feeding its source. Propagation is
/// a single pass over that order.
///
/// Suports Serde for convenient genome saving and loading.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "GenomeRecord", into = "GenomeRecord")]
pub struct Genome {
    input_count: NonZeroUsize,
    output_count: NonZeroUsize,
    neurons: Vec<NeuronGene>,
    links: Vec<LinkGene>,
    neuron_index: HashMap<NeuronId, usize, RandomState>,
    link_pairs: HashSet<(NeuronId, NeuronId), RandomState>,
    adjacency: HashMap<NeuronId, Vec<NeuronId>, RandomState>,
}

impl Genome {
    /// Creates a new genome with the configured number of
    /// input and output neurons and no links. Neuron biases
    /// are drawn uniformly from ±[`neuron_bias_start_range`].
    ///
    /// [`neuron_bias_start_range`]: GeneticConfig::neuron_bias_start_range
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::{GeneticConfig, Genome};
    /// use std::num::NonZeroUsize;
    ///
    /// let config = GeneticConfig {
    ///     input_count: NonZeroUsize::new(3).unwrap(),
    ///     output_count: NonZeroUsize::new(2).unwrap(),
    ///     neuron_bias_start_range: 1.0,
    ///     ..GeneticConfig::zero()
    /// };
    ///
    /// let genome = Genome::new(&config, &mut rand::thread_rng());
    ///
    /// assert_eq!(genome.neurons().count(), 3 + 2);
    /// assert_eq!(genome.links().count(), 0);
    /// assert!(genome.neurons().all(|n| n.bias().abs() <= 1.0));
    /// ```
    pub fn new<R: Rng + ?Sized>(config: &GeneticConfig, rng: &mut R) -> Genome {
        Self::with_shape(
            config.input_count,
            config.output_count,
            config.neuron_bias_start_range,
            rng,
        )
    }

    /// Creates a new genome with every input linked to
    /// every output. Link weights use Xavier initialization.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::{GeneticConfig, Genome};
    /// use std::num::NonZeroUsize;
    ///
    /// let config = GeneticConfig {
    ///     input_count: NonZeroUsize::new(2).unwrap(),
    ///     output_count: NonZeroUsize::new(1).unwrap(),
    ///     ..GeneticConfig::zero()
    /// };
    ///
    /// let genome = Genome::completely_connected(&config, &mut rand::thread_rng());
    ///
    /// assert_eq!(genome.neurons().count(), 3);
    /// assert_eq!(genome.links().count(), 2);
    /// assert!(genome.links().all(|l| l.enabled()));
    /// ```
    pub fn completely_connected<R: Rng + ?Sized>(config: &GeneticConfig, rng: &mut R) -> Genome {
        let mut genome = Self::new(config, rng);
        let input_count = genome.input_count.get();
        for output in input_count..input_count + genome.output_count.get() {
            for input in 0..input_count {
                genome.add_link_with_xavier(input, output, rng);
            }
        }
        genome
    }

    pub(crate) fn with_shape<R: Rng + ?Sized>(
        input_count: NonZeroUsize,
        output_count: NonZeroUsize,
        bias_range: f32,
        rng: &mut R,
    ) -> Genome {
        let neuron_count = input_count.get() + output_count.get();
        let neurons: Vec<NeuronGene> = (0..neuron_count)
            .map(|id| NeuronGene::with_random_bias(id, bias_range, rng))
            .collect();
        Genome {
            input_count,
            output_count,
            neuron_index: (0..neuron_count).map(|id| (id, id)).collect(),
            neurons,
            links: vec![],
            link_pairs: HashSet::default(),
            adjacency: HashMap::default(),
        }
    }

    /// Add a new neuron to the genome.
    /// Returns a reference to the newly added neuron.
    ///
    /// # Panics
    ///
    /// This function panics if a neuron of the
    /// same id already existed in the genome.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::{Activation, GeneticConfig, Genome, NeuronGene};
    ///
    /// let mut genome = Genome::new(&GeneticConfig::zero(), &mut rand::thread_rng());
    /// genome.add_neuron(NeuronGene::new(42, 0.0, Activation::Tanh));
    ///
    /// assert_eq!(genome.hidden_neurons().count(), 1);
    /// assert_eq!(genome.neuron(42).unwrap().activation(), Activation::Tanh);
    /// ```
    pub fn add_neuron(&mut self, neuron: NeuronGene) -> &mut NeuronGene {
        if self.neuron_index.contains_key(&neuron.id()) {
            panic!("{} in {}", GenomeError::DuplicateNeuron(neuron.id()), self);
        }
        self.neuron_index.insert(neuron.id(), self.neurons.len());
        self.neurons.push(neuron);
        let last = self.neurons.len() - 1;
        &mut self.neurons[last]
    }

    /// Add a new link to the genome.
    /// Returns a reference to the newly added link.
    ///
    /// The link is inserted right after the last link
    /// whose output is the new link's input, or at the
    /// front if there is none.
    ///
    /// # Panics
    ///
    /// This function panics if either endpoint is missing,
    /// or if a link with the same endpoints already exists.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::{GeneticConfig, Genome, LinkGene};
    /// use std::num::NonZeroUsize;
    ///
    /// let config = GeneticConfig {
    ///     input_count: NonZeroUsize::new(2).unwrap(),
    ///     ..GeneticConfig::zero()
    /// };
    /// let mut genome = Genome::new(&config, &mut rand::thread_rng());
    /// genome.add_link(LinkGene::new(0, 2, 1.5, true));
    ///
    /// assert_eq!(genome.find_link(0, 2).unwrap().weight(), 1.5);
    /// ```
    pub fn add_link(&mut self, link: LinkGene) -> &mut LinkGene {
        self.check_link_viability(link.input(), link.output())
            .unwrap_or_else(|e| panic!("{} in {}", e, self));
        let (input, output) = link.endpoints();
        let position = self
            .links
            .iter()
            .rposition(|l| l.output() == input)
            .map_or(0, |p| p + 1);
        self.links.insert(position, link);
        self.link_pairs.insert((input, output));
        self.adjacency.entry(input).or_default().push(output);
        &mut self.links[position]
    }

    fn check_link_viability(&self, input: NeuronId, output: NeuronId) -> Result<(), GenomeError> {
        if !(self.neuron_index.contains_key(&input) && self.neuron_index.contains_key(&output)) {
            Err(GenomeError::NonexistentEndpoint(input, output))
        } else if self.link_pairs.contains(&(input, output)) {
            Err(GenomeError::DuplicateLink(input, output))
        } else {
            Ok(())
        }
    }

    /// Adds an enabled link with a Xavier-initialized weight.
    ///
    /// # Panics
    ///
    /// Under the same conditions as [`add_link`](Genome::add_link).
    pub fn add_link_with_xavier<R: Rng + ?Sized>(
        &mut self,
        input: NeuronId,
        output: NeuronId,
        rng: &mut R,
    ) -> &mut LinkGene {
        let weight = self.xavier_weight(input, output, rng);
        self.add_link(LinkGene::new(input, output, weight, true))
    }

    /// Draws a fresh Xavier-initialized weight for an
    /// existing link. Does nothing if the link is absent.
    pub fn reinitialize_link_with_xavier<R: Rng + ?Sized>(
        &mut self,
        input: NeuronId,
        output: NeuronId,
        rng: &mut R,
    ) {
        let weight = self.xavier_weight(input, output, rng);
        if let Some(link) = self.find_link_mut(input, output) {
            link.set_weight(weight);
        }
    }

    /// Uniform Glorot weight for a link `input -> output`. Fan-in
    /// counts links terminating at the link's source; fan-out counts
    /// links already leaving its target.
    fn xavier_weight<R: Rng + ?Sized>(&self, input: NeuronId, output: NeuronId, rng: &mut R) -> f32 {
        let fan_in = self.links.iter().filter(|l| l.output() == input).count();
        let fan_out = self.adjacency.get(&output).map_or(0, Vec::len);
        let bound = if fan_in + fan_out == 0 {
            0.1
        } else {
            (6.0 / (fan_in + fan_out) as f32).sqrt()
        };
        bound * rng.gen_range(-1.0..=1.0)
    }

    /// Evaluates the genome on `inputs`, returning one
    /// value per output neuron, each in the range `(-1, 1)`.
    ///
    /// Every neuron starts at its bias. Links are walked
    /// in stored order; the first time a neuron is read
    /// through a link, ReLU is applied to its value.
    /// Outputs are read through `tanh`.
    ///
    /// # Panics
    ///
    /// This function panics if `inputs.len()` differs from
    /// the genome's input count.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::{GeneticConfig, Genome};
    /// use std::num::NonZeroUsize;
    ///
    /// let config = GeneticConfig {
    ///     input_count: NonZeroUsize::new(2).unwrap(),
    ///     output_count: NonZeroUsize::new(3).unwrap(),
    ///     ..GeneticConfig::zero()
    /// };
    /// let genome = Genome::completely_connected(&config, &mut rand::thread_rng());
    ///
    /// let outputs = genome.propagate(&[0.5, -1.0]);
    /// assert_eq!(outputs.len(), 3);
    /// assert!(outputs.iter().all(|o| o.abs() < 1.0));
    /// ```
    pub fn propagate(&self, inputs: &[f32]) -> Vec<f32> {
        self.check_input_length(inputs)
            .unwrap_or_else(|e| panic!("{} in {}", e, self));
        let mut values: Vec<f32> = self.neurons.iter().map(NeuronGene::bias).collect();
        let mut activated = vec![false; self.neurons.len()];
        values[..inputs.len()].copy_from_slice(inputs);
        activated[..inputs.len()].fill(true);

        for link in self.links.iter().filter(|l| l.enabled()) {
            let source = self.neuron_index[&link.input()];
            let target = self.neuron_index[&link.output()];
            if !activated[source] {
                activated[source] = true;
                values[source] = Activation::ReLU.apply(values[source]);
            }
            values[target] += values[source] * link.weight();
        }

        let input_count = self.input_count.get();
        values[input_count..input_count + self.output_count.get()]
            .iter()
            .map(|v| v.tanh().clamp(-MAX_OUTPUT, MAX_OUTPUT))
            .collect()
    }

    /// Evaluates a single output, visiting only the links
    /// that can reach it. Each neuron applies its own
    /// activation function when first read, and the output
    /// is read through a sigmoid.
    ///
    /// # Panics
    ///
    /// This function panics if `inputs.len()` differs from
    /// the genome's input count, or if `output_index` is not
    /// below the output count.
    pub fn special_propagate(&self, inputs: &[f32], output_index: usize) -> f32 {
        self.check_input_length(inputs)
            .unwrap_or_else(|e| panic!("{} in {}", e, self));
        assert!(
            output_index < self.output_count.get(),
            "output index {} out of range for {} outputs",
            output_index,
            self.output_count
        );
        let target = self.input_count.get() + output_index;

        // Walk backwards collecting every link that feeds the target.
        let mut involved: HashSet<NeuronId, RandomState> = HashSet::default();
        involved.insert(target);
        let mut subset = vec![];
        for link in self.links.iter().rev() {
            if link.enabled() && involved.contains(&link.output()) {
                involved.insert(link.input());
                subset.push(link);
            }
        }

        let mut values: Vec<f32> = self.neurons.iter().map(NeuronGene::bias).collect();
        let mut activated = vec![false; self.neurons.len()];
        values[..inputs.len()].copy_from_slice(inputs);
        activated[..inputs.len()].fill(true);

        for link in subset.into_iter().rev() {
            let source = self.neuron_index[&link.input()];
            let sink = self.neuron_index[&link.output()];
            if !activated[source] {
                activated[source] = true;
                values[source] = self.neurons[source].activate(values[source]);
            }
            values[sink] += values[source] * link.weight();
        }

        Activation::Sigmoid.apply(values[self.neuron_index[&target]])
    }

    fn check_input_length(&self, inputs: &[f32]) -> Result<(), GenomeError> {
        if inputs.len() == self.input_count.get() {
            Ok(())
        } else {
            Err(GenomeError::InputLength {
                expected: self.input_count.get(),
                found: inputs.len(),
            })
        }
    }

    /// Returns whether adding the link `input -> output` would
    /// close a cycle, i.e. whether `input` is already reachable
    /// from `output`.
    ///
    /// Small graphs are searched depth-first and large ones
    /// breadth-first, as set by [`cycle_detection_neuron_threshold`]
    /// and [`cycle_detection_link_threshold`].
    ///
    /// [`cycle_detection_neuron_threshold`]: GeneticConfig::cycle_detection_neuron_threshold
    /// [`cycle_detection_link_threshold`]: GeneticConfig::cycle_detection_link_threshold
    pub fn creates_cycle(&self, input: NeuronId, output: NeuronId, config: &GeneticConfig) -> bool {
        if self.neurons.len() > config.cycle_detection_neuron_threshold
            || self.links.len() > config.cycle_detection_link_threshold
        {
            self.has_path_bfs(output, input)
        } else {
            self.has_path_dfs(output, input)
        }
    }

    fn has_path_bfs(&self, from: NeuronId, to: NeuronId) -> bool {
        let mut visited: HashSet<NeuronId, RandomState> = HashSet::default();
        let mut queue = VecDeque::from([from]);
        visited.insert(from);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            for next in self.adjacency.get(&current).into_iter().flatten() {
                if visited.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }
        false
    }

    fn has_path_dfs(&self, from: NeuronId, to: NeuronId) -> bool {
        let mut visited: HashSet<NeuronId, RandomState> = HashSet::default();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(
                self.adjacency
                    .get(&current)
                    .into_iter()
                    .flatten()
                    .filter(|n| !visited.contains(*n)),
            );
        }
        false
    }

    /// Counts the neurons of `other` whose id is greater than
    /// the highest neuron id in `self`.
    pub fn excess_neurons(&self, other: &Genome) -> usize {
        let max_id = self.max_neuron_id();
        other.neurons.iter().filter(|n| n.id() > max_id).count()
    }

    /// Counts the neurons present in one genome, at an id no
    /// greater than the other genome's highest id, but absent
    /// from the other genome. Both directions are counted.
    pub fn disjoint_neurons(&self, other: &Genome) -> usize {
        self.neurons_missing_from(other) + other.neurons_missing_from(self)
    }

    fn neurons_missing_from(&self, other: &Genome) -> usize {
        let other_max_id = other.max_neuron_id();
        self.neurons
            .iter()
            .filter(|n| n.id() <= other_max_id && !other.neuron_index.contains_key(&n.id()))
            .count()
    }

    /// Returns the mean absolute weight difference over links
    /// present in both genomes, or 0 if they share none.
    pub fn average_weight_difference(&self, other: &Genome) -> f32 {
        let (count, total) = self
            .links
            .iter()
            .filter_map(|l| {
                other
                    .find_link(l.input(), l.output())
                    .map(|o| (l.weight() - o.weight()).abs())
            })
            .fold((0usize, 0.0f32), |(count, total), diff| (count + 1, total + diff));
        if count == 0 {
            0.0
        } else {
            total / count as f32
        }
    }

    /// Returns the genome's size, as its neuron
    /// count plus its enabled link count.
    pub fn complexity(&self) -> usize {
        self.neurons.len() + self.enabled_links().count()
    }

    /// Returns the highest neuron id in the genome.
    pub fn max_neuron_id(&self) -> NeuronId {
        self.neurons.iter().map(NeuronGene::id).max().unwrap_or(0)
    }

    /// Returns the number of input neurons.
    pub fn input_count(&self) -> NonZeroUsize {
        self.input_count
    }

    /// Returns the number of output neurons.
    pub fn output_count(&self) -> NonZeroUsize {
        self.output_count
    }

    /// Returns an iterator over all neurons, in insertion order.
    pub fn neurons(&self) -> impl Iterator<Item = &NeuronGene> {
        self.neurons.iter()
    }

    /// Returns an iterator over the output neurons.
    pub fn output_neurons(&self) -> impl Iterator<Item = &NeuronGene> {
        let input_count = self.input_count.get();
        self.neurons[input_count..input_count + self.output_count.get()].iter()
    }

    /// Returns an iterator over the hidden neurons, in insertion order.
    pub fn hidden_neurons(&self) -> impl Iterator<Item = &NeuronGene> {
        self.neurons[self.input_count.get() + self.output_count.get()..].iter()
    }

    /// Returns an iterator over all links, in propagation order.
    pub fn links(&self) -> impl Iterator<Item = &LinkGene> {
        self.links.iter()
    }

    /// Returns an iterator over the enabled links.
    pub fn enabled_links(&self) -> impl Iterator<Item = &LinkGene> {
        self.links.iter().filter(|l| l.enabled())
    }

    /// Returns the neuron with the given id, if present.
    pub fn neuron(&self, id: NeuronId) -> Option<&NeuronGene> {
        self.neuron_index.get(&id).map(|i| &self.neurons[*i])
    }

    /// Returns the neuron with the given id mutably, if present.
    pub fn neuron_mut(&mut self, id: NeuronId) -> Option<&mut NeuronGene> {
        let i = *self.neuron_index.get(&id)?;
        Some(&mut self.neurons[i])
    }

    /// Returns the link `input -> output`, if present.
    pub fn find_link(&self, input: NeuronId, output: NeuronId) -> Option<&LinkGene> {
        if !self.link_pairs.contains(&(input, output)) {
            return None;
        }
        self.links.iter().find(|l| l.endpoints() == (input, output))
    }

    /// Returns the link `input -> output` mutably, if present.
    pub fn find_link_mut(&mut self, input: NeuronId, output: NeuronId) -> Option<&mut LinkGene> {
        if !self.link_pairs.contains(&(input, output)) {
            return None;
        }
        self.links.iter_mut().find(|l| l.endpoints() == (input, output))
    }

    /// Returns whether `id` is an output neuron.
    pub fn is_output(&self, id: NeuronId) -> bool {
        let input_count = self.input_count.get();
        (input_count..input_count + self.output_count.get()).contains(&id)
    }

    /// Picks the endpoints of a random enabled link.
    pub(crate) fn random_enabled_link<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(NeuronId, NeuronId)> {
        self.enabled_links().map(LinkGene::endpoints).choose(rng)
    }

    /// Picks a random input or hidden neuron.
    pub(crate) fn random_input_or_hidden<R: Rng + ?Sized>(&self, rng: &mut R) -> NeuronId {
        let input_count = self.input_count.get();
        let hidden_start = input_count + self.output_count.get();
        let candidates = input_count + self.neurons.len() - hidden_start;
        let pick = rng.gen_range(0..candidates);
        if pick < input_count {
            self.neurons[pick].id()
        } else {
            self.neurons[hidden_start + pick - input_count].id()
        }
    }

    /// Picks a random hidden or output neuron, other than `excluded` if given.
    pub(crate) fn random_hidden_or_output<R: Rng + ?Sized>(
        &self,
        excluded: Option<NeuronId>,
        rng: &mut R,
    ) -> Option<NeuronId> {
        self.neurons[self.input_count.get()..]
            .iter()
            .map(NeuronGene::id)
            .filter(|id| Some(*id) != excluded)
            .choose(rng)
    }

    /// Picks a random hidden neuron.
    pub(crate) fn random_hidden<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<NeuronId> {
        self.hidden_neurons().map(NeuronGene::id).choose(rng)
    }
}

impl PartialEq for Genome {
    /// Genomes are equal if their shape, neurons and
    /// links (in order) are equal. Lookup caches are
    /// not compared.
    fn eq(&self, other: &Self) -> bool {
        self.input_count == other.input_count
            && self.output_count == other.output_count
            && self.neurons == other.neurons
            && self.links == other.links
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Genome")
            .field("Inputs", &self.input_count)
            .field("Outputs", &self.output_count)
            .field(
                "Neurons",
                &self.neurons.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
            )
            .field(
                "Links",
                &self.links.iter().map(|l| l.to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Serialized form of a `Genome`. Caches are rebuilt, and
/// structure validated, on deserialization.
#[derive(Serialize, Deserialize)]
struct GenomeRecord {
    input_count: NonZeroUsize,
    output_count: NonZeroUsize,
    neurons: Vec<NeuronGene>,
    links: Vec<LinkGene>,
}

impl From<Genome> for GenomeRecord {
    fn from(genome: Genome) -> Self {
        GenomeRecord {
            input_count: genome.input_count,
            output_count: genome.output_count,
            neurons: genome.neurons,
            links: genome.links,
        }
    }
}

impl TryFrom<GenomeRecord> for Genome {
    type Error = GenomeError;

    fn try_from(record: GenomeRecord) -> Result<Self, Self::Error> {
        let fixed = record.input_count.get() + record.output_count.get();
        if record.neurons.len() < fixed {
            return Err(GenomeError::MalformedGenome(format!(
                "{} neurons cannot hold {} inputs and outputs",
                record.neurons.len(),
                fixed
            )));
        }
        if let Some((i, n)) = record.neurons[..fixed]
            .iter()
            .enumerate()
            .find(|(i, n)| n.id() != *i)
        {
            return Err(GenomeError::MalformedGenome(format!(
                "neuron at position {} has id {}",
                i,
                n.id()
            )));
        }

        let mut neuron_index: HashMap<NeuronId, usize, RandomState> = HashMap::default();
        for (i, neuron) in record.neurons.iter().enumerate() {
            if neuron_index.insert(neuron.id(), i).is_some() {
                return Err(GenomeError::DuplicateNeuron(neuron.id()));
            }
        }

        let mut link_pairs: HashSet<(NeuronId, NeuronId), RandomState> = HashSet::default();
        let mut adjacency: HashMap<NeuronId, Vec<NeuronId>, RandomState> = HashMap::default();
        for link in &record.links {
            let (input, output) = link.endpoints();
            if !(neuron_index.contains_key(&input) && neuron_index.contains_key(&output)) {
                return Err(GenomeError::NonexistentEndpoint(input, output));
            }
            if !link_pairs.insert((input, output)) {
                return Err(GenomeError::DuplicateLink(input, output));
            }
            adjacency.entry(input).or_default().push(output);
        }

        Ok(Genome {
            input_count: record.input_count,
            output_count: record.output_count,
            neurons: record.neurons,
            links: record.links,
            neuron_index,
            link_pairs,
            adjacency,
        })
    }
}
