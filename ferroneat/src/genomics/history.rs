use crate::genomics::GeneticConfig;
use crate::NeuronId;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use std::collections::hash_map::{Entry, HashMap};

/// An `InnovationHistory` keeps track of neuron innovations
/// in a population, in order to make sure identical
/// structural mutations are assigned the same neuron id.
///
/// A neuron innovation is identified by the link it split,
/// so two genomes splitting the same `(input, output)` link
/// independently receive the same hidden neuron id. The
/// history only ever grows: ids are never reclaimed.
///
/// The history is owned by the population and passed by
/// mutable reference into every mutation, so only one
/// mutation can touch it at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "HistoryRecord", into = "HistoryRecord")]
pub struct InnovationHistory {
    next_innovation: NeuronId,
    split_neurons: HashMap<(NeuronId, NeuronId), NeuronId, RandomState>,
}

impl InnovationHistory {
    /// Creates a new history for genomes of the configured
    /// shape. Ids `0..input_count + output_count` belong to
    /// input and output neurons, so hidden neuron ids start
    /// right after them.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::{GeneticConfig, InnovationHistory};
    /// use std::num::NonZeroUsize;
    ///
    /// let history = InnovationHistory::new(&GeneticConfig {
    ///     input_count: NonZeroUsize::new(2).unwrap(),
    ///     output_count: NonZeroUsize::new(1).unwrap(),
    ///     ..GeneticConfig::zero()
    /// });
    ///
    /// assert_eq!(history.next_innovation(), 3);
    /// ```
    pub fn new(config: &GeneticConfig) -> InnovationHistory {
        InnovationHistory {
            next_innovation: config.input_count.get() + config.output_count.get(),
            split_neurons: HashMap::default(),
        }
    }

    /// Returns the id the next new neuron innovation
    /// will receive.
    pub fn next_innovation(&self) -> NeuronId {
        self.next_innovation
    }

    /// Returns the neuron id previously assigned to splitting
    /// the link `input -> output`, if that link was ever split.
    pub fn split_neuron(&self, input: NeuronId, output: NeuronId) -> Option<NeuronId> {
        self.split_neurons.get(&(input, output)).copied()
    }

    /// Returns the neuron id for splitting the link
    /// `input -> output`, allocating and recording the next
    /// innovation id if the link has never been split before.
    pub(crate) fn record_split(&mut self, input: NeuronId, output: NeuronId) -> NeuronId {
        match self.split_neurons.entry((input, output)) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = self.next_innovation;
                entry.insert(id);
                self.next_innovation += 1;
                id
            }
        }
    }

    /// Returns an iterator over the complete record of
    /// neuron innovations, in the format
    /// `((input neuron, output neuron), new neuron)`.
    /// No ordering is guaranteed.
    pub fn split_history(&self) -> impl Iterator<Item = (&(NeuronId, NeuronId), &NeuronId)> {
        self.split_neurons.iter()
    }
}

/// Serialized form of an `InnovationHistory`. Tuple keys
/// are stored as a list, since not every format accepts them
/// as map keys.
#[derive(Serialize, Deserialize)]
struct HistoryRecord {
    next_innovation: NeuronId,
    splits: Vec<(NeuronId, NeuronId, NeuronId)>,
}

impl From<InnovationHistory> for HistoryRecord {
    fn from(history: InnovationHistory) -> Self {
        let mut splits: Vec<_> = history
            .split_neurons
            .into_iter()
            .map(|((input, output), neuron)| (input, output, neuron))
            .collect();
        splits.sort_unstable_by_key(|(.., neuron)| *neuron);
        HistoryRecord {
            next_innovation: history.next_innovation,
            splits,
        }
    }
}

impl From<HistoryRecord> for InnovationHistory {
    fn from(record: HistoryRecord) -> Self {
        let split_neurons: HashMap<_, _, RandomState> = record
            .splits
            .into_iter()
            .map(|(input, output, neuron)| ((input, output), neuron))
            .collect();
        // Never hand out an id that is already recorded.
        let next_innovation = split_neurons
            .values()
            .map(|n| n + 1)
            .fold(record.next_innovation, NeuronId::max);
        InnovationHistory {
            next_innovation,
            split_neurons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::num::NonZeroUsize;

    fn config() -> GeneticConfig {
        GeneticConfig {
            input_count: NonZeroUsize::new(3).unwrap(),
            output_count: NonZeroUsize::new(2).unwrap(),
            ..GeneticConfig::zero()
        }
    }

    #[test]
    fn identical_splits_share_an_id() {
        let mut history = InnovationHistory::new(&config());
        assert_eq!(history.split_neuron(0, 3), None);

        let first = history.record_split(0, 3);
        let second = history.record_split(1, 4);
        assert_eq!(first, 5);
        assert_eq!(second, 6);
        assert_eq!(history.record_split(0, 3), first);
        assert_eq!(history.split_neuron(0, 3), Some(first));
        assert_eq!(history.next_innovation(), 7);
    }

    #[test]
    fn serde_round_trip() {
        let mut history = InnovationHistory::new(&config());
        history.record_split(0, 3);
        history.record_split(2, 4);
        history.record_split(5, 3);

        let json = serde_json::to_string(&history).unwrap();
        let restored: InnovationHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, history);
    }
}
