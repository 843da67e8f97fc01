use super::Population;
use crate::individuals::Individual;

use serde::{Deserialize, Serialize};

use std::fmt;

/// Defines different possible reporting levels for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportingLevel {
    /// Clones the entire population.
    AllIndividuals,
    /// Clones only the population champion.
    PopulationChampion,
    /// Clones no individuals.
    NoGenomes,
}

impl Default for ReportingLevel {
    fn default() -> Self {
        ReportingLevel::NoGenomes
    }
}

/// A snapshot of a population, taken when
/// a generation's fitness has been computed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationLog {
    /// The population's generation counter at capture. The
    /// population logs after advancing the counter, so the
    /// first evaluated generation is logged as 1.
    pub generation: usize,
    pub species_count: usize,
    pub fitness: Stats,
    pub neuron_count: Stats,
    pub enabled_link_count: Stats,
    pub largest_delta: f32,
    pub highest_delta_below_threshold: f32,
    pub sample: GenerationSample,
}

impl GenerationLog {
    /// Captures the current state of `population`, cloning
    /// individuals as `reporting_level` requires.
    pub fn capture(population: &Population, reporting_level: ReportingLevel) -> GenerationLog {
        let individuals = population.individuals();
        GenerationLog {
            generation: population.generation(),
            species_count: population.species_count(),
            fitness: Stats::from(individuals.iter().map(Individual::fitness)),
            neuron_count: Stats::from(individuals.iter().map(|i| i.genome().neurons().count() as f32)),
            enabled_link_count: Stats::from(
                individuals
                    .iter()
                    .map(|i| i.genome().enabled_links().count() as f32),
            ),
            largest_delta: population.largest_delta(),
            highest_delta_below_threshold: population.highest_delta_below_threshold(),
            sample: match reporting_level {
                ReportingLevel::AllIndividuals => GenerationSample::AllIndividuals(individuals.to_vec()),
                ReportingLevel::PopulationChampion => {
                    GenerationSample::PopulationChampion(population.champion().clone())
                }
                ReportingLevel::NoGenomes => GenerationSample::None,
            },
        }
    }
}

impl fmt::Display for GenerationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Log {{\n\
            \tgeneration: {}\n\
            \tspecies_count: {}\n\
            \tfitness: {:?}\n\
            \tneuron_count: {:?}\n\
            \tenabled_link_count: {:?}\n\
            \tlargest_delta: {:.2}\n\
            \thighest_delta_below_threshold: {:.2}\n\
            }}",
            self.generation,
            self.species_count,
            self.fitness,
            self.neuron_count,
            self.enabled_link_count,
            self.largest_delta,
            self.highest_delta_below_threshold,
        )
    }
}

/// A struct for reporting basic statistical data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub maximum: f32,
    pub minimum: f32,
    pub mean: f32,
    pub median: f32,
}

impl Stats {
    /// Returns statistics about numbers in a sequence.
    /// An empty sequence yields all zeros.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::populations::logging::Stats;
    ///
    /// let stats = Stats::from([-2.0, -1.0, 0.5, 1.0, 1.5].iter().copied());
    /// assert_eq!(stats.maximum, 1.5);
    /// assert_eq!(stats.minimum, -2.0);
    /// assert_eq!(stats.mean, 0.0);
    /// assert_eq!(stats.median, 0.5);
    ///
    /// let stats = Stats::from([4.0, 1.0, 3.0, 2.0].iter().copied());
    /// assert_eq!(stats.median, 2.5);
    /// ```
    pub fn from(data: impl Iterator<Item = f32>) -> Stats {
        let mut data: Vec<f32> = data.collect();
        if data.is_empty() {
            return Stats {
                maximum: 0.0,
                minimum: 0.0,
                mean: 0.0,
                median: 0.0,
            };
        }
        let mid = data.len() / 2;
        let (mut max, mut min, mut sum) = (f32::MIN, f32::MAX, 0.0);
        for d in &data {
            max = d.max(max);
            min = d.min(min);
            sum += d;
        }
        let mean = sum / data.len() as f32;
        let even = data.len() % 2 == 0;
        let (lower, middle, _) = data.select_nth_unstable_by(mid, f32::total_cmp);
        let mut median = *middle;
        if even {
            let below = lower.iter().copied().fold(f32::MIN, f32::max);
            median = (median + below) / 2.0;
        }
        Stats {
            maximum: max,
            minimum: min,
            mean,
            median,
        }
    }
}

/// A reporting-level dependant store
/// of individuals from a population.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GenerationSample {
    /// Every individual.
    AllIndividuals(Vec<Individual>),
    /// Only the population champion.
    PopulationChampion(Individual),
    /// Empty.
    None,
}

/// A log of the evolution of a population over time.
#[derive(Clone, Debug, Default)]
pub struct EvolutionLogger {
    reporting_level: ReportingLevel,
    logs: Vec<GenerationLog>,
}

impl EvolutionLogger {
    /// Returns a logger with the appropiate reporting level.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::populations::logging::{EvolutionLogger, ReportingLevel};
    ///
    /// let logger = EvolutionLogger::new(ReportingLevel::NoGenomes);
    /// assert!(logger.last().is_none());
    /// ```
    pub fn new(reporting_level: ReportingLevel) -> EvolutionLogger {
        EvolutionLogger {
            reporting_level,
            logs: vec![],
        }
    }

    /// Store a snapshot of a population.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::genomics::GeneticConfig;
    /// use ferroneat::populations::{InitialTopology, Population, PopulationConfig};
    /// use ferroneat::populations::logging::{EvolutionLogger, GenerationSample, ReportingLevel};
    ///
    /// let mut logger = EvolutionLogger::new(ReportingLevel::PopulationChampion);
    /// let mut population = Population::new(
    ///     GeneticConfig::zero(),
    ///     PopulationConfig::zero(),
    ///     InitialTopology::CompletelyConnected,
    /// );
    ///
    /// population.evaluate_fitness(|_| 1.0);
    /// logger.log(&population);
    ///
    /// let log = logger.last().unwrap();
    /// assert_eq!(log.fitness.maximum, 1.0);
    /// assert!(matches!(log.sample, GenerationSample::PopulationChampion(_)));
    /// ```
    pub fn log(&mut self, population: &Population) {
        self.record(GenerationLog::capture(population, self.reporting_level));
    }

    pub(crate) fn record(&mut self, log: GenerationLog) {
        self.logs.push(log);
    }

    /// Returns the reporting level used for new snapshots.
    pub fn reporting_level(&self) -> ReportingLevel {
        self.reporting_level
    }

    /// Returns the latest snapshot, if any.
    pub fn last(&self) -> Option<&GenerationLog> {
        self.logs.last()
    }

    /// Iterate over all logged snapshots.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::populations::logging::{EvolutionLogger, ReportingLevel};
    ///
    /// let logger = EvolutionLogger::new(ReportingLevel::AllIndividuals);
    /// // Log some stuff... then
    /// for log in logger.iter() {
    ///     println!("{}", log);
    /// }
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = &GenerationLog> {
        self.logs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_single_value() {
        let stats = Stats::from(std::iter::once(3.0));
        assert_eq!(
            stats,
            Stats {
                maximum: 3.0,
                minimum: 3.0,
                mean: 3.0,
                median: 3.0
            }
        );
    }

    #[test]
    fn even_median_averages_middle_values() {
        let stats = Stats::from([10.0, -4.0, 7.0, 1.0, 2.0, 100.0].iter().copied());
        assert_eq!(stats.median, 4.5);
        assert_eq!(stats.maximum, 100.0);
        assert_eq!(stats.minimum, -4.0);
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = Stats::from(std::iter::empty());
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.median, 0.0);
    }
}
