//! Fitness evaluation of a population's individuals.
//!
//! A population hands each generation's genomes to a
//! [`FitnessComputer`] as an [`EvaluationRound`]. The computer
//! evaluates the round's tasks in whatever order and on whatever
//! threads it likes, and each task reports its result exactly
//! once. The population blocks on the round's [`RoundCompletion`]
//! until every task has reported.
mod pool;
mod pooled;

pub use pool::{PoolError, WorkerPool};
pub use pooled::{EvaluatorError, PooledFitnessComputer};

use crate::genomics::Genome;

use log::{error, warn};

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Errors raised when starting an evaluation round.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// The previous round has not completed yet.
    #[error("an evaluation round is already in progress")]
    RoundInProgress,
    /// The underlying worker pool failed.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// A source of fitness scores for a population.
pub trait FitnessComputer {
    /// Begins evaluating every task in `round` and returns
    /// without waiting for the results. Each task must
    /// eventually be reported, or dropped, which reports
    /// it as failed.
    fn start(&mut self, round: EvaluationRound) -> Result<(), EvaluationError>;

    /// Aborts any ongoing work and releases resources.
    fn stop(&mut self);
}

/// The genomes of one generation, awaiting evaluation.
pub struct EvaluationRound {
    tasks: Vec<EvaluationTask>,
    barrier: Arc<RoundBarrier>,
}

impl EvaluationRound {
    /// Creates a round with one task per `(individual id, genome)`
    /// pair. Results are returned in the same order.
    ///
    /// # Examples
    /// ```
    /// use ferroneat::evaluation::EvaluationRound;
    /// use ferroneat::genomics::{GeneticConfig, Genome};
    /// use std::sync::Arc;
    ///
    /// let genome = Arc::new(Genome::new(&GeneticConfig::zero(), &mut rand::thread_rng()));
    /// let round = EvaluationRound::new(vec![(0, Arc::clone(&genome)), (1, genome)]);
    /// let completion = round.completion();
    ///
    /// for (i, task) in round.into_tasks().into_iter().enumerate() {
    ///     task.report(i as f32);
    /// }
    ///
    /// assert_eq!(completion.wait(), vec![0.0, 1.0]);
    /// ```
    pub fn new(genomes: impl IntoIterator<Item = (usize, Arc<Genome>)>) -> EvaluationRound {
        let genomes: Vec<_> = genomes.into_iter().collect();
        let barrier = Arc::new(RoundBarrier::new(genomes.len()));
        let tasks = genomes
            .into_iter()
            .enumerate()
            .map(|(slot, (individual_id, genome))| EvaluationTask {
                slot,
                individual_id,
                genome,
                barrier: Arc::clone(&barrier),
                reported: false,
            })
            .collect();
        EvaluationRound { tasks, barrier }
    }

    /// Returns a handle for awaiting the round's results.
    pub fn completion(&self) -> RoundCompletion {
        RoundCompletion {
            barrier: Arc::clone(&self.barrier),
        }
    }

    /// Returns the number of tasks in the round.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns whether the round has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Splits the round into its tasks.
    pub fn into_tasks(self) -> Vec<EvaluationTask> {
        self.tasks
    }
}

/// A single genome to evaluate. Consumed by reporting its
/// result; a task dropped unreported counts as a failure.
pub struct EvaluationTask {
    slot: usize,
    individual_id: usize,
    genome: Arc<Genome>,
    barrier: Arc<RoundBarrier>,
    reported: bool,
}

impl EvaluationTask {
    /// Returns the id of the individual being evaluated.
    pub fn individual_id(&self) -> usize {
        self.individual_id
    }

    /// Returns the genome to evaluate.
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Reports the genome's fitness.
    pub fn report(mut self, fitness: f32) {
        self.reported = true;
        self.barrier.complete(self.slot, fitness);
    }

    /// Reports that the evaluation failed. The individual
    /// is given a fitness of 0.
    pub fn fail(mut self, reason: impl fmt::Display) {
        error!("evaluation of individual {} failed: {}", self.individual_id, reason);
        self.reported = true;
        self.barrier.complete(self.slot, 0.0);
    }
}

impl Drop for EvaluationTask {
    fn drop(&mut self) {
        if !self.reported {
            error!(
                "evaluation of individual {} failed: task dropped before reporting",
                self.individual_id
            );
            self.barrier.complete(self.slot, 0.0);
        }
    }
}

impl fmt::Debug for EvaluationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationTask")
            .field("slot", &self.slot)
            .field("individual_id", &self.individual_id)
            .finish()
    }
}

/// A handle on a round's results.
#[derive(Clone)]
pub struct RoundCompletion {
    barrier: Arc<RoundBarrier>,
}

impl RoundCompletion {
    /// Blocks until every task has reported, then
    /// returns the fitness of each task in order.
    pub fn wait(&self) -> Vec<f32> {
        self.barrier.wait()
    }

    /// Returns whether every task has reported.
    pub fn is_complete(&self) -> bool {
        let state = self.barrier.lock();
        state.completed == state.results.len()
    }

    /// Returns the number of tasks that have reported.
    pub fn completed(&self) -> usize {
        self.barrier.lock().completed
    }
}

struct RoundState {
    results: Vec<Option<f32>>,
    completed: usize,
}

struct RoundBarrier {
    state: Mutex<RoundState>,
    done: Condvar,
}

impl RoundBarrier {
    fn new(expected: usize) -> RoundBarrier {
        RoundBarrier {
            state: Mutex::new(RoundState {
                results: vec![None; expected],
                completed: 0,
            }),
            done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RoundState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the result for `slot`. Only the first
    /// report for a slot counts.
    fn complete(&self, slot: usize, fitness: f32) {
        let mut state = self.lock();
        match state.results.get_mut(slot) {
            Some(result @ None) => *result = Some(fitness),
            Some(Some(_)) => {
                warn!("ignoring duplicate report for evaluation slot {}", slot);
                return;
            }
            None => {
                warn!("ignoring report for unknown evaluation slot {}", slot);
                return;
            }
        }
        state.completed += 1;
        if state.completed == state.results.len() {
            self.done.notify_all();
        }
    }

    fn wait(&self) -> Vec<f32> {
        let mut state = self.lock();
        while state.completed < state.results.len() {
            state = self.done.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.results.iter().map(|r| r.unwrap_or(0.0)).collect()
    }
}
