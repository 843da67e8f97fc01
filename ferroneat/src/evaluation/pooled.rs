//! A fitness computer backed by a [`WorkerPool`].
use super::{EvaluationError, EvaluationRound, FitnessComputer, RoundCompletion, WorkerPool};
use crate::genomics::Genome;

use log::debug;

use std::error::Error;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Error type returned by fitness evaluators.
pub type EvaluatorError = Box<dyn Error + Send + Sync>;

/// A [`FitnessComputer`] that runs an evaluation function
/// over a long-lived [`WorkerPool`].
///
/// The pool is created on the first round and reused by later
/// ones. Only one round may be in flight at a time. Evaluator
/// errors and panics are logged, and the individual is given a
/// fitness of 0.
///
/// # Examples
/// ```
/// use ferroneat::evaluation::{EvaluationRound, FitnessComputer, PooledFitnessComputer};
/// use ferroneat::genomics::{GeneticConfig, Genome};
/// use std::num::NonZeroUsize;
/// use std::sync::Arc;
///
/// let mut computer = PooledFitnessComputer::new(NonZeroUsize::new(2).unwrap(), |genome: &Genome| {
///     Ok(genome.neurons().count() as f32)
/// });
///
/// let genome = Arc::new(Genome::new(&GeneticConfig::zero(), &mut rand::thread_rng()));
/// let round = EvaluationRound::new(vec![(0, genome)]);
/// let completion = round.completion();
/// computer.start(round).unwrap();
///
/// assert_eq!(completion.wait(), vec![2.0]);
/// computer.stop();
/// ```
pub struct PooledFitnessComputer<F> {
    evaluator: Arc<F>,
    pool_size: NonZeroUsize,
    pool: Option<WorkerPool>,
    in_flight: Option<RoundCompletion>,
}

impl<F> PooledFitnessComputer<F>
where
    F: Fn(&Genome) -> Result<f32, EvaluatorError> + Send + Sync + 'static,
{
    /// Creates a computer running `evaluator` on `pool_size` threads.
    pub fn new(pool_size: NonZeroUsize, evaluator: F) -> PooledFitnessComputer<F> {
        PooledFitnessComputer {
            evaluator: Arc::new(evaluator),
            pool_size,
            pool: None,
            in_flight: None,
        }
    }
}

impl<F> FitnessComputer for PooledFitnessComputer<F>
where
    F: Fn(&Genome) -> Result<f32, EvaluatorError> + Send + Sync + 'static,
{
    fn start(&mut self, round: EvaluationRound) -> Result<(), EvaluationError> {
        if self.in_flight.as_ref().map_or(false, |c| !c.is_complete()) {
            return Err(EvaluationError::RoundInProgress);
        }
        let pool = match self.pool.take() {
            Some(pool) => pool,
            None => WorkerPool::new(self.pool_size)?,
        };
        let pool = self.pool.insert(pool);
        debug!("dispatching {} evaluations", round.len());
        self.in_flight = Some(round.completion());
        for task in round.into_tasks() {
            let evaluator = Arc::clone(&self.evaluator);
            // A job rejected by a stopped pool drops its task,
            // which reports the individual as failed.
            pool.submit(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| evaluator(task.genome())));
                match outcome {
                    Ok(Ok(fitness)) => task.report(fitness),
                    Ok(Err(e)) => task.fail(e),
                    Err(_) => task.fail("evaluator panicked"),
                }
            })?;
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.stop();
        }
        self.in_flight = None;
    }
}
