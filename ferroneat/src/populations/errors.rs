use crate::evaluation::EvaluationError;

/// Errors that abort a population's evolution run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The fitness computer could not start a round.
    #[error("fitness evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
}
