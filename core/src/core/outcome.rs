// strata/src/core/outcome.rs

//! The tagged success/failure envelope a run resolves to.

use crate::error::ContextualError;

/// Outcome of a full pipeline run, produced exactly once per run.
///
/// Unless a pass-through rule matched (in which case `Pipeline::run` raises
/// the original fault through its `Err` channel instead), every run resolves
/// to one of these.
#[derive(Debug)]
pub enum RunResult<T> {
  /// The run produced a value: the terminal step's output, a short-circuit
  /// literal, or a recovery value from the retrying interceptor.
  Success(T),
  /// The run faulted; the fault is wrapped with its origin context.
  Failure(ContextualError),
}

impl<T> RunResult<T> {
  pub fn is_success(&self) -> bool {
    matches!(self, RunResult::Success(_))
  }

  pub fn is_failure(&self) -> bool {
    matches!(self, RunResult::Failure(_))
  }

  pub fn success(&self) -> Option<&T> {
    match self {
      RunResult::Success(value) => Some(value),
      RunResult::Failure(_) => None,
    }
  }

  pub fn into_success(self) -> Option<T> {
    match self {
      RunResult::Success(value) => Some(value),
      RunResult::Failure(_) => None,
    }
  }

  pub fn failure(&self) -> Option<&ContextualError> {
    match self {
      RunResult::Success(_) => None,
      RunResult::Failure(error) => Some(error),
    }
  }

  pub fn into_failure(self) -> Option<ContextualError> {
    match self {
      RunResult::Success(_) => None,
      RunResult::Failure(error) => Some(error),
    }
  }
}
