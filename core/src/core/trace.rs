// strata/src/core/trace.rs

//! Read-only record of the inputs earlier steps actually ran with, handed to
//! each step's implementation.

use std::sync::Arc;

/// Maps every earlier step's name to the input it ran with, in execution
/// order. Under an active retry, the recorded input is the one used by the
/// attempt that succeeded.
pub struct StepTrace<T> {
  entries: Arc<Vec<(String, T)>>,
}

impl<T> StepTrace<T> {
  pub(crate) fn new(entries: Vec<(String, T)>) -> Self {
    Self {
      entries: Arc::new(entries),
    }
  }

  /// The input the named step ran with, if that step has already executed.
  pub fn input_of(&self, step_name: &str) -> Option<&T> {
    self
      .entries
      .iter()
      .find(|(name, _)| name == step_name)
      .map(|(_, input)| input)
  }

  pub fn contains(&self, step_name: &str) -> bool {
    self.entries.iter().any(|(name, _)| name == step_name)
  }

  /// Completed steps in execution order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
    self.entries.iter().map(|(name, input)| (name.as_str(), input))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<T> Clone for StepTrace<T> {
  fn clone(&self) -> Self {
    Self {
      entries: Arc::clone(&self.entries),
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StepTrace<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_map().entries(self.iter()).finish()
  }
}
