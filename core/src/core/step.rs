// strata/src/core/step.rs

//! Defines the structure for a single named step within a pipeline.

use crate::core::slot::{SlotFn, SlotTable};
use crate::core::trace::StepTrace;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a step's core implementation.
///
/// The implementation receives the input as finalized after every interceptor
/// override for this step, the slot table for this invocation, and a
/// read-only trace of the inputs every earlier step actually ran with.
pub type StepFn<T, Err> = Arc<
  dyn Fn(T, SlotTable<T>, StepTrace<T>) -> Pin<Box<dyn Future<Output = Result<T, Err>> + Send>>
    + Send
    + Sync,
>;

/// A named unit of pipeline work: a core implementation plus the step's
/// declared slot defaults.
///
/// Steps are immutable once registered. Name uniqueness within a step list is
/// validated by `Pipeline::create`.
pub struct Step<T, Err>
where
  T: 'static + Send + Sync,
{
  pub(crate) name: String,
  pub(crate) run: StepFn<T, Err>,
  pub(crate) slots: HashMap<String, SlotFn<T>>,
}

impl<T, Err> Step<T, Err>
where
  T: 'static + Send + Sync,
{
  pub fn new(
    name: impl Into<String>,
    run: impl Fn(T, SlotTable<T>, StepTrace<T>) -> Pin<Box<dyn Future<Output = Result<T, Err>> + Send>>
      + Send
      + Sync
      + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      run: Arc::new(run),
      slots: HashMap::new(),
    }
  }

  /// Declares a named slot with its default implementation. A slot already
  /// declared under the same name is replaced.
  pub fn with_slot(mut self, name: impl Into<String>, default: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
    self.slots.insert(name.into(), Arc::new(default));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn slot_names(&self) -> impl Iterator<Item = &str> {
    self.slots.keys().map(String::as_str)
  }
}

impl<T, Err> Clone for Step<T, Err>
where
  T: 'static + Send + Sync,
{
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      run: Arc::clone(&self.run),
      slots: self.slots.clone(),
    }
  }
}

// StepFn and SlotFn don't implement Debug; print the step's shape instead.
impl<T, Err> std::fmt::Debug for Step<T, Err>
where
  T: 'static + Send + Sync,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Step")
      .field("name", &self.name)
      .field("slots", &self.slots.keys().collect::<Vec<_>>())
      .finish()
  }
}
