// strata/src/core/slot.rs

//! Named, overridable helper functions ("slots") that a step's implementation
//! delegates to.
//!
//! A step declares its slots with defaults; interceptors may replace
//! individual slots per invocation through hook overrides. Replacement is
//! whole-slot by name, never a merge.

use std::collections::HashMap;
use std::sync::Arc;

/// A slot implementation: a value transformer with the step-defined payload
/// type. Uses `Arc` so tables can be cheaply overlaid and shared.
pub type SlotFn<T> = Arc<dyn Fn(T) -> T + Send + Sync + 'static>;

/// The slot table handed to a step's implementation for one invocation:
/// the step's declared defaults with any per-invocation overrides laid on
/// top.
pub struct SlotTable<T> {
  slots: HashMap<String, SlotFn<T>>,
}

impl<T> SlotTable<T> {
  pub(crate) fn overlaid(defaults: &HashMap<String, SlotFn<T>>, overrides: &HashMap<String, SlotFn<T>>) -> Self {
    let mut slots = defaults.clone();
    for (name, slot) in overrides {
      slots.insert(name.clone(), Arc::clone(slot));
    }
    Self { slots }
  }

  pub fn get(&self, name: &str) -> Option<&SlotFn<T>> {
    self.slots.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.slots.contains_key(name)
  }

  /// Runs the named slot on `value`. An unknown slot name leaves the value
  /// untouched.
  pub fn apply(&self, name: &str, value: T) -> T {
    match self.slots.get(name) {
      Some(slot) => slot(value),
      None => value,
    }
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.slots.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }
}

impl<T> Clone for SlotTable<T> {
  fn clone(&self) -> Self {
    Self {
      slots: self.slots.clone(),
    }
  }
}

impl<T> std::fmt::Debug for SlotTable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SlotTable")
      .field("slots", &self.slots.keys().collect::<Vec<_>>())
      .finish()
  }
}
