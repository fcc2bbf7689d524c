// strata/src/pipeline/definition.rs

//! Contains the `PipelineDefinition<T, Err>` builder, its configuration
//! surface, overload sets, and the validated `Pipeline<T, Err>` runtime
//! binding.

use crate::core::step::Step;
use crate::error::{FaultSource, StrataError, StrataResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Predicate deciding whether an overload set applies to a run's initial
/// input. Discriminants are checked in declaration order; the first match
/// wins.
pub type Discriminant<T> = Arc<dyn Fn(&T) -> bool + Send + Sync + 'static>;

/// An alternate step list substituted for the base list when its
/// discriminant matches the run's initial input.
pub struct OverloadSet<T, Err>
where
  T: 'static + Send + Sync,
{
  pub(crate) discriminant: Discriminant<T>,
  pub(crate) steps: Vec<Step<T, Err>>,
}

impl<T, Err> OverloadSet<T, Err>
where
  T: 'static + Send + Sync,
{
  pub fn new(discriminant: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
    Self {
      discriminant: Arc::new(discriminant),
      steps: Vec::new(),
    }
  }

  pub fn step(mut self, step: Step<T, Err>) -> Self {
    self.steps.push(step);
    self
  }
}

/// Whether a run requires some interceptor to claim the first step before
/// its core implementation may execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntrypointMode {
  /// The first step runs whether or not any interceptor invoked its hook.
  #[default]
  Open,
  /// The run fails unless some interceptor invoked the first step's hook
  /// before the step's core implementation would execute.
  Required,
}

/// The signal handed to pass-through predicates.
pub struct FaultSignal<'a, Err> {
  pub hook_name: &'a str,
  pub source: FaultSource,
  pub error: &'a Err,
}

type InstanceMatcher = Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>;
type FaultPredicate<Err> = Arc<dyn Fn(FaultSignal<'_, Err>) -> bool + Send + Sync>;

/// Run-boundary configuration: pass-through rules and the entrypoint
/// requirement.
pub(crate) struct PipelineConfig<Err> {
  pub(crate) instance_matchers: Vec<InstanceMatcher>,
  pub(crate) predicates: Vec<FaultPredicate<Err>>,
  pub(crate) entrypoint: EntrypointMode,
}

impl<Err> PipelineConfig<Err> {
  fn new() -> Self {
    Self {
      instance_matchers: Vec::new(),
      predicates: Vec::new(),
      entrypoint: EntrypointMode::Open,
    }
  }
}

impl<Err> Clone for PipelineConfig<Err> {
  fn clone(&self) -> Self {
    Self {
      instance_matchers: self.instance_matchers.clone(),
      predicates: self.predicates.clone(),
      entrypoint: self.entrypoint,
    }
  }
}

impl<Err> PipelineConfig<Err>
where
  Err: std::error::Error + Send + Sync + 'static,
{
  /// True when the fault should escape the run unwrapped. Control-flow
  /// violations are never offered here.
  pub(crate) fn passes_through(&self, hook_name: &str, source: FaultSource, error: &Err) -> bool {
    let erased: &(dyn std::error::Error + 'static) = error;
    self.instance_matchers.iter().any(|matcher| matcher(erased))
      || self.predicates.iter().any(|predicate| {
        predicate(FaultSignal {
          hook_name,
          source,
          error,
        })
      })
  }
}

/// An immutable description of a pipeline: ordered steps, configuration, and
/// overload sets. Built once via the fluent methods, then consumed by
/// [`Pipeline::create`].
pub struct PipelineDefinition<T, Err>
where
  T: 'static + Send + Sync,
{
  pub(crate) steps: Vec<Step<T, Err>>,
  pub(crate) overloads: Vec<OverloadSet<T, Err>>,
  pub(crate) config: PipelineConfig<Err>,
}

impl<T, Err> PipelineDefinition<T, Err>
where
  T: 'static + Send + Sync,
{
  pub fn new() -> Self {
    Self {
      steps: Vec::new(),
      overloads: Vec::new(),
      config: PipelineConfig::new(),
    }
  }

  /// Appends a step to the base step list.
  pub fn step(mut self, step: Step<T, Err>) -> Self {
    self.steps.push(step);
    self
  }

  /// Appends an overload set. Sets are matched in declaration order.
  pub fn overload(mut self, set: OverloadSet<T, Err>) -> Self {
    self.overloads.push(set);
    self
  }

  /// Lets faults of the exact type `E` escape `Pipeline::run` unwrapped
  /// instead of resolving to `RunResult::Failure`.
  pub fn passthrough_instance_of<E>(mut self) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    self
      .config
      .instance_matchers
      .push(Arc::new(|error: &(dyn std::error::Error + 'static)| error.is::<E>()));
    self
  }

  /// Lets faults matching the predicate escape `Pipeline::run` unwrapped.
  pub fn passthrough_when(mut self, predicate: impl Fn(FaultSignal<'_, Err>) -> bool + Send + Sync + 'static) -> Self {
    self.config.predicates.push(Arc::new(predicate));
    self
  }

  pub fn entrypoint_mode(mut self, mode: EntrypointMode) -> Self {
    self.config.entrypoint = mode;
    self
  }
}

impl<T, Err> Default for PipelineDefinition<T, Err>
where
  T: 'static + Send + Sync,
{
  fn default() -> Self {
    Self::new()
  }
}

/// A validated, immutable runtime binding of a definition: step lists stored
/// behind `Arc` with a name index, safely shared across any number of
/// concurrently initiated independent runs. No run-to-run state lives here.
pub struct Pipeline<T, Err>
where
  T: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  pub(crate) base: Arc<Vec<Step<T, Err>>>,
  pub(crate) base_index: HashMap<String, usize>,
  pub(crate) overloads: Vec<(Discriminant<T>, Arc<Vec<Step<T, Err>>>)>,
  pub(crate) config: PipelineConfig<Err>,
}

impl<T, Err> Pipeline<T, Err>
where
  T: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  /// Validates the definition (non-empty step lists, unique step names in
  /// the base list and in every overload list) and derives the runtime
  /// binding.
  pub fn create(definition: PipelineDefinition<T, Err>) -> StrataResult<Self> {
    if definition.steps.is_empty() {
      return Err(StrataError::EmptyDefinition);
    }
    let base_index = index_steps(&definition.steps)?;
    let mut overloads = Vec::with_capacity(definition.overloads.len());
    for set in definition.overloads {
      if set.steps.is_empty() {
        return Err(StrataError::EmptyDefinition);
      }
      index_steps(&set.steps)?;
      overloads.push((set.discriminant, Arc::new(set.steps)));
    }
    Ok(Self {
      base: Arc::new(definition.steps),
      base_index,
      overloads,
      config: definition.config,
    })
  }

  /// Looks up a step of the base list by name.
  pub fn step(&self, name: &str) -> Option<&Step<T, Err>> {
    self.base_index.get(name).map(|&idx| &self.base[idx])
  }

  /// Names of the base list's steps, in declaration order.
  pub fn step_names(&self) -> impl Iterator<Item = &str> {
    self.base.iter().map(Step::name)
  }

  /// Matches the run's initial input against each overload set's
  /// discriminant in declaration order. Returns the active step list and the
  /// index of the matched set, if any. Selection happens once per run and is
  /// fixed for its duration.
  pub(crate) fn resolve_overload(&self, input: &T) -> (Arc<Vec<Step<T, Err>>>, Option<usize>) {
    for (idx, (discriminant, steps)) in self.overloads.iter().enumerate() {
      if discriminant(input) {
        return (Arc::clone(steps), Some(idx));
      }
    }
    (Arc::clone(&self.base), None)
  }
}

fn index_steps<T, Err>(steps: &[Step<T, Err>]) -> StrataResult<HashMap<String, usize>>
where
  T: 'static + Send + Sync,
{
  let mut index = HashMap::with_capacity(steps.len());
  for (idx, step) in steps.iter().enumerate() {
    if index.insert(step.name().to_string(), idx).is_some() {
      return Err(StrataError::DuplicateStep {
        step_name: step.name().to_string(),
      });
    }
  }
  Ok(index)
}
