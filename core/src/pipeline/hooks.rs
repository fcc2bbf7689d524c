// strata/src/pipeline/hooks.rs

//! Per-run hook machinery: the `HookSet` table handed to interceptors, the
//! single-use `Hook` capability, and the `HookTurn` future through which an
//! interceptor yields its turn back to the orchestrator.
//!
//! "Remaining hooks" are represented as a freshly issued table keyed by the
//! remaining-step range, never as a mutable shared object: every table is
//! generated at the owning interceptor's turn, so each interceptor observes
//! step inputs exactly as left by the interceptor before it.

use crate::core::slot::SlotFn;
use crate::core::step::Step;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Overrides supplied with a hook invocation: an optional replacement input
/// for the target step and any number of slot replacements (whole-slot by
/// name).
pub struct StepOverrides<T> {
  pub(crate) input: Option<T>,
  pub(crate) slots: Vec<(String, SlotFn<T>)>,
}

impl<T> StepOverrides<T> {
  pub fn new() -> Self {
    Self {
      input: None,
      slots: Vec::new(),
    }
  }

  /// Replaces the target step's input.
  pub fn input(mut self, input: T) -> Self {
    self.input = Some(input);
    self
  }

  /// Replaces one of the target step's slots for this run of the step.
  pub fn slot(mut self, name: impl Into<String>, slot: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
    self.slots.push((name.into(), Arc::new(slot)));
    self
  }
}

impl<T> Default for StepOverrides<T> {
  fn default() -> Self {
    Self::new()
  }
}

/// What a hook invocation resolves to.
pub enum HookReply<T, Err>
where
  T: Send + Sync + 'static,
{
  /// The invoked step (and every step before it) completed; these are the
  /// hooks for the remaining steps only.
  Next(HookSet<T, Err>),
  /// The terminal step completed; this is its output.
  Final(T),
  /// The step's implementation failed. Only the retrying interceptor ever
  /// observes this; it may re-invoke the same hook, return a recovery value,
  /// or fail.
  Failed(Err),
}

impl<T: std::fmt::Debug + Send + Sync + 'static, Err: std::fmt::Debug> std::fmt::Debug for HookReply<T, Err> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      HookReply::Next(hooks) => f.debug_tuple("Next").field(&hooks.step_names().collect::<Vec<_>>()).finish(),
      HookReply::Final(value) => f.debug_tuple("Final").field(value).finish(),
      HookReply::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
    }
  }
}

// --- Per-run shared state between hooks and the orchestrator ---

/// A hook invocation as registered with the orchestrator.
pub(crate) struct TurnRequest<T> {
  pub(crate) step: usize,
  pub(crate) overrides: Option<StepOverrides<T>>,
}

/// The per-run exchange cell. Hooks park turn requests here; the
/// orchestrator parks resume payloads. Exactly one callable is ever in
/// flight, so a single pending/resume pair suffices.
pub(crate) struct RunCore<T, Err>
where
  T: Send + Sync + 'static,
{
  pub(crate) pending: Option<TurnRequest<T>>,
  /// Set when a hook registers while another invocation by the same
  /// interceptor is still pending (e.g. two invocations joined at once).
  pub(crate) overlap: Option<usize>,
  pub(crate) resume: Option<(usize, HookReply<T, Err>)>,
  pub(crate) finished: bool,
}

impl<T, Err> RunCore<T, Err>
where
  T: Send + Sync + 'static,
{
  pub(crate) fn new() -> Self {
    Self {
      pending: None,
      overlap: None,
      resume: None,
      finished: false,
    }
  }
}

pub(crate) type SharedCore<T, Err> = Arc<Mutex<RunCore<T, Err>>>;

// --- Hook table and hooks ---

/// The table of hooks an interceptor holds for the steps it has not yet
/// advanced past. Issued fresh at each of the interceptor's turns.
pub struct HookSet<T, Err>
where
  T: Send + Sync + 'static,
{
  steps: Arc<Vec<Step<T, Err>>>,
  base: usize,
  head_input: T,
  interceptor: usize,
  core: SharedCore<T, Err>,
}

impl<T, Err> HookSet<T, Err>
where
  T: Clone + Send + Sync + 'static,
{
  pub(crate) fn issue(
    steps: Arc<Vec<Step<T, Err>>>,
    base: usize,
    head_input: T,
    interceptor: usize,
    core: SharedCore<T, Err>,
  ) -> Self {
    Self {
      steps,
      base,
      head_input,
      interceptor,
      core,
    }
  }

  /// The hook for the named step, if it is among the remaining steps.
  pub fn hook(&self, step_name: &str) -> Option<Hook<T, Err>> {
    let position = self.steps[self.base..].iter().position(|step| step.name() == step_name)?;
    Some(self.issue_hook(self.base + position))
  }

  /// The hook for the next step to run.
  pub fn first(&self) -> Option<Hook<T, Err>> {
    (self.base < self.steps.len()).then(|| self.issue_hook(self.base))
  }

  fn issue_hook(&self, step: usize) -> Hook<T, Err> {
    Hook {
      step,
      step_name: self.steps[step].name().to_string(),
      // Inputs of later steps are not determined until the steps before
      // them complete.
      current_input: (step == self.base).then(|| self.head_input.clone()),
      interceptor: self.interceptor,
      core: Arc::clone(&self.core),
    }
  }
}

impl<T, Err> HookSet<T, Err>
where
  T: Send + Sync + 'static,
{
  /// Names of the remaining steps, in execution order.
  pub fn step_names(&self) -> impl Iterator<Item = &str> {
    self.steps[self.base..].iter().map(Step::name)
  }

  pub fn len(&self) -> usize {
    self.steps.len() - self.base
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T: Clone + Send + Sync + 'static, Err> Clone for HookSet<T, Err> {
  fn clone(&self) -> Self {
    Self {
      steps: Arc::clone(&self.steps),
      base: self.base,
      head_input: self.head_input.clone(),
      interceptor: self.interceptor,
      core: Arc::clone(&self.core),
    }
  }
}

impl<T, Err> std::fmt::Debug for HookSet<T, Err>
where
  T: Clone + Send + Sync + 'static,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HookSet")
      .field("steps", &self.step_names().collect::<Vec<_>>())
      .finish()
  }
}

/// A single-use, per-run capability for one step of one run.
///
/// Invocation consumes the hook. The hook is `Clone` so the retrying
/// interceptor can re-invoke after a failure; re-invocation by any other
/// interceptor, or after the step already completed, is detected at run time
/// and fails the run with a control-flow violation.
pub struct Hook<T, Err>
where
  T: Send + Sync + 'static,
{
  step: usize,
  step_name: String,
  current_input: Option<T>,
  interceptor: usize,
  core: SharedCore<T, Err>,
}

impl<T, Err> Hook<T, Err>
where
  T: Send + Sync + 'static,
{
  pub fn step_name(&self) -> &str {
    &self.step_name
  }

  /// The step's input as known when this hook's table was issued: `Some` for
  /// the table's first step, `None` for later steps whose input is not yet
  /// determined.
  pub fn current_input(&self) -> Option<&T> {
    self.current_input.as_ref()
  }

  /// Advances execution to this step without supplying overrides.
  pub fn invoke(self) -> HookTurn<T, Err> {
    self.invoke_with(StepOverrides::new())
  }

  /// Advances execution to this step, supplying input and/or slot overrides.
  pub fn invoke_with(self, overrides: StepOverrides<T>) -> HookTurn<T, Err> {
    HookTurn {
      core: self.core,
      interceptor: self.interceptor,
      step: self.step,
      overrides: Some(Box::new(overrides)),
      registered: false,
    }
  }
}

impl<T: Clone + Send + Sync + 'static, Err> Clone for Hook<T, Err> {
  fn clone(&self) -> Self {
    Self {
      step: self.step,
      step_name: self.step_name.clone(),
      current_input: self.current_input.clone(),
      interceptor: self.interceptor,
      core: Arc::clone(&self.core),
    }
  }
}

impl<T: Send + Sync + 'static, Err> std::fmt::Debug for Hook<T, Err> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Hook").field("step_name", &self.step_name).finish()
  }
}

/// Future returned by [`Hook::invoke`].
///
/// The first poll registers the invocation with the orchestrator and parks;
/// the future resolves when the orchestrator grants this interceptor its
/// next turn. The orchestrator is the sole poller and re-polls after
/// granting, so no waker is stored here.
pub struct HookTurn<T, Err>
where
  T: Send + Sync + 'static,
{
  core: SharedCore<T, Err>,
  interceptor: usize,
  step: usize,
  overrides: Option<Box<StepOverrides<T>>>,
  registered: bool,
}

impl<T, Err> Future for HookTurn<T, Err>
where
  T: Send + Sync + 'static,
{
  type Output = HookReply<T, Err>;

  fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    let mut core = this.core.lock();
    if core.finished {
      // The run already resolved; this invocation is orphaned.
      return Poll::Pending;
    }
    if !this.registered {
      this.registered = true;
      if core.pending.is_some() {
        core.overlap = Some(this.step);
      } else {
        core.pending = Some(TurnRequest {
          step: this.step,
          overrides: this.overrides.take().map(|boxed| *boxed),
        });
      }
      return Poll::Pending;
    }
    let granted = core
      .resume
      .as_ref()
      .map_or(false, |(target, _)| *target == this.interceptor);
    if granted {
      if let Some((_, reply)) = core.resume.take() {
        return Poll::Ready(reply);
      }
    }
    Poll::Pending
  }
}
