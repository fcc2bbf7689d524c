// strata/src/pipeline/execution.rs

//! Contains `Pipeline::run()` and the orchestrator behind it: an explicit
//! state machine that grants interceptors their turns in layering order,
//! runs each step's core implementation, arbitrates the retry protocol, and
//! converts faults into a `RunResult`.
//!
//! Exactly one callable is in flight at any time: the orchestrator polls a
//! single interceptor future or a single step future, never more. Turn
//! hand-off happens through the per-run `RunCore` exchange cell; genuine
//! suspension inside a step or interceptor propagates the caller's waker.

use crate::core::interceptor::{Interceptor, InterceptorFn};
use crate::core::outcome::RunResult;
use crate::core::slot::{SlotFn, SlotTable};
use crate::core::step::Step;
use crate::core::trace::StepTrace;
use crate::error::{ContextualError, FaultSource, StrataError};
use crate::pipeline::definition::{EntrypointMode, Pipeline, PipelineConfig};
use crate::pipeline::hooks::{HookReply, HookSet, RunCore, SharedCore, StepOverrides, TurnRequest};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{event, instrument, Level};

/// Per-run inputs for [`Pipeline::run`].
///
/// `interceptors` apply in order. The retrying interceptor, if present, is
/// logically appended after them and is the only one permitted retry
/// behavior.
pub struct RunOptions<T, Err>
where
  T: Send + Sync + 'static,
{
  pub(crate) initial_input: T,
  pub(crate) interceptors: Vec<Interceptor<T, Err>>,
  pub(crate) retrying: Option<Interceptor<T, Err>>,
}

impl<T, Err> RunOptions<T, Err>
where
  T: Send + Sync + 'static,
{
  pub fn new(initial_input: T) -> Self {
    Self {
      initial_input,
      interceptors: Vec::new(),
      retrying: None,
    }
  }

  /// Appends an interceptor to the chain.
  pub fn interceptor(mut self, interceptor: Interceptor<T, Err>) -> Self {
    self.interceptors.push(interceptor);
    self
  }

  /// Sets the retrying interceptor. It runs last in the chain.
  pub fn retrying(mut self, interceptor: Interceptor<T, Err>) -> Self {
    self.retrying = Some(interceptor);
    self
  }
}

impl<T, Err> Pipeline<T, Err>
where
  T: Clone + Send + Sync + 'static,
  Err: std::error::Error + Send + Sync + 'static,
{
  /// Executes one run of the pipeline.
  ///
  /// Resolves the active overload against `initial_input`, then drives the
  /// interceptor chain and the step implementations to a single
  /// [`RunResult`]. The `Err` channel is used only for faults that matched a
  /// pass-through rule; absent pass-through configuration, a run never
  /// raises past this boundary.
  #[instrument(
        name = "Pipeline::run",
        skip_all,
        fields(
            payload_type = %std::any::type_name::<T>(),
            error_type = %std::any::type_name::<Err>(),
            num_interceptors = options.interceptors.len() + usize::from(options.retrying.is_some()),
        ),
        err(Display)
    )]
  pub async fn run(&self, options: RunOptions<T, Err>) -> Result<RunResult<T>, Err> {
    let (active, overload) = self.resolve_overload(&options.initial_input);
    match overload {
      Some(idx) => {
        event!(Level::DEBUG, overload_index = idx, num_steps = active.len(), "Overload discriminant matched; using alternate step list.")
      }
      None => event!(Level::DEBUG, num_steps = active.len(), "Run starting on base step list."),
    }
    let mut driver = Driver::new(active, self.config.clone(), options);
    std::future::poll_fn(move |cx| driver.poll_run(cx)).await
  }
}

// --- Orchestrator internals ---

type LaneFuture<T, Err> = Pin<Box<dyn Future<Output = Result<T, Err>> + Send>>;

enum LaneStatus<T> {
  /// Not yet called.
  Idle,
  /// Currently being polled by the orchestrator.
  Running,
  /// Suspended on a hook invocation targeting `step`. `overrides` holds a
  /// deferred override from a skip-ahead invocation, applied at the target
  /// step's turn cycle.
  Parked {
    step: usize,
    overrides: Option<StepOverrides<T>>,
  },
  /// The step this lane was suspended on completed; the lane is resumed with
  /// the remaining hooks at its next turn.
  ResumeReady,
}

struct Lane<T, Err>
where
  T: Send + Sync + 'static,
{
  label: String,
  call: InterceptorFn<T, Err>,
  fut: Option<LaneFuture<T, Err>>,
  status: LaneStatus<T>,
  invoked: HashMap<usize, u32>,
  retrying: bool,
}

impl<T, Err> Lane<T, Err>
where
  T: Send + Sync + 'static,
{
  fn new(interceptor: Interceptor<T, Err>, index: usize, retrying: bool) -> Self {
    let label = interceptor
      .name
      .unwrap_or_else(|| format!("interceptor#{index}"));
    Self {
      label,
      call: interceptor.call,
      fut: None,
      status: LaneStatus::Idle,
      invoked: HashMap::new(),
      retrying,
    }
  }
}

#[derive(Clone, Copy)]
enum AfterDrive {
  /// The drive was a turn within the current step's turn cycle.
  Turn,
  /// The drive delivered a failure to the retrying interceptor.
  Retry,
  /// The drive delivered the terminal step's output.
  Terminal,
}

#[derive(Clone, Copy)]
enum Phase {
  /// Giving each interceptor its turn for the current step, in chain order.
  Turns { lane: usize },
  /// Polling one interceptor future until it parks, completes, or suspends
  /// on external work.
  Driving { lane: usize, after: AfterDrive },
  /// Polling the current step's core implementation.
  Core,
  Done,
}

enum TurnAction {
  Start,
  Resume,
  ApplyDeferred,
  Skip,
}

enum Drove {
  /// The lane suspended on a hook invocation; its request was accepted.
  Parked,
  /// The lane is awaiting external work; the run itself must suspend.
  External,
  /// The run resolved (completion, fault, or violation).
  Finished,
}

struct Driver<T, Err>
where
  T: Clone + Send + Sync + 'static,
  Err: std::error::Error + Send + Sync + 'static,
{
  steps: Arc<Vec<Step<T, Err>>>,
  config: PipelineConfig<Err>,
  lanes: Vec<Lane<T, Err>>,
  core: SharedCore<T, Err>,
  cursor: usize,
  input: T,
  slot_overlay: HashMap<String, SlotFn<T>>,
  trace: Vec<(String, T)>,
  completed: Vec<bool>,
  retry_window: Option<usize>,
  entry_claimed: bool,
  step_fut: Option<LaneFuture<T, Err>>,
  phase: Phase,
  outcome: Option<Result<RunResult<T>, Err>>,
}

impl<T, Err> Driver<T, Err>
where
  T: Clone + Send + Sync + 'static,
  Err: std::error::Error + Send + Sync + 'static,
{
  fn new(steps: Arc<Vec<Step<T, Err>>>, config: PipelineConfig<Err>, options: RunOptions<T, Err>) -> Self {
    let mut lanes = Vec::with_capacity(options.interceptors.len() + 1);
    for (index, interceptor) in options.interceptors.into_iter().enumerate() {
      lanes.push(Lane::new(interceptor, index, false));
    }
    if let Some(retrier) = options.retrying {
      let index = lanes.len();
      lanes.push(Lane::new(retrier, index, true));
    }
    let num_steps = steps.len();
    Self {
      steps,
      config,
      lanes,
      core: Arc::new(Mutex::new(RunCore::new())),
      cursor: 0,
      input: options.initial_input,
      slot_overlay: HashMap::new(),
      trace: Vec::new(),
      completed: vec![false; num_steps],
      retry_window: None,
      entry_claimed: false,
      step_fut: None,
      phase: Phase::Turns { lane: 0 },
      outcome: None,
    }
  }

  fn poll_run(&mut self, cx: &mut Context<'_>) -> Poll<Result<RunResult<T>, Err>> {
    loop {
      match self.phase {
        Phase::Done => {
          let outcome = self.outcome.take().unwrap_or_else(|| {
            Ok(RunResult::Failure(ContextualError::violation(
              self.step_name_of(self.cursor),
              None,
              StrataError::Internal("run concluded without an outcome".into()),
            )))
          });
          return Poll::Ready(outcome);
        }
        Phase::Turns { lane } if lane >= self.lanes.len() => {
          if self.cursor == 0 && self.config.entrypoint == EntrypointMode::Required && !self.entry_claimed {
            let step_name = self.step_name_of(0);
            event!(Level::ERROR, step = %step_name, "Entrypoint step was never claimed by an interceptor.");
            self.finish_failure(ContextualError::violation(
              step_name.clone(),
              None,
              StrataError::EntrypointUnclaimed { step_name },
            ));
            continue;
          }
          self.begin_core();
        }
        Phase::Turns { lane } => {
          self.phase = Phase::Turns { lane: lane + 1 };
          let action = match &self.lanes[lane].status {
            LaneStatus::Idle => TurnAction::Start,
            LaneStatus::ResumeReady => TurnAction::Resume,
            LaneStatus::Parked { step, overrides } if *step == self.cursor && overrides.is_some() => {
              TurnAction::ApplyDeferred
            }
            _ => TurnAction::Skip,
          };
          match action {
            TurnAction::Start => {
              event!(Level::TRACE, interceptor = %self.lanes[lane].label, step_index = self.cursor, "Starting interceptor.");
              let hooks = self.issue_hooks(lane);
              let call = Arc::clone(&self.lanes[lane].call);
              self.lanes[lane].fut = Some(call(hooks));
              self.lanes[lane].status = LaneStatus::Running;
              self.phase = Phase::Driving {
                lane,
                after: AfterDrive::Turn,
              };
            }
            TurnAction::Resume => {
              event!(Level::TRACE, interceptor = %self.lanes[lane].label, step_index = self.cursor, "Resuming interceptor with remaining hooks.");
              let hooks = self.issue_hooks(lane);
              self.core.lock().resume = Some((lane, HookReply::Next(hooks)));
              self.lanes[lane].status = LaneStatus::Running;
              self.phase = Phase::Driving {
                lane,
                after: AfterDrive::Turn,
              };
            }
            TurnAction::ApplyDeferred => {
              let deferred = match &mut self.lanes[lane].status {
                LaneStatus::Parked { overrides, .. } => overrides.take(),
                _ => None,
              };
              if let Some(overrides) = deferred {
                event!(Level::TRACE, interceptor = %self.lanes[lane].label, step_index = self.cursor, "Applying deferred overrides from a skip-ahead invocation.");
                self.apply_overrides(overrides);
              }
            }
            TurnAction::Skip => {}
          }
        }
        Phase::Driving { lane, after } => match self.drive(lane, cx) {
          Drove::Finished => {}
          Drove::External => return Poll::Pending,
          Drove::Parked => match after {
            AfterDrive::Turn => {
              self.phase = Phase::Turns { lane: lane + 1 };
            }
            AfterDrive::Retry => self.begin_core(),
            AfterDrive::Terminal => {
              // accept_request rejects every invocation once all steps
              // completed, so a legal park cannot reach this point
              self.finish_failure(ContextualError::violation(
                self.step_name_of(self.cursor),
                Some(self.lanes[lane].label.clone()),
                StrataError::Internal("interceptor parked after the terminal step completed".into()),
              ));
            }
          },
        },
        Phase::Core => {
          let poll = match self.step_fut.as_mut() {
            Some(fut) => fut.as_mut().poll(cx),
            None => {
              self.finish_failure(ContextualError::violation(
                self.step_name_of(self.cursor),
                None,
                StrataError::Internal("step future missing during core phase".into()),
              ));
              continue;
            }
          };
          match poll {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(output)) => self.complete_step(output),
            Poll::Ready(Err(error)) => self.step_failed(error),
          }
        }
      }
    }
  }

  /// Polls one interceptor future until it parks on a hook, completes, or
  /// suspends on external work.
  fn drive(&mut self, lane: usize, cx: &mut Context<'_>) -> Drove {
    let poll = match self.lanes[lane].fut.as_mut() {
      Some(fut) => fut.as_mut().poll(cx),
      None => {
        self.finish_failure(ContextualError::violation(
          self.step_name_of(self.cursor),
          Some(self.lanes[lane].label.clone()),
          StrataError::Internal("interceptor future missing during drive".into()),
        ));
        return Drove::Finished;
      }
    };
    match poll {
      Poll::Ready(outcome) => {
        self.lanes[lane].fut = None;
        {
          let mut core = self.core.lock();
          core.pending = None;
          core.overlap = None;
          core.resume = None;
        }
        match outcome {
          Ok(value) => {
            event!(Level::DEBUG, interceptor = %self.lanes[lane].label, "Interceptor returned a value; concluding run.");
            self.finish_success(value);
          }
          Err(error) => self.fault(error, FaultSource::Extension, Some(lane)),
        }
        Drove::Finished
      }
      Poll::Pending => {
        let (request, overlap) = {
          let mut core = self.core.lock();
          (core.pending.take(), core.overlap.take())
        };
        if let Some(step) = overlap {
          let hook_name = self.step_name_of(step);
          let label = self.lanes[lane].label.clone();
          self.finish_failure(ContextualError::violation(
            hook_name.clone(),
            Some(label.clone()),
            StrataError::HookOverlap {
              hook_name,
              interceptor: label,
            },
          ));
          return Drove::Finished;
        }
        match request {
          Some(req) => {
            if self.accept_request(lane, req) {
              Drove::Finished
            } else {
              Drove::Parked
            }
          }
          None => Drove::External,
        }
      }
    }
  }

  /// Validates a hook invocation and parks the lane. Returns `true` when the
  /// invocation was a control-flow violation that concluded the run.
  fn accept_request(&mut self, lane: usize, req: TurnRequest<T>) -> bool {
    let hook_name = self.step_name_of(req.step);
    let label = self.lanes[lane].label.clone();

    if self.completed[req.step] {
      self.finish_failure(ContextualError::violation(
        hook_name.clone(),
        Some(label.clone()),
        StrataError::HookAfterCompletion {
          hook_name,
          interceptor: label,
        },
      ));
      return true;
    }
    if let Some(window) = self.retry_window {
      if req.step != window {
        let pending = self.step_name_of(window);
        self.finish_failure(ContextualError::violation(
          hook_name.clone(),
          Some(label.clone()),
          StrataError::RetryWindowViolation {
            hook_name,
            interceptor: label,
            pending,
          },
        ));
        return true;
      }
    }
    let invocations = self.lanes[lane].invoked.get(&req.step).copied().unwrap_or(0);
    let retry_permitted = self.lanes[lane].retrying && self.retry_window == Some(req.step);
    if invocations > 0 && !retry_permitted {
      self.finish_failure(ContextualError::violation(
        hook_name.clone(),
        Some(label.clone()),
        StrataError::HookReinvoked {
          hook_name,
          interceptor: label,
        },
      ));
      return true;
    }
    self.lanes[lane].invoked.insert(req.step, invocations + 1);
    if req.step == 0 {
      self.entry_claimed = true;
    }
    event!(Level::TRACE, interceptor = %self.lanes[lane].label, hook = %hook_name, "Hook invocation accepted.");
    if req.step == self.cursor {
      if let Some(overrides) = req.overrides {
        self.apply_overrides(overrides);
      }
      self.lanes[lane].status = LaneStatus::Parked {
        step: req.step,
        overrides: None,
      };
    } else {
      // Skip-ahead: the override is applied at the target step's turn
      // cycle, in this interceptor's chain position.
      self.lanes[lane].status = LaneStatus::Parked {
        step: req.step,
        overrides: req.overrides,
      };
    }
    false
  }

  fn apply_overrides(&mut self, overrides: StepOverrides<T>) {
    if let Some(input) = overrides.input {
      self.input = input;
    }
    for (name, slot) in overrides.slots {
      self.slot_overlay.insert(name, slot);
    }
  }

  fn begin_core(&mut self) {
    let step = &self.steps[self.cursor];
    event!(Level::DEBUG, step = %step.name(), step_index = self.cursor, "Running step implementation.");
    let slots = SlotTable::overlaid(&step.slots, &self.slot_overlay);
    let trace = StepTrace::new(self.trace.clone());
    self.step_fut = Some((step.run)(self.input.clone(), slots, trace));
    self.phase = Phase::Core;
  }

  fn complete_step(&mut self, output: T) {
    self.step_fut = None;
    self.retry_window = None;
    self.completed[self.cursor] = true;
    let step_name = self.step_name_of(self.cursor);
    self.trace.push((step_name.clone(), self.input.clone()));
    self.slot_overlay.clear();
    let terminal = self.cursor + 1 == self.steps.len();
    event!(Level::DEBUG, step = %step_name, terminal, "Step completed.");
    if terminal {
      let parked = self
        .lanes
        .iter()
        .position(|lane| matches!(lane.status, LaneStatus::Parked { step, .. } if step == self.cursor));
      match parked {
        Some(lane) => {
          self.core.lock().resume = Some((lane, HookReply::Final(output)));
          self.lanes[lane].status = LaneStatus::Running;
          self.phase = Phase::Driving {
            lane,
            after: AfterDrive::Terminal,
          };
        }
        None => self.finish_success(output),
      }
    } else {
      for lane in &mut self.lanes {
        if matches!(lane.status, LaneStatus::Parked { step, .. } if step == self.cursor) {
          lane.status = LaneStatus::ResumeReady;
        }
      }
      self.cursor += 1;
      self.input = output;
      self.phase = Phase::Turns { lane: 0 };
    }
  }

  fn step_failed(&mut self, error: Err) {
    self.step_fut = None;
    let step_name = self.step_name_of(self.cursor);
    let retrier = self.lanes.iter().position(|lane| {
      lane.retrying && matches!(lane.status, LaneStatus::Parked { step, .. } if step == self.cursor)
    });
    match retrier {
      Some(lane) => {
        event!(Level::DEBUG, step = %step_name, interceptor = %self.lanes[lane].label, "Step failed; offering the failure to the retrying interceptor.");
        self.retry_window = Some(self.cursor);
        self.core.lock().resume = Some((lane, HookReply::Failed(error)));
        self.lanes[lane].status = LaneStatus::Running;
        self.phase = Phase::Driving {
          lane,
          after: AfterDrive::Retry,
        };
      }
      None => self.fault(error, FaultSource::Implementation, None),
    }
  }

  /// Disposes of a recoverable fault: raise it unwrapped when a pass-through
  /// rule matches, otherwise wrap it into the run's failure envelope.
  fn fault(&mut self, error: Err, source: FaultSource, lane: Option<usize>) {
    let hook_name = self.step_name_of(self.cursor);
    if self.config.passes_through(&hook_name, source, &error) {
      event!(Level::DEBUG, hook = %hook_name, %source, "Fault matched a pass-through rule; raising unwrapped.");
      self.conclude(Err(error));
      return;
    }
    event!(Level::ERROR, hook = %hook_name, %source, error = %error, "Run failed.");
    let wrapped = match source {
      FaultSource::Implementation => ContextualError::implementation(hook_name, anyhow::Error::new(error)),
      FaultSource::Extension => {
        let interceptor_name = lane.map(|idx| self.lanes[idx].label.clone());
        ContextualError::extension(hook_name, interceptor_name, anyhow::Error::new(error))
      }
    };
    self.conclude(Ok(RunResult::Failure(wrapped)));
  }

  fn finish_success(&mut self, value: T) {
    event!(Level::DEBUG, "Run resolved successfully.");
    self.conclude(Ok(RunResult::Success(value)));
  }

  fn finish_failure(&mut self, error: ContextualError) {
    event!(Level::ERROR, error = %error, "Run resolved with a failure.");
    self.conclude(Ok(RunResult::Failure(error)));
  }

  fn conclude(&mut self, outcome: Result<RunResult<T>, Err>) {
    self.core.lock().finished = true;
    self.outcome = Some(outcome);
    self.phase = Phase::Done;
  }

  fn issue_hooks(&self, lane: usize) -> HookSet<T, Err> {
    HookSet::issue(
      Arc::clone(&self.steps),
      self.cursor,
      self.input.clone(),
      lane,
      Arc::clone(&self.core),
    )
  }

  fn step_name_of(&self, step: usize) -> String {
    self.steps[step].name().to_string()
  }
}
