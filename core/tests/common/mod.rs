// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata::{HookReply, HookSet, Interceptor, Step, StepOverrides, StrataError};
use tracing::Level;

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("strata framework error: {0}")] // stored as String for Eq comparison
  Strata(String),

  #[error("step failed: {0}")]
  Step(String),

  #[error("interceptor failed: {0}")]
  Interceptor(String),
}

impl From<StrataError> for TestError {
  fn from(err: StrataError) -> Self {
    TestError::Strata(format!("{err:?}"))
  }
}

// --- Common Step Builders ---

/// A step whose implementation appends `suffix` to its input.
pub fn append_step(name: &'static str, suffix: &'static str) -> Step<String, TestError> {
  Step::new(name, move |input: String, _slots, _trace| {
    Box::pin(async move { Ok(format!("{input}{suffix}")) })
  })
}

/// Like `append_step`, but counts executions.
pub fn counting_step(
  name: &'static str,
  suffix: &'static str,
  counter: Arc<AtomicUsize>,
) -> Step<String, TestError> {
  Step::new(name, move |input: String, _slots, _trace| {
    let counter = Arc::clone(&counter);
    Box::pin(async move {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(format!("{input}{suffix}"))
    })
  })
}

/// A step that always fails with the given message.
pub fn failing_step(name: &'static str, message: &'static str) -> Step<String, TestError> {
  Step::new(name, move |_input: String, _slots, _trace| {
    Box::pin(async move { Err(TestError::Step(message.to_string())) })
  })
}

pub fn new_counter() -> Arc<AtomicUsize> {
  Arc::new(AtomicUsize::new(0))
}

// --- Common Interceptor Builders ---

/// An interceptor that walks every remaining hook in order, appending
/// `+<tag>` to the inputs of the steps named in `touches` and advancing
/// through the others untouched. Returns the terminal output.
pub fn appending_interceptor(
  tag: &'static str,
  touches: &'static [&'static str],
) -> Interceptor<String, TestError> {
  Interceptor::named(tag, move |hooks: HookSet<String, TestError>| {
    Box::pin(async move {
      let mut hooks = hooks;
      loop {
        let hook = hooks.first().expect("hook table is never empty mid-run");
        let reply = if touches.contains(&hook.step_name()) {
          let input = hook
            .current_input()
            .cloned()
            .expect("the table's first hook carries its input");
          hook.invoke_with(StepOverrides::new().input(format!("{input}+{tag}"))).await
        } else {
          hook.invoke().await
        };
        match reply {
          HookReply::Next(next) => hooks = next,
          HookReply::Final(value) => return Ok(value),
          HookReply::Failed(error) => return Err(error),
        }
      }
    })
  })
}

/// An interceptor that advances through every step without contributing any
/// override, flagging that it ran.
pub fn observing_interceptor(tag: &'static str, ran: Arc<AtomicUsize>) -> Interceptor<String, TestError> {
  Interceptor::named(tag, move |hooks: HookSet<String, TestError>| {
    let ran = Arc::clone(&ran);
    Box::pin(async move {
      ran.fetch_add(1, Ordering::SeqCst);
      let mut hooks = hooks;
      loop {
        let hook = hooks.first().expect("hook table is never empty mid-run");
        match hook.invoke().await {
          HookReply::Next(next) => hooks = next,
          HookReply::Final(value) => return Ok(value),
          HookReply::Failed(error) => return Err(error),
        }
      }
    })
  })
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
