// tests/interceptor_layering_tests.rs
mod common;

use common::*;
use std::sync::atomic::Ordering;
use strata::{HookReply, HookSet, Interceptor, Pipeline, PipelineDefinition, RunOptions};

fn appended_pipeline() -> Pipeline<String, TestError> {
  Pipeline::create(
    PipelineDefinition::new()
      .step(append_step("a", "+a"))
      .step(append_step("b", "+b")),
  )
  .expect("definition is valid")
}

#[tokio::test]
async fn test_two_interceptors_layer_over_both_steps() {
  setup_tracing();
  let pipeline = appended_pipeline();

  let result = pipeline
    .run(
      RunOptions::new("initial".to_string())
        .interceptor(appending_interceptor("ex1", &["a", "b"]))
        .interceptor(appending_interceptor("ex2", &["a", "b"])),
    )
    .await
    .unwrap();

  assert_eq!(
    result.into_success().as_deref(),
    Some("initial+ex1+ex2+a+ex1+ex2+b")
  );
}

#[tokio::test]
async fn test_partial_participation_preserves_layering() {
  setup_tracing();
  let pipeline = appended_pipeline();

  // Only interceptor 1 overrides `a`; both override `b`.
  let result = pipeline
    .run(
      RunOptions::new("initial".to_string())
        .interceptor(appending_interceptor("ex1", &["a", "b"]))
        .interceptor(appending_interceptor("ex2", &["b"])),
    )
    .await
    .unwrap();

  assert_eq!(result.into_success().as_deref(), Some("initial+ex1+a+ex1+ex2+b"));
}

#[tokio::test]
async fn test_three_interceptors_observe_left_to_right() {
  setup_tracing();
  let pipeline = appended_pipeline();

  let result = pipeline
    .run(
      RunOptions::new("initial".to_string())
        .interceptor(appending_interceptor("e1", &["a", "b"]))
        .interceptor(appending_interceptor("e2", &["a", "b"]))
        .interceptor(appending_interceptor("e3", &["a", "b"])),
    )
    .await
    .unwrap();

  // Each interceptor's observed input is the one left by the interceptor
  // before it, for every step.
  assert_eq!(
    result.into_success().as_deref(),
    Some("initial+e1+e2+e3+a+e1+e2+e3+b")
  );
}

#[tokio::test]
async fn test_literal_return_short_circuits_everything() {
  setup_tracing();
  let a_count = new_counter();
  let b_count = new_counter();
  let pipeline = Pipeline::create(
    PipelineDefinition::new()
      .step(counting_step("a", "+a", a_count.clone()))
      .step(counting_step("b", "+b", b_count.clone())),
  )
  .unwrap();

  let later_ran = new_counter();
  let literal = Interceptor::named("literal", |_hooks: HookSet<String, TestError>| {
    Box::pin(async move { Ok("short-circuited".to_string()) })
  });

  let result = pipeline
    .run(
      RunOptions::new("initial".to_string())
        .interceptor(literal)
        .interceptor(observing_interceptor("late", later_ran.clone())),
    )
    .await
    .unwrap();

  assert_eq!(result.into_success().as_deref(), Some("short-circuited"));
  assert_eq!(a_count.load(Ordering::SeqCst), 0);
  assert_eq!(b_count.load(Ordering::SeqCst), 0);
  assert_eq!(later_ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mid_run_return_skips_remaining_steps() {
  setup_tracing();
  let b_count = new_counter();
  let pipeline = Pipeline::create(
    PipelineDefinition::new()
      .step(append_step("a", "+a"))
      .step(counting_step("b", "+b", b_count.clone())),
  )
  .unwrap();

  // Advances through `a`, then returns a literal instead of invoking `b`.
  let bail = Interceptor::named("bail", |hooks: HookSet<String, TestError>| {
    Box::pin(async move {
      let hook = hooks.hook("a").expect("hook for a");
      match hook.invoke().await {
        HookReply::Next(rest) => {
          assert_eq!(rest.step_names().collect::<Vec<_>>(), vec!["b"]);
          Ok("bailed-after-a".to_string())
        }
        other => panic!("expected remaining hooks, got {other:?}"),
      }
    })
  });

  let result = pipeline
    .run(RunOptions::new("initial".to_string()).interceptor(bail))
    .await
    .unwrap();

  assert_eq!(result.into_success().as_deref(), Some("bailed-after-a"));
  assert_eq!(b_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_skip_ahead_contributes_no_override() {
  setup_tracing();
  let pipeline = appended_pipeline();

  // First hook call targets the non-initial step `b`; `a` still runs with
  // the unmodified input.
  let skipper = Interceptor::named("skipper", |hooks: HookSet<String, TestError>| {
    Box::pin(async move {
      let hook = hooks.hook("b").expect("hook for b");
      assert!(hook.current_input().is_none());
      match hook.invoke().await {
        HookReply::Final(value) => Ok(value),
        other => panic!("expected terminal output, got {other:?}"),
      }
    })
  });

  let result = pipeline
    .run(RunOptions::new("initial".to_string()).interceptor(skipper))
    .await
    .unwrap();

  assert_eq!(result.into_success().as_deref(), Some("initial+a+b"));
}

#[tokio::test]
async fn test_remaining_hooks_are_forward_only() {
  setup_tracing();
  let pipeline = appended_pipeline();

  let prober = Interceptor::named("prober", |hooks: HookSet<String, TestError>| {
    Box::pin(async move {
      assert_eq!(hooks.step_names().collect::<Vec<_>>(), vec!["a", "b"]);
      let hook = hooks.hook("a").expect("hook for a");
      match hook.invoke().await {
        HookReply::Next(rest) => {
          // The consumed step is gone from the table.
          assert!(rest.hook("a").is_none());
          let hook = rest.hook("b").expect("hook for b");
          assert_eq!(hook.current_input().map(String::as_str), Some("initial+a"));
          match hook.invoke().await {
            HookReply::Final(value) => Ok(value),
            other => panic!("expected terminal output, got {other:?}"),
          }
        }
        other => panic!("expected remaining hooks, got {other:?}"),
      }
    })
  });

  let result = pipeline
    .run(RunOptions::new("initial".to_string()).interceptor(prober))
    .await
    .unwrap();

  assert_eq!(result.into_success().as_deref(), Some("initial+a+b"));
}

#[tokio::test]
async fn test_interceptor_may_suspend_between_hook_invocations() {
  setup_tracing();
  let pipeline = appended_pipeline();

  let sleeper = Interceptor::named("sleeper", |hooks: HookSet<String, TestError>| {
    Box::pin(async move {
      let mut hooks = hooks;
      loop {
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        let hook = hooks.first().expect("hook table is never empty mid-run");
        match hook.invoke().await {
          HookReply::Next(next) => hooks = next,
          HookReply::Final(value) => return Ok(value),
          HookReply::Failed(error) => return Err(error),
        }
      }
    })
  });

  let result = pipeline
    .run(RunOptions::new("initial".to_string()).interceptor(sleeper))
    .await
    .unwrap();

  assert_eq!(result.into_success().as_deref(), Some("initial+a+b"));
}
