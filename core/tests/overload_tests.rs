// tests/overload_tests.rs
mod common;

use common::*;
use strata::{
  OverloadSet, Pipeline, PipelineDefinition, RunOptions, StrataError,
};

fn overloaded_pipeline() -> Pipeline<String, TestError> {
  Pipeline::create(
    PipelineDefinition::new()
      .step(append_step("a", "+a"))
      .step(append_step("b", "+b"))
      .overload(
        OverloadSet::new(|input: &String| input.starts_with("alt:"))
          .step(append_step("x", "+x"))
          .step(append_step("y", "+y")),
      )
      .overload(OverloadSet::new(|input: &String| input.contains("alt")).step(append_step("z", "+z"))),
  )
  .expect("definition is valid")
}

#[tokio::test]
async fn test_no_match_uses_base_steps() {
  setup_tracing();
  let pipeline = overloaded_pipeline();
  let result = pipeline.run(RunOptions::new("plain".to_string())).await.unwrap();
  assert_eq!(result.into_success().as_deref(), Some("plain+a+b"));
}

#[tokio::test]
async fn test_matching_discriminant_substitutes_step_list() {
  setup_tracing();
  let pipeline = overloaded_pipeline();
  let result = pipeline.run(RunOptions::new("alt:job".to_string())).await.unwrap();
  assert_eq!(result.into_success().as_deref(), Some("alt:job+x+y"));
}

#[tokio::test]
async fn test_first_matching_overload_wins() {
  setup_tracing();
  let pipeline = overloaded_pipeline();
  // Both discriminants match "alt:job"; declaration order decides. An input
  // matching only the second set selects it.
  let result = pipeline.run(RunOptions::new("my-alt".to_string())).await.unwrap();
  assert_eq!(result.into_success().as_deref(), Some("my-alt+z"));
}

#[tokio::test]
async fn test_interceptors_layer_over_overload_steps() {
  setup_tracing();
  let pipeline = overloaded_pipeline();
  let result = pipeline
    .run(RunOptions::new("alt:job".to_string()).interceptor(appending_interceptor("ex1", &["x", "y"])))
    .await
    .unwrap();
  assert_eq!(result.into_success().as_deref(), Some("alt:job+ex1+x+ex1+y"));
}

#[tokio::test]
async fn test_selection_is_fixed_for_the_run() {
  setup_tracing();
  let pipeline = overloaded_pipeline();
  // The interceptor replaces the first step's input with a value no
  // discriminant matches; the alternate list stays active regardless.
  let rewrite = strata::Interceptor::named("rewrite", |hooks: strata::HookSet<String, TestError>| {
    Box::pin(async move {
      let hook = hooks.hook("x").expect("alternate step list is active");
      let reply = hook
        .invoke_with(strata::StepOverrides::new().input("plain".to_string()))
        .await;
      match reply {
        strata::HookReply::Next(rest) => match rest.hook("y").expect("hook for y").invoke().await {
          strata::HookReply::Final(value) => Ok(value),
          other => panic!("expected terminal output, got {other:?}"),
        },
        other => panic!("expected remaining hooks, got {other:?}"),
      }
    })
  });

  let result = pipeline
    .run(RunOptions::new("alt:job".to_string()).interceptor(rewrite))
    .await
    .unwrap();
  assert_eq!(result.into_success().as_deref(), Some("plain+x+y"));
}

#[tokio::test]
async fn test_duplicate_step_in_overload_rejected() {
  let result = Pipeline::create(
    PipelineDefinition::<String, TestError>::new()
      .step(append_step("a", "+a"))
      .overload(
        OverloadSet::new(|_: &String| true)
          .step(append_step("dup", "+1"))
          .step(append_step("dup", "+2")),
      ),
  );
  assert!(matches!(result, Err(StrataError::DuplicateStep { .. })));
}

#[tokio::test]
async fn test_empty_overload_rejected() {
  let result = Pipeline::create(
    PipelineDefinition::<String, TestError>::new()
      .step(append_step("a", "+a"))
      .overload(OverloadSet::new(|_: &String| true)),
  );
  assert!(matches!(result, Err(StrataError::EmptyDefinition)));
}
