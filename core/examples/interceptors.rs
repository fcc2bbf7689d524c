// strata/examples/interceptors.rs

use strata::{
  HookReply, HookSet, Interceptor, Pipeline, PipelineDefinition, RunOptions, Step, StepOverrides,
  StrataError,
};
use tracing::info;

fn append_step(name: &'static str, suffix: &'static str) -> Step<String, StrataError> {
  Step::new(name, move |input: String, _slots, _trace| {
    Box::pin(async move { Ok(format!("{input}{suffix}")) })
  })
}

/// Appends `+<tag>` to every step's input, in turn order.
fn tagging_interceptor(tag: &'static str) -> Interceptor<String, StrataError> {
  Interceptor::named(tag, move |hooks: HookSet<String, StrataError>| {
    Box::pin(async move {
      let mut hooks = hooks;
      loop {
        let hook = hooks.first().expect("hook table is never empty mid-run");
        let input = hook
          .current_input()
          .cloned()
          .expect("the table's first hook carries its input");
        let reply = hook
          .invoke_with(StepOverrides::new().input(format!("{input}+{tag}")))
          .await;
        match reply {
          HookReply::Next(next) => hooks = next,
          HookReply::Final(value) => return Ok(value),
          HookReply::Failed(error) => return Err(error),
        }
      }
    })
  })
}

#[tokio::main]
async fn main() -> Result<(), StrataError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Interceptor Layering Example ---");

  let pipeline = Pipeline::create(
    PipelineDefinition::new()
      .step(append_step("a", "+a"))
      .step(append_step("b", "+b")),
  )?;

  // Interceptors layer left to right: each observes the input exactly as
  // left by the one before it, for every step.
  let result = pipeline
    .run(
      RunOptions::new("initial".to_string())
        .interceptor(tagging_interceptor("ex1"))
        .interceptor(tagging_interceptor("ex2")),
    )
    .await?;
  info!("Layered run: {:?}", result.success());

  // Returning a value without invoking any hook short-circuits the run: no
  // step and no later interceptor executes.
  let short_circuit = Interceptor::named("bail", |_hooks: HookSet<String, StrataError>| {
    Box::pin(async move { Ok("handled-elsewhere".to_string()) })
  });
  let result = pipeline
    .run(
      RunOptions::new("initial".to_string())
        .interceptor(short_circuit)
        .interceptor(tagging_interceptor("never-runs")),
    )
    .await?;
  info!("Short-circuited run: {:?}", result.success());

  Ok(())
}
