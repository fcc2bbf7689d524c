// strata/examples/basic_run.rs

use strata::{Pipeline, PipelineDefinition, RunOptions, RunResult, Step, StrataError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), StrataError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Run Example ---");

  // A pipeline is an ordered list of named steps. Each step receives the
  // input as left by the step (and interceptors) before it.
  let pipeline = Pipeline::create(
    PipelineDefinition::new()
      .step(Step::new("trim", |input: String, _slots, _trace| {
        Box::pin(async move { Ok::<_, StrataError>(input.trim().to_string()) })
      }))
      .step(
        Step::new("shout", |input: String, slots, _trace| {
          Box::pin(async move { Ok::<_, StrataError>(slots.apply("decorate", input.to_uppercase())) })
        })
        // Slots are overridable helpers with step-declared defaults.
        .with_slot("decorate", |value: String| format!("{value}!")),
      ),
  )?;

  let result = pipeline.run(RunOptions::new("  hello pipelines  ".to_string())).await?;

  match result {
    RunResult::Success(value) => info!("Run succeeded: {value}"),
    RunResult::Failure(error) => info!("Run failed: {error}"),
  }

  Ok(())
}
