// strata/examples/overloads.rs

use strata::{OverloadSet, Pipeline, PipelineDefinition, RunOptions, Step, StrataError};
use tracing::info;

fn append_step(name: &'static str, suffix: &'static str) -> Step<String, StrataError> {
  Step::new(name, move |input: String, _slots, _trace| {
    Box::pin(async move { Ok(format!("{input}{suffix}")) })
  })
}

#[tokio::main]
async fn main() -> Result<(), StrataError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Overload Dispatch Example ---");

  // Overload sets substitute an alternate step list when their discriminant
  // matches the run's initial input. The first matching set wins; selection
  // is fixed for the duration of the run.
  let pipeline = Pipeline::create(
    PipelineDefinition::new()
      .step(append_step("parse", ":parsed"))
      .step(append_step("store", ":stored"))
      .overload(
        OverloadSet::new(|input: &String| input.starts_with("dry-run:"))
          .step(append_step("parse", ":parsed"))
          .step(append_step("plan", ":planned")),
      ),
  )?;

  let result = pipeline.run(RunOptions::new("order-7".to_string())).await?;
  info!("Base list: {:?}", result.success());

  let result = pipeline.run(RunOptions::new("dry-run:order-7".to_string())).await?;
  info!("Overload list: {:?}", result.success());

  Ok(())
}
