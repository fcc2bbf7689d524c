// strata/examples/retrying.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata::{
  HookReply, HookSet, Interceptor, Pipeline, PipelineDefinition, RunOptions, Step, StrataError,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), StrataError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Retrying Interceptor Example ---");

  let attempts = Arc::new(AtomicUsize::new(0));
  let attempts_in_step = Arc::clone(&attempts);

  // Fails the first two attempts, then succeeds.
  let flaky = Step::new("flaky-fetch", move |input: String, _slots, _trace| {
    let attempts = Arc::clone(&attempts_in_step);
    Box::pin(async move {
      let attempt = attempts.fetch_add(1, Ordering::SeqCst);
      if attempt < 2 {
        Err(StrataError::Internal(format!("transient failure on attempt {attempt}")))
      } else {
        Ok(format!("{input}:fetched"))
      }
    })
  });

  let pipeline = Pipeline::create(PipelineDefinition::new().step(flaky))?;

  // Only the retrying interceptor (always last in the chain) observes step
  // failures; it may re-invoke the same hook until it gives up.
  let retrier = Interceptor::named("retrier", |hooks: HookSet<String, StrataError>| {
    Box::pin(async move {
      let hook = hooks.hook("flaky-fetch").expect("hook for flaky-fetch");
      let mut reply = hook.clone().invoke().await;
      while let HookReply::Failed(error) = reply {
        info!("step failed ({}); retrying", error);
        reply = hook.clone().invoke().await;
      }
      match reply {
        HookReply::Final(value) => Ok(value),
        HookReply::Next(_) => unreachable!("single-step pipeline"),
        HookReply::Failed(_) => unreachable!("handled by the loop"),
      }
    })
  });

  let result = pipeline
    .run(RunOptions::new("job-42".to_string()).retrying(retrier))
    .await?;

  info!(
    "Run resolved to {:?} after {} attempts",
    result.success(),
    attempts.load(Ordering::SeqCst)
  );

  Ok(())
}
