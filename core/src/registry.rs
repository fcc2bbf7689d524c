// strata/src/registry.rs

//! Defines the `Strata<Err>` struct, a type-keyed registry for managing and
//! executing pipelines. Pipelines are registered per payload type `T`; `run`
//! dispatches on `TypeId` through a type-erased runner.

use crate::core::outcome::RunResult;
use crate::error::StrataError;
use crate::pipeline::definition::Pipeline;
use crate::pipeline::execution::RunOptions;

use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{event, instrument, Level};

/// Type-erased trait for pipeline execution by the registry.
#[async_trait]
trait AnyPipelineRunner<Err>: Send + Sync
where
  Err: std::error::Error + Send + Sync + 'static,
{
  /// Executes the pipeline with type-erased run options. `options` is
  /// expected to contain `RunOptions<T, Err>` for the runner's `T`; the
  /// returned box contains `RunResult<T>`.
  async fn run_erased(&self, options: Box<dyn Any + Send>) -> Result<Box<dyn Any + Send>, Err>;
}

/// Wrapper binding a concrete `Pipeline<T, Err>` to the erased runner trait.
struct PipelineRunner<T, Err>
where
  T: Clone + Send + Sync + 'static,
  Err: std::error::Error + Send + Sync + 'static,
{
  pipeline: Arc<Pipeline<T, Err>>,
}

#[async_trait]
impl<T, Err> AnyPipelineRunner<Err> for PipelineRunner<T, Err>
where
  T: Clone + Send + Sync + 'static,
  Err: std::error::Error + From<StrataError> + Send + Sync + 'static,
{
  #[instrument(
        name = "PipelineRunner::run_erased",
        skip_all,
        fields(payload_type = %std::any::type_name::<T>()),
        err(Display)
    )]
  async fn run_erased(&self, options: Box<dyn Any + Send>) -> Result<Box<dyn Any + Send>, Err> {
    let options = match options.downcast::<RunOptions<T, Err>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        let expected_type = std::any::type_name::<RunOptions<T, Err>>();
        event!(Level::ERROR, "Run options type mismatch. Expected {}.", expected_type);
        return Err(Err::from(StrataError::TypeMismatch {
          expected_type: expected_type.to_string(),
        }));
      }
    };
    let result = self.pipeline.run(options).await?;
    Ok(Box::new(result))
  }
}

/// The strata registry.
///
/// `Err` is the error type `Strata::run` raises for passed-through faults;
/// it must be constructible from `StrataError` so registry-level errors
/// (pipeline not found, dispatch type mismatches) can surface through the
/// same channel.
pub struct Strata<Err = StrataError>
where
  Err: std::error::Error + From<StrataError> + Send + Sync + 'static,
{
  registry: Mutex<HashMap<TypeId, Arc<dyn AnyPipelineRunner<Err>>>>,
}

impl<Err> Strata<Err>
where
  Err: std::error::Error + From<StrataError> + Send + Sync + 'static,
{
  /// Creates a new, empty registry.
  pub fn new() -> Self {
    Self {
      registry: Mutex::new(HashMap::new()),
    }
  }

  /// Registers a pipeline for its payload type `T`, replacing any pipeline
  /// previously registered for `T`.
  pub fn register_pipeline<T>(&self, pipeline: Pipeline<T, Err>)
  where
    T: Clone + Send + Sync + 'static,
  {
    event!(Level::DEBUG, payload_type = %std::any::type_name::<T>(), "Registering pipeline.");
    let runner = PipelineRunner {
      pipeline: Arc::new(pipeline),
    };
    self
      .registry
      .lock()
      .unwrap()
      .insert(TypeId::of::<T>(), Arc::new(runner));
  }

  /// Runs the pipeline registered for the payload type `T`.
  pub async fn run<T>(&self, options: RunOptions<T, Err>) -> Result<RunResult<T>, Err>
  where
    T: Clone + Send + Sync + 'static,
  {
    let type_id = TypeId::of::<T>();
    let runner = {
      let registry = self.registry.lock().unwrap();
      registry.get(&type_id).cloned()
    };
    let runner = runner.ok_or_else(|| {
      let type_name = std::any::type_name::<T>();
      event!(Level::ERROR, "No pipeline registered for payload type {}.", type_name);
      Err::from(StrataError::PipelineNotFound {
        type_name: type_name.to_string(),
      })
    })?;

    let erased = runner.run_erased(Box::new(options)).await?;
    match erased.downcast::<RunResult<T>>() {
      Ok(boxed) => Ok(*boxed),
      Err(_) => Err(Err::from(StrataError::TypeMismatch {
        expected_type: std::any::type_name::<RunResult<T>>().to_string(),
      })),
    }
  }
}

impl<Err> Default for Strata<Err>
where
  Err: std::error::Error + From<StrataError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl Strata<StrataError> {
  pub fn new_default() -> Self {
    Strata::<StrataError>::new()
  }
}
