// strata/src/error.rs

//! The engine's error taxonomy.
//!
//! Framework-level faults are `StrataError`. Faults raised by caller-provided
//! steps or interceptors keep their own error type and are wrapped into a
//! [`ContextualError`] at the run boundary, unless a pass-through rule lets
//! them escape unwrapped.

use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Framework-level errors: definition validation, hook control-flow
/// violations, and registry dispatch failures.
#[derive(Debug, Error)]
pub enum StrataError {
  #[error("step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("duplicate step name '{step_name}' in pipeline definition")]
  DuplicateStep { step_name: String },

  #[error("pipeline definition declares no steps")]
  EmptyDefinition,

  #[error("interceptor '{interceptor}' invoked hook '{hook_name}' twice; only the retrying interceptor may re-invoke, and only after a failure")]
  HookReinvoked { hook_name: String, interceptor: String },

  #[error("interceptor '{interceptor}' invoked hook '{hook_name}' after the step already completed")]
  HookAfterCompletion { hook_name: String, interceptor: String },

  #[error("interceptor '{interceptor}' invoked hook '{hook_name}' while an earlier invocation was still pending")]
  HookOverlap { hook_name: String, interceptor: String },

  #[error("interceptor '{interceptor}' invoked hook '{hook_name}' while a retry of '{pending}' was pending; only the failed hook may be re-invoked")]
  RetryWindowViolation {
    hook_name: String,
    interceptor: String,
    pending: String,
  },

  #[error("no interceptor claimed entrypoint step '{step_name}'")]
  EntrypointUnclaimed { step_name: String },

  #[error("no pipeline registered for payload type {type_name}")]
  PipelineNotFound { type_name: String },

  #[error("type mismatch during registry dispatch (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  #[error("internal strata error: {0}")]
  Internal(String),
}

pub type StrataResult<T, E = StrataError> = std::result::Result<T, E>;

/// Where a run-time fault originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSource {
  /// A step's core implementation failed.
  Implementation,
  /// An interceptor failed, or committed a control-flow violation.
  Extension,
}

impl std::fmt::Display for FaultSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      FaultSource::Implementation => f.write_str("implementation"),
      FaultSource::Extension => f.write_str("extension"),
    }
  }
}

/// Location metadata attached to every wrapped fault.
#[derive(Debug, Clone)]
pub struct FaultContext {
  /// Name of the step whose hook was active when the fault occurred.
  pub hook_name: String,
  pub source: FaultSource,
  /// Present for extension faults when the interceptor was named.
  pub interceptor_name: Option<String>,
}

/// A run-time fault wrapped with its origin context.
///
/// The original fault is coerced into an `anyhow::Error` and kept as `cause`;
/// tests and callers can `downcast_ref` it to the concrete error type.
#[derive(Debug, Error)]
#[error("{} fault in hook '{}': {message}", .context.source, .context.hook_name)]
pub struct ContextualError {
  pub message: String,
  pub context: FaultContext,
  #[source]
  pub cause: AnyhowError,
}

impl ContextualError {
  pub(crate) fn implementation(hook_name: impl Into<String>, cause: AnyhowError) -> Self {
    ContextualError {
      message: cause.to_string(),
      context: FaultContext {
        hook_name: hook_name.into(),
        source: FaultSource::Implementation,
        interceptor_name: None,
      },
      cause,
    }
  }

  pub(crate) fn extension(
    hook_name: impl Into<String>,
    interceptor_name: Option<String>,
    cause: AnyhowError,
  ) -> Self {
    ContextualError {
      message: cause.to_string(),
      context: FaultContext {
        hook_name: hook_name.into(),
        source: FaultSource::Extension,
        interceptor_name,
      },
      cause,
    }
  }

  /// Control-flow violations surface like extension faults but always carry
  /// a `StrataError` cause and are never eligible for pass-through.
  pub(crate) fn violation(
    hook_name: impl Into<String>,
    interceptor_name: Option<String>,
    violation: StrataError,
  ) -> Self {
    Self::extension(hook_name, interceptor_name, AnyhowError::new(violation))
  }
}
