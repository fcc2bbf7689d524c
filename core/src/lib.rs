// src/lib.rs

//! Strata: an interceptor-based execution engine for multi-step pipelines.
//!
//! A pipeline author declares an ordered sequence of named steps; at run
//! time a chain of interceptors may observe, adjust, short-circuit, or retry
//! execution at the granularity of each named step before that step's core
//! implementation runs. Features:
//!  - Named steps with overridable helper slots and a trace of earlier
//!    steps' inputs.
//!  - Strict left-to-right layering: each interceptor observes a step's
//!    input exactly as left by the interceptor before it.
//!  - Short-circuiting: an interceptor may return a value at any point,
//!    concluding the run immediately.
//!  - A constrained retry protocol reserved for a single, last-in-chain
//!    retrying interceptor.
//!  - Runtime overload dispatch: alternate step lists selected per run by
//!    matching discriminants against the input.
//!  - A structured error taxonomy with configurable pass-through rules.
//!  - A type-keyed registry for managing and running different pipelines.

// Declare modules according to the planned structure
pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

// --- Re-exports for the Public API ---

// Core types that users will interact with frequently
pub use crate::core::interceptor::{Interceptor, InterceptorFn};
pub use crate::core::outcome::RunResult;
pub use crate::core::slot::{SlotFn, SlotTable};
pub use crate::core::step::{Step, StepFn};
pub use crate::core::trace::StepTrace;

// The pipeline data model and the run entry point
pub use crate::pipeline::definition::{
  Discriminant, EntrypointMode, FaultSignal, OverloadSet, Pipeline, PipelineDefinition,
};
pub use crate::pipeline::execution::RunOptions;
pub use crate::pipeline::hooks::{Hook, HookReply, HookSet, StepOverrides};

pub use crate::error::{ContextualError, FaultContext, FaultSource, StrataError, StrataResult};

// The strata registry for managing and dispatching pipelines
pub use crate::registry::Strata;

/*
    Core Workflow:
    1. Build a `PipelineDefinition<T, Err>` from `Step` values (plus any
       `OverloadSet`s and pass-through configuration).
    2. Derive the immutable runtime binding with `Pipeline::create`.
    3. Call `pipeline.run(RunOptions::new(input).interceptor(..)).await`.
       Each interceptor receives a `HookSet`; invoking a hook advances
       execution to that step and resolves with the remaining hooks (or the
       terminal output). Returning a value concludes the run.
    4. Inspect the `RunResult`: `Success(value)` or `Failure(contextual)`.
*/
