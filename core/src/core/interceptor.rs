// strata/src/core/interceptor.rs

//! Defines the `Interceptor<T, Err>` type: caller-supplied logic that can
//! observe, adjust, short-circuit, or (when designated) retry step execution
//! through the hook table it receives.

use crate::pipeline::hooks::HookSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for an interceptor callable.
///
/// An interceptor receives the table of hooks for the steps it has not yet
/// advanced past and returns a `Future` resolving to `Result<T, Err>`.
/// Returning `Ok` at any point concludes the run with that value; invoking
/// hooks advances execution step by step instead.
pub type InterceptorFn<T, Err> = Arc<
  dyn Fn(HookSet<T, Err>) -> Pin<Box<dyn Future<Output = Result<T, Err>> + Send>> + Send + Sync,
>;

/// A pipeline interceptor, optionally named for diagnostics.
///
/// The name appears in `ContextualError` contexts and log events; it has no
/// effect on execution.
pub struct Interceptor<T, Err>
where
  T: Send + Sync + 'static,
{
  pub(crate) name: Option<String>,
  pub(crate) call: InterceptorFn<T, Err>,
}

impl<T, Err> Interceptor<T, Err>
where
  T: Send + Sync + 'static,
{
  pub fn new(
    call: impl Fn(HookSet<T, Err>) -> Pin<Box<dyn Future<Output = Result<T, Err>> + Send>>
      + Send
      + Sync
      + 'static,
  ) -> Self {
    Self {
      name: None,
      call: Arc::new(call),
    }
  }

  pub fn named(
    name: impl Into<String>,
    call: impl Fn(HookSet<T, Err>) -> Pin<Box<dyn Future<Output = Result<T, Err>> + Send>>
      + Send
      + Sync
      + 'static,
  ) -> Self {
    Self {
      name: Some(name.into()),
      call: Arc::new(call),
    }
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }
}

impl<T: Send + Sync + 'static, Err> Clone for Interceptor<T, Err> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      call: Arc::clone(&self.call),
    }
  }
}

impl<T: Send + Sync + 'static, Err> std::fmt::Debug for Interceptor<T, Err> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Interceptor").field("name", &self.name).finish()
  }
}
