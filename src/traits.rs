//! Provider Capability Trait
//!
//! The routing engine never speaks a provider's wire format itself; it calls
//! this abstract capability. Concrete adapters (HTTP clients, local engines)
//! implement it and are registered with the router by [`crate::types::ProviderId`].
//!
//! ## Design Principles
//!
//! 1. **Capability-based**: the router depends on behavior, not on concrete
//!    adapter types.
//! 2. **Async-first**: every provider interaction is a suspension point.
//! 3. **Send + Sync**: adapters are shared across concurrent requests.

use async_trait::async_trait;

use crate::error::RouteResult;
use crate::types::{GenerationOutput, Parameters, TaskType};

/// Contract every provider adapter must satisfy.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    /// Whether this provider can service the given task type.
    fn supports_task(&self, task_type: TaskType) -> bool;

    /// Provider-specific parameter validation, a refinement of the generic
    /// [`crate::params::ParameterValidator`]. Returning an error here aborts
    /// the whole fallback chain: a parameter problem is not provider-specific.
    async fn validate_params(&self, task_type: TaskType, parameters: &Parameters)
    -> RouteResult<()>;

    /// Execute the generation call. Errors are classified by
    /// [`crate::error::RouteError::kind`] to drive retry/fallback decisions.
    async fn generate(
        &self,
        task_type: TaskType,
        parameters: &Parameters,
    ) -> RouteResult<GenerationOutput>;

    /// Lightweight reachability probe, used to seed the health tracker at
    /// startup. Scheduling periodic probes is the embedding application's
    /// concern.
    async fn health_check(&self) -> bool {
        true
    }
}
