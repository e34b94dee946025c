//! # Genroute - Provider Routing and Fallback for Generative AI
//!
//! Genroute routes generation requests (image, video, music, voice, prompt
//! services) across multiple interchangeable, independently unreliable
//! backend providers. It validates parameters, picks providers in priority
//! order, tracks per-provider health, enforces per-provider rate limits,
//! retries transient failures with backoff, and falls back to the next
//! provider when one fails - reporting exactly what happened.
//!
#![deny(unsafe_code)]
//!
//! ## Features
//!
//! - **Priority routing**: each task type maps to an ordered provider list;
//!   the order is fixed at startup and only filtered at runtime.
//! - **Health tracking**: rolling failure counters shared across concurrent
//!   requests; three consecutive failures exclude a provider until a
//!   success is recorded.
//! - **Rate limiting**: per-provider token buckets plus time-boxed lockouts
//!   on explicit upstream rate-limit signals.
//! - **Bounded retry**: fixed/linear/exponential backoff with jitter and
//!   rate-limit-aware early abort.
//! - **Explicit errors**: a typed error kind drives every retry/fallback
//!   decision; no exception-style control flow.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use genroute::prelude::*;
//!
//! # async fn example(
//! #     hf: Arc<dyn GenerationCapability>,
//! #     openai: Arc<dyn GenerationCapability>,
//! # ) -> Result<(), RouteError> {
//! let registry = ProviderRegistry::builder()
//!     .provider(ProviderConfig::new(ProviderId::Huggingface).with_priority(10))
//!     .provider(ProviderConfig::new(ProviderId::Openai).with_priority(20))
//!     .default_routes()
//!     .build();
//!
//! let router = Router::builder()
//!     .registry(registry)
//!     .provider(ProviderId::Huggingface, hf)
//!     .provider(ProviderId::Openai, openai)
//!     .build()?;
//!
//! let request = GenerationRequest::from_pairs(
//!     TaskType::TextToImage,
//!     [("prompt", serde_json::json!("a lighthouse at dusk"))],
//! );
//!
//! let (result, notification) = router.generate(&request).await;
//! if result.success {
//!     println!("served by {:?}", result.provider);
//! }
//! if let Some(message) = notification {
//!     println!("{message}"); // a fallback occurred
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## What genroute does not do
//!
//! Translating a request into a provider's wire format is the provider
//! adapter's job ([`traits::GenerationCapability`]); genroute only calls the
//! abstract capability. Persistence, authentication, and transport are the
//! embedding application's concern, as is installing a `tracing` subscriber.

pub mod error;
pub mod health;
pub mod limiter;
pub mod notify;
pub mod orchestrator;
pub mod params;
pub mod registry;
pub mod retry;
pub mod traits;
pub mod types;

// Re-export the primary public API at the crate root.
pub use error::{RouteError, RouteResult, classify_provider_error};
pub use health::HealthTracker;
pub use limiter::RateLimiter;
pub use orchestrator::{Router, RouterBuilder, RouterOptions};
pub use params::ParameterValidator;
pub use registry::{ProviderConfig, ProviderRegistry, RateLimitConfig, RegistryBuilder};
pub use retry::{BackoffStrategy, RetryExecutor, RetryPolicy, RetryReport};
pub use traits::GenerationCapability;
pub use types::{
    AttemptRecord, FallbackExecution, GenerationOutput, GenerationRequest, GenerationResult,
    HealthStatus, Parameters, ProviderId, TaskType,
};

/// Common imports for working with genroute.
pub mod prelude {
    pub use crate::error::{RouteError, RouteResult};
    pub use crate::health::HealthTracker;
    pub use crate::limiter::RateLimiter;
    pub use crate::notify;
    pub use crate::orchestrator::{Router, RouterOptions};
    pub use crate::params::ParameterValidator;
    pub use crate::registry::{ProviderConfig, ProviderRegistry, RateLimitConfig};
    pub use crate::retry::{BackoffStrategy, RetryPolicy};
    pub use crate::traits::GenerationCapability;
    pub use crate::types::{
        FallbackExecution, GenerationOutput, GenerationRequest, GenerationResult, HealthStatus,
        Parameters, ProviderId, TaskType,
    };
}
