//! LLM provider layer for Tertulia.
//!
//! # Architecture
//!
//! - [`registry`]: ordered URL-fragment rules mapping an endpoint to a [`ProviderKind`]
//! - [`policy`]: global behavioral rules prepended to every system prompt
//! - [`request`]: per-provider request shapes (auth, URL, body)
//! - [`normalize`]: per-provider response extraction into plain text
//! - [`credentials`]: process-wide environment credentials keyed by provider
//! - [`dispatcher::ChatDispatcher`]: model lookup → credential → build → send → normalize

pub mod credentials;
pub mod dispatcher;
pub mod normalize;
pub mod policy;
pub mod registry;
pub mod request;

// Re-export main types for convenience
pub use credentials::EnvCredentials;
pub use dispatcher::{ChatDispatcher, ChatError};
pub use normalize::{normalize, ProviderError, NO_RESPONSE};
pub use policy::{effective_system_prompt, GLOBAL_POLICY};
pub use registry::{detect, ProviderKind, ProviderSpec, PROVIDERS};
pub use request::{build_request, ProviderRequest};
