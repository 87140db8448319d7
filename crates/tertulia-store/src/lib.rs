//! Data-access layer for Tertulia.
//!
//! # Architecture
//!
//! - [`traits::DataStore`]: the collaborator the gateway and dispatcher consume
//! - [`hosted::HostedStore`]: REST tables + object storage of a managed backend
//! - [`memory::MemoryStore`]: in-process tables for tests and local runs

pub mod error;
pub mod hosted;
pub mod memory;
pub mod traits;

// Re-export main types for convenience
pub use error::StoreError;
pub use hosted::HostedStore;
pub use memory::MemoryStore;
pub use traits::DataStore;
