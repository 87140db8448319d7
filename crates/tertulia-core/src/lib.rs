//! Core building blocks shared by every Tertulia crate.
//!
//! - [`types`]: model, character and chat records exchanged with the store and the HTTP layer
//! - [`config`]: JSON config file + environment overrides
//! - [`utils`]: data-URL decoding, secret masking, paths

pub mod config;
pub mod types;
pub mod utils;
