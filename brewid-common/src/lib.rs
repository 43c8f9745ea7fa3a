//! # brewid Common Library
//!
//! Shared code for the brewid services including:
//! - Error types
//! - Configuration loading (TOML + environment)
//! - Resolver event types and the broadcast event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
