//! HTTP API handlers for brewid-resolver
//!
//! JSON surface for the UI collaborator: session lifecycle, user choices,
//! partial saves, commit, guarded cleanup and an SSE event stream.

pub mod events;
pub mod health;
pub mod sessions;

pub use events::event_routes;
pub use health::health_routes;
pub use sessions::session_routes;
