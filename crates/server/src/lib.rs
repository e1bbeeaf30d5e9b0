//! HTTP surface of the medvoice backend: tenant-scoped conversation
//! endpoints, AI and TTS diagnostics, and a health check.

pub mod agents;
pub mod ai_status;
pub mod bootstrap;
pub mod conversations;
pub mod error;
pub mod health;
pub mod router;
pub mod state;
pub mod tenant;
pub mod voice;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use error::ApiError;
pub use router::router;
pub use state::AppState;
