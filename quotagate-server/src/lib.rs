//! HTTP surface for quotagate: one endpoint behind the per-client quota gate.

pub mod app;
pub mod config;

pub use app::router;
pub use config::ServerConfig;
