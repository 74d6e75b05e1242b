//! Telemetry for gate decisions.
//!
//! The gate emits one [`GateEvent`] per decided request and one when a store call fails.
//! Events flow through `TelemetrySink` implementations, which are plain
//! `tower::Service<GateEvent>`s, so they compose with standard tower combinators.
//!
//! ```rust
//! use quotagate::telemetry::GateEvent;
//!
//! let event = GateEvent::Rejected { key: "203.0.113.7".into(), observed: 51, limit: 50 };
//! assert_eq!(event.to_string(), "Rejected(203.0.113.7, 51/50)");
//! ```

pub mod events;
pub mod sinks;

#[cfg(feature = "telemetry-json")]
pub use events::event_to_json;
pub use events::{GateEvent, StorePhase};
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
