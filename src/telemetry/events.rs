use crate::StoreError;
use std::fmt;

#[cfg(feature = "telemetry-json")]
use serde_json::json;

/// Store call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    /// Reading the current count.
    Read,
    /// Running the increment+expire operation.
    Increment,
}

impl fmt::Display for StorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorePhase::Read => "read",
            StorePhase::Increment => "increment",
        })
    }
}

/// Events emitted by the gate, one per checked request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// Request admitted; the counter now holds `count`.
    Admitted { key: String, count: u64 },
    /// Request rejected by policy; the counter was left at `observed`.
    Rejected { key: String, observed: u64, limit: u64 },
    /// A store call failed and the request failed closed.
    StoreFailed { key: String, phase: StorePhase, error: StoreError },
}

impl fmt::Display for GateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateEvent::Admitted { key, count } => write!(f, "Admitted({}, count={})", key, count),
            GateEvent::Rejected { key, observed, limit } => {
                write!(f, "Rejected({}, {}/{})", key, observed, limit)
            }
            GateEvent::StoreFailed { key, phase, error } => {
                write!(f, "StoreFailed({}, {}: {})", key, phase, error)
            }
        }
    }
}

/// Convert a GateEvent into a JSON value for sinks.
#[cfg(feature = "telemetry-json")]
pub fn event_to_json(event: &GateEvent) -> serde_json::Value {
    match event {
        GateEvent::Admitted { key, count } => json!({
            "kind": "admitted",
            "key": key,
            "count": *count,
        }),
        GateEvent::Rejected { key, observed, limit } => json!({
            "kind": "rejected",
            "key": key,
            "observed": *observed,
            "limit": *limit,
        }),
        GateEvent::StoreFailed { key, phase, error } => json!({
            "kind": "store_failed",
            "key": key,
            "phase": phase.to_string(),
            "error": error.to_string(),
        }),
    }
}
