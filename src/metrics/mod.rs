//! Process-wide metrics collection.
//!
//! Hand rolled on `std::sync::atomic` rather than an external metrics
//! crate — grounded on the existing `AppState`-held-plain-data pattern,
//! wired up the same way `/health` is exposed (`axum` route registration
//! in `main.rs`). Recording must never fail a request: every recording
//! method is infallible.

pub mod collector;
pub mod percentile;

pub use collector::Collector;
