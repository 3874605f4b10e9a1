//! Transaction Dashboard Engine
//!
//! In-process core for a streaming financial transaction dashboard: a
//! background generation pipeline feeding a growing dataset, a chunked
//! cancellable risk-analytics pipeline over the visible subset, and a
//! coordination layer tying the two together with backpressure and debounced
//! re-analysis.

pub mod analytics;
pub mod config;
pub mod coordinator;
pub mod filter;
pub mod generation;
pub mod generator;
pub mod models;
pub mod scoring;

pub use config::Config;
pub use coordinator::{Coordinator, DashboardHandle};
