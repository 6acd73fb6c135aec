//! Utility Module Implementation
//! Author: kartik4091
//! Created: 2025-06-03 09:14:13 UTC

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
