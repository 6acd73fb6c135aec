//! PDF redaction and privacy risk auditor
//! Author: kartik4091
//! Created: 2025-06-05
//!
//! Flags pages where opaque boxes were painted over live text instead of
//! removing it, and scores each document on independent privacy signals
//! (hidden text, metadata, signatures, scripts, OCR layers, revision history).
//! No audited text leaves the crate unless validation mode is switched on.

// Core types
pub mod config;
pub mod error;
pub mod geometry;

// Document access
pub mod accessor;
pub mod backend;

// Detectors
pub mod hidden_text;
pub mod overlay;
pub mod structural;

// Scoring, orchestration, output
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod utils;

pub use accessor::{AuditDocument, DocumentAccessor, PageContent};
pub use backend::LopdfAccessor;
pub use config::{AuditConfig, ExtractionMode, TierScheme};
pub use error::{Error, Result};
pub use overlay::{OverlayRisk, PageRisk};
pub use pipeline::{collect_inputs, run_on_audit_runtime, AuditPipeline, CancellationFlag};
pub use report::{BatchReport, DocumentRiskReport, ReportError, ReportFormat, ReportFormatter};
pub use scoring::RiskTier;
pub use utils::{Metrics, MetricsSnapshot};
