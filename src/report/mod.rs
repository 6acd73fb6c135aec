//! Report types for the redaction audit
//! Author: kartik4091
//! Created: 2025-06-05

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::hidden_text::HiddenTextFindings;
use crate::overlay::{OverlayRisk, PageRisk};
use crate::scoring::RiskTier;
use crate::structural::StructuralFindings;

pub mod formatter;

pub use formatter::ReportFormatter;

pub const TOOL_NAME: &str = "pdx-redaction-audit";

pub const SECURITY_NOTICE: &str = "This report contains risk indicators only. \
No redacted, hidden or body text has been extracted, displayed or saved.";

pub const DISCLAIMER: &str = "Findings are probabilistic and do not establish legal certainty. \
Every flagged page requires manual verification.";

/// Report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    PlainText,
    Json,
    Csv,
}

/// Report generation errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReportError {
    #[error("Format error: {0}")]
    FormatError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Everything learned about one document besides page risks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFindings {
    pub overlay_risk: OverlayRisk,
    pub hidden_text: HiddenTextFindings,
    #[serde(flatten)]
    pub structure: StructuralFindings,
}

/// Audit result for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRiskReport {
    pub filename: String,
    pub total_pages: usize,
    pub page_risks: Vec<PageRisk>,
    pub overlay_risk: OverlayRisk,
    pub findings: Option<DocumentFindings>,
    pub risk_score: u32,
    pub risk_tier: RiskTier,
    pub error: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl DocumentRiskReport {
    /// Report for a document that could not be audited at all
    pub fn failed(filename: impl Into<String>, error: impl ToString) -> Self {
        Self {
            filename: filename.into(),
            total_pages: 0,
            page_risks: Vec::new(),
            overlay_risk: OverlayRisk::None,
            findings: None,
            risk_score: 0,
            risk_tier: RiskTier::Low,
            error: Some(error.to_string()),
            notes: Vec::new(),
            elapsed_ms: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn max_confidence(&self) -> Option<u32> {
        self.page_risks.iter().map(|p| p.confidence_score).max()
    }
}

/// Totals over a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_pdfs: usize,
    pub total_pages: usize,
    pub pdfs_with_risks: usize,
    pub total_flagged_pages: usize,
    pub pdfs_with_errors: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[DocumentRiskReport]) -> Self {
        let mut summary = BatchSummary {
            total_pdfs: reports.len(),
            ..Default::default()
        };
        for report in reports {
            if report.is_error() {
                summary.pdfs_with_errors += 1;
                continue;
            }
            summary.total_pages += report.total_pages;
            summary.total_flagged_pages += report.page_risks.len();
            if !report.page_risks.is_empty() {
                summary.pdfs_with_risks += 1;
            }
            match report.risk_tier {
                RiskTier::High => summary.high += 1,
                RiskTier::Medium => summary.medium += 1,
                RiskTier::Low => summary.low += 1,
            }
        }
        summary
    }
}

/// Complete output of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub tool: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub security_notice: String,
    pub disclaimer: String,
    pub summary: BatchSummary,
    pub reports: Vec<DocumentRiskReport>,
}

impl BatchReport {
    pub fn new(reports: Vec<DocumentRiskReport>) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            security_notice: SECURITY_NOTICE.to_string(),
            disclaimer: DISCLAIMER.to_string(),
            summary: BatchSummary::from_reports(&reports),
            reports,
        }
    }
}

/// Writes through a temporary sibling and renames it into place
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), ReportError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| ReportError::FormatError(format!("Not a file path: {}", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path: PathBuf = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}
