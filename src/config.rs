//! Configuration types and validation for the audit pipeline
//! Author: kartik4091
//! Created: 2025-06-03

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Top-level audit configuration; every threshold the detectors use lives here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub overlay: OverlayConfig,
    pub hidden_text: HiddenTextConfig,
    pub structural: StructuralConfig,
    pub weights: ScoreWeights,
    pub tiers: TierConfig,
    pub batch: BatchConfig,
    pub backend: BackendConfig,
    pub extraction: ExtractionMode,
}

/// Opaque-fill overlay detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub black_threshold: f64,
    pub min_overlap_area: f64,
    pub min_hits: usize,
    pub min_dimension: f64,
    pub max_coverage_ratio: f64,
    pub dedup_tolerance: f64,
    pub redaction_aspect_ratio: f64,
    pub multi_fill_count: usize,
    pub score_any_fill: u32,
    pub score_threshold_met: u32,
    pub score_redaction_shape: u32,
    pub score_multi_fill: u32,
    /// Flagged pages at or above this confidence make the verdict definite
    pub definite_confidence: u32,
}

/// Hidden text classification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenTextConfig {
    pub white_tolerance: f64,
    pub off_page_margin: f64,
    pub tiny_font_size: f64,
    pub max_previews: usize,
}

/// Structural check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralConfig {
    /// Run the structural checks at all; when off only overlay detection runs
    pub enabled: bool,
    /// Overrides the accessor's advertised deep-structure capability
    pub deep_structure: Option<bool>,
    pub include_metadata_values: bool,
    pub metadata_value_max_chars: usize,
    pub ocr_min_image_dimension: u32,
    pub scanned_ocr_ratio: f64,
    pub incremental_tail_bytes: usize,
    pub watermark_min_pages: usize,
}

/// Additive risk weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub hidden_text: u32,
    pub overlay_definite: u32,
    pub overlay_possible: u32,
    pub signatures: u32,
    pub javascript: u32,
    pub external_links: u32,
    pub metadata: u32,
    pub attachments: u32,
    pub reviewer_names: u32,
    pub ocr_layer: u32,
    pub incremental_updates: u32,
    pub forms: u32,
    pub thumbnails: u32,
    pub structure_tags: u32,
}

/// Score cut-offs for one tier scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub high: u32,
    pub medium: u32,
}

/// Which tier scheme to report with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TierScheme {
    /// HIGH >= 40, MEDIUM >= 20
    #[default]
    Default,
    /// HIGH >= 70, MEDIUM >= 40
    Secondary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub scheme: TierScheme,
    pub default: TierThresholds,
    pub secondary: TierThresholds,
}

/// Corpus execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_concurrent: usize,
    pub document_timeout_secs: u64,
    pub recursive: bool,
}

/// Content interpreter limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub max_form_depth: usize,
}

/// Whether any decoded text may leave the accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtractionMode {
    #[default]
    NonExtractive,
    /// Keeps short previews of flagged text for manual verification
    Validation { preview_chars: usize },
}

impl ExtractionMode {
    pub fn preview_chars(&self) -> Option<usize> {
        match self {
            ExtractionMode::NonExtractive => None,
            ExtractionMode::Validation { preview_chars } => Some(*preview_chars),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ExtractionMode::Validation { .. })
    }
}

// Defaults
impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            black_threshold: 0.15,
            min_overlap_area: 4.0,
            min_hits: 1,
            min_dimension: 2.0,
            max_coverage_ratio: 0.95,
            dedup_tolerance: 0.5,
            redaction_aspect_ratio: 3.0,
            multi_fill_count: 3,
            score_any_fill: 3,
            score_threshold_met: 3,
            score_redaction_shape: 1,
            score_multi_fill: 1,
            definite_confidence: 7,
        }
    }
}

impl Default for HiddenTextConfig {
    fn default() -> Self {
        Self {
            white_tolerance: 0.01,
            off_page_margin: 100.0,
            tiny_font_size: 1.0,
            max_previews: 20,
        }
    }
}

impl Default for StructuralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            deep_structure: None,
            include_metadata_values: false,
            metadata_value_max_chars: 100,
            ocr_min_image_dimension: 1000,
            scanned_ocr_ratio: 0.3,
            incremental_tail_bytes: 65536,
            watermark_min_pages: 3,
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            hidden_text: 15,
            overlay_definite: 20,
            overlay_possible: 10,
            signatures: 10,
            javascript: 15,
            external_links: 10,
            metadata: 5,
            attachments: 5,
            reviewer_names: 5,
            ocr_layer: 3,
            incremental_updates: 5,
            forms: 2,
            thumbnails: 2,
            structure_tags: 1,
        }
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            scheme: TierScheme::Default,
            default: TierThresholds { high: 40, medium: 20 },
            secondary: TierThresholds { high: 70, medium: 40 },
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get().max(1),
            document_timeout_secs: 120,
            recursive: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { max_form_depth: 8 }
    }
}

impl TierConfig {
    /// Thresholds for the selected scheme
    pub fn active(&self) -> TierThresholds {
        match self.scheme {
            TierScheme::Default => self.default,
            TierScheme::Secondary => self.secondary,
        }
    }
}

impl BatchConfig {
    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }
}

impl AuditConfig {
    /// Loads a config file, trying JSON first and then YAML
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfiguration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: AuditConfig = serde_json::from_str(&content)
            .or_else(|_| serde_yaml::from_str(&content))
            .map_err(|e| Error::InvalidConfiguration(format!("Config parsing error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the detectors cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfiguration(msg.to_string()));
        let unit = |v: f64| (0.0..=1.0).contains(&v);

        if !unit(self.overlay.black_threshold) {
            return invalid("black_threshold must be within [0, 1]");
        }
        if self.overlay.min_overlap_area < 0.0 {
            return invalid("min_overlap_area must not be negative");
        }
        if self.overlay.min_hits == 0 {
            return invalid("min_hits must be at least 1");
        }
        if self.overlay.min_dimension < 0.0 || self.overlay.dedup_tolerance < 0.0 {
            return invalid("min_dimension and dedup_tolerance must not be negative");
        }
        if self.overlay.max_coverage_ratio <= 0.0 || self.overlay.max_coverage_ratio > 1.0 {
            return invalid("max_coverage_ratio must be within (0, 1]");
        }
        if !unit(self.hidden_text.white_tolerance) {
            return invalid("white_tolerance must be within [0, 1]");
        }
        if self.hidden_text.off_page_margin < 0.0 || self.hidden_text.tiny_font_size < 0.0 {
            return invalid("hidden text thresholds must not be negative");
        }
        if !unit(self.structural.scanned_ocr_ratio) {
            return invalid("scanned_ocr_ratio must be within [0, 1]");
        }
        if self.structural.incremental_tail_bytes == 0 {
            return invalid("incremental_tail_bytes must be at least 1");
        }
        for (name, tiers) in [("default", self.tiers.default), ("secondary", self.tiers.secondary)] {
            if tiers.medium > tiers.high {
                return Err(Error::InvalidConfiguration(format!(
                    "{} tier scheme has medium above high",
                    name
                )));
            }
        }
        if self.batch.max_concurrent == 0 {
            return invalid("Concurrency must be at least 1");
        }
        if self.batch.document_timeout_secs == 0 {
            return invalid("document_timeout_secs must be at least 1");
        }
        if let ExtractionMode::Validation { preview_chars } = self.extraction {
            if preview_chars == 0 {
                return invalid("preview_chars must be at least 1");
            }
            warn!("⚠️  Validation mode enabled: short text previews will appear in reports");
        }
        Ok(())
    }
}
