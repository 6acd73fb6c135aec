//! Structural privacy checks
//! Author: kartik4091
//! Created: 2025-06-08
//!
//! Each check reads non-content facts from the document (names, counts,
//! flags) and is isolated from the others: a failing check becomes a note
//! and the rest still run.

pub mod incremental;
pub mod watermark;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::accessor::{AnnotationInfo, AuditDocument, PageContent};
use crate::config::StructuralConfig;
use crate::error::{Error, Result};

pub use incremental::count_startxref;
pub use watermark::WatermarkTracker;

pub const DEEP_STRUCTURE_UNAVAILABLE: &str =
    "deep structure inspection unavailable - advanced checks skipped";

/// Optional capabilities of the auditor, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditorCapabilities {
    pub deep_structure: bool,
}

/// Results of every structural check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralFindings {
    pub has_metadata: bool,
    pub metadata_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_values: Option<BTreeMap<String, String>>,

    pub has_attachments: bool,
    pub attachment_count: usize,
    pub attachment_names: Vec<String>,

    pub has_annotations: bool,
    pub annotation_count: usize,
    pub annotation_types: Vec<String>,
    pub reviewer_names: Vec<String>,

    pub has_forms: bool,
    pub form_field_count: usize,

    pub has_ocr_layer: bool,
    pub ocr_pages: Vec<usize>,
    pub is_scanned: bool,

    pub has_javascript: bool,
    pub javascript_count: usize,
    pub has_actions: bool,

    pub has_external_links: bool,
    pub external_urls: Vec<String>,
    pub has_remote_resources: bool,

    pub has_signatures: bool,
    pub signature_count: usize,
    pub signer_names: Vec<String>,

    pub has_layers: bool,
    pub layer_count: usize,
    pub incremental_updates: bool,
    pub version_count: usize,

    pub has_structure_tags: bool,
    pub has_alt_text: bool,

    pub has_watermarks: bool,
    pub has_thumbnails: bool,

    pub notes: Vec<String>,
}

/// Per-page observations gathered during the page pass
#[derive(Debug, Default)]
pub struct PageSurvey {
    pages_seen: usize,
    image_pages: usize,
    text_pages: usize,
    ocr_pages: Vec<usize>,
    watermarks: WatermarkTracker,
}

impl PageSurvey {
    pub fn observe(&mut self, page: &PageContent, config: &StructuralConfig) {
        self.pages_seen += 1;
        let has_text = page.has_text();
        if !page.images.is_empty() {
            self.image_pages += 1;
        }
        if has_text {
            self.text_pages += 1;
        }

        let min = config.ocr_min_image_dimension;
        if has_text && page.images.iter().any(|img| img.width >= min && img.height >= min) {
            self.ocr_pages.push(page.number);
        }

        self.watermarks.observe(page);
    }
}

pub struct StructuralAuditor<'a> {
    config: &'a StructuralConfig,
    capabilities: AuditorCapabilities,
}

impl<'a> StructuralAuditor<'a> {
    pub fn new(config: &'a StructuralConfig, capabilities: AuditorCapabilities) -> Self {
        Self { config, capabilities }
    }

    pub fn capabilities(&self) -> AuditorCapabilities {
        self.capabilities
    }

    /// Runs every check against an opened document
    pub fn audit(&self, doc: &dyn AuditDocument, survey: PageSurvey) -> StructuralFindings {
        let mut findings = StructuralFindings::default();

        run_check(&mut findings, "metadata", |f| self.check_metadata(doc, f));
        run_check(&mut findings, "attachments", |f| check_attachments(doc, f));

        let annotations = match collect_annotations(doc) {
            Ok(annotations) => Some(annotations),
            Err(e) => {
                record_failure(&mut findings, "annotations", e);
                None
            }
        };
        if let Some(annotations) = &annotations {
            summarize_annotations(annotations, &mut findings);
        }

        run_check(&mut findings, "forms", |f| check_forms(doc, f));
        self.summarize_survey(&survey, doc.page_count(), &mut findings);
        run_check(&mut findings, "incremental updates", |f| self.check_incremental(doc, f));

        if self.capabilities.deep_structure {
            run_check(&mut findings, "javascript", |f| check_catalog(doc, f));
            run_check(&mut findings, "thumbnails", |f| check_thumbnails(doc, f));
            if let Some(annotations) = &annotations {
                findings.has_remote_resources |= annotations
                    .iter()
                    .filter_map(|a| a.action.as_ref())
                    .any(|action| action.is_remote());
            }
        } else {
            findings.notes.push(DEEP_STRUCTURE_UNAVAILABLE.to_string());
        }

        findings
    }

    fn check_metadata(&self, doc: &dyn AuditDocument, findings: &mut StructuralFindings) -> Result<()> {
        let entries = doc.metadata()?;
        let mut keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
        if doc.has_xmp_metadata()? {
            keys.push("XMP".to_string());
        }

        if self.config.include_metadata_values {
            let limit = self.config.metadata_value_max_chars;
            findings.metadata_values = Some(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.chars().take(limit).collect()))
                    .collect(),
            );
        }
        findings.has_metadata = !keys.is_empty();
        findings.metadata_keys = keys;
        Ok(())
    }

    fn check_incremental(&self, doc: &dyn AuditDocument, findings: &mut StructuralFindings) -> Result<()> {
        let count = count_startxref(doc.raw_bytes(), self.config.incremental_tail_bytes);
        findings.incremental_updates = count > 1;
        findings.version_count = count;
        Ok(())
    }

    fn summarize_survey(&self, survey: &PageSurvey, page_count: usize, findings: &mut StructuralFindings) {
        findings.has_ocr_layer = !survey.ocr_pages.is_empty();
        findings.ocr_pages = survey.ocr_pages.clone();
        findings.is_scanned = page_count > 0
            && (survey.ocr_pages.len() as f64 / page_count as f64 >= self.config.scanned_ocr_ratio
                || (survey.image_pages == page_count && survey.text_pages == page_count));
        findings.has_watermarks = survey.watermarks.has_watermark(self.config.watermark_min_pages);
        debug!("Surveyed {} of {} pages", survey.pages_seen, page_count);
    }
}

fn run_check<F>(findings: &mut StructuralFindings, check: &'static str, f: F)
where
    F: FnOnce(&mut StructuralFindings) -> Result<()>,
{
    if let Err(e) = f(findings) {
        record_failure(findings, check, e);
    }
}

fn record_failure(findings: &mut StructuralFindings, check: &'static str, err: Error) {
    let note = match err {
        failure @ Error::PartialCheckFailure { .. } => failure.to_string(),
        other => Error::check(check, other).to_string(),
    };
    warn!("⚠️  {}", note);
    findings.notes.push(note);
}

fn check_attachments(doc: &dyn AuditDocument, findings: &mut StructuralFindings) -> Result<()> {
    let attachments = doc.attachments()?;
    findings.has_attachments = !attachments.is_empty();
    findings.attachment_count = attachments.len();
    findings.attachment_names = attachments.into_iter().map(|a| a.name).collect();
    Ok(())
}

fn collect_annotations(doc: &dyn AuditDocument) -> Result<Vec<AnnotationInfo>> {
    let mut all = Vec::new();
    for index in 0..doc.page_count() {
        all.extend(doc.annotations(index)?);
    }
    Ok(all)
}

fn summarize_annotations(annotations: &[AnnotationInfo], findings: &mut StructuralFindings) {
    let mut types = BTreeSet::new();
    let mut reviewers = BTreeSet::new();
    let mut urls = BTreeSet::new();

    for annotation in annotations {
        types.insert(annotation.subtype.clone());

        for name in [&annotation.author, &annotation.subject].into_iter().flatten() {
            let name = name.trim();
            if !name.is_empty() && name != "None" {
                reviewers.insert(name.to_string());
            }
        }

        if let Some(action) = &annotation.action {
            urls.extend(
                action
                    .targets()
                    .filter(|t| t.starts_with("http://") || t.starts_with("https://"))
                    .map(str::to_string),
            );
        }
    }

    findings.has_annotations = !annotations.is_empty();
    findings.annotation_count = annotations.len();
    findings.annotation_types = types.into_iter().collect();
    findings.reviewer_names = reviewers.into_iter().collect();
    findings.has_external_links = !urls.is_empty();
    findings.external_urls = urls.into_iter().collect();
}

fn check_forms(doc: &dyn AuditDocument, findings: &mut StructuralFindings) -> Result<()> {
    let fields = doc.form_fields()?;
    let signatures: Vec<_> = fields.iter().filter(|f| f.is_signature()).collect();

    findings.has_forms = !fields.is_empty();
    findings.form_field_count = fields.len();
    findings.has_signatures = !signatures.is_empty();
    findings.signature_count = signatures.len();
    findings.signer_names = signatures
        .iter()
        .filter_map(|f| f.signer_name.as_ref().or(f.name.as_ref()))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    Ok(())
}

fn check_catalog(doc: &dyn AuditDocument, findings: &mut StructuralFindings) -> Result<()> {
    let catalog = doc.catalog()?;
    findings.has_javascript = catalog.has_javascript_name_tree || catalog.javascript_action_count > 0;
    findings.javascript_count = catalog.javascript_action_count;
    findings.has_actions = catalog.has_open_action || catalog.has_additional_actions;
    findings.has_layers = catalog.layer_count > 0;
    findings.layer_count = catalog.layer_count;
    findings.has_structure_tags = catalog.has_struct_tree;
    findings.has_alt_text = catalog.is_marked;
    findings.has_remote_resources |= catalog.remote_action_count > 0;
    Ok(())
}

fn check_thumbnails(doc: &dyn AuditDocument, findings: &mut StructuralFindings) -> Result<()> {
    for index in 0..doc.page_count() {
        if doc.has_thumbnail(index)? {
            findings.has_thumbnails = true;
            break;
        }
    }
    Ok(())
}
