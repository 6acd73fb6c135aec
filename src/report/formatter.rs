//! Report formatter implementation
//! Author: kartik4091
//! Created: 2025-06-05

use std::fmt::Write as _;

use serde::Serialize;

use super::{BatchReport, DocumentFindings, DocumentRiskReport, ReportError, ReportFormat};

/// Formats batch reports into the supported output formats
pub struct ReportFormatter;

impl ReportFormatter {
    pub fn format(data: &BatchReport, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::PlainText => Self::to_text(data),
            ReportFormat::Json => Self::to_json(data),
            ReportFormat::Csv => Self::to_csv(data),
        }
    }

    fn to_json(data: &BatchReport) -> Result<String, ReportError> {
        serde_json::to_string_pretty(data).map_err(|e| ReportError::SerializationError(e.to_string()))
    }

    fn to_csv(data: &BatchReport) -> Result<String, ReportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for report in &data.reports {
            writer
                .serialize(CsvRow::from_report(report))
                .map_err(|e| ReportError::SerializationError(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ReportError::SerializationError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ReportError::FormatError(e.to_string()))
    }

    fn to_text(data: &BatchReport) -> Result<String, ReportError> {
        let mut out = String::new();
        Self::write_text(data, &mut out).map_err(|e| ReportError::FormatError(e.to_string()))?;
        Ok(out)
    }

    fn write_text(data: &BatchReport, out: &mut String) -> std::fmt::Result {
        writeln!(out, "PDF Redaction & Privacy Risk Audit")?;
        writeln!(out, "==================================")?;
        writeln!(out, "Run: {}  Generated: {}", data.run_id, data.generated_at.to_rfc3339())?;
        writeln!(out)?;
        writeln!(out, "SECURITY NOTICE: {}", data.security_notice)?;
        writeln!(out)?;

        for report in &data.reports {
            Self::write_document(report, out)?;
        }

        let s = &data.summary;
        writeln!(out, "Summary")?;
        writeln!(out, "-------")?;
        writeln!(out, "  PDFs audited:        {}", s.total_pdfs)?;
        writeln!(out, "  Pages audited:       {}", s.total_pages)?;
        writeln!(out, "  PDFs with risks:     {}", s.pdfs_with_risks)?;
        writeln!(out, "  Flagged pages:       {}", s.total_flagged_pages)?;
        writeln!(out, "  PDFs with errors:    {}", s.pdfs_with_errors)?;
        writeln!(out, "  Tiers:               HIGH {} / MEDIUM {} / LOW {}", s.high, s.medium, s.low)?;
        writeln!(out)?;
        writeln!(out, "{}", data.disclaimer)?;
        Ok(())
    }

    fn write_document(report: &DocumentRiskReport, out: &mut String) -> std::fmt::Result {
        writeln!(out, "{}", report.filename)?;
        if let Some(error) = &report.error {
            writeln!(out, "  ERROR: {}", error)?;
            writeln!(out)?;
            return Ok(());
        }

        writeln!(
            out,
            "  Pages: {}  Risk score: {}/100 ({})  Overlay risk: {}",
            report.total_pages,
            report.risk_score,
            report.risk_tier,
            report.overlay_risk.as_str()
        )?;
        for page in &report.page_risks {
            writeln!(
                out,
                "  - page {}: {} opaque rects, {} overlaps, confidence {}",
                page.page_number, page.opaque_rect_count, page.overlap_count, page.confidence_score
            )?;
        }

        if let Some(findings) = &report.findings {
            for line in finding_lines(findings) {
                writeln!(out, "  * {}", line)?;
            }
            for note in &findings.structure.notes {
                writeln!(out, "  note: {}", note)?;
            }
        }
        for note in &report.notes {
            writeln!(out, "  note: {}", note)?;
        }
        writeln!(out)
    }
}

/// Human-readable lines for the findings that are present
fn finding_lines(findings: &DocumentFindings) -> Vec<String> {
    let s = &findings.structure;
    let h = &findings.hidden_text;
    let mut lines = Vec::new();

    if h.has_hidden_text {
        lines.push(format!("Hidden text: {}", h.hidden_text_types.join(", ")));
    }
    if s.has_metadata {
        lines.push(format!("Metadata keys: {}", s.metadata_keys.join(", ")));
    }
    if s.has_attachments {
        lines.push(format!("Attachments: {} ({})", s.attachment_count, s.attachment_names.join(", ")));
    }
    if s.has_annotations {
        lines.push(format!("Annotations: {} ({})", s.annotation_count, s.annotation_types.join(", ")));
    }
    if !s.reviewer_names.is_empty() {
        lines.push(format!("Reviewer names: {}", s.reviewer_names.len()));
    }
    if s.has_forms {
        lines.push(format!("Form fields: {}", s.form_field_count));
    }
    if s.has_signatures {
        lines.push(format!("Signatures: {}", s.signature_count));
    }
    if s.has_ocr_layer {
        lines.push(format!("OCR layer on {} page(s), scanned: {}", s.ocr_pages.len(), yes_no(s.is_scanned)));
    }
    if s.has_javascript {
        lines.push(format!("JavaScript actions: {}", s.javascript_count));
    }
    if s.has_actions {
        lines.push("Document actions present".to_string());
    }
    if s.has_external_links {
        lines.push(format!("External URLs: {}", s.external_urls.len()));
    }
    if s.has_remote_resources {
        lines.push("Remote resources referenced".to_string());
    }
    if s.has_layers {
        lines.push(format!("Layers: {}", s.layer_count));
    }
    if s.incremental_updates {
        lines.push(format!("Incremental updates: {} revisions", s.version_count));
    }
    if s.has_structure_tags {
        lines.push("Accessibility structure tags".to_string());
    }
    if s.has_watermarks {
        lines.push("Repeated watermark text".to_string());
    }
    if s.has_thumbnails {
        lines.push("Page thumbnails".to_string());
    }
    lines
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

/// One CSV row; structural columns stay empty when the audit was skipped
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    filename: &'a str,
    total_pages: usize,
    flagged_pages: usize,
    flagged_page_numbers: String,
    max_confidence: Option<u32>,
    overlay_risk: &'static str,
    risk_score: u32,
    risk_tier: &'static str,
    has_hidden_text: Option<&'static str>,
    hidden_text_types: Option<String>,
    has_metadata: Option<&'static str>,
    metadata_keys: Option<String>,
    has_attachments: Option<&'static str>,
    attachment_count: Option<usize>,
    has_annotations: Option<&'static str>,
    annotation_count: Option<usize>,
    reviewer_count: Option<usize>,
    has_forms: Option<&'static str>,
    form_field_count: Option<usize>,
    has_ocr_layer: Option<&'static str>,
    is_scanned: Option<&'static str>,
    has_javascript: Option<&'static str>,
    javascript_count: Option<usize>,
    has_actions: Option<&'static str>,
    has_external_links: Option<&'static str>,
    external_url_count: Option<usize>,
    has_remote_resources: Option<&'static str>,
    has_signatures: Option<&'static str>,
    signature_count: Option<usize>,
    has_layers: Option<&'static str>,
    layer_count: Option<usize>,
    incremental_updates: Option<&'static str>,
    version_count: Option<usize>,
    has_structure_tags: Option<&'static str>,
    has_watermarks: Option<&'static str>,
    has_thumbnails: Option<&'static str>,
    notes: String,
    error: &'a str,
}

impl<'a> CsvRow<'a> {
    fn from_report(report: &'a DocumentRiskReport) -> Self {
        let f = report.findings.as_ref();
        let s = f.map(|f| &f.structure);
        let flag = |get: fn(&DocumentFindings) -> bool| f.map(|f| yes_no(get(f)));

        let mut notes: Vec<&str> = s.map(|s| s.notes.iter().map(String::as_str).collect()).unwrap_or_default();
        notes.extend(report.notes.iter().map(String::as_str));

        CsvRow {
            filename: &report.filename,
            total_pages: report.total_pages,
            flagged_pages: report.page_risks.len(),
            flagged_page_numbers: report
                .page_risks
                .iter()
                .map(|p| p.page_number.to_string())
                .collect::<Vec<_>>()
                .join(";"),
            max_confidence: report.max_confidence(),
            overlay_risk: report.overlay_risk.as_str(),
            risk_score: report.risk_score,
            risk_tier: report.risk_tier.as_str(),
            has_hidden_text: flag(|f| f.hidden_text.has_hidden_text),
            hidden_text_types: f.map(|f| f.hidden_text.hidden_text_types.join("; ")),
            has_metadata: flag(|f| f.structure.has_metadata),
            metadata_keys: s.map(|s| s.metadata_keys.join("; ")),
            has_attachments: flag(|f| f.structure.has_attachments),
            attachment_count: s.map(|s| s.attachment_count),
            has_annotations: flag(|f| f.structure.has_annotations),
            annotation_count: s.map(|s| s.annotation_count),
            reviewer_count: s.map(|s| s.reviewer_names.len()),
            has_forms: flag(|f| f.structure.has_forms),
            form_field_count: s.map(|s| s.form_field_count),
            has_ocr_layer: flag(|f| f.structure.has_ocr_layer),
            is_scanned: flag(|f| f.structure.is_scanned),
            has_javascript: flag(|f| f.structure.has_javascript),
            javascript_count: s.map(|s| s.javascript_count),
            has_actions: flag(|f| f.structure.has_actions),
            has_external_links: flag(|f| f.structure.has_external_links),
            external_url_count: s.map(|s| s.external_urls.len()),
            has_remote_resources: flag(|f| f.structure.has_remote_resources),
            has_signatures: flag(|f| f.structure.has_signatures),
            signature_count: s.map(|s| s.signature_count),
            has_layers: flag(|f| f.structure.has_layers),
            layer_count: s.map(|s| s.layer_count),
            incremental_updates: flag(|f| f.structure.incremental_updates),
            version_count: s.map(|s| s.version_count),
            has_structure_tags: flag(|f| f.structure.has_structure_tags),
            has_watermarks: flag(|f| f.structure.has_watermarks),
            has_thumbnails: flag(|f| f.structure.has_thumbnails),
            notes: notes.join(" | "),
            error: report.error.as_deref().unwrap_or(""),
        }
    }
}
