use lopdf::{dictionary, Object};
use pdx_audit::accessor::DocumentAccessor;
use pdx_audit::config::{AuditConfig, ExtractionMode};
use pdx_audit::{AuditPipeline, Error, LopdfAccessor, OverlayRisk, RiskTier};
use tempfile::TempDir;

use crate::fixtures::{overlay_redaction, text, PdfBuilder, TestFixtures};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_overlay_redaction_is_flagged_on_its_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("redacted.pdf");
        fs::write(&path, TestFixtures::redacted_pdf()).unwrap();

        let report = AuditPipeline::with_lopdf(AuditConfig::default()).audit_document(&path);

        assert!(report.error.is_none(), "{:?}", report.error);
        assert_eq!(report.total_pages, 2);
        assert_eq!(report.page_risks.len(), 1);
        let risk = &report.page_risks[0];
        assert_eq!(risk.page_number, 1);
        assert_eq!(risk.opaque_rect_count, 1);
        assert_eq!(risk.overlap_count, 1);
        assert_eq!(risk.confidence_score, 7);
        assert_eq!(report.overlay_risk, OverlayRisk::Definite);
        assert!(risk.covered_text_previews.is_none());
    }

    #[test]
    fn test_reports_never_contain_covered_text_by_default() {
        let dir = TempDir::new().unwrap();
        let path = PdfBuilder::new()
            .page(overlay_redaction("TOPSECRETVALUE"))
            .write(dir.path(), "secret.pdf");

        let report = AuditPipeline::with_lopdf(AuditConfig::default()).audit_document(&path);
        let json = serde_json::to_string(&report).unwrap();

        assert_eq!(report.page_risks.len(), 1);
        assert!(!json.contains("TOPSECRETVALUE"));
        assert!(!json.contains("TOPSEC"));
    }

    #[test]
    fn test_validation_mode_keeps_short_previews() {
        let dir = TempDir::new().unwrap();
        let path = PdfBuilder::new()
            .page(overlay_redaction("TOPSECRETVALUE"))
            .write(dir.path(), "secret.pdf");
        let config = AuditConfig {
            extraction: ExtractionMode::Validation { preview_chars: 6 },
            ..Default::default()
        };

        let report = AuditPipeline::with_lopdf(config).audit_document(&path);
        assert_eq!(
            report.page_risks[0].covered_text_previews,
            Some(vec!["TOPSEC".to_string()])
        );
    }

    #[test]
    fn test_clean_document_scores_low() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clean.pdf");
        fs::write(&path, TestFixtures::clean_pdf()).unwrap();

        let report = AuditPipeline::with_lopdf(AuditConfig::default()).audit_document(&path);

        assert!(report.page_risks.is_empty());
        assert_eq!(report.overlay_risk, OverlayRisk::None);
        assert_eq!(report.risk_tier, RiskTier::Low);
        let findings = report.findings.unwrap();
        assert!(!findings.hidden_text.has_hidden_text);
        assert!(!findings.structure.has_javascript);
    }

    #[test]
    fn test_white_text_is_hidden_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("white.pdf");
        fs::write(&path, TestFixtures::white_text_pdf()).unwrap();

        let report = AuditPipeline::with_lopdf(AuditConfig::default()).audit_document(&path);
        let hidden = report.findings.unwrap().hidden_text;

        assert!(hidden.has_hidden_text);
        assert_eq!(hidden.hidden_text_types, vec!["white-on-white text".to_string()]);
        assert_eq!(hidden.white_on_white_pages, vec![1]);
        assert!(hidden.previews.is_none());
    }

    #[test]
    fn test_text_cropped_out_of_view_is_off_page() {
        let dir = TempDir::new().unwrap();
        let path = PdfBuilder::new()
            .page_with(
                text(500, 700, "outside the crop"),
                dictionary! { "CropBox" => vec![0.into(), 0.into(), 300.into(), 300.into()] },
            )
            .write(dir.path(), "cropped.pdf");

        let report = AuditPipeline::with_lopdf(AuditConfig::default()).audit_document(&path);
        let hidden = report.findings.unwrap().hidden_text;

        assert_eq!(hidden.offpage_text_pages, vec![1]);
        assert!(hidden.hidden_text_types.iter().any(|t| t.contains("off-page")));
    }

    #[test]
    fn test_structural_signals_reach_the_score() {
        let dir = TempDir::new().unwrap();
        let path = PdfBuilder::new()
            .page(text(72, 700, "Exhibit A"))
            .info("Author", "Paralegal Name")
            .info("Producer", "")
            .catalog_entry(
                "OpenAction",
                Object::Dictionary(dictionary! {
                    "S" => "JavaScript",
                    "JS" => Object::string_literal("this.print()"),
                }),
            )
            .write(dir.path(), "scripted.pdf");

        let report = AuditPipeline::with_lopdf(AuditConfig::default()).audit_document(&path);
        let findings = report.findings.clone().unwrap();

        assert!(findings.structure.has_metadata);
        assert_eq!(findings.structure.metadata_keys, vec!["Author".to_string()]);
        assert!(findings.structure.metadata_values.is_none());
        assert!(findings.structure.has_javascript);
        // metadata 5 + javascript 15
        assert_eq!(report.risk_score, 20);
        assert_eq!(report.risk_tier, RiskTier::Medium);
    }

    #[test]
    fn test_corrupt_file_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, TestFixtures::corrupt_pdf()).unwrap();

        let report = AuditPipeline::with_lopdf(AuditConfig::default()).audit_document(&path);
        assert!(report.error.unwrap().starts_with("Invalid or corrupt PDF"));
        assert_eq!(report.total_pages, 0);
    }

    #[test]
    fn test_password_protected_document_does_not_open() {
        let dir = TempDir::new().unwrap();
        let path = PdfBuilder::new()
            .page(text(72, 700, "sealed"))
            .encrypted()
            .write(dir.path(), "sealed.pdf");

        let result = LopdfAccessor::default().open(&path);
        assert!(matches!(result.err(), Some(Error::EncryptedDocument)));
    }

    #[test]
    fn test_password_protected_document_report() {
        let dir = TempDir::new().unwrap();
        let path = PdfBuilder::new()
            .page(text(72, 700, "sealed"))
            .encrypted()
            .write(dir.path(), "sealed.pdf");

        let report = AuditPipeline::with_lopdf(AuditConfig::default()).audit_document(&path);

        assert_eq!(report.filename, "sealed.pdf");
        assert_eq!(report.error.as_deref(), Some("PDF is encrypted and requires a password"));
        assert_eq!(report.total_pages, 0);
        assert!(report.page_risks.is_empty());
        assert!(report.findings.is_none());
    }
}
