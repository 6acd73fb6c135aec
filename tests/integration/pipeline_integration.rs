use std::fs;
use std::sync::Arc;

use pdx_audit::config::AuditConfig;
use pdx_audit::report::{ReportFormat, ReportFormatter};
use pdx_audit::utils::metrics;
use pdx_audit::{collect_inputs, AuditPipeline, BatchReport, CancellationFlag, OverlayRisk};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::fixtures::{ScriptedAccessor, TestFixtures};

fn scripted(config: AuditConfig) -> AuditPipeline {
    AuditPipeline::new(config, Arc::new(ScriptedAccessor::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_mixed_corpus_keeps_every_report() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a-clean.pdf"), TestFixtures::clean_pdf()).unwrap();
        fs::write(dir.path().join("b-redacted.pdf"), TestFixtures::redacted_pdf()).unwrap();
        fs::write(dir.path().join("c-broken.pdf"), TestFixtures::corrupt_pdf()).unwrap();
        fs::write(dir.path().join("locked.pdf"), TestFixtures::clean_pdf()).unwrap();

        let pipeline = scripted(AuditConfig::default());
        let inputs = collect_inputs(dir.path(), false).unwrap();
        let reports = pipeline.audit_corpus(inputs, CancellationFlag::new()).await;

        let names: Vec<&str> = reports.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a-clean.pdf", "b-redacted.pdf", "c-broken.pdf", "locked.pdf"]);

        assert_eq!(reports[0].overlay_risk, OverlayRisk::None);
        assert_eq!(reports[1].overlay_risk, OverlayRisk::Definite);
        assert!(reports[2].error.as_deref().unwrap().starts_with("Invalid or corrupt PDF"));

        let locked = &reports[3];
        assert_eq!(locked.error.as_deref(), Some("PDF is encrypted and requires a password"));
        assert_eq!(locked.total_pages, 0);
        assert!(locked.page_risks.is_empty());

        let batch = BatchReport::new(reports);
        assert_eq!(batch.summary.total_pdfs, 4);
        assert_eq!(batch.summary.pdfs_with_errors, 2);
        assert_eq!(batch.summary.pdfs_with_risks, 1);
        assert_eq!(batch.summary.total_flagged_pages, 1);
        assert_eq!(pipeline.metrics().get_counter(metrics::DOCUMENTS_AUDITED), 2);
        assert_eq!(pipeline.metrics().get_counter(metrics::DOCUMENTS_ERRORED), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_output_order_ignores_completion_order() {
        let dir = TempDir::new().unwrap();
        for name in ["slow-400-first.pdf", "slow-10-second.pdf", "third.pdf"] {
            fs::write(dir.path().join(name), TestFixtures::clean_pdf()).unwrap();
        }
        let paths = vec![
            dir.path().join("slow-400-first.pdf"),
            dir.path().join("slow-10-second.pdf"),
            dir.path().join("third.pdf"),
        ];

        let mut config = AuditConfig::default();
        config.batch.max_concurrent = 3;
        let reports = scripted(config).audit_corpus(paths, CancellationFlag::new()).await;

        let names: Vec<&str> = reports.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["slow-400-first.pdf", "slow-10-second.pdf", "third.pdf"]);
        assert!(reports.iter().all(|r| r.error.is_none()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_document_times_out_alone() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("slow-2500.pdf"), TestFixtures::clean_pdf()).unwrap();
        fs::write(dir.path().join("quick.pdf"), TestFixtures::clean_pdf()).unwrap();

        let mut config = AuditConfig::default();
        config.batch.document_timeout_secs = 1;
        let pipeline = scripted(config);
        let reports = pipeline
            .audit_corpus(
                vec![dir.path().join("slow-2500.pdf"), dir.path().join("quick.pdf")],
                CancellationFlag::new(),
            )
            .await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].error.as_deref(), Some("Audit timed out after 1s"));
        assert!(reports[1].error.is_none());
        assert_eq!(pipeline.metrics().get_counter(metrics::DOCUMENTS_TIMED_OUT), 1);
    }

    #[tokio::test]
    async fn test_cancellation_before_start_yields_no_reports() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.pdf"), TestFixtures::clean_pdf()).unwrap();

        let cancel = CancellationFlag::new();
        cancel.cancel();
        let reports = scripted(AuditConfig::default())
            .audit_corpus(vec![dir.path().join("a.pdf")], cancel)
            .await;
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_no_security_audit_corpus_report() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("redacted.pdf"), TestFixtures::redacted_pdf()).unwrap();

        let mut config = AuditConfig::default();
        config.structural.enabled = false;
        let reports = scripted(config)
            .audit_corpus(vec![dir.path().join("redacted.pdf")], CancellationFlag::new())
            .await;

        assert!(reports[0].findings.is_none());
        assert_eq!(reports[0].risk_score, 20);
    }

    #[tokio::test]
    async fn test_batch_report_formats() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("redacted.pdf"), TestFixtures::redacted_pdf()).unwrap();
        fs::write(dir.path().join("locked.pdf"), TestFixtures::clean_pdf()).unwrap();

        let inputs = collect_inputs(dir.path(), false).unwrap();
        let reports = scripted(AuditConfig::default())
            .audit_corpus(inputs, CancellationFlag::new())
            .await;
        let batch = BatchReport::new(reports);

        let json = ReportFormatter::format(&batch, ReportFormat::Json).unwrap();
        let back: BatchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, batch);

        let csv = ReportFormatter::format(&batch, ReportFormat::Csv).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().next().unwrap().starts_with("filename,total_pages,"));

        let text = ReportFormatter::format(&batch, ReportFormat::PlainText).unwrap();
        assert!(text.contains("SECURITY NOTICE"));
        assert!(text.contains("manual verification"));
        assert!(text.contains("PDF is encrypted and requires a password"));
    }
}
