//! Redaction Audit Pipeline: per-document and per-corpus execution
//! Author: kartik4091
//! Created: 2025-06-05
//!
//! A document is audited synchronously: open, one pass over the pages feeding
//! the overlay detector, the hidden text scanner and the structural page
//! survey, then the document-level checks and the score. A corpus runs those
//! audits on the blocking pool with bounded concurrency, a per-document time
//! budget and cooperative cancellation. Every failure ends up in the report of
//! the document that caused it.

use std::any::Any;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use glob::{glob_with, MatchOptions, Pattern};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    accessor::DocumentAccessor,
    backend::LopdfAccessor,
    config::AuditConfig,
    error::{Error, Result},
    hidden_text::HiddenTextScanner,
    overlay::{self, OverlayRisk},
    report::{DocumentFindings, DocumentRiskReport},
    scoring::{score_findings, score_overlay_only, RiskTier},
    structural::{AuditorCapabilities, PageSurvey, StructuralAuditor},
    utils::metrics::{self, Metrics},
};

/// Shared stop signal; once set no further document is started
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates audits over a document accessor
#[derive(Clone)]
pub struct AuditPipeline {
    config: Arc<AuditConfig>,
    accessor: Arc<dyn DocumentAccessor>,
    metrics: Metrics,
}

impl AuditPipeline {
    pub fn new(config: AuditConfig, accessor: Arc<dyn DocumentAccessor>) -> Self {
        Self {
            config: Arc::new(config),
            accessor,
            metrics: Metrics::new(),
        }
    }

    /// Pipeline over the lopdf backend
    pub fn with_lopdf(config: AuditConfig) -> Self {
        let accessor = Arc::new(LopdfAccessor::new(&config.backend));
        Self::new(config, accessor)
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Deep checks run when the accessor supports them, unless the config turns them off
    pub fn capabilities(&self) -> AuditorCapabilities {
        let supported = self.accessor.supports_deep_structure();
        AuditorCapabilities {
            deep_structure: match self.config.structural.deep_structure {
                Some(wanted) => wanted && supported,
                None => supported,
            },
        }
    }

    /// Audits one document. Never fails: errors are recorded in the report.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn audit_document(&self, path: &Path) -> DocumentRiskReport {
        let outcome = self.evaluate(path);
        self.record(&outcome);
        outcome.report
    }

    fn evaluate(&self, path: &Path) -> Outcome {
        let started = Instant::now();
        let filename = display_name(path);
        let mut pages_read = 0;

        let mut report = match self.run_document(path, &filename, &mut pages_read) {
            Ok(report) => report,
            Err(e) => {
                warn!("⚠️  {}: {}", filename, e);
                DocumentRiskReport::failed(filename, e)
            }
        };

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        Outcome { report, pages_read }
    }

    /// Counts a finished document; called once, by whoever keeps its report
    fn record(&self, outcome: &Outcome) {
        let report = &outcome.report;
        self.metrics.add_to_counter(metrics::PAGES_AUDITED, outcome.pages_read);
        if report.is_error() {
            self.metrics.increment_counter(metrics::DOCUMENTS_ERRORED);
            return;
        }
        self.metrics.increment_counter(metrics::DOCUMENTS_AUDITED);
        self.metrics
            .add_to_counter(metrics::PAGES_FLAGGED, report.page_risks.len() as u64);
        info!(
            "✅ {}: {} pages, overlay {}, score {} ({})",
            report.filename,
            report.total_pages,
            report.overlay_risk.as_str(),
            report.risk_score,
            report.risk_tier
        );
    }

    fn run_document(&self, path: &Path, filename: &str, pages_read: &mut u64) -> Result<DocumentRiskReport> {
        let config = &self.config;
        let mode = config.extraction;
        let security_audit = config.structural.enabled;

        let doc = self.accessor.open(path)?;
        let total_pages = doc.page_count();
        debug!("Auditing {} ({} pages)", filename, total_pages);

        let mut page_risks = Vec::new();
        let mut notes = Vec::new();
        let mut hidden_text = HiddenTextScanner::new(&config.hidden_text, mode);
        let mut survey = PageSurvey::default();

        for index in 0..total_pages {
            let page = match doc.page(index, mode) {
                Ok(page) => page,
                Err(e) => {
                    warn!("⚠️  {}: page {} skipped: {}", filename, index + 1, e);
                    notes.push(format!("page {} skipped: {}", index + 1, e));
                    continue;
                }
            };
            *pages_read += 1;

            if let Some(risk) = overlay::audit_page(&page, page.number, &config.overlay, mode) {
                page_risks.push(risk);
            }
            if security_audit {
                hidden_text.scan_page(&page);
                survey.observe(&page, &config.structural);
            }
        }

        let overlay_risk = OverlayRisk::from_pages(&page_risks, config.overlay.definite_confidence);

        let (findings, risk_score) = if security_audit {
            let auditor = StructuralAuditor::new(&config.structural, self.capabilities());
            let findings = DocumentFindings {
                overlay_risk,
                hidden_text: hidden_text.finish(),
                structure: auditor.audit(doc.as_ref(), survey),
            };
            let score = score_findings(&findings, &config.weights);
            (Some(findings), score)
        } else {
            (None, score_overlay_only(overlay_risk, &config.weights))
        };

        Ok(DocumentRiskReport {
            filename: filename.to_string(),
            total_pages,
            page_risks,
            overlay_risk,
            findings,
            risk_score,
            risk_tier: RiskTier::from_score(risk_score, config.tiers.active()),
            error: None,
            notes,
            elapsed_ms: 0,
        })
    }

    /// Audits a corpus. Reports come back in input order; documents not yet
    /// started when `cancel` is set produce no report.
    #[instrument(skip(self, paths, cancel), fields(documents = paths.len()))]
    pub async fn audit_corpus(&self, paths: Vec<PathBuf>, cancel: CancellationFlag) -> Vec<DocumentRiskReport> {
        let max_concurrent = self.config.batch.max_concurrent.max(1);
        let limit = self.config.batch.document_timeout();
        info!(
            "🚦 Auditing {} documents ({} at a time, {:?} each)",
            paths.len(),
            max_concurrent,
            limit
        );
        self.metrics.start_timer(metrics::CORPUS_TIMER);

        let reports: Vec<Option<DocumentRiskReport>> = stream::iter(paths.into_iter().map(|path| {
            let pipeline = self.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    debug!("Skipping {} after cancellation", path.display());
                    pipeline.metrics.increment_counter(metrics::DOCUMENTS_SKIPPED);
                    return None;
                }
                Some(pipeline.audit_on_blocking_pool(path, limit).await)
            }
        }))
        .buffered(max_concurrent)
        .collect()
        .await;

        self.metrics.end_timer(metrics::CORPUS_TIMER);
        if cancel.is_cancelled() {
            warn!("⚠️  Run cancelled, {} documents skipped", self.metrics.get_counter(metrics::DOCUMENTS_SKIPPED));
        }
        reports.into_iter().flatten().collect()
    }

    async fn audit_on_blocking_pool(&self, path: PathBuf, limit: Duration) -> DocumentRiskReport {
        let filename = display_name(&path);
        let pipeline = self.clone();
        let task = tokio::task::spawn_blocking(move || pipeline.evaluate(&path));

        // On timeout the blocking worker keeps running; its result is dropped unrecorded
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(outcome)) => {
                self.record(&outcome);
                outcome.report
            }
            Ok(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    format!("audit panicked: {}", panic_message(join_error.into_panic()))
                } else {
                    format!("audit task failed: {}", join_error)
                };
                error!("❌ {}: {}", filename, reason);
                self.metrics.increment_counter(metrics::DOCUMENTS_ERRORED);
                DocumentRiskReport::failed(filename, Error::InternalError(reason.into()))
            }
            Err(_) => {
                warn!("⏱️  {}: no result after {:?}", filename, limit);
                self.metrics.increment_counter(metrics::DOCUMENTS_TIMED_OUT);
                let mut report = DocumentRiskReport::failed(filename, Error::Timeout(limit));
                report.elapsed_ms = limit.as_millis() as u64;
                report
            }
        }
    }
}

struct Outcome {
    report: DocumentRiskReport,
    pages_read: u64,
}

/// Runs `future` on a fresh multi-threaded runtime and shuts it down without
/// waiting for blocking workers left behind by timed-out audits
pub fn run_on_audit_runtime<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("redaction-audit")
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

/// Resolves an input path into the sorted list of PDFs to audit
pub fn collect_inputs(input: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        return Err(Error::InputNotFound(input.to_path_buf()));
    }
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let root = input
        .to_str()
        .ok_or_else(|| Error::InvalidArgument(format!("Input path is not valid UTF-8: {}", input.display())))?;
    let pattern = if recursive {
        format!("{}/**/*.pdf", Pattern::escape(root))
    } else {
        format!("{}/*.pdf", Pattern::escape(root))
    };
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut paths: Vec<PathBuf> = glob_with(&pattern, options)
        .map_err(|e| Error::InvalidArgument(format!("Bad input pattern: {}", e)))?
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                warn!("⚠️  Unreadable entry skipped: {}", e);
                None
            }
        })
        .collect();
    paths.sort();

    debug!("Found {} PDFs under {}", paths.len(), input.display());
    Ok(paths)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{
        AnnotationInfo, AttachmentInfo, AuditDocument, CatalogInfo, FillPath, FormFieldInfo, PageContent, TextSpan,
    };
    use crate::config::ExtractionMode;
    use crate::geometry::{ColorSample, Rect};
    use std::fs;
    use tempfile::TempDir;

    /// A single page with one black box over one line of text
    struct RedactedDoc;

    impl AuditDocument for RedactedDoc {
        fn page_count(&self) -> usize {
            2
        }

        fn page(&self, index: usize, _mode: ExtractionMode) -> Result<PageContent> {
            if index == 1 {
                return Err(Error::PageUnavailable {
                    page: 2,
                    reason: "bad content stream".into(),
                });
            }
            Ok(PageContent {
                number: 1,
                rect: Rect::new(0.0, 0.0, 612.0, 792.0),
                fill_paths: vec![FillPath {
                    rect: Rect::new(90.0, 690.0, 200.0, 712.0),
                    color: Some(ColorSample::black()),
                }],
                text_spans: vec![TextSpan {
                    bbox: Rect::new(100.0, 698.0, 190.0, 708.0),
                    color: Some(ColorSample::black()),
                    font_size: 10.0,
                    glyph_count: 18,
                    fingerprint: 7,
                    preview: None,
                }],
                images: Vec::new(),
            })
        }

        fn metadata(&self) -> Result<Vec<(String, String)>> {
            Ok(vec![("Author".into(), "Clerk".into())])
        }

        fn has_xmp_metadata(&self) -> Result<bool> {
            Ok(false)
        }

        fn attachments(&self) -> Result<Vec<AttachmentInfo>> {
            Ok(Vec::new())
        }

        fn annotations(&self, _index: usize) -> Result<Vec<AnnotationInfo>> {
            Ok(Vec::new())
        }

        fn form_fields(&self) -> Result<Vec<FormFieldInfo>> {
            Ok(Vec::new())
        }

        fn catalog(&self) -> Result<CatalogInfo> {
            Ok(CatalogInfo::default())
        }

        fn has_thumbnail(&self, _index: usize) -> Result<bool> {
            Ok(false)
        }

        fn raw_bytes(&self) -> &[u8] {
            b"%PDF-1.4\nstartxref\n0\n%%EOF"
        }
    }

    struct StubAccessor {
        deep: bool,
    }

    impl DocumentAccessor for StubAccessor {
        fn open(&self, path: &Path) -> Result<Box<dyn AuditDocument>> {
            match path.file_name().and_then(|n| n.to_str()) {
                Some("locked.pdf") => Err(Error::EncryptedDocument),
                Some("panic.pdf") => panic!("parser blew up"),
                Some("slow.pdf") => {
                    std::thread::sleep(Duration::from_millis(2500));
                    Ok(Box::new(RedactedDoc))
                }
                _ => Ok(Box::new(RedactedDoc)),
            }
        }

        fn supports_deep_structure(&self) -> bool {
            self.deep
        }
    }

    fn pipeline(config: AuditConfig) -> AuditPipeline {
        AuditPipeline::new(config, Arc::new(StubAccessor { deep: true }))
    }

    #[test]
    fn test_document_report_with_skipped_page() {
        let report = pipeline(AuditConfig::default()).audit_document(Path::new("/corpus/case.pdf"));

        assert_eq!(report.filename, "case.pdf");
        assert_eq!(report.total_pages, 2);
        assert_eq!(report.page_risks.len(), 1);
        assert_eq!(report.notes.len(), 1);
        assert!(report.notes[0].starts_with("page 2 skipped"));
        assert!(report.error.is_none());

        let findings = report.findings.as_ref().unwrap();
        assert!(findings.structure.has_metadata);
        assert!(!findings.structure.incremental_updates);
        assert_eq!(findings.overlay_risk, report.overlay_risk);
    }

    #[test]
    fn test_encrypted_document_is_contained() {
        let pipeline = pipeline(AuditConfig::default());
        let report = pipeline.audit_document(Path::new("locked.pdf"));

        assert_eq!(report.error.as_deref(), Some("PDF is encrypted and requires a password"));
        assert_eq!(report.total_pages, 0);
        assert!(report.page_risks.is_empty());
        assert_eq!(pipeline.metrics().get_counter(metrics::DOCUMENTS_ERRORED), 1);
    }

    #[test]
    fn test_security_audit_disabled_scores_overlay_only() {
        let mut config = AuditConfig::default();
        config.structural.enabled = false;
        let report = pipeline(config.clone()).audit_document(Path::new("case.pdf"));

        assert!(report.findings.is_none());
        assert_eq!(report.risk_score, score_overlay_only(report.overlay_risk, &config.weights));
    }

    #[test]
    fn test_capability_override() {
        let mut config = AuditConfig::default();
        assert!(pipeline(config.clone()).capabilities().deep_structure);

        config.structural.deep_structure = Some(false);
        assert!(!pipeline(config.clone()).capabilities().deep_structure);

        config.structural.deep_structure = Some(true);
        let shallow = AuditPipeline::new(config, Arc::new(StubAccessor { deep: false }));
        assert!(!shallow.capabilities().deep_structure);
    }

    #[tokio::test]
    async fn test_corpus_contains_panics_and_keeps_order() {
        let pipeline = pipeline(AuditConfig::default());
        let paths = vec![
            PathBuf::from("a.pdf"),
            PathBuf::from("panic.pdf"),
            PathBuf::from("locked.pdf"),
            PathBuf::from("d.pdf"),
        ];

        let reports = pipeline.audit_corpus(paths, CancellationFlag::new()).await;
        let names: Vec<&str> = reports.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["a.pdf", "panic.pdf", "locked.pdf", "d.pdf"]);
        assert!(reports[1].error.as_deref().unwrap().contains("parser blew up"));
        assert!(reports[2].is_error());
        assert!(!reports[3].is_error());
    }

    #[tokio::test]
    async fn test_cancelled_corpus_starts_nothing() {
        let pipeline = pipeline(AuditConfig::default());
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let reports = pipeline
            .audit_corpus(vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")], cancel)
            .await;
        assert!(reports.is_empty());
        assert_eq!(pipeline.metrics().get_counter(metrics::DOCUMENTS_SKIPPED), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_document_is_counted_once() {
        let mut config = AuditConfig::default();
        config.batch.document_timeout_secs = 1;
        let pipeline = pipeline(config);

        let reports = pipeline
            .audit_corpus(vec![PathBuf::from("slow.pdf")], CancellationFlag::new())
            .await;
        assert_eq!(reports[0].error.as_deref(), Some("Audit timed out after 1s"));

        // Let the abandoned worker finish
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(pipeline.metrics().get_counter(metrics::DOCUMENTS_TIMED_OUT), 1);
        assert_eq!(pipeline.metrics().get_counter(metrics::DOCUMENTS_AUDITED), 0);
        assert_eq!(pipeline.metrics().get_counter(metrics::DOCUMENTS_ERRORED), 0);
        assert_eq!(pipeline.metrics().get_counter(metrics::PAGES_AUDITED), 0);
    }

    #[test]
    fn test_runtime_shutdown_leaves_timed_out_workers_behind() {
        let mut config = AuditConfig::default();
        config.batch.document_timeout_secs = 1;
        let pipeline = pipeline(config);

        let started = Instant::now();
        let reports = run_on_audit_runtime(pipeline.audit_corpus(vec![PathBuf::from("slow.pdf")], CancellationFlag::new()))
            .unwrap();

        assert!(reports[0].is_error());
        assert!(started.elapsed() < Duration::from_millis(2000), "{:?}", started.elapsed());
    }

    #[test]
    fn test_collect_inputs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.pdf"), b"x").unwrap();
        fs::write(dir.path().join("A.PDF"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.pdf"), b"x").unwrap();

        let flat = collect_inputs(dir.path(), false).unwrap();
        let names: Vec<String> = flat.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, ["A.PDF", "b.pdf"]);

        let deep = collect_inputs(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);

        let single = dir.path().join("b.pdf");
        assert_eq!(collect_inputs(&single, false).unwrap(), vec![single]);

        assert!(matches!(
            collect_inputs(&dir.path().join("missing"), false),
            Err(Error::InputNotFound(_))
        ));
    }
}
