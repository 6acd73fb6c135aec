//! Overlay redaction risk detector
//! Author: kartik4091
//! Created: 2025-06-07
//!
//! Flags pages where near-black filled rectangles sit on top of text that is
//! still present in the content stream. Only geometry is inspected; span text
//! is never read unless validation mode is explicitly enabled.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accessor::PageContent;
use crate::config::{ExtractionMode, OverlayConfig};
use crate::geometry::{intersection_area, is_black_like, ColorSample, Rect};

/// Identifier of the heuristic that produced a page risk
pub const HEURISTIC_ID: &str = "black_fill_rect_overlap_text";

/// A filled rectangle that could be a redaction box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpaqueFillCandidate {
    pub rect: Rect,
    pub color: ColorSample,
}

/// One flagged page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRisk {
    pub page_number: usize,
    pub opaque_rect_count: usize,
    pub overlap_count: usize,
    pub confidence_score: u32,
    pub heuristic_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covered_text_previews: Option<Vec<String>>,
}

/// Document-level overlay verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlayRisk {
    #[default]
    #[serde(rename = "NO")]
    None,
    #[serde(rename = "MAYBE")]
    Possible,
    #[serde(rename = "YES")]
    Definite,
}

impl OverlayRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayRisk::None => "NO",
            OverlayRisk::Possible => "MAYBE",
            OverlayRisk::Definite => "YES",
        }
    }

    /// Verdict over all flagged pages of a document
    pub fn from_pages(pages: &[PageRisk], definite_confidence: u32) -> Self {
        if pages.is_empty() {
            OverlayRisk::None
        } else if pages.iter().any(|p| p.confidence_score >= definite_confidence) {
            OverlayRisk::Definite
        } else {
            OverlayRisk::Possible
        }
    }
}

/// Black-like filled rectangles that are neither hairlines nor page backgrounds
pub fn extract_opaque_fills(page: &PageContent, config: &OverlayConfig) -> Vec<OpaqueFillCandidate> {
    let page_area = page.rect.area();
    let mut unique: Vec<OpaqueFillCandidate> = Vec::new();

    for path in &page.fill_paths {
        let color = match path.color {
            Some(color) if is_black_like(Some(&color), config.black_threshold) => color,
            _ => continue,
        };
        let rect = path.rect;

        if rect.width() < config.min_dimension || rect.height() < config.min_dimension {
            continue;
        }
        if page_area > 0.0 && rect.area() > config.max_coverage_ratio * page_area {
            continue;
        }
        if unique
            .iter()
            .any(|existing| existing.rect.approx_eq(&rect, config.dedup_tolerance))
        {
            continue;
        }
        unique.push(OpaqueFillCandidate { rect, color });
    }

    unique
}

/// Span bounding boxes with everything else dropped
pub fn extract_text_span_bounds(page: &PageContent) -> Vec<Rect> {
    page.text_spans.iter().map(|span| span.bbox).collect()
}

/// Number of fills that cover at least one span by `min_overlap_area`.
///
/// Each fill counts once. Counting stops as soon as `stop_after` is reached.
pub fn count_overlaps(
    fills: &[OpaqueFillCandidate],
    spans: &[Rect],
    min_overlap_area: f64,
    stop_after: Option<usize>,
) -> usize {
    let mut count = 0;
    for fill in fills {
        if spans
            .iter()
            .any(|span| intersection_area(&fill.rect, span) >= min_overlap_area)
        {
            count += 1;
        }
        if stop_after.map_or(false, |limit| count >= limit) {
            break;
        }
    }
    count
}

/// Number of (fill, span) pairs overlapping by at least `min_overlap_area`
pub fn count_overlap_pairs(fills: &[OpaqueFillCandidate], spans: &[Rect], min_overlap_area: f64) -> usize {
    fills
        .iter()
        .map(|fill| {
            spans
                .iter()
                .filter(|span| intersection_area(&fill.rect, span) >= min_overlap_area)
                .count()
        })
        .sum()
}

/// Audits one page; `None` unless the page is flagged
pub fn audit_page(
    page: &PageContent,
    page_number: usize,
    config: &OverlayConfig,
    mode: ExtractionMode,
) -> Option<PageRisk> {
    let fills = extract_opaque_fills(page, config);
    if fills.is_empty() {
        return None;
    }

    let spans = extract_text_span_bounds(page);
    if spans.is_empty() {
        return None;
    }

    let hits = count_overlaps(&fills, &spans, config.min_overlap_area, Some(config.min_hits));
    if hits < config.min_hits {
        return None;
    }

    let confidence_score = confidence(&fills, hits, config);
    let overlap_count = count_overlap_pairs(&fills, &spans, config.min_overlap_area);
    debug!(
        "Page {}: {} opaque fills, {} overlaps, confidence {}",
        page_number,
        fills.len(),
        overlap_count,
        confidence_score
    );

    Some(PageRisk {
        page_number,
        opaque_rect_count: fills.len(),
        overlap_count,
        confidence_score,
        heuristic_id: HEURISTIC_ID.to_string(),
        covered_text_previews: mode
            .preview_chars()
            .map(|limit| covered_previews(page, &fills, config.min_overlap_area, limit)),
    })
}

/// Additive evidence score; adding fills or overlaps never lowers it
fn confidence(fills: &[OpaqueFillCandidate], hits: usize, config: &OverlayConfig) -> u32 {
    let mut score = 0;
    if !fills.is_empty() {
        score += config.score_any_fill;
    }
    if hits >= config.min_hits {
        score += config.score_threshold_met;
    }
    if fills
        .iter()
        .any(|f| f.rect.width() > config.redaction_aspect_ratio * f.rect.height())
    {
        score += config.score_redaction_shape;
    }
    if fills.len() >= config.multi_fill_count {
        score += config.score_multi_fill;
    }
    score
}

fn covered_previews(
    page: &PageContent,
    fills: &[OpaqueFillCandidate],
    min_overlap_area: f64,
    limit: usize,
) -> Vec<String> {
    page.text_spans
        .iter()
        .filter(|span| {
            fills
                .iter()
                .any(|fill| intersection_area(&fill.rect, &span.bbox) >= min_overlap_area)
        })
        .filter_map(|span| span.preview.as_deref())
        .map(|text| text.chars().take(limit).collect())
        .collect()
}
