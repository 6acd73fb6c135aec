//! Hidden and invisible text scanner
//! Author: kartik4091
//! Created: 2025-06-08

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::accessor::{PageContent, TextSpan};
use crate::config::{ExtractionMode, HiddenTextConfig};
use crate::geometry::{is_white_like, Rect};

/// Ways a span can be present but unreadable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenTextKind {
    WhiteOnWhite,
    OffPage,
    Tiny,
}

impl HiddenTextKind {
    pub fn label(&self) -> &'static str {
        match self {
            HiddenTextKind::WhiteOnWhite => "white-on-white text",
            HiddenTextKind::OffPage => "off-page text",
            HiddenTextKind::Tiny => "tiny text",
        }
    }
}

/// Preview of one hidden span, only produced in validation mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenTextPreview {
    pub page_number: usize,
    pub kind: HiddenTextKind,
    pub text: String,
}

/// Document-level hidden text results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenTextFindings {
    pub has_hidden_text: bool,
    pub hidden_text_types: Vec<String>,
    pub white_on_white_pages: Vec<usize>,
    pub offpage_text_pages: Vec<usize>,
    pub tiny_text_pages: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previews: Option<Vec<HiddenTextPreview>>,
}

/// Every category a single span falls into
pub fn classify_span(span: &TextSpan, page_rect: &Rect, config: &HiddenTextConfig) -> Vec<HiddenTextKind> {
    let mut kinds = Vec::new();
    if is_white_like(span.color.as_ref(), config.white_tolerance) {
        kinds.push(HiddenTextKind::WhiteOnWhite);
    }
    if span.bbox.exceeds(page_rect, config.off_page_margin) {
        kinds.push(HiddenTextKind::OffPage);
    }
    if span.font_size > 0.0 && span.font_size < config.tiny_font_size {
        kinds.push(HiddenTextKind::Tiny);
    }
    kinds
}

/// Accumulates per-page classifications into document findings
pub struct HiddenTextScanner<'a> {
    config: &'a HiddenTextConfig,
    mode: ExtractionMode,
    kinds_seen: Vec<HiddenTextKind>,
    white_on_white: BTreeSet<usize>,
    off_page: BTreeSet<usize>,
    tiny: BTreeSet<usize>,
    previews: Vec<HiddenTextPreview>,
}

impl<'a> HiddenTextScanner<'a> {
    pub fn new(config: &'a HiddenTextConfig, mode: ExtractionMode) -> Self {
        Self {
            config,
            mode,
            kinds_seen: Vec::new(),
            white_on_white: BTreeSet::new(),
            off_page: BTreeSet::new(),
            tiny: BTreeSet::new(),
            previews: Vec::new(),
        }
    }

    pub fn scan_page(&mut self, page: &PageContent) {
        for span in &page.text_spans {
            for kind in classify_span(span, &page.rect, self.config) {
                if !self.kinds_seen.contains(&kind) {
                    self.kinds_seen.push(kind);
                }
                match kind {
                    HiddenTextKind::WhiteOnWhite => self.white_on_white.insert(page.number),
                    HiddenTextKind::OffPage => self.off_page.insert(page.number),
                    HiddenTextKind::Tiny => self.tiny.insert(page.number),
                };
                self.record_preview(page.number, kind, span);
            }
        }
    }

    fn record_preview(&mut self, page_number: usize, kind: HiddenTextKind, span: &TextSpan) {
        let Some(limit) = self.mode.preview_chars() else {
            return;
        };
        if self.previews.len() >= self.config.max_previews {
            return;
        }
        if let Some(text) = span.preview.as_deref() {
            self.previews.push(HiddenTextPreview {
                page_number,
                kind,
                text: text.chars().take(limit).collect(),
            });
        }
    }

    pub fn finish(self) -> HiddenTextFindings {
        HiddenTextFindings {
            has_hidden_text: !self.kinds_seen.is_empty(),
            hidden_text_types: self.kinds_seen.iter().map(|k| k.label().to_string()).collect(),
            white_on_white_pages: self.white_on_white.into_iter().collect(),
            offpage_text_pages: self.off_page.into_iter().collect(),
            tiny_text_pages: self.tiny.into_iter().collect(),
            previews: self.mode.is_validation().then_some(self.previews),
        }
    }
}
