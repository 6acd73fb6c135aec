//! Repeated-text watermark detection
//! Author: kartik4091
//! Created: 2025-06-08

use std::collections::{BTreeSet, HashMap};

use crate::accessor::PageContent;

/// Rounded position and size plus the text fingerprint
type PlacementKey = (i64, i64, i64, i64, u64);

/// Tracks which pages show the same text at the same place
#[derive(Debug, Default)]
pub struct WatermarkTracker {
    placements: HashMap<PlacementKey, BTreeSet<usize>>,
}

impl WatermarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, page: &PageContent) {
        for span in page.text_spans.iter().filter(|s| s.glyph_count > 0) {
            let key = (
                span.bbox.x0.round() as i64,
                span.bbox.y0.round() as i64,
                span.bbox.width().round() as i64,
                span.bbox.height().round() as i64,
                span.fingerprint,
            );
            self.placements.entry(key).or_default().insert(page.number);
        }
    }

    /// True when some placement repeats on more than `min_pages` distinct pages
    pub fn has_watermark(&self, min_pages: usize) -> bool {
        self.placements.values().any(|pages| pages.len() > min_pages)
    }
}
