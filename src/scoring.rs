//! Risk scoring
//! Author: kartik4091
//! Created: 2025-06-08

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ScoreWeights, TierThresholds};
use crate::overlay::OverlayRisk;
use crate::report::DocumentFindings;

/// Independent evidence that contributes to a document's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskSignal {
    HiddenText,
    OverlayDefinite,
    OverlayPossible,
    Signatures,
    JavaScript,
    ExternalLinks,
    Metadata,
    Attachments,
    ReviewerNames,
    OcrLayer,
    IncrementalUpdates,
    Forms,
    Thumbnails,
    StructureTags,
}

impl RiskSignal {
    pub fn weight(&self, weights: &ScoreWeights) -> u32 {
        match self {
            RiskSignal::HiddenText => weights.hidden_text,
            RiskSignal::OverlayDefinite => weights.overlay_definite,
            RiskSignal::OverlayPossible => weights.overlay_possible,
            RiskSignal::Signatures => weights.signatures,
            RiskSignal::JavaScript => weights.javascript,
            RiskSignal::ExternalLinks => weights.external_links,
            RiskSignal::Metadata => weights.metadata,
            RiskSignal::Attachments => weights.attachments,
            RiskSignal::ReviewerNames => weights.reviewer_names,
            RiskSignal::OcrLayer => weights.ocr_layer,
            RiskSignal::IncrementalUpdates => weights.incremental_updates,
            RiskSignal::Forms => weights.forms,
            RiskSignal::Thumbnails => weights.thumbnails,
            RiskSignal::StructureTags => weights.structure_tags,
        }
    }
}

/// Reporting tier derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_score(score: u32, thresholds: TierThresholds) -> Self {
        if score >= thresholds.high {
            RiskTier::High
        } else if score >= thresholds.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn overlay_signal(verdict: OverlayRisk) -> Option<RiskSignal> {
    match verdict {
        OverlayRisk::Definite => Some(RiskSignal::OverlayDefinite),
        OverlayRisk::Possible => Some(RiskSignal::OverlayPossible),
        OverlayRisk::None => None,
    }
}

/// Every signal present in a set of findings
pub fn collect_signals(findings: &DocumentFindings) -> BTreeSet<RiskSignal> {
    let s = &findings.structure;
    let mut signals: BTreeSet<RiskSignal> = [
        (findings.hidden_text.has_hidden_text, RiskSignal::HiddenText),
        (s.has_signatures, RiskSignal::Signatures),
        (s.has_javascript, RiskSignal::JavaScript),
        (s.has_external_links || s.has_remote_resources, RiskSignal::ExternalLinks),
        (s.has_metadata, RiskSignal::Metadata),
        (s.has_attachments, RiskSignal::Attachments),
        (!s.reviewer_names.is_empty(), RiskSignal::ReviewerNames),
        (s.has_ocr_layer, RiskSignal::OcrLayer),
        (s.incremental_updates, RiskSignal::IncrementalUpdates),
        (s.has_forms, RiskSignal::Forms),
        (s.has_thumbnails, RiskSignal::Thumbnails),
        (s.has_structure_tags, RiskSignal::StructureTags),
    ]
    .into_iter()
    .filter_map(|(present, signal)| present.then_some(signal))
    .collect();

    signals.extend(overlay_signal(findings.overlay_risk));
    signals
}

/// Weighted sum of the signals, clamped to 100
pub fn score_signals<I>(signals: I, weights: &ScoreWeights) -> u32
where
    I: IntoIterator<Item = RiskSignal>,
{
    let unique: BTreeSet<RiskSignal> = signals.into_iter().collect();
    unique
        .iter()
        .map(|signal| signal.weight(weights))
        .fold(0u32, u32::saturating_add)
        .min(100)
}

pub fn score_findings(findings: &DocumentFindings, weights: &ScoreWeights) -> u32 {
    score_signals(collect_signals(findings), weights)
}

/// Score used when the structural audit is switched off
pub fn score_overlay_only(verdict: OverlayRisk, weights: &ScoreWeights) -> u32 {
    score_signals(overlay_signal(verdict), weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_text_definite_overlay_javascript_is_fifty() {
        let mut findings = DocumentFindings::default();
        findings.hidden_text.has_hidden_text = true;
        findings.overlay_risk = OverlayRisk::Definite;
        findings.structure.has_javascript = true;

        assert_eq!(score_findings(&findings, &ScoreWeights::default()), 50);
    }

    #[test]
    fn test_order_independent_and_deduplicated() {
        let weights = ScoreWeights::default();
        let forward = [RiskSignal::Metadata, RiskSignal::Forms, RiskSignal::JavaScript];
        let backward = [RiskSignal::JavaScript, RiskSignal::Forms, RiskSignal::Metadata, RiskSignal::Forms];
        assert_eq!(score_signals(forward, &weights), 22);
        assert_eq!(score_signals(backward, &weights), 22);
    }

    #[test]
    fn test_clamped_to_hundred() {
        let weights = ScoreWeights { hidden_text: 90, javascript: 90, ..Default::default() };
        assert_eq!(score_signals([RiskSignal::HiddenText, RiskSignal::JavaScript], &weights), 100);
    }

    #[test]
    fn test_every_signal_sums_past_cap() {
        let mut findings = DocumentFindings::default();
        findings.overlay_risk = OverlayRisk::Possible;
        findings.hidden_text.has_hidden_text = true;
        let s = &mut findings.structure;
        s.has_signatures = true;
        s.has_javascript = true;
        s.has_remote_resources = true;
        s.has_metadata = true;
        s.has_attachments = true;
        s.reviewer_names = vec!["A".into()];
        s.has_ocr_layer = true;
        s.incremental_updates = true;
        s.has_forms = true;
        s.has_thumbnails = true;
        s.has_structure_tags = true;

        assert_eq!(collect_signals(&findings).len(), 13);
        assert_eq!(score_findings(&findings, &ScoreWeights::default()), 88);
    }

    #[test]
    fn test_overlay_only_scoring() {
        let weights = ScoreWeights::default();
        assert_eq!(score_overlay_only(OverlayRisk::Definite, &weights), 20);
        assert_eq!(score_overlay_only(OverlayRisk::Possible, &weights), 10);
        assert_eq!(score_overlay_only(OverlayRisk::None, &weights), 0);
    }

    #[test]
    fn test_tiers() {
        let default = TierThresholds { high: 40, medium: 20 };
        let secondary = TierThresholds { high: 70, medium: 40 };
        assert_eq!(RiskTier::from_score(50, default), RiskTier::High);
        assert_eq!(RiskTier::from_score(50, secondary), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(20, default), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(19, default), RiskTier::Low);
        assert_eq!(serde_json::to_string(&RiskTier::High).unwrap(), "\"HIGH\"");
    }
}
