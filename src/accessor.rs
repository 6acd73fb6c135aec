//! Document access capability consumed by the detectors
//! Author: kartik4091
//! Created: 2025-06-07
//!
//! The detectors never touch PDF objects directly. They see pages as fills,
//! text span geometry and image sizes, and the document as a handful of
//! catalog facts. `backend::LopdfAccessor` is the default implementation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ExtractionMode;
use crate::error::Result;
use crate::geometry::{ColorSample, Rect};

/// Opens documents for auditing
pub trait DocumentAccessor: Send + Sync {
    /// Fails with `EncryptedDocument` when the empty password is rejected and
    /// `CorruptDocument` when the file cannot be parsed
    fn open(&self, path: &Path) -> Result<Box<dyn AuditDocument>>;

    /// Whether catalog-level checks (actions, layers, tags, thumbnails) are available
    fn supports_deep_structure(&self) -> bool;
}

/// One opened document. Dropped at the end of each audit.
pub trait AuditDocument {
    fn page_count(&self) -> usize;

    /// Page content for a 0-based index
    fn page(&self, index: usize, mode: ExtractionMode) -> Result<PageContent>;

    /// Document information entries with non-empty values
    fn metadata(&self) -> Result<Vec<(String, String)>>;

    fn has_xmp_metadata(&self) -> Result<bool>;

    fn attachments(&self) -> Result<Vec<AttachmentInfo>>;

    fn annotations(&self, index: usize) -> Result<Vec<AnnotationInfo>>;

    fn form_fields(&self) -> Result<Vec<FormFieldInfo>>;

    fn catalog(&self) -> Result<CatalogInfo>;

    fn has_thumbnail(&self, index: usize) -> Result<bool>;

    fn raw_bytes(&self) -> &[u8];
}

/// Everything the page-level detectors need from one page
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// 1-based
    pub number: usize,
    pub rect: Rect,
    pub fill_paths: Vec<FillPath>,
    pub text_spans: Vec<TextSpan>,
    pub images: Vec<ImageInfo>,
}

impl PageContent {
    pub fn has_text(&self) -> bool {
        self.text_spans.iter().any(|span| span.glyph_count > 0)
    }
}

/// A filled (not merely stroked) path, reduced to its bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillPath {
    pub rect: Rect,
    pub color: Option<ColorSample>,
}

/// Geometry of one shown string. `preview` is only set in validation mode.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub bbox: Rect,
    pub color: Option<ColorSample>,
    pub font_size: f64,
    pub glyph_count: usize,
    /// One-way hash of the raw string bytes
    pub fingerprint: u64,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationInfo {
    pub subtype: String,
    /// `/T`
    pub author: Option<String>,
    /// `/Subj`
    pub subject: Option<String>,
    pub action: Option<ActionInfo>,
}

/// The `/A` action of an annotation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionInfo {
    /// `/S`
    pub kind: Option<String>,
    pub uri: Option<String>,
    pub url: Option<String>,
}

impl ActionInfo {
    const REMOTE_KINDS: [&'static str; 4] = ["GoToR", "SubmitForm", "ImportData", "Launch"];

    /// Points at something outside the document
    pub fn is_remote(&self) -> bool {
        self.uri.is_some()
            || self.url.is_some()
            || self
                .kind
                .as_deref()
                .map_or(false, |kind| Self::REMOTE_KINDS.contains(&kind))
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.uri.iter().chain(self.url.iter()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFieldInfo {
    /// `/T`
    pub name: Option<String>,
    /// `/FT`, inherited from parents
    pub field_type: Option<String>,
    /// `/V /Name` of a signature value
    pub signer_name: Option<String>,
}

impl FormFieldInfo {
    pub fn is_signature(&self) -> bool {
        self.field_type.as_deref() == Some("Sig")
    }
}

/// Catalog-level facts for the deep checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogInfo {
    pub has_javascript_name_tree: bool,
    pub javascript_action_count: usize,
    pub has_open_action: bool,
    pub has_additional_actions: bool,
    pub layer_count: usize,
    pub has_struct_tree: bool,
    pub is_marked: bool,
    pub remote_action_count: usize,
}
