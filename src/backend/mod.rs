//! lopdf-backed document access
//! Author: kartik4091
//! Created: 2025-06-09

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument, warn};

use crate::accessor::{
    ActionInfo, AnnotationInfo, AttachmentInfo, AuditDocument, CatalogInfo, DocumentAccessor, FormFieldInfo,
    PageContent,
};
use crate::config::{BackendConfig, ExtractionMode};
use crate::error::{Error, Result};
use crate::geometry::Rect;

pub mod interpreter;

pub use interpreter::{ContentInterpreter, PageGraphics};

/// US Letter, used when no MediaBox is found
const DEFAULT_MEDIA_BOX: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

const MAX_TREE_DEPTH: usize = 32;
const MAX_REFERENCE_HOPS: usize = 8;

const REMOTE_ACTION_KINDS: [&[u8]; 4] = [b"GoToR", b"SubmitForm", b"ImportData", b"Launch"];

/// Opens PDFs with lopdf
#[derive(Debug, Clone)]
pub struct LopdfAccessor {
    max_form_depth: usize,
}

impl LopdfAccessor {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            max_form_depth: config.max_form_depth,
        }
    }
}

impl Default for LopdfAccessor {
    fn default() -> Self {
        Self::new(&BackendConfig::default())
    }
}

impl DocumentAccessor for LopdfAccessor {
    #[instrument(skip(self))]
    fn open(&self, path: &Path) -> Result<Box<dyn AuditDocument>> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::InputNotFound(path.to_path_buf()),
            _ => Error::IoError(e),
        })?;
        let document = LopdfDocument::from_bytes(bytes, self.max_form_depth)?;
        info!("📄 Opened {} ({} pages)", path.display(), document.page_count());
        Ok(Box::new(document))
    }

    fn supports_deep_structure(&self) -> bool {
        true
    }
}

/// A parsed document plus its original bytes
pub struct LopdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
    bytes: Vec<u8>,
    max_form_depth: usize,
}

impl LopdfDocument {
    pub fn from_bytes(bytes: Vec<u8>, max_form_depth: usize) -> Result<Self> {
        let mut doc = Document::load_mem(&bytes).map_err(|e| Error::CorruptDocument(e.to_string()))?;

        if doc.is_encrypted() {
            if let Err(e) = doc.decrypt("") {
                debug!("Empty password rejected: {}", e);
                return Err(Error::EncryptedDocument);
            }
            debug!("Opened encrypted document with the empty password");
        }

        let page_ids = doc.get_pages().into_values().collect();
        Ok(Self {
            doc,
            page_ids,
            bytes,
            max_form_depth,
        })
    }

    fn page_dict(&self, index: usize) -> Result<&Dictionary> {
        let unavailable = |reason: String| Error::PageUnavailable {
            page: index + 1,
            reason,
        };
        let id = self
            .page_ids
            .get(index)
            .ok_or_else(|| unavailable("no such page".into()))?;
        self.doc
            .get_object(*id)
            .and_then(Object::as_dict)
            .map_err(|e| unavailable(e.to_string()))
    }

    fn catalog_dict(&self) -> Result<&Dictionary> {
        dict_get(&self.doc, &self.doc.trailer, b"Root")
            .and_then(|root| root.as_dict().ok())
            .ok_or_else(|| Error::MalformedStructure("missing document catalog".into()))
    }

    fn page_box(&self, page: &Dictionary, key: &[u8]) -> Option<Rect> {
        resolve_inherited(&self.doc, page, key)
            .and_then(|obj| obj.as_array().ok())
            .and_then(|arr| match arr.iter().filter_map(as_number).collect::<Vec<_>>()[..] {
                [x0, y0, x1, y1] => Some(Rect::new(x0, y0, x1, y1)),
                _ => None,
            })
    }

    /// Visible page area: the CropBox clipped to the MediaBox
    fn visible_box(&self, page: &Dictionary) -> Rect {
        let media = self.page_box(page, b"MediaBox").unwrap_or(DEFAULT_MEDIA_BOX);
        self.page_box(page, b"CropBox")
            .and_then(|crop| crop.intersection(&media))
            .unwrap_or(media)
    }

    fn collect_fields(&self, field: &Dictionary, parent: &FieldContext, depth: usize, out: &mut Vec<FormFieldInfo>) {
        if depth > MAX_TREE_DEPTH {
            return;
        }
        let doc = &self.doc;
        let partial = dict_get(doc, field, b"T").and_then(text_of);
        let context = FieldContext {
            name: match (&parent.name, partial) {
                (Some(p), Some(t)) => Some(format!("{}.{}", p, t)),
                (None, t) => t,
                (p, None) => p.clone(),
            },
            field_type: dict_get(doc, field, b"FT")
                .and_then(name_of)
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .or_else(|| parent.field_type.clone()),
        };

        // Kids without /T are widgets of this field, not child fields
        let child_fields: Vec<&Dictionary> = dict_get(doc, field, b"Kids")
            .and_then(|k| k.as_array().ok())
            .map(|kids| {
                kids.iter()
                    .filter_map(|kid| resolve(doc, kid).as_dict().ok())
                    .filter(|kid| kid.has(b"T"))
                    .collect()
            })
            .unwrap_or_default();

        if child_fields.is_empty() {
            let signer_name = dict_get(doc, field, b"V")
                .and_then(|v| v.as_dict().ok())
                .and_then(|sig| dict_get(doc, sig, b"Name"))
                .and_then(text_of);
            out.push(FormFieldInfo {
                name: context.name,
                field_type: context.field_type,
                signer_name,
            });
        } else {
            for kid in child_fields {
                self.collect_fields(kid, &context, depth + 1, out);
            }
        }
    }
}

#[derive(Default)]
struct FieldContext {
    name: Option<String>,
    field_type: Option<String>,
}

impl AuditDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    #[instrument(skip(self, mode))]
    fn page(&self, index: usize, mode: ExtractionMode) -> Result<PageContent> {
        let page = self.page_dict(index)?;
        let rect = self.visible_box(page);
        let page_id = self.page_ids[index];

        let content = self.doc.get_page_content(page_id).map_err(|e| Error::PageUnavailable {
            page: index + 1,
            reason: e.to_string(),
        })?;
        let resources = resolve_inherited(&self.doc, page, b"Resources").and_then(|r| r.as_dict().ok());

        let graphics = ContentInterpreter::new(&self.doc, mode, self.max_form_depth)
            .run_page(&content, resources)
            .map_err(|e| Error::PageUnavailable {
                page: index + 1,
                reason: format!("content stream: {}", e),
            })?;

        Ok(PageContent {
            number: index + 1,
            rect,
            fill_paths: graphics.fill_paths,
            text_spans: graphics.text_spans,
            images: graphics.images,
        })
    }

    fn metadata(&self) -> Result<Vec<(String, String)>> {
        let Some(info) = dict_get(&self.doc, &self.doc.trailer, b"Info") else {
            return Ok(Vec::new());
        };
        let info = info
            .as_dict()
            .map_err(|_| Error::MalformedStructure("document information is not a dictionary".into()))?;

        Ok(info
            .iter()
            .filter_map(|(key, value)| {
                let value = text_of(resolve(&self.doc, value))?;
                let value = value.trim();
                (!value.is_empty()).then(|| (String::from_utf8_lossy(key).into_owned(), value.to_string()))
            })
            .collect())
    }

    fn has_xmp_metadata(&self) -> Result<bool> {
        Ok(self.catalog_dict()?.has(b"Metadata"))
    }

    fn attachments(&self) -> Result<Vec<AttachmentInfo>> {
        let doc = &self.doc;
        let Some(tree) = get_dict(doc, self.catalog_dict()?, b"Names")
            .and_then(|names| dict_get(doc, names, b"EmbeddedFiles"))
        else {
            return Ok(Vec::new());
        };
        let tree = tree
            .as_dict()
            .map_err(|_| Error::MalformedStructure("EmbeddedFiles is not a name tree".into()))?;

        let mut out = Vec::new();
        walk_name_tree(doc, tree, 0, &mut |key, _| {
            out.push(AttachmentInfo { name: key });
        });
        Ok(out)
    }

    fn annotations(&self, index: usize) -> Result<Vec<AnnotationInfo>> {
        let doc = &self.doc;
        let page = self.page_dict(index)?;
        let Some(annots) = dict_get(doc, page, b"Annots") else {
            return Ok(Vec::new());
        };
        let annots = annots.as_array().map_err(|_| Error::PageUnavailable {
            page: index + 1,
            reason: "Annots is not an array".into(),
        })?;

        Ok(annots
            .iter()
            .filter_map(|a| resolve(doc, a).as_dict().ok())
            .filter_map(|annot| {
                let subtype = dict_get(doc, annot, b"Subtype")
                    .and_then(name_of)
                    .map(|n| String::from_utf8_lossy(n).into_owned())
                    .unwrap_or_default();
                if subtype == "Popup" || subtype == "Widget" {
                    return None;
                }
                let action = get_dict(doc, annot, b"A").map(|a| ActionInfo {
                    kind: dict_get(doc, a, b"S")
                        .and_then(name_of)
                        .map(|n| String::from_utf8_lossy(n).into_owned()),
                    uri: dict_get(doc, a, b"URI").and_then(text_of),
                    url: dict_get(doc, a, b"URL").and_then(text_of),
                });
                Some(AnnotationInfo {
                    subtype,
                    author: dict_get(doc, annot, b"T").and_then(text_of),
                    subject: dict_get(doc, annot, b"Subj").and_then(text_of),
                    action,
                })
            })
            .collect())
    }

    fn form_fields(&self) -> Result<Vec<FormFieldInfo>> {
        let doc = &self.doc;
        let Some(form) = get_dict(doc, self.catalog_dict()?, b"AcroForm") else {
            return Ok(Vec::new());
        };
        let fields = match dict_get(doc, form, b"Fields") {
            Some(fields) => fields
                .as_array()
                .map_err(|_| Error::MalformedStructure("AcroForm Fields is not an array".into()))?,
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::new();
        for field in fields.iter().filter_map(|f| resolve(doc, f).as_dict().ok()) {
            self.collect_fields(field, &FieldContext::default(), 0, &mut out);
        }
        Ok(out)
    }

    fn catalog(&self) -> Result<CatalogInfo> {
        let doc = &self.doc;
        let catalog = self.catalog_dict()?;

        let mut javascript_action_count = 0;
        let mut remote_action_count = 0;
        for object in doc.objects.values() {
            visit_dicts(object, 0, &mut |dict| {
                if dict.has(b"JS") {
                    javascript_action_count += 1;
                }
                if let Ok(Object::Name(kind)) = dict.get(b"S") {
                    if REMOTE_ACTION_KINDS.contains(&kind.as_slice()) {
                        remote_action_count += 1;
                    }
                }
            });
        }

        Ok(CatalogInfo {
            has_javascript_name_tree: get_dict(doc, catalog, b"Names").map_or(false, |n| n.has(b"JavaScript")),
            javascript_action_count,
            has_open_action: catalog.has(b"OpenAction"),
            has_additional_actions: catalog.has(b"AA"),
            layer_count: get_dict(doc, catalog, b"OCProperties")
                .and_then(|oc| dict_get(doc, oc, b"OCGs"))
                .and_then(|ocgs| ocgs.as_array().ok())
                .map_or(0, Vec::len),
            has_struct_tree: catalog.has(b"StructTreeRoot"),
            is_marked: get_dict(doc, catalog, b"MarkInfo")
                .and_then(|mark| dict_get(doc, mark, b"Marked"))
                .map_or(false, |m| matches!(m, Object::Boolean(true))),
            remote_action_count,
        })
    }

    fn has_thumbnail(&self, index: usize) -> Result<bool> {
        Ok(self.page_dict(index)?.has(b"Thumb"))
    }

    fn raw_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Follows indirect references
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_REFERENCE_HOPS {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

pub(crate) fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

/// Dictionary value, or the dictionary of a stream value
pub(crate) fn get_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    match dict_get(doc, dict, key)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Looks a key up on a page and then its /Parent chain
pub(crate) fn resolve_inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Some(value) = dict_get(doc, node, key) {
            return Some(value);
        }
        node = get_dict(doc, node, b"Parent")?;
    }
    None
}

pub(crate) fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

pub(crate) fn name_of(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

fn text_of(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text(bytes, false)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Text strings: UTF-16BE with BOM, then UTF-8, then Latin-1.
/// Two-byte font strings are read as big-endian code units.
pub(crate) fn decode_text(bytes: &[u8], two_byte: bool) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16be(rest);
    }
    if two_byte {
        return decode_utf16be(bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn decode_utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Stable identity of a shown string that does not retain its text
pub(crate) fn fingerprint(bytes: &[u8]) -> u64 {
    let hash = blake3::hash(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

pub(crate) fn stream_bytes(stream: &Stream) -> lopdf::Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content()
    } else {
        Ok(stream.content.clone())
    }
}

fn walk_name_tree<F>(doc: &Document, node: &Dictionary, depth: usize, f: &mut F)
where
    F: FnMut(String, &Object),
{
    if depth > MAX_TREE_DEPTH {
        warn!("⚠️  Name tree deeper than {}, truncating", MAX_TREE_DEPTH);
        return;
    }
    if let Some(names) = dict_get(doc, node, b"Names").and_then(|n| n.as_array().ok()) {
        for pair in names.chunks_exact(2) {
            if let Some(key) = text_of(resolve(doc, &pair[0])) {
                f(key, resolve(doc, &pair[1]));
            }
        }
    }
    if let Some(kids) = dict_get(doc, node, b"Kids").and_then(|k| k.as_array().ok()) {
        for kid in kids.iter().filter_map(|k| resolve(doc, k).as_dict().ok()) {
            walk_name_tree(doc, kid, depth + 1, f);
        }
    }
}

/// Visits every dictionary nested in an object without following references
fn visit_dicts<'a, F>(obj: &'a Object, depth: usize, f: &mut F)
where
    F: FnMut(&'a Dictionary),
{
    if depth > MAX_TREE_DEPTH {
        return;
    }
    let dict = match obj {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        Object::Array(items) => {
            for item in items {
                visit_dicts(item, depth + 1, f);
            }
            return;
        }
        _ => return,
    };
    f(dict);
    for (_, value) in dict.iter() {
        visit_dicts(value, depth + 1, f);
    }
}
