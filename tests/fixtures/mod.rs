//! In-memory PDFs and accessors shared by the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pdx_audit::accessor::{AuditDocument, DocumentAccessor};
use pdx_audit::{Error, LopdfAccessor, Result};

/// Builds small single-font PDFs page by page
#[derive(Default)]
pub struct PdfBuilder {
    pages: Vec<(Vec<Operation>, Dictionary)>,
    info: Vec<(String, String)>,
    catalog: Dictionary,
    encrypted: bool,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, operations: Vec<Operation>) -> Self {
        self.page_with(operations, Dictionary::new())
    }

    pub fn page_with(mut self, operations: Vec<Operation>, extra: Dictionary) -> Self {
        self.pages.push((operations, extra));
        self
    }

    pub fn info(mut self, key: &str, value: &str) -> Self {
        self.info.push((key.to_string(), value.to_string()));
        self
    }

    pub fn catalog_entry(mut self, key: &str, value: Object) -> Self {
        self.catalog.set(key, value);
        self
    }

    /// Standard security handler whose user password is not empty
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for (operations, extra) in self.pages {
            let content = Content { operations }.encode().unwrap();
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            for (key, value) in extra.into_iter() {
                page.set(key.clone(), value.clone());
            }
            kids.push(doc.add_object(page).into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }),
        );

        let mut catalog = dictionary! { "Type" => "Catalog", "Pages" => pages_id };
        for (key, value) in self.catalog.into_iter() {
            catalog.set(key.clone(), value.clone());
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        if !self.info.is_empty() {
            let mut info = Dictionary::new();
            for (key, value) in &self.info {
                info.set(key.as_str(), Object::string_literal(value.as_str()));
            }
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }

        if self.encrypted {
            let encrypt_id = doc.add_object(dictionary! {
                "Filter" => "Standard",
                "V" => 1,
                "R" => 2,
                "Length" => 40,
                "P" => -4,
                "O" => Object::string_literal(vec![0x11u8; 32]),
                "U" => Object::string_literal(vec![0x22u8; 32]),
            });
            doc.trailer.set("Encrypt", encrypt_id);
            doc.trailer.set(
                "ID",
                vec![
                    Object::string_literal(vec![0x33u8; 16]),
                    Object::string_literal(vec![0x33u8; 16]),
                ],
            );
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    pub fn write(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Shows `text` at (x, y) in 12 pt Helvetica with the current fill color
pub fn text(x: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

pub fn fill_rect(gray: f64, x: i64, y: i64, w: i64, h: i64) -> Vec<Operation> {
    vec![
        Operation::new("g", vec![Object::Real(gray as _)]),
        Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
        Operation::new("f", vec![]),
    ]
}

pub fn rgb_fill(r: i64, g: i64, b: i64) -> Operation {
    Operation::new("rg", vec![r.into(), g.into(), b.into()])
}

/// Live text with a black box painted over it
pub fn overlay_redaction(secret: &str) -> Vec<Operation> {
    let mut ops = text(100, 700, secret);
    ops.extend(fill_rect(0.0, 95, 690, 120, 24));
    ops
}

pub struct TestFixtures;

impl TestFixtures {
    pub fn redacted_pdf() -> Vec<u8> {
        PdfBuilder::new()
            .page(overlay_redaction("SSN 078-05-1120"))
            .page(text(72, 600, "Nothing to see on page two"))
            .build()
    }

    pub fn clean_pdf() -> Vec<u8> {
        let mut ops = text(72, 700, "Quarterly filing");
        // Black rule under the heading, too thin to hide anything
        ops.extend(fill_rect(0.0, 72, 690, 200, 1));
        PdfBuilder::new().page(ops).build()
    }

    pub fn white_text_pdf() -> Vec<u8> {
        let mut ops = vec![rgb_fill(1, 1, 1)];
        ops.extend(text(72, 500, "invisible"));
        PdfBuilder::new().page(ops).build()
    }

    pub fn corrupt_pdf() -> Vec<u8> {
        b"%PDF-1.4\nthis is not a real document".to_vec()
    }
}

/// Wraps the lopdf accessor with named failure modes:
/// `locked*` is encrypted, `slow-<ms>*` sleeps before opening
pub struct ScriptedAccessor {
    inner: LopdfAccessor,
}

impl ScriptedAccessor {
    pub fn new() -> Self {
        Self {
            inner: LopdfAccessor::default(),
        }
    }
}

impl DocumentAccessor for ScriptedAccessor {
    fn open(&self, path: &Path) -> Result<Box<dyn AuditDocument>> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with("locked") {
            return Err(Error::EncryptedDocument);
        }
        if let Some(rest) = name.strip_prefix("slow-") {
            let millis: u64 = rest.split(|c: char| !c.is_ascii_digit()).next().unwrap().parse().unwrap();
            thread::sleep(Duration::from_millis(millis));
        }
        self.inner.open(path)
    }

    fn supports_deep_structure(&self) -> bool {
        true
    }
}
