//! Markup sanitization and slide extraction.
//!
//! Raw markup is parsed with `scraper`, copied into an owned [`Document`],
//! stripped of executable content and then segmented into [`Slide`]s.

use log::{debug, warn};
use scraper::Html;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::dom::{Document, NodeData, NodeId};
use crate::{Error, Result};

/// Options controlling extraction
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub marker_class: String,
    pub strict_parse: bool,
    pub require_markers: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        crate::ToolConfig::default().extract_options()
    }
}

/// One extracted slide. Owns a standalone copy of its markup.
#[derive(Debug, Clone)]
pub struct Slide {
    index: usize,
    doc: Document,
    root: NodeId,
    synthetic: bool,
}

impl Slide {
    /// 1-based display index
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The slide element inside [`Slide::document`]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// True when the slide wraps the whole body because no marker was found
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn to_html(&self) -> String {
        self.doc.to_html(self.root)
    }

    pub fn text(&self) -> String {
        self.doc.text_content(self.root)
    }

    /// Hex SHA-256 of the serialized slide.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.to_html().as_bytes()))
    }
}

/// Soft conditions reported to the user alongside (possibly empty) results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Marker elements were required but the markup has none
    MissingMarkers { marker_class: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingMarkers { marker_class } => write!(
                f,
                "No slides found: wrap each slide in an element with class=\"{}\"",
                marker_class
            ),
        }
    }
}

/// Result of a successful extraction
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub slides: Vec<Slide>,
    pub diagnostic: Option<Diagnostic>,
    pub sanitized: SanitizeStats,
}

impl Extraction {
    /// Nothing to render. Not an error.
    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// Pre-filled payload for reporting a markup the parser could not accept.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParseReport {
    pub errors: Vec<String>,
    pub input_len: usize,
    pub excerpt: String,
}

impl ParseReport {
    const EXCERPT_CHARS: usize = 200;

    fn new(raw: &str, errors: Vec<String>) -> Self {
        Self {
            errors,
            input_len: raw.len(),
            excerpt: raw.chars().take(Self::EXCERPT_CHARS).collect(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// What the sanitizer removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeStats {
    pub scripts: usize,
    pub attributes: usize,
}

/// Attributes whose value is loaded or navigated to as a URL. SVG animation
/// values are included since they can rewrite an `href`.
const URL_ATTRIBUTES: &[&str] = &[
    "href", "src", "action", "formaction", "xlink:href", "data", "poster", "background",
    "cite", "codebase", "from", "to", "values",
];

/// Attributes that carry a whole inline document.
const DOCUMENT_ATTRIBUTES: &[&str] = &["srcdoc"];

fn is_executable_attr(name: &str, value: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("on")
        || DOCUMENT_ATTRIBUTES.contains(&name.as_str())
        || (URL_ATTRIBUTES.contains(&name.as_str()) && is_script_url(value))
}

/// Strip executable content: `<script>` elements, `on*` handler attributes,
/// inline `srcdoc` documents and script URLs.
pub fn sanitize(doc: &mut Document) -> SanitizeStats {
    let mut stats = SanitizeStats::default();
    for node in doc.descendants(doc.root()) {
        if !doc.is_element(node) {
            continue;
        }
        if doc.tag(node) == Some("script") {
            doc.detach(node);
            stats.scripts += 1;
            continue;
        }
        let mut removed = 0;
        doc.retain_attrs(node, |name, value| {
            let executable = is_executable_attr(name, value);
            if executable {
                removed += 1;
            }
            !executable
        });
        stats.attributes += removed;
    }
    if stats.scripts > 0 || stats.attributes > 0 {
        debug!(
            "sanitized markup: removed {} script(s), {} attribute(s)",
            stats.scripts, stats.attributes
        );
    }
    stats
}

fn is_script_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    ["javascript:", "vbscript:", "data:text/html"]
        .iter()
        .any(|scheme| compact.starts_with(scheme))
}

/// Parse `raw` into a sanitized document.
pub fn parse_markup(raw: &str, opts: &ExtractOptions) -> Result<(Document, SanitizeStats)> {
    let html = if opts.strict_parse {
        // A missing doctype is not a structural problem; give html5ever one so
        // only real tree-construction errors remain.
        let has_doctype = raw
            .trim_start()
            .get(..9)
            .map(|p| p.eq_ignore_ascii_case("<!doctype"))
            .unwrap_or(false);
        let source = if has_doctype {
            raw.to_string()
        } else {
            format!("<!DOCTYPE html>{}", raw)
        };
        let html = Html::parse_document(&source);
        let errors: Vec<String> = html
            .errors
            .iter()
            .map(|e| e.to_string())
            .filter(|e| !e.to_ascii_lowercase().contains("doctype"))
            .collect();
        if !errors.is_empty() {
            warn!("markup rejected with {} structural error(s)", errors.len());
            return Err(Error::Parse {
                message: format!("{} structural error(s), first: {}", errors.len(), errors[0]),
                report: Box::new(ParseReport::new(raw, errors)),
            });
        }
        html
    } else {
        Html::parse_document(raw)
    };

    let mut doc = Document::from_html(&html);
    let stats = sanitize(&mut doc);
    Ok((doc, stats))
}

fn has_content(doc: &Document, node: NodeId) -> bool {
    doc.children(node).iter().any(|c| match doc.data(*c) {
        NodeData::Text(t) => !t.trim().is_empty(),
        NodeData::Comment(_) => false,
        _ => true,
    })
}

/// Extract slides from raw markup.
///
/// Every element carrying the marker class becomes a slide in document order;
/// without markers the body content becomes one synthetic slide. Empty input or
/// an empty body yields no slides.
pub fn extract_slides(raw: &str, opts: &ExtractOptions) -> Result<Extraction> {
    if raw.trim().is_empty() {
        return Ok(Extraction::default());
    }

    let (doc, sanitized) = parse_markup(raw, opts)?;
    let markers = doc.elements_with_class(doc.root(), &opts.marker_class);

    let mut slides = Vec::new();
    let mut diagnostic = None;
    if !markers.is_empty() {
        for (i, marker) in markers.into_iter().enumerate() {
            let mut slide_doc = Document::new();
            let root = slide_doc.import(&doc, marker);
            let doc_root = slide_doc.root();
            slide_doc.append_child(doc_root, root);
            slides.push(Slide {
                index: i + 1,
                doc: slide_doc,
                root,
                synthetic: false,
            });
        }
    } else if opts.require_markers {
        diagnostic = Some(Diagnostic::MissingMarkers {
            marker_class: opts.marker_class.clone(),
        });
    } else if let Some(body) = doc.find_tag(doc.root(), "body").filter(|b| has_content(&doc, *b)) {
        let mut slide_doc = Document::new();
        let wrapper = slide_doc.create_element("div");
        let doc_root = slide_doc.root();
        slide_doc.append_child(doc_root, wrapper);
        for child in doc.children(body) {
            let copy = slide_doc.import(&doc, child);
            slide_doc.append_child(wrapper, copy);
        }
        slides.push(Slide {
            index: 1,
            doc: slide_doc,
            root: wrapper,
            synthetic: true,
        });
    }

    debug!(
        "extracted {} slide(s) using marker class {:?}",
        slides.len(),
        opts.marker_class
    );
    Ok(Extraction {
        slides,
        diagnostic,
        sanitized,
    })
}
