/// Block and inline layout of a slide subtree onto a fixed canvas

use crate::css::{self, Rgb};
use crate::dom::{Document, NodeData, NodeId};
use crate::fonts::{self, FontFace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Inherited text properties of an element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedStyle {
    /// CSS pixels
    pub font_px: f32,
    pub color: Rgb,
    pub bold: bool,
    /// Not inherited
    pub background: Option<Rgb>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            font_px: 16.0,
            color: Rgb::INK,
            bold: false,
            background: None,
        }
    }
}

impl ComputedStyle {
    /// Computed sizes beyond this are clamped; no slide can show a larger glyph.
    pub const MAX_FONT_PX: f32 = 4096.0;

    /// Style of `node` given its parent's computed style.
    pub fn inherit(&self, doc: &Document, node: NodeId) -> ComputedStyle {
        let mut out = ComputedStyle {
            background: None,
            ..*self
        };
        let Some(tag) = doc.tag(node) else {
            return out;
        };
        let em = match tag {
            "h1" => 2.0,
            "h2" => 1.5,
            "h3" => 1.17,
            "h5" | "small" => 0.83,
            "h6" => 0.67,
            _ => 1.0,
        };
        out.font_px *= em;
        if matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "b" | "strong" | "th") {
            out.bold = true;
        }

        let style = doc.style(node);
        if let Some(px) = style
            .get("font-size")
            .and_then(|v| css::parse_length_px(v, self.font_px))
        {
            out.font_px = px;
        }
        if let Some(c) = style.get("color").and_then(css::parse_color) {
            out.color = c;
        }
        if let Some(w) = style.get("font-weight") {
            out.bold = match w.trim() {
                "bold" | "bolder" => true,
                "normal" | "lighter" => false,
                n => n.parse::<u32>().map(|n| n >= 600).unwrap_or(out.bold),
            };
        }
        out.font_px = out.font_px.min(Self::MAX_FONT_PX);
        out.background = style
            .get("background-color")
            .and_then(css::parse_color)
            .or_else(|| {
                style
                    .get("background")
                    .and_then(|v| v.split_whitespace().find_map(css::parse_color))
            });
        out
    }

    /// Fold inheritance from the outermost element down to `node`.
    pub fn at(doc: &Document, node: NodeId) -> ComputedStyle {
        let mut chain: Vec<NodeId> = std::iter::once(node).chain(doc.ancestors(node)).collect();
        chain.reverse();
        chain
            .into_iter()
            .fold(ComputedStyle::default(), |acc, n| acc.inherit(doc, n))
    }
}

/// What a layout node draws
#[derive(Debug, Clone)]
pub enum ElementType {
    /// A block box filled with a background color
    Background(Rgb),
    /// A rule line (`<hr>`)
    Rule(Rgb),
    /// A run of text in a single face
    Text {
        text: String,
        color: Rgb,
        face: FontFace,
    },
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub rect: Rect,
    pub elem_type: ElementType,
}

/// Canvas geometry and global parameters, in device pixels
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    pub width: u32,
    pub height: u32,
    /// Device pixels per CSS pixel
    pub scale: f32,
    pub font_scale: f32,
    pub density: f32,
    /// Page padding in CSS pixels
    pub padding: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            scale: 1.0,
            font_scale: 1.0,
            density: 1.0,
            padding: 48.0,
        }
    }
}

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "tr", "ul",
];

const SKIPPED_TAGS: &[&str] = &[
    "head", "title", "style", "script", "meta", "link", "template", "noscript", "img", "svg",
    "video", "audio", "canvas", "iframe", "object",
];

fn device_px(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

struct PendingRun {
    x: i32,
    text: String,
    color: Rgb,
    face: FontFace,
}

struct Flow {
    opts: LayoutOptions,
    left: i32,
    right: i32,
    cursor_x: i32,
    cursor_y: i32,
    line: Vec<PendingRun>,
    /// A collapsible space is owed before the next word on this line
    space_pending: bool,
    nodes: Vec<LayoutNode>,
}

impl Flow {
    fn px(&self, css_px: f32) -> i32 {
        (css_px * self.opts.scale).round() as i32
    }

    fn face_for(&self, style: &ComputedStyle) -> FontFace {
        fonts::select_face(
            style.font_px * self.opts.font_scale * self.opts.scale,
            style.bold,
        )
    }

    fn line_is_empty(&self) -> bool {
        self.line.is_empty()
    }

    /// Close the current line, aligning runs on a shared bottom edge.
    fn break_line(&mut self, min_height: i32) {
        let height = self
            .line
            .iter()
            .map(|r| device_px(r.face.height()))
            .max()
            .unwrap_or(0);
        let line_gap = (height as f32 * 0.25 * self.opts.density).round() as i32;
        for run in self.line.drain(..) {
            let h = device_px(run.face.height());
            let y = self.cursor_y.saturating_add(height - h);
            if y.saturating_add(h) > device_px(self.opts.height) {
                continue;
            }
            self.nodes.push(LayoutNode {
                rect: Rect {
                    x: run.x,
                    y,
                    width: run.face.text_width(&run.text),
                    height: h as u32,
                },
                elem_type: ElementType::Text {
                    text: run.text,
                    color: run.color,
                    face: run.face,
                },
            });
        }
        let advance = if height > 0 { height.saturating_add(line_gap) } else { min_height };
        self.cursor_y = self.cursor_y.saturating_add(advance);
        self.cursor_x = self.left;
        self.space_pending = false;
    }

    fn push_text(&mut self, text: &str, style: &ComputedStyle) {
        let face = self.face_for(style);
        let normalized = fonts::normalize_for_mono(text);
        if normalized.starts_with(char::is_whitespace) && !self.line_is_empty() {
            self.space_pending = true;
        }
        let mut words = normalized.split_whitespace().peekable();
        while let Some(word) = words.next() {
            let space = if self.space_pending { device_px(face.advance()) } else { 0 };
            let width = device_px(face.text_width(word));
            if self.cursor_x.saturating_add(space).saturating_add(width) > self.right
                && !self.line_is_empty()
            {
                self.break_line(0);
            } else {
                self.cursor_x = self.cursor_x.saturating_add(space);
            }
            self.line.push(PendingRun {
                x: self.cursor_x,
                text: word.to_string(),
                color: style.color,
                face,
            });
            self.cursor_x = self.cursor_x.saturating_add(width);
            self.space_pending = words.peek().is_some();
        }
        if normalized.ends_with(char::is_whitespace) && !self.line_is_empty() {
            self.space_pending = true;
        }
    }

    fn finish_block(&mut self) {
        if !self.line_is_empty() {
            self.break_line(0);
        }
        self.space_pending = false;
    }

    fn visit(&mut self, doc: &Document, node: NodeId, parent_style: &ComputedStyle) {
        match doc.data(node) {
            NodeData::Text(t) => self.push_text(t, parent_style),
            NodeData::Element(el) => {
                let tag = el.tag.as_str();
                if SKIPPED_TAGS.contains(&tag) {
                    return;
                }
                let style = parent_style.inherit(doc, node);
                match tag {
                    "br" => {
                        let h = device_px(self.face_for(&style).height());
                        self.break_line(h);
                    }
                    "hr" => {
                        self.finish_block();
                        let gap = self.px(8.0 * self.opts.density);
                        self.cursor_y = self.cursor_y.saturating_add(gap);
                        self.nodes.push(LayoutNode {
                            rect: Rect {
                                x: self.left,
                                y: self.cursor_y,
                                width: (self.right - self.left).max(0) as u32,
                                height: self.px(1.0).max(1) as u32,
                            },
                            elem_type: ElementType::Rule(Rgb(0xd1, 0xd5, 0xdb)),
                        });
                        self.cursor_y = self.cursor_y.saturating_add(gap);
                    }
                    _ if BLOCK_TAGS.contains(&tag) => self.visit_block(doc, node, tag, &style),
                    _ => {
                        for child in doc.children(node) {
                            self.visit(doc, child, &style);
                        }
                    }
                }
            }
            NodeData::Document => {
                for child in doc.children(node) {
                    self.visit(doc, child, parent_style);
                }
            }
            NodeData::Comment(_) => {}
        }
    }

    fn visit_block(&mut self, doc: &Document, node: NodeId, tag: &str, style: &ComputedStyle) {
        self.finish_block();
        let margin = match tag {
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol" | "blockquote" | "pre" => {
                self.px(style.font_px * self.opts.font_scale * 0.5 * self.opts.density)
            }
            _ => 0,
        };
        self.cursor_y = self.cursor_y.saturating_add(margin);

        let indent = match tag {
            "ul" | "ol" | "blockquote" | "dd" => self.px(24.0),
            _ => 0,
        };
        let saved_left = self.left;
        self.left = self.left.saturating_add(indent);
        self.cursor_x = self.left;

        let background_slot = style.background.map(|bg| {
            self.nodes.push(LayoutNode {
                rect: Rect {
                    x: self.left,
                    y: self.cursor_y,
                    width: (self.right - self.left).max(0) as u32,
                    height: 0,
                },
                elem_type: ElementType::Background(bg),
            });
            self.nodes.len() - 1
        });
        let top = self.cursor_y;

        if tag == "li" {
            let marker = match doc.parent(node).and_then(|p| doc.tag(p)) {
                Some("ol") => {
                    let position = doc
                        .parent(node)
                        .map(|p| {
                            doc.children(p)
                                .into_iter()
                                .take_while(|c| *c != node)
                                .filter(|c| doc.tag(*c) == Some("li"))
                                .count()
                        })
                        .unwrap_or(0);
                    format!("{}. ", position + 1)
                }
                _ => "* ".to_string(),
            };
            self.push_text(&marker, style);
        }

        for child in doc.children(node) {
            self.visit(doc, child, style);
        }
        self.finish_block();

        if let Some(slot) = background_slot {
            self.nodes[slot].rect.height = self.cursor_y.saturating_sub(top).max(0) as u32;
        }
        self.left = saved_left;
        self.cursor_x = self.left;
        self.cursor_y = self.cursor_y.saturating_add(margin);
    }
}

/// Lay out the subtree rooted at `root` onto the canvas described by `opts`.
///
/// - Blocks stack vertically; inline text wraps at the content width
/// - Text that would fall below the canvas is clipped
/// - A background on `root` itself fills the whole canvas
pub fn layout_slide(doc: &Document, root: NodeId, opts: LayoutOptions) -> Vec<LayoutNode> {
    let base = doc
        .parent(root)
        .map(|p| ComputedStyle::at(doc, p))
        .unwrap_or_default();
    let root_style = base.inherit(doc, root);

    let pad = (opts.padding * opts.scale).round() as i32;
    let mut flow = Flow {
        opts,
        left: pad,
        right: opts.width as i32 - pad,
        cursor_x: pad,
        cursor_y: pad,
        line: Vec::new(),
        space_pending: false,
        nodes: Vec::new(),
    };

    if let Some(bg) = root_style.background {
        flow.nodes.push(LayoutNode {
            rect: Rect {
                x: 0,
                y: 0,
                width: opts.width,
                height: opts.height,
            },
            elem_type: ElementType::Background(bg),
        });
    }
    for child in doc.children(root) {
        flow.visit(doc, child, &root_style);
    }
    flow.finish_block();
    flow.nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_of(html: &str) -> (Document, NodeId) {
        let doc = Document::from_html(&scraper::Html::parse_document(html));
        let div = doc.find_tag(doc.root(), "div").unwrap();
        (doc, div)
    }

    fn texts(nodes: &[LayoutNode]) -> Vec<(String, Rect)> {
        nodes
            .iter()
            .filter_map(|n| match &n.elem_type {
                ElementType::Text { text, .. } => Some((text.clone(), n.rect)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn layout_stacks_title_and_paragraphs() {
        let (doc, div) = doc_of("<div><h1>Heading</h1><p>Hello world</p><p>More text</p></div>");
        let nodes = layout_slide(&doc, div, LayoutOptions::default());
        let t = texts(&nodes);
        let words: Vec<_> = t.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(words, vec!["Heading", "Hello", "world", "More", "text"]);
        assert!(t[0].1.height > t[1].1.height, "heading is larger");
        assert!(t[1].1.y > t[0].1.y);
        assert_eq!(t[1].1.y, t[2].1.y, "same line");
        assert!(t[2].1.x > t[1].1.x);
        assert!(t[3].1.y > t[2].1.y);
    }

    #[test]
    fn long_text_wraps_and_clips() {
        let words = "word ".repeat(2000);
        let (doc, div) = doc_of(&format!("<div><p>{}</p></div>", words));
        let opts = LayoutOptions::default();
        let nodes = layout_slide(&doc, div, opts);
        assert!(nodes.len() < 2000, "overflow is clipped");
        for n in &nodes {
            assert!(n.rect.x + n.rect.width as i32 <= opts.width as i32);
            assert!(n.rect.y + n.rect.height as i32 <= opts.height as i32);
        }
    }

    #[test]
    fn inline_styles_change_color_and_size() {
        let (doc, div) = doc_of(
            r#"<div style="background: #002f5d"><span style="color: #ff0000; font-size: 40px">Big</span> small</div>"#,
        );
        let nodes = layout_slide(&doc, div, LayoutOptions::default());
        assert!(matches!(nodes[0].elem_type, ElementType::Background(Rgb(0x00, 0x2f, 0x5d))));
        let big = nodes
            .iter()
            .find_map(|n| match &n.elem_type {
                ElementType::Text { text, color, face } if text == "Big" => Some((*color, *face)),
                _ => None,
            })
            .unwrap();
        assert_eq!(big.0, Rgb(0xff, 0, 0));
        assert!(big.1.height() >= 30);
    }

    #[test]
    fn computed_style_folds_ancestors() {
        let (doc, div) = doc_of(r#"<div style="font-size: 20px; color: blue"><h2><i>x</i></h2></div>"#);
        let i = doc.find_tag(div, "i").unwrap();
        let s = ComputedStyle::at(&doc, i);
        assert_eq!(s.font_px, 30.0);
        assert_eq!(s.color, Rgb(0, 0, 0xff));
        assert!(s.bold);
    }

    #[test]
    fn huge_font_sizes_are_clamped_and_laid_out() {
        let (doc, div) = doc_of(
            r#"<div><p style="font-size: 1e12px">A</p><h1><h1><p style="font-size: 3000px">B</p></h1></h1><p>C</p></div>"#,
        );
        let p = doc.find_tag(div, "p").unwrap();
        assert_eq!(ComputedStyle::at(&doc, p).font_px, ComputedStyle::MAX_FONT_PX);
        let opts = LayoutOptions {
            scale: 2.0,
            ..LayoutOptions::default()
        };
        let nodes = layout_slide(&doc, div, opts);
        for n in &nodes {
            assert!(n.rect.y >= 0);
        }
    }
}
