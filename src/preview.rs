//! Editable preview of extracted slides.

use log::debug;

use crate::dom::{Document, NodeId};
use crate::extract::Slide;
use crate::selection::Range;
use crate::DisplayParams;

pub const PREVIEW_CLASS: &str = "preview";
pub const WRAP_CLASS: &str = "slide-wrap";
pub const EDITOR_CLASS: &str = "slide-editor";
pub const TOOLBAR_CLASS: &str = "selection-toolbar";
pub const INDEX_ATTR: &str = "data-slide-index";

/// The preview document: one `div.slide-wrap > .slide-editor` per slide under a
/// single root.
///
/// Every structural mutation bumps [`Preview::generation`], which invalidates
/// selection ranges taken before it.
#[derive(Debug, Clone)]
pub struct Preview {
    doc: Document,
    root: NodeId,
    editors: Vec<NodeId>,
    toolbar: Option<NodeId>,
    edit_mode: bool,
    params: DisplayParams,
    generation: u64,
}

impl Preview {
    pub fn new(params: DisplayParams) -> Self {
        let mut doc = Document::new();
        let root = doc.create_element("div");
        let doc_root = doc.root();
        doc.append_child(doc_root, root);
        doc.set_attr(root, "class", PREVIEW_CLASS);
        let mut preview = Self {
            doc,
            root,
            editors: Vec::new(),
            toolbar: None,
            edit_mode: true,
            params,
            generation: 0,
        };
        preview.set_display(params);
        preview
    }

    /// Replace the preview content with clones of `slides`.
    pub fn render(&mut self, slides: &[Slide]) {
        self.clear();
        for (i, slide) in slides.iter().enumerate() {
            let wrap = self.doc.create_element("div");
            self.doc.set_attr(wrap, "class", WRAP_CLASS);
            let editor = self.doc.import(slide.document(), slide.root());
            self.doc.add_class(editor, EDITOR_CLASS);
            self.doc.set_attr(editor, INDEX_ATTR, &(i + 1).to_string());
            self.doc.append_child(wrap, editor);
            self.doc.append_child(self.root, wrap);
            self.editors.push(editor);
        }
        self.apply_edit_mode();
        debug!(
            "rendered {} slide(s) at generation {}",
            self.editors.len(),
            self.generation
        );
    }

    /// Remove all slides.
    pub fn clear(&mut self) {
        self.doc.clear_children(self.root);
        self.editors.clear();
        self.toolbar = None;
        self.bump_generation();
    }

    pub fn set_edit_mode(&mut self, editable: bool) {
        self.edit_mode = editable;
        self.apply_edit_mode();
        if !editable {
            self.dismiss_toolbar();
        }
    }

    fn apply_edit_mode(&mut self) {
        let value = if self.edit_mode { "true" } else { "false" };
        for editor in self.editors.clone() {
            self.doc.set_attr(editor, "contenteditable", value);
        }
    }

    /// Publish display parameters as custom properties on the preview root so
    /// every slide picks them up.
    pub fn set_display(&mut self, params: DisplayParams) {
        self.params = params;
        let mut style = self.doc.style(self.root);
        style.set("--preview-scale", &format_number(params.scale));
        style.set("--preview-density", &format_number(params.density));
        style.set("--font-scale", &format_number(params.font_scale));
        self.doc.set_attr(self.root, "style", &style.to_string());
    }

    /// Show the selection toolbar next to the slide holding `range`.
    pub fn show_toolbar(&mut self, range: &Range) -> Option<NodeId> {
        let editor = self.editor_for(range.start.node)?;
        let wrap = self.doc.parent(editor)?;
        self.dismiss_toolbar();
        let toolbar = self.doc.create_element("div");
        self.doc.set_attr(toolbar, "class", TOOLBAR_CLASS);
        self.doc.set_attr(toolbar, "contenteditable", "false");
        self.doc.append_child(wrap, toolbar);
        self.toolbar = Some(toolbar);
        Some(toolbar)
    }

    pub fn dismiss_toolbar(&mut self) {
        if let Some(toolbar) = self.toolbar.take() {
            self.doc.detach(toolbar);
        }
    }

    pub fn toolbar(&self) -> Option<NodeId> {
        self.toolbar
    }

    /// The `.slide-editor` enclosing `node`, if it belongs to this preview.
    pub fn editor_for(&self, node: NodeId) -> Option<NodeId> {
        if !self.doc.is_attached(node) {
            return None;
        }
        self.doc
            .closest(node, |d, n| d.has_class(n, EDITOR_CLASS))
            .filter(|e| self.editors.contains(e))
    }

    /// Whether `node` may receive a style patch.
    pub fn is_editable_scope(&self, node: NodeId) -> bool {
        self.editor_for(node).is_some()
    }

    pub(crate) fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn params(&self) -> DisplayParams {
        self.params
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Rendered slide elements in display order.
    pub fn editors(&self) -> &[NodeId] {
        &self.editors
    }

    pub fn len(&self) -> usize {
        self.editors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }

    pub fn to_html(&self) -> String {
        self.doc.to_html(self.root)
    }
}

fn format_number(v: f32) -> String {
    let s = format!("{:.3}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract_slides, ExtractOptions};
    use crate::selection::Boundary;

    fn preview_of(raw: &str) -> Preview {
        let ex = extract_slides(raw, &ExtractOptions::default()).unwrap();
        let mut p = Preview::new(DisplayParams::default());
        p.render(&ex.slides);
        p
    }

    #[test]
    fn render_tags_slides_with_one_based_index() {
        let p = preview_of(r#"<div class="slide">A</div><div class="slide">B</div>"#);
        assert_eq!(p.len(), 2);
        let doc = p.document();
        assert_eq!(doc.attr(p.editors()[0], INDEX_ATTR), Some("1"));
        assert_eq!(doc.attr(p.editors()[1], INDEX_ATTR), Some("2"));
        assert!(doc.has_class(p.editors()[0], EDITOR_CLASS));
        assert_eq!(doc.attr(p.editors()[0], "contenteditable"), Some("true"));
        assert!(p.to_html().contains(r#"<div class="slide-wrap"><div class="slide slide-editor""#));
    }

    #[test]
    fn display_params_become_custom_properties() {
        let mut p = Preview::new(DisplayParams::default());
        p.set_display(DisplayParams {
            scale: 0.5,
            density: 1.25,
            font_scale: 1.1,
        });
        assert_eq!(
            p.document().attr(p.root(), "style"),
            Some("--preview-scale: 0.5; --preview-density: 1.25; --font-scale: 1.1")
        );
    }

    #[test]
    fn edit_mode_off_dismisses_toolbar() {
        let mut p = preview_of(r#"<div class="slide">A</div>"#);
        let text = p.document().children(p.editors()[0])[0];
        let range = Range::caret(Boundary::new(text, 0), p.generation());
        assert!(p.show_toolbar(&range).is_some());
        p.set_edit_mode(false);
        assert!(p.toolbar().is_none());
        assert!(!p.to_html().contains(TOOLBAR_CLASS));
        assert_eq!(p.document().attr(p.editors()[0], "contenteditable"), Some("false"));
    }

    #[test]
    fn rerender_bumps_generation_and_drops_old_nodes() {
        let mut p = preview_of(r#"<div class="slide">A</div>"#);
        let old_editor = p.editors()[0];
        let g = p.generation();
        let ex = extract_slides(r#"<div class="slide">A</div>"#, &ExtractOptions::default()).unwrap();
        p.render(&ex.slides);
        assert!(p.generation() > g);
        assert!(!p.is_editable_scope(old_editor));
    }
}
