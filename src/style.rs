//! Selection-scoped style application.
//!
//! A [`StylePatch`] is applied to whatever the user last selected inside the
//! preview. Carets style their enclosing element; spans are wrapped in a new
//! `<span>` when the range sits inside a single parent, otherwise the nearest
//! common ancestor element is styled instead.

use log::debug;

use crate::css::{self, StyleMap};
use crate::dom::{Document, NodeId};
use crate::preview::Preview;
use crate::rendering::layout::ComputedStyle;
use crate::selection::{Boundary, Range, SelectionState};
use crate::{Error, Result};

/// Quick-pick colors offered next to the color input.
pub const COLOR_SWATCHES: [&str; 18] = [
    "#111111", "#333333", "#6b7280", "#9ca3af", "#e5e7eb", "#002f5d", "#036ad1", "#1a237e",
    "#3949ab", "#5c6bc0", "#8e24aa", "#ab47bc", "#ba68c8", "#4285F4", "#EA4335", "#FBBC05",
    "#FF0000", "#000000",
];

/// Largest font size the toolbar accepts.
pub const MAX_FONT_SIZE_PX: f32 = 1000.0;

/// A small set of inline style overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StylePatch {
    decls: StyleMap,
}

impl StylePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn font_size_px(mut self, px: f32) -> Result<Self> {
        if !px.is_finite() || px <= 0.0 {
            return Err(Error::InvalidStyle(format!("font size must be positive, got {}", px)));
        }
        if px > MAX_FONT_SIZE_PX {
            return Err(Error::InvalidStyle(format!(
                "font size must be at most {}px, got {}",
                MAX_FONT_SIZE_PX, px
            )));
        }
        let value = if px.fract() == 0.0 {
            format!("{}px", px as i64)
        } else {
            format!("{}px", px)
        };
        self.decls.set("font-size", &value);
        Ok(self)
    }

    pub fn color(mut self, value: &str) -> Result<Self> {
        let value = value.trim();
        if css::parse_color(value).is_none() || !(value.starts_with('#') || value.starts_with("rgb")) {
            return Err(Error::InvalidStyle(format!("not a color: {:?}", value)));
        }
        self.decls.set("color", value);
        Ok(self)
    }

    pub fn declarations(&self) -> &StyleMap {
        &self.decls
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

/// Why a style request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    NoSelection,
    OutsideEditable,
    InvalidRange,
    EmptySelection,
    EmptyPatch,
}

/// Outcome of a style request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The selected content was wrapped in a new span
    Wrapped { span: NodeId },
    /// An existing element received the patch
    Styled { element: NodeId },
    /// Nothing changed
    Ignored(Miss),
}

/// One edge of a precise wrap, relative to the shared parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Text { node: NodeId, offset: usize },
    Child { index: usize },
}

/// How a non-collapsed range will be styled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPlan {
    /// Both edges sit directly inside `parent`: wrap the spanned children
    Precise { parent: NodeId, start: Edge, end: Edge },
    /// The range crosses element boundaries: style this ancestor instead
    Ancestor(NodeId),
}

fn edge_of(doc: &Document, b: Boundary) -> Option<(NodeId, Edge)> {
    if doc.text(b.node).is_some() {
        let parent = doc.parent(b.node)?;
        Some((
            parent,
            Edge::Text {
                node: b.node,
                offset: b.offset,
            },
        ))
    } else {
        Some((b.node, Edge::Child { index: b.offset }))
    }
}

/// Decide how to style a non-collapsed range. `None` when no target lies
/// inside the editable scope.
pub fn plan_wrap(preview: &Preview, range: &Range) -> Option<WrapPlan> {
    let doc = preview.document();
    if let (Some((ps, start)), Some((pe, end))) = (edge_of(doc, range.start), edge_of(doc, range.end)) {
        if ps == pe && doc.is_element(ps) && preview.is_editable_scope(ps) {
            return Some(WrapPlan::Precise {
                parent: ps,
                start,
                end,
            });
        }
    }
    doc.common_ancestor(range.start.node, range.end.node)
        .and_then(|n| doc.enclosing_element(n))
        .filter(|e| preview.is_editable_scope(*e))
        .map(WrapPlan::Ancestor)
}

/// Child index where an edge cuts its parent, splitting text when the offset
/// falls inside a text node. Returns the index and whether a split happened.
fn cut(doc: &mut Document, edge: Edge) -> (usize, bool) {
    match edge {
        Edge::Child { index } => (index, false),
        Edge::Text { node, offset } => {
            let index = doc.index_in_parent(node).unwrap_or(0);
            if offset == 0 {
                (index, false)
            } else if offset >= doc.node_len(node) {
                (index + 1, false)
            } else {
                // The right half now sits at index + 1.
                doc.split_text(node, offset);
                (index + 1, true)
            }
        }
    }
}

/// Position of an edge among the parent's children as `(index, inside, offset)`.
/// `inside` marks a cut that falls strictly within the text node at `index`.
fn position(doc: &Document, edge: Edge) -> (usize, bool, usize) {
    match edge {
        Edge::Child { index } => (index, false, 0),
        Edge::Text { node, offset } => {
            let index = doc.index_in_parent(node).unwrap_or(0);
            if offset == 0 {
                (index, false, 0)
            } else if offset >= doc.node_len(node) {
                (index + 1, false, 0)
            } else {
                (index, true, offset)
            }
        }
    }
}

fn wrap_precise(
    doc: &mut Document,
    parent: NodeId,
    start: Edge,
    end: Edge,
    patch: &StylePatch,
) -> Option<NodeId> {
    // Nothing is split unless the range covers content.
    if position(doc, start) >= position(doc, end) {
        return None;
    }
    // Cut the end first so the start edge still addresses the same text.
    let (mut end_index, _) = cut(doc, end);
    let (start_index, split) = cut(doc, start);
    if split {
        end_index += 1;
    }
    let children = doc.children(parent);
    let end_index = end_index.min(children.len());
    if start_index >= end_index {
        return None;
    }
    let spanned: Vec<NodeId> = children[start_index..end_index].to_vec();
    let span = doc.create_element("span");
    doc.merge_style(span, patch.declarations());
    doc.insert_child(parent, start_index, span);
    for child in spanned {
        doc.append_child(span, child);
    }
    Some(span)
}

/// Apply `patch` to the current selection.
///
/// Uses the live selection, falling back to the saved snapshot. On success the
/// resulting selection is saved again so following patches hit the same scope.
pub fn apply_selection_style(
    preview: &mut Preview,
    selection: &mut SelectionState,
    patch: &StylePatch,
) -> Applied {
    if patch.is_empty() {
        return Applied::Ignored(Miss::EmptyPatch);
    }
    let Some(range) = selection.resolve(preview.generation()) else {
        return Applied::Ignored(Miss::NoSelection);
    };
    if !range.is_valid_in(preview.document()) {
        return Applied::Ignored(Miss::InvalidRange);
    }

    if range.is_collapsed() {
        let doc = preview.document();
        let target = doc
            .enclosing_element(range.start.node)
            .filter(|e| preview.is_editable_scope(*e));
        let Some(element) = target else {
            return Applied::Ignored(Miss::OutsideEditable);
        };
        preview.document_mut().merge_style(element, patch.declarations());
        let generation = preview.bump_generation();
        selection.save(Range { generation, ..range });
        debug!("styled caret container {:?}", element);
        return Applied::Styled { element };
    }

    match plan_wrap(preview, &range) {
        Some(WrapPlan::Precise { parent, start, end }) => {
            let Some(span) = wrap_precise(preview.document_mut(), parent, start, end, patch) else {
                return Applied::Ignored(Miss::EmptySelection);
            };
            let generation = preview.bump_generation();
            selection.save(Range::contents_of(preview.document(), span, generation));
            debug!("wrapped selection in {:?}", span);
            Applied::Wrapped { span }
        }
        Some(WrapPlan::Ancestor(element)) => {
            preview.document_mut().merge_style(element, patch.declarations());
            let generation = preview.bump_generation();
            selection.save(Range { generation, ..range });
            debug!("selection crosses elements; styled ancestor {:?}", element);
            Applied::Styled { element }
        }
        None => Applied::Ignored(Miss::OutsideEditable),
    }
}

/// Values to pre-fill the toolbar inputs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarState {
    pub font_size_px: u32,
    pub color: String,
}

/// Computed font size and color at the start of the current selection.
pub fn toolbar_state(preview: &Preview, selection: &SelectionState) -> Option<ToolbarState> {
    let range = selection.resolve(preview.generation())?;
    let doc = preview.document();
    if !doc.is_attached(range.start.node) {
        return None;
    }
    let element = doc
        .enclosing_element(range.start.node)
        .filter(|e| preview.is_editable_scope(*e))?;
    let computed = ComputedStyle::at(doc, element);
    Some(ToolbarState {
        font_size_px: computed.font_px.round().max(1.0) as u32,
        color: computed.color.to_hex(),
    })
}
