//! Selection ranges over the preview document.

use std::cmp::Ordering;

use crate::dom::{Document, NodeId};

/// A position inside the document: a character offset for text nodes, a child
/// index for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A start/end pair taken at a given preview generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Boundary,
    pub end: Boundary,
    pub generation: u64,
}

impl Range {
    pub fn new(start: Boundary, end: Boundary, generation: u64) -> Self {
        Self {
            start,
            end,
            generation,
        }
    }

    pub fn caret(at: Boundary, generation: u64) -> Self {
        Self::new(at, at, generation)
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Select every child of `node`.
    pub fn contents_of(doc: &Document, node: NodeId, generation: u64) -> Self {
        Self::new(
            Boundary::new(node, 0),
            Boundary::new(node, doc.node_len(node)),
            generation,
        )
    }

    /// Boundaries exist in `doc`, offsets are in bounds, nodes are attached and
    /// start does not come after end.
    pub fn is_valid_in(&self, doc: &Document) -> bool {
        let attached =
            |b: &Boundary| doc.is_attached(b.node) && b.offset <= doc.node_len(b.node);
        if !attached(&self.start) || !attached(&self.end) {
            return false;
        }
        compare_boundaries(doc, self.start, self.end) != Ordering::Greater
    }
}

/// Document order of two attached boundary points.
///
/// When one container holds the other, the outer offset is compared against the
/// index of the child that leads down to the inner boundary.
pub fn compare_boundaries(doc: &Document, a: Boundary, b: Boundary) -> Ordering {
    if a.node == b.node {
        return a.offset.cmp(&b.offset);
    }
    if doc.contains(a.node, b.node) {
        let branch = std::iter::once(b.node)
            .chain(doc.ancestors(b.node))
            .find(|n| doc.parent(*n) == Some(a.node));
        let index = branch.and_then(|n| doc.index_in_parent(n)).unwrap_or(0);
        return if a.offset <= index {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    if doc.contains(b.node, a.node) {
        return compare_boundaries(doc, b, a).reverse();
    }
    doc.cmp_order(a.node, b.node)
}

/// Live selection plus the last snapshot saved for controls that steal focus.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    live: Option<Range>,
    saved: Option<Range>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user moved the selection.
    pub fn select(&mut self, range: Range) {
        self.live = Some(range);
        self.saved = Some(range);
    }

    /// Focus left the editable area; the saved snapshot survives.
    pub fn blur(&mut self) {
        self.live = None;
    }

    /// Persist `range` as both live and saved selection.
    pub fn save(&mut self, range: Range) {
        self.select(range);
    }

    pub fn clear(&mut self) {
        self.live = None;
        self.saved = None;
    }

    pub fn live(&self) -> Option<Range> {
        self.live
    }

    pub fn saved(&self) -> Option<Range> {
        self.saved
    }

    /// Live selection first, then the saved snapshot. Ranges taken at another
    /// generation are stale and never resolve.
    pub fn resolve(&self, generation: u64) -> Option<Range> {
        self.live
            .filter(|r| r.generation == generation)
            .or_else(|| self.saved.filter(|r| r.generation == generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        doc.append_child(root, p);
        let a = doc.create_text("abc");
        let b = doc.create_text("de");
        doc.append_child(p, a);
        doc.append_child(p, b);
        (doc, p, a, b)
    }

    #[test]
    fn resolve_prefers_live_then_saved() {
        let (_, _, a, b) = paragraph();
        let first = Range::caret(Boundary::new(a, 0), 3);
        let second = Range::caret(Boundary::new(b, 1), 3);
        let mut s = SelectionState::new();
        s.select(first);
        s.select(second);
        assert_eq!(s.resolve(3), Some(second));
        s.blur();
        assert_eq!(s.live(), None);
        assert_eq!(s.resolve(3), Some(second));
        s.clear();
        assert_eq!(s.resolve(3), None);
    }

    #[test]
    fn stale_generation_does_not_resolve() {
        let (_, p, _, _) = paragraph();
        let mut s = SelectionState::new();
        s.select(Range::caret(Boundary::new(p, 0), 1));
        assert_eq!(s.resolve(2), None);
    }

    #[test]
    fn validity_checks_offsets_and_order() {
        let (mut doc, p, a, b) = paragraph();
        assert!(Range::new(Boundary::new(a, 1), Boundary::new(b, 2), 0).is_valid_in(&doc));
        assert!(!Range::new(Boundary::new(b, 1), Boundary::new(a, 2), 0).is_valid_in(&doc));
        assert!(!Range::new(Boundary::new(a, 4), Boundary::new(a, 4), 0).is_valid_in(&doc));
        assert!(Range::contents_of(&doc, p, 0).is_valid_in(&doc));
        doc.detach(p);
        assert!(!Range::caret(Boundary::new(a, 0), 0).is_valid_in(&doc));
    }

    #[test]
    fn container_boundaries_order_against_their_children() {
        let (doc, p, a, b) = paragraph();
        // Text offset 2 of "abc" lies after the point before the first child.
        assert!(!Range::new(Boundary::new(a, 2), Boundary::new(p, 0), 0).is_valid_in(&doc));
        assert!(Range::new(Boundary::new(p, 0), Boundary::new(a, 2), 0).is_valid_in(&doc));
        assert!(Range::new(Boundary::new(a, 2), Boundary::new(p, 1), 0).is_valid_in(&doc));
        assert!(!Range::new(Boundary::new(b, 1), Boundary::new(p, 1), 0).is_valid_in(&doc));
        assert_eq!(
            compare_boundaries(&doc, Boundary::new(p, 1), Boundary::new(b, 0)),
            Ordering::Less
        );
        assert_eq!(
            compare_boundaries(&doc, Boundary::new(p, 2), Boundary::new(b, 2)),
            Ordering::Greater
        );
    }
}
