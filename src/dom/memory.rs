//! Arena-backed [`Document`] with a synthetic line layout.
//!
//! Every rendered element with text occupies one line of `LINE_HEIGHT` pixels, stacked in
//! document order, and every character is `CHAR_WIDTH` pixels wide. That is enough layout for
//! visibility checks and overlay geometry when no browser engine is around.

use super::{ComputedStyle, Display, Document, NodeId, Rect, Visibility};

pub const LINE_HEIGHT: f64 = 20.0;
pub const CHAR_WIDTH: f64 = 8.0;

#[derive(Debug, Clone)]
enum NodeKind {
    Element(String),
    Text(String),
}

#[derive(Debug, Clone, Default)]
struct DeclaredStyle {
    display: Option<Display>,
    visibility: Option<Visibility>,
    opacity: Option<f32>,
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    style: DeclaredStyle,
    rect: Option<Rect>,
}

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    scroll_y: f64,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// A document holding only a `body` root element.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Element("body".to_string()),
                style: DeclaredStyle::default(),
                rect: None,
            }],
            scroll_y: 0.0,
        }
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: Some(parent),
            children: Vec::new(),
            kind,
            style: DeclaredStyle::default(),
            rect: None,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push(parent, NodeKind::Element(tag.to_ascii_lowercase()))
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeKind::Text(text.to_string()))
    }

    /// Element with a single text child.
    pub fn append_text_element(&mut self, parent: NodeId, tag: &str, text: &str) -> NodeId {
        let element = self.append_element(parent, tag);
        self.append_text(element, text);
        element
    }

    /// Replaces the data of a text node. Elements are left untouched.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(NodeKind::Text(data)) = self.nodes.get_mut(node.0).map(|n| &mut n.kind) {
            *data = text.to_string();
        }
    }

    /// Removes a node (and its subtree) from its parent.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes.get_mut(node.0).and_then(|n| n.parent.take()) {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    pub fn set_display(&mut self, node: NodeId, display: Display) {
        self.nodes[node.0].style.display = Some(display);
    }

    pub fn set_visibility(&mut self, node: NodeId, visibility: Visibility) {
        self.nodes[node.0].style.visibility = Some(visibility);
    }

    pub fn set_opacity(&mut self, node: NodeId, opacity: f32) {
        self.nodes[node.0].style.opacity = Some(opacity);
    }

    /// Pins an element's document-relative box instead of using the line layout.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.nodes[node.0].rect = Some(rect);
    }

    pub fn scroll_to(&mut self, y: f64) {
        self.scroll_y = y;
    }

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    fn node(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0)
    }

    fn ancestors_and_self(&self, node: NodeId) -> impl Iterator<Item = &NodeData> + '_ {
        let mut current = self.node(node);
        std::iter::from_fn(move || {
            let data = current?;
            current = data.parent.and_then(|p| self.node(p));
            Some(data)
        })
    }

    /// Not displayed when it, or anything above it, is `display:none`.
    fn is_displayed(&self, node: NodeId) -> bool {
        self.ancestors_and_self(node)
            .all(|data| data.style.display != Some(Display::None))
    }

    /// Line index of an element among the rendered elements that carry text.
    fn line_of(&self, element: NodeId) -> usize {
        super::descendants(self, self.root())
            .take_while(|id| *id != element)
            .filter(|id| self.occupies_line(*id))
            .count()
    }

    fn occupies_line(&self, node: NodeId) -> bool {
        matches!(self.node(node).map(|n| &n.kind), Some(NodeKind::Element(_)))
            && self.is_displayed(node)
            && !super::text_content(self, node).is_empty()
    }

    fn layout_rect(&self, element: NodeId) -> Rect {
        if let Some(rect) = self.node(element).and_then(|n| n.rect) {
            return rect;
        }
        let chars = super::text_content(self, element).chars().count();
        if chars == 0 {
            return Rect::default();
        }
        let top = self.line_of(element) as f64 * LINE_HEIGHT;
        Rect::new(0.0, top, chars as f64 * CHAR_WIDTH, LINE_HEIGHT)
    }
}

impl Document for MemoryDocument {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.node(node)?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<String> {
        match &self.node(node)?.kind {
            NodeKind::Text(text) => Some(text.clone()),
            NodeKind::Element(_) => None,
        }
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn computed_style(&self, node: NodeId) -> ComputedStyle {
        let Some(data) = self.node(node) else {
            return ComputedStyle::default();
        };
        let visibility = self
            .ancestors_and_self(node)
            .find_map(|n| n.style.visibility)
            .unwrap_or_default();
        let opacity = self
            .ancestors_and_self(node)
            .map(|n| n.style.opacity.unwrap_or(1.0))
            .product();
        ComputedStyle {
            display: data.style.display.unwrap_or_default(),
            visibility,
            opacity,
        }
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        if !self.is_attached(node) || !self.is_displayed(node) {
            return Rect::default();
        }
        let mut rect = self.layout_rect(node);
        rect.top -= self.scroll_y;
        rect
    }

    fn range_rect(&self, text_node: NodeId, start: usize, end: usize) -> Option<Rect> {
        let text = self.text(text_node)?;
        if start > end || end > text.chars().count() {
            return None;
        }
        let parent = self.parent(text_node)?;
        let base = self.bounding_rect(parent);
        if base.is_empty() {
            return None;
        }
        let before = super::text_runs(self, parent)
            .find(|run| run.node == text_node)
            .map(|run| run.start)?;
        Some(Rect::new(
            base.left + (before + start) as f64 * CHAR_WIDTH,
            base.top,
            (end - start) as f64 * CHAR_WIDTH,
            LINE_HEIGHT,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::is_visible;

    #[test]
    fn test_display_none_hides_descendants() {
        let mut doc = MemoryDocument::new();
        let outer = doc.append_element(doc.root(), "div");
        let p = doc.append_text_element(outer, "p", "hidden text");
        doc.set_display(outer, Display::None);

        assert!(!is_visible(&doc, p));
        assert!(doc.bounding_rect(p).is_empty());
    }

    #[test]
    fn test_visibility_and_opacity_inherit() {
        let mut doc = MemoryDocument::new();
        let outer = doc.append_element(doc.root(), "section");
        let p = doc.append_text_element(outer, "p", "some text");

        doc.set_opacity(outer, 0.0);
        assert!(!is_visible(&doc, p));

        doc.set_opacity(outer, 0.5);
        doc.set_visibility(outer, Visibility::Hidden);
        assert!(!is_visible(&doc, p));

        doc.set_visibility(p, Visibility::Visible);
        assert!(is_visible(&doc, p));
    }

    #[test]
    fn test_scroll_shifts_rects() {
        let mut doc = MemoryDocument::new();
        doc.append_text_element(doc.root(), "p", "first line");
        let second = doc.append_text_element(doc.root(), "p", "second line");

        let before = doc.bounding_rect(second);
        doc.scroll_to(15.0);
        let after = doc.bounding_rect(second);

        assert_eq!(after.top, before.top - 15.0);
        assert_eq!(after.left, before.left);
    }

    #[test]
    fn test_range_rect_offsets_inside_element() {
        let mut doc = MemoryDocument::new();
        let p = doc.append_element(doc.root(), "p");
        doc.append_text(p, "Hello ");
        let world = doc.append_text(p, "world");

        let rect = doc.range_rect(world, 1, 3).unwrap();
        assert_eq!(rect.left, 7.0 * CHAR_WIDTH);
        assert_eq!(rect.width, 2.0 * CHAR_WIDTH);
        assert!(doc.range_rect(world, 2, 9).is_none());
    }

    #[test]
    fn test_detach_marks_subtree_unattached() {
        let mut doc = MemoryDocument::new();
        let div = doc.append_element(doc.root(), "div");
        let p = doc.append_text_element(div, "p", "gone soon");
        doc.detach(div);

        assert!(!doc.is_attached(p));
        assert!(doc.children(doc.root()).is_empty());
    }
}
