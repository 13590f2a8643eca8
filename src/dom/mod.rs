//! Host document abstraction.
//!
//! The checker never owns page structure. It reads it through [`Document`], which a host
//! implements over whatever it has: a live browser DOM, a captured snapshot, or the arena tree
//! in [`memory`]. Handles are plain [`NodeId`]s, so nothing here keeps a copy of the page.
//!
//! All text offsets in this crate count Unicode scalar values (`char`), never bytes.

pub mod memory;

pub use memory::MemoryDocument;

/// Opaque handle to a node of the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Block,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    Collapse,
}

/// Live rendered style of an element, as the host's layout engine reports it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub visibility: Visibility,
    pub opacity: f32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            visibility: Visibility::Visible,
            opacity: 1.0,
        }
    }
}

impl ComputedStyle {
    /// False for `display:none`, `visibility:hidden|collapse` and fully transparent elements.
    pub fn is_painted(&self) -> bool {
        self.display != Display::None
            && self.visibility == Visibility::Visible
            && self.opacity > 0.0
    }
}

/// Viewport-relative box in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A box with no rendered area.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Read access to a rendered document.
///
/// Implementations answer from live, post-layout state: `computed_style` and `bounding_rect`
/// must reflect ancestor visibility and stylesheet rules, not just inline style.
pub trait Document {
    fn root(&self) -> NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child nodes in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lower-case tag name for elements, `None` for text nodes.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    /// Character data for text nodes, `None` for elements.
    fn text(&self, node: NodeId) -> Option<String>;

    /// Whether the node is still part of the document.
    fn is_attached(&self, node: NodeId) -> bool;

    fn computed_style(&self, node: NodeId) -> ComputedStyle;

    fn bounding_rect(&self, node: NodeId) -> Rect;

    /// Box of the characters `start..end` of a text node, if it can be laid out.
    fn range_rect(&self, text_node: NodeId, start: usize, end: usize) -> Option<Rect>;
}

/// Visibility predicate used by serialization.
pub fn is_visible<D: Document + ?Sized>(doc: &D, element: NodeId) -> bool {
    doc.computed_style(element).is_painted() && !doc.bounding_rect(element).is_empty()
}

/// Nearest self-or-ancestor element whose tag is in `tags`.
pub fn closest<D: Document + ?Sized>(doc: &D, node: NodeId, tags: &[&str]) -> Option<NodeId> {
    let mut current = Some(node);
    while let Some(id) = current {
        if let Some(tag) = doc.tag_name(id) {
            if tags.contains(&tag.as_str()) {
                return Some(id);
            }
        }
        current = doc.parent(id);
    }
    None
}

/// Concatenated text of every descendant text node, like DOM `textContent`.
pub fn text_content<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    text_runs(doc, node).map(|run| run.text).collect()
}

/// Descendants of `root` (excluding `root`) in pre-order.
pub fn descendants<D: Document + ?Sized>(doc: &D, root: NodeId) -> Descendants<'_, D> {
    let mut stack = doc.children(root);
    stack.reverse();
    Descendants { doc, stack }
}

pub struct Descendants<'a, D: ?Sized> {
    doc: &'a D,
    stack: Vec<NodeId>,
}

impl<D: Document + ?Sized> Iterator for Descendants<'_, D> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack.extend(self.doc.children(node).into_iter().rev());
        Some(node)
    }
}

/// One text node of an element together with where it starts in the element's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub node: NodeId,
    pub text: String,
    /// Characters consumed by earlier runs of the same walk.
    pub start: usize,
    /// Length in characters.
    pub len: usize,
}

impl TextRun {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Lazily walks the text nodes under `element` in document order.
///
/// Every call starts a fresh walk, so a run sequence reflects the document as it is now.
pub fn text_runs<D: Document + ?Sized>(doc: &D, element: NodeId) -> TextRuns<'_, D> {
    TextRuns {
        doc,
        stack: vec![element],
        consumed: 0,
    }
}

pub struct TextRuns<'a, D: ?Sized> {
    doc: &'a D,
    stack: Vec<NodeId>,
    consumed: usize,
}

impl<D: Document + ?Sized> Iterator for TextRuns<'_, D> {
    type Item = TextRun;

    fn next(&mut self) -> Option<TextRun> {
        while let Some(node) = self.stack.pop() {
            if let Some(text) = self.doc.text(node) {
                let len = text.chars().count();
                let run = TextRun {
                    node,
                    text,
                    start: self.consumed,
                    len,
                };
                self.consumed += len;
                return Some(run);
            }
            self.stack.extend(self.doc.children(node).into_iter().rev());
        }
        None
    }
}

/// Byte index of the `char_idx`-th character, or `s.len()` past the end.
pub(crate) fn byte_offset(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len())
}

/// `s[start..end]` in character coordinates, clamped to the string.
pub(crate) fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let from = byte_offset(s, start);
    let to = byte_offset(s, end.max(start));
    &s[from..to]
}
