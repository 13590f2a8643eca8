use super::OverlayStyle;
use crate::dom::{NodeId, Rect};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Viewport changes that move page content relative to a fixed overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportEvent {
    /// Any scroll, including nested scroll containers (capture phase).
    Scroll,
    Resize,
}

/// Where overlays are painted.
///
/// The host creates overlay nodes outside the page content and forwards subscribed viewport
/// events back to [`OverlayController::reposition`](super::OverlayController::reposition).
pub trait OverlaySurface {
    fn create_overlay(&mut self, rect: Rect, style: &OverlayStyle) -> OverlayId;

    fn move_overlay(&mut self, overlay: OverlayId, rect: Rect);

    fn remove_overlay(&mut self, overlay: OverlayId);

    fn listen(&mut self, event: ViewportEvent) -> ListenerId;

    fn unlisten(&mut self, listener: ListenerId);

    /// Scrolls `element` into the middle of the viewport.
    fn reveal(&mut self, element: NodeId);
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayNode {
    pub rect: Rect,
    pub style: OverlayStyle,
}

/// Surface that records what it was asked to do.
#[derive(Debug, Default)]
pub struct MemorySurface {
    next_id: u64,
    overlays: BTreeMap<OverlayId, OverlayNode>,
    listeners: BTreeMap<ListenerId, ViewportEvent>,
    revealed: Vec<NodeId>,
    /// Removals or unbinds of ids that were not live.
    stale_operations: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn overlays(&self) -> impl Iterator<Item = (&OverlayId, &OverlayNode)> {
        self.overlays.iter()
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&OverlayNode> {
        self.overlays.get(&id)
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listeners_for(&self, event: ViewportEvent) -> usize {
        self.listeners.values().filter(|e| **e == event).count()
    }

    pub fn revealed(&self) -> &[NodeId] {
        &self.revealed
    }

    pub fn stale_operations(&self) -> usize {
        self.stale_operations
    }
}

impl OverlaySurface for MemorySurface {
    fn create_overlay(&mut self, rect: Rect, style: &OverlayStyle) -> OverlayId {
        let id = OverlayId(self.next());
        self.overlays.insert(
            id,
            OverlayNode {
                rect,
                style: style.clone(),
            },
        );
        id
    }

    fn move_overlay(&mut self, overlay: OverlayId, rect: Rect) {
        match self.overlays.get_mut(&overlay) {
            Some(node) => node.rect = rect,
            None => self.stale_operations += 1,
        }
    }

    fn remove_overlay(&mut self, overlay: OverlayId) {
        if self.overlays.remove(&overlay).is_none() {
            self.stale_operations += 1;
        }
    }

    fn listen(&mut self, event: ViewportEvent) -> ListenerId {
        let id = ListenerId(self.next());
        self.listeners.insert(id, event);
        id
    }

    fn unlisten(&mut self, listener: ListenerId) {
        if self.listeners.remove(&listener).is_none() {
            self.stale_operations += 1;
        }
    }

    fn reveal(&mut self, element: NodeId) {
        self.revealed.push(element);
    }
}
