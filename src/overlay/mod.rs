//! Transient highlight overlays.
//!
//! At most one overlay exists per page. It is painted on a host [`OverlaySurface`] above the
//! content, so the page itself is never modified, and it follows its target while the viewport
//! scrolls or resizes until it is cleared.

pub mod surface;

pub use surface::{ListenerId, MemorySurface, OverlayId, OverlaySurface, ViewportEvent};

use crate::checker::mapper::HighlightTarget;
use crate::checker::ErrorType;
use crate::dom::{Document, Rect};
use log::debug;

pub const OVERLAY_CLASS: &str = "proofread-highlight";

const OVERLAY_Z_INDEX: i32 = 999_999;

/// Cosmetic description of an overlay box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayStyle {
    /// Class the host puts on the overlay element so it can be found and removed.
    pub class_name: &'static str,
    pub accent: &'static str,
    pub border_bottom: String,
    pub background: &'static str,
    pub z_index: i32,
}

impl OverlayStyle {
    pub fn for_error_type(error_type: ErrorType) -> Self {
        let (accent, background) = match error_type {
            ErrorType::Spelling => ("#ef4444", "rgba(239, 68, 68, 0.15)"),
            ErrorType::Grammar => ("#f59e0b", "rgba(245, 158, 11, 0.15)"),
        };
        Self {
            class_name: OVERLAY_CLASS,
            accent,
            border_bottom: format!("3px wavy {}", accent),
            background,
            z_index: OVERLAY_Z_INDEX,
        }
    }

    /// Inline `style` attribute for a fixed, non-interactive box at `rect`.
    pub fn css_text(&self, rect: Rect) -> String {
        format!(
            "position: fixed; left: {}px; top: {}px; width: {}px; height: {}px; \
             z-index: {}; pointer-events: none; border-bottom: {}; \
             background-color: {}; border-radius: 2px;",
            rect.left,
            rect.top,
            rect.width,
            rect.height,
            self.z_index,
            self.border_bottom,
            self.background
        )
    }
}

/// A live overlay and the viewport listeners bound for it.
#[derive(Debug)]
pub struct OverlayHandle {
    overlay: OverlayId,
    target: HighlightTarget,
    error_type: ErrorType,
    listeners: Vec<ListenerId>,
}

impl OverlayHandle {
    pub fn overlay(&self) -> OverlayId {
        self.overlay
    }

    pub fn target(&self) -> HighlightTarget {
        self.target
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// Unbinds this handle's listeners. Later calls do nothing.
    pub fn cleanup<S: OverlaySurface + ?Sized>(&mut self, surface: &mut S) {
        for listener in self.listeners.drain(..) {
            surface.unlisten(listener);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Idle,
    Highlighted,
}

#[derive(Debug, Default)]
pub struct OverlayController {
    active: Option<OverlayHandle>,
}

impl OverlayController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OverlayState {
        match self.active {
            Some(_) => OverlayState::Highlighted,
            None => OverlayState::Idle,
        }
    }

    pub fn active(&self) -> Option<&OverlayHandle> {
        self.active.as_ref()
    }

    /// Paints an overlay over `target`, replacing any previous one.
    pub fn highlight<D, S>(
        &mut self,
        doc: &D,
        surface: &mut S,
        target: HighlightTarget,
        error_type: ErrorType,
    ) -> OverlayId
    where
        D: Document + ?Sized,
        S: OverlaySurface + ?Sized,
    {
        self.clear_all(surface);

        let rect = target_rect(doc, target);
        let overlay = surface.create_overlay(rect, &OverlayStyle::for_error_type(error_type));
        let listeners = vec![
            surface.listen(ViewportEvent::Scroll),
            surface.listen(ViewportEvent::Resize),
        ];
        debug!("Highlight overlay {:?} placed at {:?}", overlay, rect);

        self.active = Some(OverlayHandle {
            overlay,
            target,
            error_type,
            listeners,
        });
        overlay
    }

    /// Re-measures the target and moves the overlay onto it.
    pub fn reposition<D, S>(&self, doc: &D, surface: &mut S)
    where
        D: Document + ?Sized,
        S: OverlaySurface + ?Sized,
    {
        if let Some(handle) = &self.active {
            surface.move_overlay(handle.overlay, target_rect(doc, handle.target));
        }
    }

    /// Removes the overlay, if any, after unbinding its listeners.
    pub fn clear_all<S: OverlaySurface + ?Sized>(&mut self, surface: &mut S) {
        if let Some(mut handle) = self.active.take() {
            handle.cleanup(surface);
            surface.remove_overlay(handle.overlay);
            debug!("Highlight overlay {:?} removed", handle.overlay);
        }
    }
}

fn target_rect<D: Document + ?Sized>(doc: &D, target: HighlightTarget) -> Rect {
    match target {
        HighlightTarget::Range { node, start, end } => doc
            .range_rect(node, start, end)
            .or_else(|| doc.parent(node).map(|parent| doc.bounding_rect(parent)))
            .unwrap_or_default(),
        HighlightTarget::Element(element) => doc.bounding_rect(element),
    }
}
