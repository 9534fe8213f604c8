//! Image-anchored overlay markers.
//!
//! An overlay is pinned to a point of the image and drawn at a fixed
//! screen-pixel offset from wherever that point lands, so markers follow
//! pan and zoom without scaling. The engine only places them; what gets
//! drawn there is up to the owner.

use glam::DVec2;

use crate::viewport::ViewportState;

/// Handle returned by [`OverlaySet::attach`]. Stays valid until detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(u64);

/// Where an overlay sits and how it responds to clicks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayAnchor {
    /// Anchor point in full-resolution image pixels
    pub image_position: DVec2,

    /// Screen-pixel offset of the marker's top-left corner from the anchor
    pub offset: DVec2,

    /// Clickable size in screen pixels, starting at `offset`; `None` if the
    /// marker ignores clicks
    pub hit_size: Option<DVec2>,

    pub visible: bool,
}

impl OverlayAnchor {
    pub fn new(image_position: DVec2) -> Self {
        Self {
            image_position,
            offset: DVec2::ZERO,
            hit_size: None,
            visible: true,
        }
    }

    pub fn with_offset(mut self, offset: DVec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_hit_size(mut self, size: DVec2) -> Self {
        self.hit_size = Some(size);
        self
    }
}

/// A visible overlay resolved to screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedOverlay {
    pub id: OverlayId,

    /// Screen position of the anchor point itself
    pub anchor: DVec2,

    /// Top-left corner of the marker: `anchor + offset`
    pub position: DVec2,
}

/// Attached overlays in attach order.
#[derive(Debug, Clone, Default)]
pub struct OverlaySet {
    entries: Vec<(OverlayId, OverlayAnchor)>,
    next_id: u64,
}

impl OverlaySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, anchor: OverlayAnchor) -> OverlayId {
        self.next_id += 1;
        let id = OverlayId(self.next_id);
        self.entries.push((id, anchor));
        id
    }

    /// Remove an overlay, returning its anchor if it was attached.
    pub fn detach(&mut self, id: OverlayId) -> Option<OverlayAnchor> {
        let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, id: OverlayId) -> Option<&OverlayAnchor> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == id)
            .map(|(_, anchor)| anchor)
    }

    pub fn get_mut(&mut self, id: OverlayId) -> Option<&mut OverlayAnchor> {
        self.entries
            .iter_mut()
            .find(|(entry, _)| *entry == id)
            .map(|(_, anchor)| anchor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Screen placement of every visible overlay, in attach order.
    ///
    /// Empty until the viewport is ready to draw.
    pub fn place(&self, viewport: &ViewportState) -> Vec<PlacedOverlay> {
        let Some(transform) = viewport.image_to_screen() else {
            return Vec::new();
        };

        self.entries
            .iter()
            .filter(|(_, anchor)| anchor.visible)
            .map(|(id, anchor)| {
                let screen = transform.transform_point2(anchor.image_position);
                PlacedOverlay {
                    id: *id,
                    anchor: screen,
                    position: screen + anchor.offset,
                }
            })
            .collect()
    }

    /// First visible, clickable overlay whose hit box contains `point`.
    pub fn hit_test(&self, viewport: &ViewportState, point: DVec2) -> Option<OverlayId> {
        let transform = viewport.image_to_screen()?;

        self.entries.iter().find_map(|(id, anchor)| {
            let size = anchor.hit_size.filter(|_| anchor.visible)?;
            let min = transform.transform_point2(anchor.image_position) + anchor.offset;
            let max = min + size;
            let inside = point.x >= min.x && point.x < max.x && point.y >= min.y && point.y < max.y;
            inside.then_some(*id)
        })
    }
}
