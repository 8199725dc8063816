//! The surface tree (spec §3, §4.F): bars own nested popups; both share
//! geometry, buffering and input-region state through [`SurfaceCommon`].

pub mod bar;
pub mod popup;

pub use bar::{edge_is_vertical, edge_to_zwlr_anchor, Bar, BarState, Layer};
pub use popup::{Gravity, Grab, ParentRef, Popup, PopupState};

use serde_json::Value;

use crate::block::BlockHandle;
use crate::buffer::ShmBuffer;
use crate::geometry::{BlockBox, Rect};

/// Resolved cursor image request for a surface (spec §3; §9 Open Question
/// 2 — `Default` never issues a `set_shape` request at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Default,
    Pointer,
    Text,
    Crosshair,
    Grab,
    Grabbing,
    NotAllowed,
}

impl CursorShape {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "pointer" => Self::Pointer,
            "text" => Self::Text,
            "crosshair" => Self::Crosshair,
            "grab" => Self::Grab,
            "grabbing" => Self::Grabbing,
            "not-allowed" => Self::NotAllowed,
            _ => Self::Default,
        }
    }
}

/// Fields shared by bars and popups (spec §3 "Surface").
pub struct SurfaceCommon {
    pub wl_surface: wayland_client::protocol::wl_surface::WlSurface,
    pub buffer: Option<ShmBuffer>,
    pub width: i32,
    pub height: i32,
    pub scale: i32,
    pub vertical: bool,
    pub render: bool,
    pub cursor_shape: CursorShape,
    pub input_regions: Vec<Rect>,
    pub blocks: Vec<BlockHandle>,
    /// Layout output, parallel to `blocks` — the `block_hotspots` used for
    /// pointer hit-testing and state-report `blocks[]` entries.
    pub block_boxes: Vec<BlockBox>,
    /// `None` at an index means that slot's popup was dismissed/rejected —
    /// the slot stays, rather than the vec shrinking, so sibling indices
    /// keep their positional meaning (spec §4.J, mirrors `Output.bars`).
    pub popups: Vec<Option<Popup>>,
    pub userdata: Value,
    /// Set whenever geometry, content or commit-level properties changed
    /// since the last Wayland commit; cleared by the surface-tree driver
    /// once it has acted on the change.
    pub dirty: bool,
}

impl SurfaceCommon {
    pub fn new(wl_surface: wayland_client::protocol::wl_surface::WlSurface) -> Self {
        Self {
            wl_surface,
            buffer: None,
            width: 0,
            height: 0,
            scale: 1,
            vertical: false,
            render: true,
            cursor_shape: CursorShape::default(),
            input_regions: Vec::new(),
            blocks: Vec::new(),
            block_boxes: Vec::new(),
            popups: Vec::new(),
            userdata: Value::Null,
            dirty: true,
        }
    }

    /// Spec §8 invariant 1: `block_hotspots[i]` must describe the exact
    /// rectangle `blocks[i]` was composited into.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<usize> {
        self.block_boxes.iter().position(|b| b.contains(x, y))
    }

    /// A surface with both derived dimensions zero is rejected by the
    /// reconciler (spec §4.E "wanted size deduction").
    pub fn has_zero_derived_size(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

#[cfg(test)]
mod tests {
    // `SurfaceCommon` needs a live `wl_surface` to construct, so its tests
    // live alongside the reconciler and surface-tree integration tests
    // where a test connection is already set up.
}
