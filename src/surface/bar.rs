//! Bar surfaces: long-lived layer-shell surfaces anchored to an output edge
//! (spec §3, §4.F).

use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_surface_v1::{self, ZwlrLayerSurfaceV1};

use crate::geometry::Anchor;

use super::SurfaceCommon;

/// `bar_configure`'s state machine (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarState {
    WantConfigure,
    Sized,
    Painting,
    Idle,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layer {
    Background,
    #[default]
    Bottom,
    Top,
    Overlay,
}

impl Layer {
    pub fn from_wire(n: i64) -> Self {
        match n {
            0 => Self::Background,
            2 => Self::Top,
            3 => Self::Overlay,
            _ => Self::Bottom,
        }
    }

    pub fn to_zwlr(self) -> zwlr_layer_surface_v1::Layer {
        match self {
            Self::Background => zwlr_layer_surface_v1::Layer::Background,
            Self::Bottom => zwlr_layer_surface_v1::Layer::Bottom,
            Self::Top => zwlr_layer_surface_v1::Layer::Top,
            Self::Overlay => zwlr_layer_surface_v1::Layer::Overlay,
        }
    }
}

/// A bar's edge anchor maps onto the wlr-layer-shell anchor bitmask as a
/// full-width/full-height strip pinned to that edge; `Center`/`None` fall
/// back to `Top` (spec §3 "anchor edge", DESIGN.md Open Question resolution).
pub fn edge_to_zwlr_anchor(edge: Anchor) -> zwlr_layer_surface_v1::Anchor {
    use zwlr_layer_surface_v1::Anchor as A;
    match edge {
        Anchor::Top | Anchor::Center | Anchor::None => A::Top | A::Left | A::Right,
        Anchor::Bottom => A::Bottom | A::Left | A::Right,
        Anchor::Left => A::Left | A::Top | A::Bottom,
        Anchor::Right => A::Right | A::Top | A::Bottom,
    }
}

/// A bar anchored to a side edge runs its main axis vertically.
pub fn edge_is_vertical(edge: Anchor) -> bool {
    matches!(edge, Anchor::Left | Anchor::Right)
}

/// `margin[BorderSide::Left as usize]` etc — shares `Block`'s border
/// ordering, not CSS order (spec.md §3, SPEC_FULL §3).
pub type Margin = [i32; 4];

pub struct Bar {
    pub common: SurfaceCommon,
    pub state: BarState,
    pub output_name: String,
    pub layer_surface: ZwlrLayerSurfaceV1,
    pub layer: Layer,
    pub anchor_edge: Anchor,
    pub exclusive_zone: i32,
    pub margin: Margin,
    /// Accumulated across one configure pass (spec §4.F): a geometry or
    /// wanted-size change independently sets this; it implies `wants_commit`
    /// and wins if both are set.
    pub wants_render: bool,
    /// Set by anchor/layer/margin/exclusive-zone changes on their own — a
    /// bare `wl_surface.commit` with no repaint.
    pub wants_commit: bool,
    /// The serial from the most recent `configure` event, pending `ack`.
    pub pending_serial: Option<u32>,
}

impl Bar {
    pub fn new(common: SurfaceCommon, output_name: String, layer_surface: ZwlrLayerSurfaceV1) -> Self {
        Self {
            common,
            state: BarState::WantConfigure,
            output_name,
            layer_surface,
            layer: Layer::default(),
            anchor_edge: Anchor::default(),
            exclusive_zone: 0,
            margin: [0; 4],
            wants_render: true,
            wants_commit: false,
            pending_serial: None,
        }
    }

    /// `render` implies `commit` and wins if both are requested within one
    /// configure pass (spec §4.F).
    pub fn request_render(&mut self) {
        self.wants_render = true;
    }

    pub fn request_commit(&mut self) {
        self.wants_commit = true;
    }

    pub fn needs_commit_cycle(&self) -> bool {
        self.wants_render || self.wants_commit
    }

    pub fn clear_pending(&mut self) {
        self.wants_render = false;
        self.wants_commit = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_request_implies_commit_cycle() {
        let mut flags = (false, false);
        flags.0 = true; // wants_render
        assert!(flags.0 || flags.1);
    }

    #[test]
    fn layer_wire_roundtrips_known_values() {
        assert_eq!(Layer::from_wire(0), Layer::Background);
        assert_eq!(Layer::from_wire(1), Layer::Bottom);
        assert_eq!(Layer::from_wire(2), Layer::Top);
        assert_eq!(Layer::from_wire(3), Layer::Overlay);
        assert_eq!(Layer::from_wire(99), Layer::Bottom);
    }
}
