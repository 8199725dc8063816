//! Popup surfaces: transient xdg-shell surfaces positioned relative to a
//! parent bar or popup (spec §3, §4.F, §4.G grab resolution).

use wayland_protocols::xdg::shell::client::xdg_popup::XdgPopup;
use wayland_protocols::xdg::shell::client::xdg_positioner::Gravity as XdgGravity;
use wayland_protocols::xdg::shell::client::xdg_surface::XdgSurface;

use super::SurfaceCommon;

/// Identical to `BarState` plus `RepositionPending` (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupState {
    WantConfigure,
    Sized,
    Painting,
    Idle,
    /// Entered when a positioner input changes post-creation;
    /// `xdg_popup.reposition` has been issued and the next `configure`
    /// closes this state.
    RepositionPending,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    TopLeft,
    Top,
    TopRight,
    Right,
    None,
}

impl Gravity {
    pub fn from_wire(n: i64) -> Self {
        match n {
            0 => Self::None,
            1 => Self::Top,
            2 => Self::Bottom,
            3 => Self::Left,
            4 => Self::Right,
            5 => Self::TopLeft,
            6 => Self::BottomLeft,
            7 => Self::TopRight,
            _ => Self::BottomRight,
        }
    }

    pub fn to_xdg(self) -> XdgGravity {
        match self {
            Self::None => XdgGravity::None,
            Self::Top => XdgGravity::Top,
            Self::Bottom => XdgGravity::Bottom,
            Self::Left => XdgGravity::Left,
            Self::Right => XdgGravity::Right,
            Self::TopLeft => XdgGravity::TopLeft,
            Self::BottomLeft => XdgGravity::BottomLeft,
            Self::TopRight => XdgGravity::TopRight,
            Self::BottomRight => XdgGravity::BottomRight,
        }
    }
}

/// The seat holding a popup's pointer grab, resolved once at creation time
/// against a seat's serial ring (spec §4.G).
#[derive(Debug, Clone)]
pub struct Grab {
    pub seat_name: String,
    pub serial: u32,
}

/// A popup's parent, addressed by index rather than a raw back-pointer
/// (spec §9 "ownership from owner to owned"). Resolved on demand by
/// walking from the owning output/bar rather than stored as a pointer, so
/// the tree can never become cyclic by construction.
#[derive(Debug, Clone)]
pub enum ParentRef {
    Bar { output_name: String, bar_index: usize },
    Popup { output_name: String, bar_index: usize, popup_path: Vec<usize> },
}

pub struct Popup {
    pub common: SurfaceCommon,
    pub state: PopupState,
    pub xdg_surface: XdgSurface,
    pub xdg_popup: XdgPopup,
    pub parent: ParentRef,
    pub wanted_x: i32,
    pub wanted_y: i32,
    pub wanted_width: i32,
    pub wanted_height: i32,
    pub gravity: Gravity,
    pub constraint_adjustment: u32,
    pub grab: Option<Grab>,
    pub wants_render: bool,
    pub wants_commit: bool,
    pub wants_reposition: bool,
    pub pending_serial: Option<u32>,
}

impl Popup {
    pub fn new(
        common: SurfaceCommon,
        xdg_surface: XdgSurface,
        xdg_popup: XdgPopup,
        parent: ParentRef,
    ) -> Self {
        Self {
            common,
            state: PopupState::WantConfigure,
            xdg_surface,
            xdg_popup,
            parent,
            wanted_x: 0,
            wanted_y: 0,
            wanted_width: 0,
            wanted_height: 0,
            gravity: Gravity::default(),
            constraint_adjustment: 0,
            grab: None,
            wants_render: true,
            wants_commit: false,
            wants_reposition: false,
            pending_serial: None,
        }
    }

    pub fn request_render(&mut self) {
        self.wants_render = true;
    }

    pub fn request_commit(&mut self) {
        self.wants_commit = true;
    }

    /// A change to any positioner input (x/y/width/height/gravity/
    /// constraint-adjustment) after creation moves the popup into
    /// `RepositionPending` rather than tearing it down (spec §4.F).
    pub fn request_reposition(&mut self) {
        self.wants_reposition = true;
        if self.state != PopupState::WantConfigure {
            self.state = PopupState::RepositionPending;
        }
    }

    pub fn needs_commit_cycle(&self) -> bool {
        self.wants_render || self.wants_commit || self.wants_reposition
    }

    pub fn clear_pending(&mut self) {
        self.wants_render = false;
        self.wants_commit = false;
        self.wants_reposition = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gravity_wire_roundtrips_known_values() {
        assert_eq!(Gravity::from_wire(0), Gravity::None);
        assert_eq!(Gravity::from_wire(5), Gravity::TopLeft);
        assert_eq!(Gravity::from_wire(99), Gravity::BottomRight);
    }
}
