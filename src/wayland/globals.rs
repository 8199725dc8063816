//! Connection setup and the one-time global bind pass (spec §4.H).

use wayland_client::globals::GlobalList;
use wayland_client::protocol::{wl_compositor, wl_shm};
use wayland_client::QueueHandle;
use wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_manager_v1::WpCursorShapeManagerV1;
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;

use crate::error::FatalEnvironmentError;
use crate::renderer::Renderer;

use super::{
    WL_COMPOSITOR_VERSION, WL_SHM_VERSION, WP_CURSOR_SHAPE_MANAGER_VERSION, XDG_WM_BASE_VERSION,
    ZWLR_LAYER_SHELL_VERSION,
};

/// The protocol-level handles every surface needs, bound once at startup.
/// `wl_output`/`wl_seat` are bound per-instance by
/// [`super::output::OutputState`]/[`super::seat::SeatState`] as the registry
/// advertises them, not here.
pub struct WaylandGlobals {
    pub compositor: wl_compositor::WlCompositor,
    pub shm: wl_shm::WlShm,
    pub layer_shell: ZwlrLayerShellV1,
    pub xdg_wm_base: XdgWmBase,
    /// `None` when the compositor doesn't advertise the protocol — cursor
    /// hints are then silently disabled rather than treated as fatal
    /// (spec §4.H).
    pub cursor_shape_manager: Option<WpCursorShapeManagerV1>,
}

impl WaylandGlobals {
    pub fn bind(globals: &GlobalList, qh: &QueueHandle<Renderer>) -> Result<Self, FatalEnvironmentError> {
        let compositor: wl_compositor::WlCompositor = globals
            .bind(qh, WL_COMPOSITOR_VERSION..=WL_COMPOSITOR_VERSION, ())
            .map_err(|_| FatalEnvironmentError::MissingGlobal("wl_compositor"))?;
        let shm: wl_shm::WlShm = globals
            .bind(qh, WL_SHM_VERSION..=WL_SHM_VERSION, ())
            .map_err(|_| FatalEnvironmentError::MissingGlobal("wl_shm"))?;
        let layer_shell: ZwlrLayerShellV1 = globals
            .bind(qh, ZWLR_LAYER_SHELL_VERSION..=ZWLR_LAYER_SHELL_VERSION, ())
            .map_err(|_| FatalEnvironmentError::MissingGlobal("zwlr_layer_shell_v1"))?;
        let xdg_wm_base: XdgWmBase = globals
            .bind(qh, XDG_WM_BASE_VERSION..=XDG_WM_BASE_VERSION, ())
            .map_err(|_| FatalEnvironmentError::MissingGlobal("xdg_wm_base"))?;
        let cursor_shape_manager = globals
            .bind(qh, WP_CURSOR_SHAPE_MANAGER_VERSION..=WP_CURSOR_SHAPE_MANAGER_VERSION, ())
            .ok();
        if cursor_shape_manager.is_none() {
            tracing::warn!("compositor does not advertise wp_cursor_shape_manager_v1; cursor hints disabled");
        }

        Ok(Self { compositor, shm, layer_shell, xdg_wm_base, cursor_shape_manager })
    }
}
