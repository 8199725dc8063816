//! Registry binding, output/seat tracking, and the configure/ack/commit
//! plumbing shared by bars and popups (spec §4.H).
//!
//! Bind versions (spec §4.H, `wl_registry_global` in `original_source/sbar.c`):
//! `wl_output` v4, `wl_seat` v2, `wl_compositor` v6, `wl_shm` v1,
//! `zwlr_layer_shell_v1` v2, `xdg_wm_base` v3, `wp_cursor_shape_manager_v1`
//! v1 (optional — its absence only disables cursor hints, spec §4.H).

pub mod globals;
pub mod output;
pub mod seat;
pub mod xdg;

pub use globals::WaylandGlobals;
pub use output::Output;
pub use seat::{GrabRing, PointerState, Seat};

pub const WL_OUTPUT_VERSION: u32 = 4;
pub const WL_SEAT_VERSION: u32 = 2;
pub const WL_COMPOSITOR_VERSION: u32 = 6;
pub const WL_SHM_VERSION: u32 = 1;
pub const ZWLR_LAYER_SHELL_VERSION: u32 = 2;
pub const XDG_WM_BASE_VERSION: u32 = 3;
pub const WP_CURSOR_SHAPE_MANAGER_VERSION: u32 = 1;
