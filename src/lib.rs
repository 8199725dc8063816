//! `sbar`: a declarative, JSON-driven status-bar renderer for wlr-layer-shell
//! compositors (see spec §1). The controller speaks newline-delimited JSON
//! over stdin/stdout; this crate turns that into layer-shell bars and
//! xdg-shell popups, lays out and composites their block children into
//! shared-memory buffers, and reports back realised geometry and pointer
//! events.

pub mod block;
pub mod buffer;
pub mod color;
pub mod error;
pub mod geometry;
pub mod io_loop;
pub mod pixel;
pub mod providers;
pub mod reconciler;
pub mod renderer;
pub mod size_language;
pub mod state_report;
pub mod surface;
pub mod wayland;

pub use renderer::Renderer;
