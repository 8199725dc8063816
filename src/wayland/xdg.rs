//! Manual `Dispatch` impls for every protocol object this crate creates
//! directly rather than through a smithay-client-toolkit delegate (spec
//! §4.H). `wl_output`/`wl_seat`/`wl_pointer` are handled by
//! `delegate_output!`/`delegate_seat!`/`delegate_pointer!` in
//! `output.rs`/`seat.rs`; everything else routes through here.

use wayland_client::globals::GlobalListContents;
use wayland_client::protocol::{wl_buffer, wl_compositor, wl_region, wl_registry, wl_shm, wl_shm_pool, wl_surface};
use wayland_client::{Connection, Dispatch, QueueHandle};
use wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_device_v1::WpCursorShapeDeviceV1;
use wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_manager_v1::WpCursorShapeManagerV1;
use wayland_protocols::xdg::shell::client::xdg_popup::{self, XdgPopup};
use wayland_protocols::xdg::shell::client::xdg_positioner::XdgPositioner;
use wayland_protocols::xdg::shell::client::xdg_surface::{self, XdgSurface};
use wayland_protocols::xdg::shell::client::xdg_wm_base::{self, XdgWmBase};
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::ZwlrLayerShellV1;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_surface_v1::{self, ZwlrLayerSurfaceV1};

use crate::error::CompositorProtocolError;
use crate::renderer::Renderer;
use crate::surface::{BarState, PopupState};

// `registry_queue_init` dispatches bind-time events through this rather
// than the convenience path `OutputState`/`SeatState` use for their own
// globals.
impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &wl_registry::WlRegistry,
        _event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_compositor::WlCompositor, ()> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &wl_compositor::WlCompositor,
        _event: wl_compositor::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_surface::WlSurface, ()> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &wl_surface::WlSurface,
        _event: wl_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        // `enter`/`leave`/`preferred_buffer_scale` don't affect layout here:
        // a surface's effective scale comes from its owning output (spec §3).
    }
}

impl Dispatch<wl_region::WlRegion, ()> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &wl_region::WlRegion,
        _event: wl_region::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_shm::WlShm, ()> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &wl_shm::WlShm,
        _event: wl_shm::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, ()> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &wl_shm_pool::WlShmPool,
        _event: wl_shm_pool::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_buffer::WlBuffer, ()> for Renderer {
    /// The only busy/idle transition in the crate (spec §4.B, §8 invariant
    /// 2, scenario S4): a pending repaint deferred while this buffer was
    /// busy now gets its chance.
    fn event(
        state: &mut Self,
        proxy: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            let shm = state.globals.shm.clone();
            if let Some(common) = state.find_common_by_buffer_mut(proxy) {
                if let Some(buf) = common.buffer.as_mut() {
                    buf.busy = false;
                }
                if common.dirty {
                    let (w, h) = (common.width, common.height);
                    if let Err(e) = crate::renderer::paint_surface_common(common, &shm, qh, w, h) {
                        tracing::error!(error = %e, "deferred repaint on buffer release failed");
                    }
                }
            }
        }
    }
}

impl Dispatch<XdgWmBase, ()> for Renderer {
    fn event(
        _state: &mut Self,
        proxy: &XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            proxy.pong(serial);
        }
    }
}

impl Dispatch<ZwlrLayerShellV1, ()> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &ZwlrLayerShellV1,
        _event: wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_shell_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, ()> for Renderer {
    fn event(
        state: &mut Self,
        proxy: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure { serial, width, height } => {
                proxy.ack_configure(serial);
                let Some(bar) = state.find_bar_by_layer_surface_mut(proxy) else { return };
                if width > 0 && height > 0 {
                    bar.common.width = width as i32;
                    bar.common.height = height as i32;
                }
                bar.pending_serial = Some(serial);
                bar.state = BarState::Sized;
                bar.request_render();
                let output_name = bar.output_name.clone();
                let bar_index = find_bar_index(state, &output_name, proxy);
                if let Some(bar_index) = bar_index {
                    state.advance_bar(&output_name, bar_index);
                }
                state.state_dirty = true;
            }
            zwlr_layer_surface_v1::Event::Closed => {
                if let Some(bar) = state.find_bar_by_layer_surface_mut(proxy) {
                    bar.state = BarState::Closing;
                    tracing::debug!(error = %CompositorProtocolError::LayerSurfaceClosed, "layer surface closed by compositor");
                }
                destroy_bar_by_layer_surface(state, proxy);
                state.state_dirty = true;
            }
            _ => {}
        }
    }
}

fn find_bar_index(state: &Renderer, output_name: &str, ls: &ZwlrLayerSurfaceV1) -> Option<usize> {
    let output = state.outputs.iter().find(|o| o.name.as_deref() == Some(output_name))?;
    output.bars.iter().position(|b| b.as_ref().map(|b| &b.layer_surface) == Some(ls))
}

fn destroy_bar_by_layer_surface(state: &mut Renderer, ls: &ZwlrLayerSurfaceV1) {
    for output in &mut state.outputs {
        if let Some(slot) = output.bars.iter_mut().find(|b| b.as_ref().map(|b| &b.layer_surface) == Some(ls)) {
            *slot = None;
        }
    }
}

impl Dispatch<XdgSurface, ()> for Renderer {
    /// Only popups use `xdg_surface` directly in this crate (bars use
    /// `zwlr_layer_surface_v1`'s own configure); this ack-commits whatever
    /// geometry the preceding `xdg_popup.configure` stored (spec §4.F).
    fn event(
        state: &mut Self,
        proxy: &XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            proxy.ack_configure(serial);
            if let Some(popup) = state.find_popup_mut(|p| &p.xdg_surface == proxy) {
                popup.pending_serial = Some(serial);
                if popup.state != PopupState::Closing {
                    popup.state = PopupState::Sized;
                    popup.request_render();
                }
            }
            if let Some((output_name, bar_index, path)) = locate_popup_path(state, |p| &p.xdg_surface == proxy) {
                state.advance_popup(&output_name, bar_index, &path);
            }
            state.state_dirty = true;
        }
    }
}

impl Dispatch<XdgPopup, ()> for Renderer {
    fn event(
        state: &mut Self,
        proxy: &XdgPopup,
        event: xdg_popup::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_popup::Event::Configure { x: _, y: _, width, height } => {
                if let Some(popup) = state.find_popup_mut(|p| &p.xdg_popup == proxy) {
                    if width > 0 && height > 0 {
                        popup.common.width = width;
                        popup.common.height = height;
                    }
                }
            }
            xdg_popup::Event::PopupDone => {
                if let Some(popup) = state.find_popup_mut(|p| &p.xdg_popup == proxy) {
                    popup.state = PopupState::Closing;
                    tracing::debug!(error = %CompositorProtocolError::PopupDismissed, "popup dismissed by compositor");
                }
                destroy_popup_by_xdg_popup(state, proxy);
                state.state_dirty = true;
            }
            xdg_popup::Event::Repositioned { .. } => {
                if let Some(popup) = state.find_popup_mut(|p| &p.xdg_popup == proxy) {
                    popup.state = PopupState::Sized;
                    popup.request_render();
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<XdgPositioner, ()> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &XdgPositioner,
        _event: wayland_protocols::xdg::shell::client::xdg_positioner::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WpCursorShapeManagerV1, ()> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &WpCursorShapeManagerV1,
        _event: wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_manager_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WpCursorShapeDeviceV1, ()> for Renderer {
    fn event(
        _state: &mut Self,
        _proxy: &WpCursorShapeDeviceV1,
        _event: wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_device_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

/// Finds the `(output_name, bar_index, popup_path)` addressing a popup
/// matching `pred`, for handlers that need to call back into
/// `Renderer::advance_popup` after mutating it through `find_popup_mut`.
fn locate_popup_path(
    state: &Renderer,
    pred: impl Fn(&crate::surface::Popup) -> bool,
) -> Option<(String, usize, Vec<usize>)> {
    for output in &state.outputs {
        let output_name = output.name.clone()?;
        for (bar_index, bar_slot) in output.bars.iter().enumerate() {
            let Some(bar) = bar_slot else { continue };
            let mut path = Vec::new();
            if search_popups(&bar.common.popups, &pred, &mut path) {
                return Some((output_name, bar_index, path));
            }
        }
    }
    None
}

fn search_popups(
    popups: &[Option<crate::surface::Popup>],
    pred: &impl Fn(&crate::surface::Popup) -> bool,
    path: &mut Vec<usize>,
) -> bool {
    for (i, slot) in popups.iter().enumerate() {
        let Some(p) = slot else { continue };
        path.push(i);
        if pred(p) {
            return true;
        }
        if search_popups(&p.common.popups, pred, path) {
            return true;
        }
        path.pop();
    }
    false
}

fn destroy_popup_by_xdg_popup(state: &mut Renderer, xp: &XdgPopup) {
    for output in &mut state.outputs {
        for bar_slot in &mut output.bars {
            let Some(bar) = bar_slot else { continue };
            remove_popup_recursive(&mut bar.common.popups, xp);
        }
    }
}

/// Nulls the matching slot (and recurses into every remaining slot's
/// children) instead of `retain`ing, so a popup dismissed by the compositor
/// leaves its siblings' indices untouched (spec §4.J, scenario S3) — and
/// explicitly destroys its protocol objects rather than relying on drop.
fn remove_popup_recursive(popups: &mut [Option<crate::surface::Popup>], xp: &XdgPopup) {
    for slot in popups.iter_mut() {
        if slot.as_ref().map(|p| &p.xdg_popup) == Some(xp) {
            if let Some(popup) = slot.take() {
                popup.xdg_popup.destroy();
                popup.xdg_surface.destroy();
                popup.common.wl_surface.destroy();
            }
        }
    }
    for slot in popups.iter_mut() {
        let Some(p) = slot else { continue };
        remove_popup_recursive(&mut p.common.popups, xp);
    }
}
