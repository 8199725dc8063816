//! The `Renderer` aggregate (spec §9 "Global mutable state"): the single
//! struct the IO loop owns, replacing the original's file-scope `outputs`/
//! `seats`/`blocks_with_id`/`image_cache` arrays.

use serde_json::Value;
use smithay_client_toolkit::output::OutputState;
use smithay_client_toolkit::seat::SeatState;
use wayland_client::globals::registry_queue_init;
use wayland_client::protocol::{wl_buffer, wl_shm, wl_surface};
use wayland_client::{Connection, EventQueue, QueueHandle};

use crate::block::layout;
use crate::block::BlockCache;
use crate::buffer::ShmBuffer;
use crate::error::FatalEnvironmentError;
use crate::pixel::PixelBuffer;
use crate::providers::font::MonospaceStub;
use crate::providers::image::{DefaultImageProvider, ImageCache};
use crate::providers::{FontProvider, ImageProvider};
use crate::surface::{Bar, BarState, ParentRef, Popup, PopupState, SurfaceCommon};
use crate::wayland::{Output, Seat, WaylandGlobals};
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_surface_v1::ZwlrLayerSurfaceV1;

/// A popup's parent/a pointer's focus target are both addressed by the same
/// path shape; re-exported here since both the reconciler and the seat
/// dispatch code resolve against the live tree through `Renderer`.
pub type SurfaceRef = ParentRef;

pub struct Renderer {
    pub conn: Connection,
    pub qh: QueueHandle<Renderer>,
    pub globals: WaylandGlobals,
    pub output_state: OutputState,
    pub seat_state: SeatState,
    pub outputs: Vec<Output>,
    pub seats: Vec<Seat>,
    pub block_cache: BlockCache,
    pub image_cache: ImageCache,
    pub fonts: Box<dyn FontProvider>,
    pub image_provider: Box<dyn ImageProvider>,
    /// Echoed verbatim in every state report (spec §4.J).
    pub userdata: Value,
    /// Whether the controller has asked to receive state reports at all.
    pub state_events: bool,
    /// Set by any mutation that should produce a state report on the next
    /// IO loop iteration.
    pub state_dirty: bool,
    /// Set by a pointer event: forces a report even if nothing else changed
    /// (spec §5 "every pointer event produces exactly one report").
    pub force_report: bool,
}

/// Lets call sites reach `WaylandGlobals`' fields directly off `Renderer`
/// (`self.cursor_shape_manager`, `self.compositor`, ...) the way the rest of
/// this crate's Wayland glue already does.
impl std::ops::Deref for Renderer {
    type Target = WaylandGlobals;
    fn deref(&self) -> &WaylandGlobals {
        &self.globals
    }
}

impl Renderer {
    /// Connect to the Wayland display, bind the required globals, and run
    /// one roundtrip so `OutputState`/`SeatState` have their initial batch
    /// of outputs/seats before the IO loop starts (spec §4.H).
    pub fn connect() -> Result<(Self, EventQueue<Renderer>), FatalEnvironmentError> {
        let conn = Connection::connect_to_env()
            .map_err(|e| FatalEnvironmentError::ConnectFailed(e.to_string()))?;
        let (global_list, mut queue) = registry_queue_init::<Renderer>(&conn)
            .map_err(|e| FatalEnvironmentError::ConnectFailed(e.to_string()))?;
        let qh = queue.handle();

        let globals = WaylandGlobals::bind(&global_list, &qh)?;
        let output_state = OutputState::new(&global_list, &qh);
        let seat_state = SeatState::new(&global_list, &qh);

        let mut renderer = Renderer {
            conn,
            qh,
            globals,
            output_state,
            seat_state,
            outputs: Vec::new(),
            seats: Vec::new(),
            block_cache: BlockCache::new(),
            image_cache: ImageCache::new(),
            fonts: Box::new(MonospaceStub),
            image_provider: Box::new(DefaultImageProvider),
            userdata: Value::Null,
            state_events: false,
            state_dirty: true,
            force_report: false,
        };
        queue
            .roundtrip(&mut renderer)
            .map_err(|e| FatalEnvironmentError::ConnectFailed(e.to_string()))?;
        Ok((renderer, queue))
    }

    // ---- tree lookups (spec §9 "back references resolved on demand") ----

    pub fn output_index_by_name(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name.as_deref() == Some(name))
    }

    pub fn bar_mut(&mut self, output_name: &str, bar_index: usize) -> Option<&mut Bar> {
        let output = self.outputs.iter_mut().find(|o| o.name.as_deref() == Some(output_name))?;
        output.bars.get_mut(bar_index)?.as_mut()
    }

    pub fn output_dims(&self, output_name: &str) -> (i32, i32) {
        self.outputs
            .iter()
            .find(|o| o.name.as_deref() == Some(output_name))
            .map(|o| (o.width, o.height))
            .unwrap_or((0, 0))
    }

    pub fn popup_mut(&mut self, output_name: &str, bar_index: usize, path: &[usize]) -> Option<&mut Popup> {
        let bar = self.bar_mut(output_name, bar_index)?;
        popup_at_path_mut(&mut bar.common.popups, path)
    }

    /// Resolve a `wl_surface` to its place in the tree — used by pointer
    /// event handling to turn "which surface is under the cursor" into a
    /// `SurfaceRef` (spec §4.H, §9).
    pub fn find_surface_ref(&self, surface: &wl_surface::WlSurface) -> Option<SurfaceRef> {
        for output in &self.outputs {
            let output_name = output.name.clone()?;
            for (bar_index, bar_slot) in output.bars.iter().enumerate() {
                let Some(bar) = bar_slot else { continue };
                if &bar.common.wl_surface == surface {
                    return Some(ParentRef::Bar { output_name, bar_index });
                }
                let mut path = Vec::new();
                if find_popup_surface_path(&bar.common.popups, surface, &mut path) {
                    return Some(ParentRef::Popup { output_name, bar_index, popup_path: path });
                }
            }
        }
        None
    }

    pub fn find_bar_by_layer_surface_mut(&mut self, ls: &ZwlrLayerSurfaceV1) -> Option<&mut Bar> {
        self.outputs
            .iter_mut()
            .flat_map(|o| o.bars.iter_mut())
            .flatten()
            .find(|b| &b.layer_surface == ls)
    }

    pub fn find_popup_mut(&mut self, pred: impl Fn(&Popup) -> bool) -> Option<&mut Popup> {
        for output in &mut self.outputs {
            for bar_slot in &mut output.bars {
                let Some(bar) = bar_slot else { continue };
                if let Some(p) = find_popup_by_mut(&mut bar.common.popups, &pred) {
                    return Some(p);
                }
            }
        }
        None
    }

    pub fn find_common_by_buffer_mut(&mut self, buf: &wl_buffer::WlBuffer) -> Option<&mut SurfaceCommon> {
        for output in &mut self.outputs {
            for bar_slot in &mut output.bars {
                let Some(bar) = bar_slot else { continue };
                if bar.common.buffer.as_ref().map(|b| &b.wl_buffer) == Some(buf) {
                    return Some(&mut bar.common);
                }
                if let Some(c) = find_common_in_popups(&mut bar.common.popups, buf) {
                    return Some(c);
                }
            }
        }
        None
    }

    // ---- paint driving ----

    /// Run a bar's pending render/commit cycle, if any (spec §4.F). Called
    /// after a `configure` ack, after the reconciler changes the bar, and
    /// after a deferred repaint becomes possible again on buffer release.
    pub fn advance_bar(&mut self, output_name: &str, bar_index: usize) {
        let (output_width, output_height) = self.output_dims(output_name);
        let shm = self.globals.shm.clone();
        let qh = self.qh.clone();
        let Some(bar) = self.bar_mut(output_name, bar_index) else { return };
        if bar.state == BarState::WantConfigure || bar.state == BarState::Closing {
            return;
        }
        if !bar.needs_commit_cycle() {
            return;
        }
        if bar.wants_render {
            match paint_surface_common(&mut bar.common, &shm, &qh, output_width, output_height) {
                Ok(true) => bar.state = BarState::Idle,
                Ok(false) => bar.state = BarState::Painting,
                Err(e) => tracing::error!(error = %e, bar = bar_index, "bar paint failed"),
            }
        } else if bar.wants_commit {
            bar.common.wl_surface.commit();
            bar.state = BarState::Idle;
        }
        bar.clear_pending();
    }

    pub fn advance_popup(&mut self, output_name: &str, bar_index: usize, path: &[usize]) {
        let (output_width, output_height) = self.output_dims(output_name);
        let shm = self.globals.shm.clone();
        let qh = self.qh.clone();
        let Some(popup) = self.popup_mut(output_name, bar_index, path) else { return };
        if matches!(popup.state, PopupState::WantConfigure | PopupState::Closing | PopupState::RepositionPending) {
            return;
        }
        if !popup.needs_commit_cycle() {
            return;
        }
        if popup.wants_render {
            match paint_surface_common(&mut popup.common, &shm, &qh, output_width, output_height) {
                Ok(true) => popup.state = PopupState::Idle,
                Ok(false) => popup.state = PopupState::Painting,
                Err(e) => tracing::error!(error = %e, "popup paint failed"),
            }
        } else if popup.wants_commit {
            popup.common.wl_surface.commit();
            popup.state = PopupState::Idle;
        }
        popup.clear_pending();
    }
}

fn popup_at_path_mut<'a>(popups: &'a mut [Option<Popup>], path: &[usize]) -> Option<&'a mut Popup> {
    let (&first, rest) = path.split_first()?;
    let popup = popups.get_mut(first)?.as_mut()?;
    if rest.is_empty() {
        Some(popup)
    } else {
        popup_at_path_mut(&mut popup.common.popups, rest)
    }
}

fn find_popup_surface_path(popups: &[Option<Popup>], surface: &wl_surface::WlSurface, path: &mut Vec<usize>) -> bool {
    for (i, slot) in popups.iter().enumerate() {
        let Some(p) = slot else { continue };
        path.push(i);
        if &p.common.wl_surface == surface {
            return true;
        }
        if find_popup_surface_path(&p.common.popups, surface, path) {
            return true;
        }
        path.pop();
    }
    false
}

fn find_popup_by_mut<'a>(popups: &'a mut [Option<Popup>], pred: &impl Fn(&Popup) -> bool) -> Option<&'a mut Popup> {
    if let Some(pos) = popups.iter().position(|slot| slot.as_ref().map(|p| pred(p)).unwrap_or(false)) {
        return popups[pos].as_mut();
    }
    for slot in popups.iter_mut() {
        let Some(p) = slot else { continue };
        if let Some(found) = find_popup_by_mut(&mut p.common.popups, pred) {
            return Some(found);
        }
    }
    None
}

fn find_common_in_popups<'a>(popups: &'a mut [Option<Popup>], buf: &wl_buffer::WlBuffer) -> Option<&'a mut SurfaceCommon> {
    if let Some(pos) = popups
        .iter()
        .position(|slot| slot.as_ref().map(|p| p.common.buffer.as_ref().map(|b| &b.wl_buffer) == Some(buf)).unwrap_or(false))
    {
        return popups[pos].as_mut().map(|p| &mut p.common);
    }
    for slot in popups.iter_mut() {
        let Some(p) = slot else { continue };
        if let Some(found) = find_common_in_popups(&mut p.common.popups, buf) {
            return Some(found);
        }
    }
    None
}

/// Render a surface's current block list into its buffer and commit it, or
/// defer if the buffer is still busy (spec §4.B, §8 invariant 2, scenario
/// S4). `output_width`/`output_height` ground `output*` size-language
/// references; they are the bar's own output's dimensions, or (for a
/// popup) the dimensions of the output its ancestor bar lives on.
pub fn paint_surface_common(
    common: &mut SurfaceCommon,
    shm: &wl_shm::WlShm,
    qh: &QueueHandle<Renderer>,
    output_width: i32,
    output_height: i32,
) -> Result<bool, FatalEnvironmentError> {
    let boxes = layout::layout_surface(
        &common.blocks,
        common.vertical,
        common.width,
        common.height,
        output_width,
        output_height,
    );
    common.block_boxes = boxes.clone();

    let needs_new_buffer = match &common.buffer {
        Some(b) => !b.matches(common.width, common.height),
        None => true,
    };
    if needs_new_buffer {
        common.buffer = Some(ShmBuffer::new(shm, qh, common.width, common.height)?);
    }
    let buffer = common.buffer.as_mut().expect("just allocated above");
    if buffer.busy {
        common.dirty = true;
        return Ok(false);
    }

    let mut pixels = PixelBuffer::new(common.width, common.height);
    for (handle, bbox) in common.blocks.iter().zip(&boxes) {
        crate::block::render::render_block(&mut pixels, &handle.borrow(), bbox);
    }
    buffer.write(&pixels);
    common.wl_surface.attach(Some(&buffer.wl_buffer), 0, 0);
    common.wl_surface.damage_buffer(0, 0, common.width, common.height);
    common.wl_surface.commit();
    buffer.busy = true;
    common.dirty = false;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    // `Popup`/`SurfaceCommon` need a live `wl_surface` to construct, so tree
    // lookups against a populated tree are covered by the reconciler's
    // integration tests, which already set up a test connection. This only
    // checks the empty-tree base cases.

    #[test]
    fn popup_at_path_mut_rejects_out_of_range_and_empty_path() {
        let mut popups: Vec<Option<Popup>> = Vec::new();
        assert!(popup_at_path_mut(&mut popups, &[0]).is_none());
        assert!(popup_at_path_mut(&mut popups, &[]).is_none());
    }
}
