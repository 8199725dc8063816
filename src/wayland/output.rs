//! Output tracking (spec §3 "Output"): geometry/mode/scale/name plus the
//! bar array the reconciler maintains per output.

use smithay_client_toolkit::output::{OutputHandler, OutputState};
use smithay_client_toolkit::{delegate_output, reexports::client::protocol::wl_output};
use wayland_client::Connection;

use crate::renderer::Renderer;
use crate::surface::{Bar, BarState};

/// One compositor output and the bars the reconciler has placed on it
/// (spec §3). `bars[i]` is `None` for a "failed" slot so positional
/// meaning (array index) is preserved across reconciliation passes.
pub struct Output {
    pub wl_output: wl_output::WlOutput,
    pub name: Option<String>,
    pub scale: i32,
    pub width: i32,
    pub height: i32,
    pub transform: wl_output::Transform,
    pub bars: Vec<Option<Bar>>,
}

impl Output {
    pub fn new(wl_output: wl_output::WlOutput) -> Self {
        Self {
            wl_output,
            name: None,
            scale: 1,
            width: 0,
            height: 0,
            transform: wl_output::Transform::Normal,
            bars: Vec::new(),
        }
    }
}

impl OutputHandler for Renderer {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(&mut self, _conn: &Connection, _qh: &wayland_client::QueueHandle<Self>, output: wl_output::WlOutput) {
        self.outputs.push(Output::new(output));
        self.sync_output_info();
    }

    fn update_output(&mut self, _conn: &Connection, _qh: &wayland_client::QueueHandle<Self>, _output: wl_output::WlOutput) {
        self.sync_output_info();
    }

    /// An output disappearing tears down every bar (and any focused-pointer
    /// reference) rooted in it (spec §3 Lifecycle, scenario S6).
    fn output_destroyed(&mut self, _conn: &Connection, _qh: &wayland_client::QueueHandle<Self>, output: wl_output::WlOutput) {
        if let Some(pos) = self.outputs.iter().position(|o| o.wl_output == output) {
            let removed = self.outputs.remove(pos);
            if let Some(name) = removed.name.as_deref() {
                for seat in &mut self.seats {
                    if let Some(pointer) = &mut seat.pointer {
                        pointer.clear_focus_if_output(name);
                    }
                }
            }
            self.state_dirty = true;
        }
    }
}

impl Renderer {
    /// Re-read name/scale/geometry from smithay-client-toolkit's own
    /// `OutputInfo` cache into our parallel `Output` entries. A scale
    /// change triggers a relayout of every bar on that output (spec §8
    /// "output scale change triggers relayout and re-send of layer-surface
    /// size/exclusive/margins scaled by the new factor").
    pub fn sync_output_info(&mut self) {
        for output in &mut self.outputs {
            if let Some(info) = self.output_state.info(&output.wl_output) {
                let old_scale = output.scale;
                output.name = info.name;
                output.scale = info.scale_factor;
                if let Some(mode) = info.modes.iter().find(|m| m.current) {
                    output.width = mode.dimensions.0;
                    output.height = mode.dimensions.1;
                }
                output.transform = info.transform;

                if old_scale > 0 && output.scale != old_scale {
                    rescale_bars_for_output(output, old_scale, output.scale);
                }
            }
        }
    }
}

/// Re-sends each bar's `set_size`/`set_exclusive_zone`/`set_margin` scaled
/// by `new_scale/old_scale` and forces the bar back through a fresh
/// configure before it paints again, rather than attaching a buffer sized
/// for the old scale.
fn rescale_bars_for_output(output: &mut Output, old_scale: i32, new_scale: i32) {
    let rescale = |v: i32| ((v as i64 * new_scale as i64) / old_scale as i64) as i32;
    for slot in output.bars.iter_mut() {
        let Some(bar) = slot else { continue };
        bar.common.width = rescale(bar.common.width);
        bar.common.height = rescale(bar.common.height);
        bar.exclusive_zone = rescale(bar.exclusive_zone);
        bar.margin = bar.margin.map(rescale);

        bar.layer_surface.set_size(bar.common.width.max(0) as u32, bar.common.height.max(0) as u32);
        bar.layer_surface.set_exclusive_zone(bar.exclusive_zone);
        bar.layer_surface.set_margin(bar.margin[3], bar.margin[1], bar.margin[2], bar.margin[0]);
        bar.common.wl_surface.commit();

        bar.state = BarState::WantConfigure;
        bar.request_render();
    }
}

delegate_output!(Renderer);
