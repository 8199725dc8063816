//! Diffing one incoming JSON state document against the live surface tree
//! (spec §4.G). Bars are addressed by output name + array index; popups by
//! index within their parent's `popups` array.

use serde_json::Value;
use wayland_protocols::xdg::shell::client::xdg_popup::XdgPopup;
use wayland_protocols::xdg::shell::client::xdg_positioner::ConstraintAdjustment;
use wayland_protocols::xdg::shell::client::xdg_surface::XdgSurface;
use wayland_protocols_wlr::layer_shell::v1::client::zwlr_layer_surface_v1::KeyboardInteractivity;

use crate::block::parse::{parse_blocks, ParseEnv};
use crate::block::BlockHandle;
use crate::error::SurfaceBuildError;
use crate::geometry::{Anchor, Rect};
use crate::surface::{edge_is_vertical, edge_to_zwlr_anchor, Bar, BarState, CursorShape, Grab, Gravity, ParentRef, Popup, PopupState, SurfaceCommon};
use crate::renderer::Renderer;

/// Parsed form of one bar/popup description's common fields (spec §6).
/// Bars and popups share every field except geometry input (edge anchor vs
/// wanted x/y/width/height) and a handful of popup-only positioner inputs.
struct CommonDesc<'a> {
    width: i32,
    height: i32,
    scale: i32,
    cursor_shape: CursorShape,
    render: bool,
    input_regions: Vec<Rect>,
    userdata: Value,
    blocks_json: &'a [Value],
    popups_json: &'a [Value],
}

fn parse_input_regions(json: &Value) -> Vec<Rect> {
    json.get("input_regions")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|r| Rect {
                    x: r.get("x").and_then(Value::as_i64).unwrap_or(0) as i32,
                    y: r.get("y").and_then(Value::as_i64).unwrap_or(0) as i32,
                    width: r.get("width").and_then(Value::as_i64).unwrap_or(0) as i32,
                    height: r.get("height").and_then(Value::as_i64).unwrap_or(0) as i32,
                })
                .collect()
        })
        .unwrap_or_default()
}

static EMPTY: Vec<Value> = Vec::new();

fn parse_common<'a>(json: &'a Value) -> CommonDesc<'a> {
    CommonDesc {
        width: json.get("width").and_then(Value::as_i64).unwrap_or(0) as i32,
        height: json.get("height").and_then(Value::as_i64).unwrap_or(0) as i32,
        scale: json.get("scale").and_then(Value::as_i64).unwrap_or(1) as i32,
        cursor_shape: json
            .get("cursor_shape")
            .and_then(Value::as_str)
            .map(CursorShape::from_wire)
            .unwrap_or_default(),
        render: json.get("render").and_then(Value::as_bool).unwrap_or(true),
        input_regions: parse_input_regions(json),
        userdata: json.get("userdata").cloned().unwrap_or(Value::Null),
        blocks_json: json.get("blocks").and_then(Value::as_array).unwrap_or(&EMPTY),
        popups_json: json.get("popups").and_then(Value::as_array).unwrap_or(&EMPTY),
    }
}

impl Renderer {
    /// Entry point: apply one parsed JSON document (spec §4.G steps 1-6).
    pub fn reconcile(&mut self, json: &Value) {
        if let Some(events) = json.get("state_events").and_then(Value::as_bool) {
            self.state_events = events;
        }
        self.userdata = json.get("userdata").cloned().unwrap_or(Value::Null);

        let output_names: Vec<String> = self.outputs.iter().filter_map(|o| o.name.clone()).collect();
        for output_name in output_names {
            let Some(bars_json) = json.get(&output_name).and_then(Value::as_array) else { continue };
            self.reconcile_output_bars(&output_name, bars_json.clone());
        }

        self.state_dirty = true;
    }

    fn reconcile_output_bars(&mut self, output_name: &str, bars_json: Vec<Value>) {
        let Some(output_idx) = self.output_index_by_name(output_name) else { return };

        for (i, bar_json) in bars_json.iter().enumerate() {
            if bar_json.is_null() {
                self.destroy_bar_at(output_idx, i);
                continue;
            }
            self.configure_bar(output_idx, i, bar_json);
        }

        let current_len = self.outputs[output_idx].bars.len();
        if current_len > bars_json.len() {
            for i in bars_json.len()..current_len {
                self.destroy_bar_at(output_idx, i);
            }
            self.outputs[output_idx].bars.truncate(bars_json.len());
        }
    }

    fn destroy_bar_at(&mut self, output_idx: usize, bar_index: usize) {
        if let Some(slot) = self.outputs[output_idx].bars.get_mut(bar_index) {
            if let Some(bar) = slot.take() {
                bar.layer_surface.destroy();
                bar.common.wl_surface.destroy();
            }
        }
    }

    /// Create-or-update the bar at `(output_idx, bar_index)` (spec §4.G
    /// step 2/3). Rejects (destroys) it if its derived size is zero in both
    /// dimensions (spec §4.E "wanted size deduction").
    fn configure_bar(&mut self, output_idx: usize, bar_index: usize, json: &Value) {
        let common = parse_common(json);
        let anchor_edge = json.get("anchor").and_then(Value::as_i64).map(Anchor::from_wire).unwrap_or_default();
        let layer = json.get("layer").and_then(Value::as_i64).map(crate::surface::Layer::from_wire).unwrap_or_default();
        let exclusive_zone = json.get("exclusive_zone").and_then(Value::as_i64).unwrap_or(0) as i32;
        // `margin[BorderSide::Left/Right/Bottom/Top as usize]` (bar.rs).
        let margin: [i32; 4] = [
            json.get("margin_left").and_then(Value::as_i64).unwrap_or(0) as i32,
            json.get("margin_right").and_then(Value::as_i64).unwrap_or(0) as i32,
            json.get("margin_bottom").and_then(Value::as_i64).unwrap_or(0) as i32,
            json.get("margin_top").and_then(Value::as_i64).unwrap_or(0) as i32,
        ];
        let vertical = edge_is_vertical(anchor_edge);

        let (output_width, output_height) = {
            let o = &self.outputs[output_idx];
            (o.width, o.height)
        };

        let mut env = ParseEnv {
            cache: &mut self.block_cache,
            fonts: self.fonts.as_ref(),
            images: &mut self.image_cache,
            image_provider: self.image_provider.as_ref(),
        };
        let blocks = parse_blocks(common.blocks_json, &mut env);

        let (width, height) = resolve_wanted_size(common.width, common.height, &blocks, vertical, output_width, output_height);
        if width == 0 && height == 0 {
            tracing::debug!(error = %SurfaceBuildError::ZeroDerivedSize, output_idx, bar_index, "bar rejected");
            self.destroy_bar_at(output_idx, bar_index);
            return;
        }

        let exists = self.outputs[output_idx].bars.get(bar_index).map(|b| b.is_some()).unwrap_or(false);
        if !exists {
            self.create_bar(output_idx, bar_index, layer, anchor_edge);
        }

        let qh = self.qh.clone();
        let Some(bar) = self.outputs[output_idx].bars.get_mut(bar_index).and_then(|b| b.as_mut()) else { return };

        let geometry_changed = bar.anchor_edge != anchor_edge
            || bar.common.width != width
            || bar.common.height != height
            || bar.exclusive_zone != exclusive_zone
            || bar.margin != margin;
        let layer_changed = bar.layer != layer;

        bar.common.blocks = blocks;
        bar.common.vertical = vertical;
        bar.common.render = common.render;
        bar.common.cursor_shape = common.cursor_shape;
        bar.common.input_regions = common.input_regions;
        bar.common.userdata = common.userdata;
        bar.common.scale = common.scale;
        bar.anchor_edge = anchor_edge;
        bar.exclusive_zone = exclusive_zone;
        bar.margin = margin;
        bar.layer = layer;

        if geometry_changed {
            bar.common.width = width;
            bar.common.height = height;
            bar.layer_surface.set_anchor(edge_to_zwlr_anchor(anchor_edge));
            bar.layer_surface.set_size(width.max(0) as u32, height.max(0) as u32);
            bar.layer_surface.set_exclusive_zone(exclusive_zone);
            bar.layer_surface.set_margin(margin[3], margin[1], margin[2], margin[0]);
            bar.request_render();
        } else {
            bar.common.dirty = true;
            bar.request_render();
        }
        if layer_changed {
            bar.layer_surface.set_layer(layer.to_zwlr());
            bar.request_commit();
        }

        if bar.state != BarState::WantConfigure {
            let output_name = bar.output_name.clone();
            self.advance_bar(&output_name, bar_index);
        }
        let _ = qh;

        self.reconcile_popups(ParentRef::Bar { output_name: self.outputs[output_idx].name.clone().unwrap_or_default(), bar_index }, common.popups_json);
    }

    fn create_bar(&mut self, output_idx: usize, bar_index: usize, layer: crate::surface::Layer, anchor_edge: Anchor) {
        let output = &self.outputs[output_idx];
        let output_name = output.name.clone().unwrap_or_default();
        let wl_output = output.wl_output.clone();

        let wl_surface = self.globals.compositor.create_surface(&self.qh, ());
        let layer_surface = self.globals.layer_shell.get_layer_surface(
            &wl_surface,
            Some(&wl_output),
            layer.to_zwlr(),
            format!("sbar-{output_name}"),
            &self.qh,
            (),
        );
        layer_surface.set_anchor(edge_to_zwlr_anchor(anchor_edge));
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);
        wl_surface.commit();

        let common = SurfaceCommon::new(wl_surface);
        let bar = Bar::new(common, output_name, layer_surface);

        let slot = &mut self.outputs[output_idx].bars;
        if slot.len() <= bar_index {
            slot.resize_with(bar_index + 1, || None);
        }
        slot[bar_index] = Some(bar);
    }

    /// Recursively reconcile a `popups` array under `parent` (spec §4.G).
    fn reconcile_popups(&mut self, parent: ParentRef, popups_json: &[Value]) {
        let existing_len = self.popups_len(&parent);

        for (i, popup_json) in popups_json.iter().enumerate() {
            if popup_json.is_null() {
                self.destroy_popup_at(&parent, i);
                continue;
            }
            self.configure_popup(&parent, i, popup_json);
        }
        if existing_len > popups_json.len() {
            for i in popups_json.len()..existing_len {
                self.destroy_popup_at(&parent, i);
            }
            self.popups_mut(&parent).map(|v| v.truncate(popups_json.len()));
        }
    }

    fn popups_mut(&mut self, parent: &ParentRef) -> Option<&mut Vec<Option<Popup>>> {
        match parent {
            ParentRef::Bar { output_name, bar_index } => {
                self.bar_mut(output_name, *bar_index).map(|b| &mut b.common.popups)
            }
            ParentRef::Popup { output_name, bar_index, popup_path } => {
                self.popup_mut(output_name, *bar_index, popup_path).map(|p| &mut p.common.popups)
            }
        }
    }

    fn popups_len(&mut self, parent: &ParentRef) -> usize {
        self.popups_mut(parent).map(|v| v.len()).unwrap_or(0)
    }

    /// Nulls the slot rather than removing it, so sibling indices keep their
    /// positional meaning in the next state report (spec §4.J, scenario S3).
    fn destroy_popup_at(&mut self, parent: &ParentRef, index: usize) {
        if let Some(popups) = self.popups_mut(parent) {
            if let Some(slot) = popups.get_mut(index) {
                if let Some(popup) = slot.take() {
                    popup.xdg_popup.destroy();
                    popup.xdg_surface.destroy();
                    popup.common.wl_surface.destroy();
                }
            }
        }
    }

    fn configure_popup(&mut self, parent: &ParentRef, index: usize, json: &Value) {
        let common = parse_common(json);
        let wanted_x = json.get("x").and_then(Value::as_i64).unwrap_or(0) as i32;
        let wanted_y = json.get("y").and_then(Value::as_i64).unwrap_or(0) as i32;
        let vertical = json.get("vertical").and_then(Value::as_bool).unwrap_or(true);
        let gravity = json.get("gravity").and_then(Value::as_i64).map(Gravity::from_wire).unwrap_or_default();
        let constraint_adjustment = json.get("constraint_adjustment").and_then(Value::as_u64).unwrap_or(0) as u32;
        let grab_serial = json.get("grab").and_then(Value::as_u64).map(|v| v as u32);

        let (output_name, output_width, output_height) = match parent {
            ParentRef::Bar { output_name, .. } => (output_name.clone(), self.output_dims(output_name).0, self.output_dims(output_name).1),
            ParentRef::Popup { output_name, .. } => (output_name.clone(), self.output_dims(output_name).0, self.output_dims(output_name).1),
        };

        let mut env = ParseEnv {
            cache: &mut self.block_cache,
            fonts: self.fonts.as_ref(),
            images: &mut self.image_cache,
            image_provider: self.image_provider.as_ref(),
        };
        let blocks = parse_blocks(common.blocks_json, &mut env);

        let (width, height) = resolve_wanted_size(common.width, common.height, &blocks, vertical, output_width, output_height);
        if width == 0 && height == 0 {
            tracing::debug!(error = %SurfaceBuildError::ZeroDerivedSize, index, "popup rejected");
            self.destroy_popup_at(parent, index);
            return;
        }

        let grab = match grab_serial {
            Some(serial) => match self.resolve_grab_seat(serial) {
                Some(seat_name) => Some(Grab { seat_name, serial }),
                None => {
                    tracing::debug!(
                        error = %SurfaceBuildError::UnresolvableGrabSerial(serial),
                        "popup rejected"
                    );
                    self.destroy_popup_at(parent, index);
                    return;
                }
            },
            None => None,
        };

        let exists = self
            .popups_mut(parent)
            .map(|v| v.get(index).map(|slot| slot.is_some()).unwrap_or(false))
            .unwrap_or(false);
        if !exists {
            if self.create_popup(parent, index, wanted_x, wanted_y, width, height, gravity, constraint_adjustment, grab).is_none() {
                return;
            }
        }

        let Some(popups) = self.popups_mut(parent) else { return };
        let Some(popup) = popups.get_mut(index).and_then(|slot| slot.as_mut()) else { return };

        let positioner_changed = popup.wanted_x != wanted_x
            || popup.wanted_y != wanted_y
            || popup.wanted_width != width
            || popup.wanted_height != height
            || popup.gravity != gravity
            || popup.constraint_adjustment != constraint_adjustment;

        popup.common.blocks = blocks;
        popup.common.vertical = vertical;
        popup.common.render = common.render;
        popup.common.cursor_shape = common.cursor_shape;
        popup.common.input_regions = common.input_regions;
        popup.common.userdata = common.userdata;
        popup.common.scale = common.scale;
        popup.wanted_x = wanted_x;
        popup.wanted_y = wanted_y;
        popup.wanted_width = width;
        popup.wanted_height = height;
        popup.gravity = gravity;
        popup.constraint_adjustment = constraint_adjustment;

        let want_reposition = positioner_changed && popup.state != PopupState::WantConfigure;
        if want_reposition {
            popup.request_reposition();
        } else {
            popup.common.dirty = true;
            popup.request_render();
        }

        if want_reposition {
            self.issue_reposition(parent, index, wanted_x, wanted_y, width, height, gravity, constraint_adjustment);
        } else if let Some(popups) = self.popups_mut(parent) {
            let advance = popups
                .get(index)
                .and_then(|slot| slot.as_ref())
                .map(|p| p.state != PopupState::WantConfigure)
                .unwrap_or(false);
            if advance {
                let path = popup_path_for(parent, index);
                self.advance_popup(&output_name, bar_index_of(parent), &path);
            }
        }

        self.reconcile_popups(
            ParentRef::Popup { output_name, bar_index: bar_index_of(parent), popup_path: popup_path_for(parent, index) },
            common.popups_json,
        );
    }

    /// `None` return means the popup couldn't be created (already logged by
    /// the caller via its own rejection path); the caller returns early.
    #[allow(clippy::too_many_arguments)]
    fn create_popup(
        &mut self,
        parent: &ParentRef,
        index: usize,
        wanted_x: i32,
        wanted_y: i32,
        width: i32,
        height: i32,
        gravity: Gravity,
        constraint_adjustment: u32,
        grab: Option<Grab>,
    ) -> Option<()> {
        let parent_xdg_surface: Option<XdgSurface> = match parent {
            ParentRef::Bar { .. } => None,
            ParentRef::Popup { output_name, bar_index, popup_path } => {
                self.popup_mut(output_name, *bar_index, popup_path).map(|p| p.xdg_surface.clone())
            }
        };

        let wl_surface = self.globals.compositor.create_surface(&self.qh, ());
        let xdg_surface = self.globals.xdg_wm_base.get_xdg_surface(&wl_surface, &self.qh, ());
        let positioner = self.globals.xdg_wm_base.create_positioner(&self.qh, ());
        positioner.set_size(width.max(1), height.max(1));
        positioner.set_anchor_rect(wanted_x, wanted_y, 1, 1);
        positioner.set_offset(0, 0);
        positioner.set_gravity(gravity.to_xdg());
        positioner.set_constraint_adjustment(ConstraintAdjustment::from_bits_truncate(constraint_adjustment));
        positioner.set_reactive();

        let xdg_popup = xdg_surface.get_popup(parent_xdg_surface.as_ref(), &positioner, &self.qh, ());
        positioner.destroy();

        match parent {
            ParentRef::Bar { output_name, bar_index } => {
                let bar = self.bar_mut(output_name, *bar_index)?;
                bar.layer_surface.get_popup(&xdg_popup);
            }
            ParentRef::Popup { .. } => {}
        }

        if let Some(grab) = &grab {
            if let Some(seat) = self.seats.iter().find(|s| s.name.as_deref() == Some(grab.seat_name.as_str())) {
                xdg_popup.grab(&seat.wl_seat, grab.serial);
            }
        }
        wl_surface.commit();

        let mut common = SurfaceCommon::new(wl_surface);
        common.width = width;
        common.height = height;
        let mut popup = Popup::new(common, xdg_surface, xdg_popup, parent.clone());
        popup.grab = grab;
        popup.wanted_x = wanted_x;
        popup.wanted_y = wanted_y;
        popup.wanted_width = width;
        popup.wanted_height = height;
        popup.gravity = gravity;
        popup.constraint_adjustment = constraint_adjustment;

        let popups = self.popups_mut(parent)?;
        if popups.len() <= index {
            // A controller may send indices out of order, or skip one with
            // an explicit `null`, leaving a gap this resize fills with
            // empty slots rather than ever observing a placeholder popup.
            popups.resize_with(index + 1, || None);
        }
        popups[index] = Some(popup);
        Some(())
    }

    /// A positioner-affecting field changed on an already-configured popup:
    /// issue a fresh `xdg_positioner` and `xdg_popup.reposition` rather than
    /// tearing the popup down (spec §4.F `RepositionPending`). The token is
    /// unused by this crate's `repositioned` handler, which simply re-enters
    /// `Sized` on any repositioned event.
    #[allow(clippy::too_many_arguments)]
    fn issue_reposition(
        &mut self,
        parent: &ParentRef,
        index: usize,
        wanted_x: i32,
        wanted_y: i32,
        width: i32,
        height: i32,
        gravity: Gravity,
        constraint_adjustment: u32,
    ) {
        let positioner = self.globals.xdg_wm_base.create_positioner(&self.qh, ());
        positioner.set_size(width.max(1), height.max(1));
        positioner.set_anchor_rect(wanted_x, wanted_y, 1, 1);
        positioner.set_offset(0, 0);
        positioner.set_gravity(gravity.to_xdg());
        positioner.set_constraint_adjustment(ConstraintAdjustment::from_bits_truncate(constraint_adjustment));
        positioner.set_reactive();

        if let Some(popups) = self.popups_mut(parent) {
            if let Some(popup) = popups.get(index).and_then(|slot| slot.as_ref()) {
                popup.xdg_popup.reposition(&positioner, 0);
            }
        }
        positioner.destroy();
    }

    /// Spec §4.G "popup grab resolution": the first seat whose recent-button
    /// ring contains the serial becomes the grab seat.
    fn resolve_grab_seat(&self, serial: u32) -> Option<String> {
        self.seats.iter().find(|s| s.owns_grab_serial(serial)).and_then(|s| s.name.clone())
    }
}

fn bar_index_of(parent: &ParentRef) -> usize {
    match parent {
        ParentRef::Bar { bar_index, .. } => *bar_index,
        ParentRef::Popup { bar_index, .. } => *bar_index,
    }
}

fn popup_path_for(parent: &ParentRef, index: usize) -> Vec<usize> {
    match parent {
        ParentRef::Bar { .. } => vec![index],
        ParentRef::Popup { popup_path, .. } => {
            let mut p = popup_path.clone();
            p.push(index);
            p
        }
    }
}

/// Spec §4.E "wanted size deduction": a `0` input dimension is replaced by
/// the sum/max of the surface's renderable anchored blocks; a surface whose
/// derived size is zero in both dimensions is rejected by the caller.
fn resolve_wanted_size(
    width: i32,
    height: i32,
    blocks: &[BlockHandle],
    vertical: bool,
    output_width: i32,
    output_height: i32,
) -> (i32, i32) {
    if width > 0 && height > 0 {
        return (width, height);
    }
    let (derived_w, derived_h) = crate::block::layout::derive_wanted_size(blocks, vertical, output_width, output_height);
    (if width > 0 { width } else { derived_w }, if height > 0 { height } else { derived_h })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_wanted_size_keeps_explicit_dimensions() {
        let (w, h) = resolve_wanted_size(200, 30, &[], false, 1920, 1080);
        assert_eq!((w, h), (200, 30));
    }

    #[test]
    fn resolve_wanted_size_falls_back_to_derived_on_zero() {
        let (w, h) = resolve_wanted_size(0, 0, &[], false, 1920, 1080);
        assert_eq!((w, h), (0, 0));
    }

    #[test]
    fn parse_input_regions_reads_rect_array() {
        let json = serde_json::json!({"input_regions": [{"x": 1, "y": 2, "width": 3, "height": 4}]});
        let regions = parse_input_regions(&json);
        assert_eq!(regions, vec![Rect { x: 1, y: 2, width: 3, height: 4 }]);
    }
}
