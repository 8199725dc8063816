//! Serializing the live surface tree into the state-report JSON line (spec
//! §4.J), emitted to stdout whenever `state_dirty` (or a forced pointer
//! report) fires.

use serde_json::{json, Value};

use crate::renderer::Renderer;
use crate::surface::{Bar, ParentRef, Popup};
use crate::wayland::output::Output;
use crate::wayland::seat::PointerState;

impl Renderer {
    /// Build one state-report document. Pops one queued button event and
    /// one queued scroll event per seat (spec §8 invariant 6: every pointer
    /// button event gets its own report) — call
    /// [`Renderer::has_pending_pointer_events`] afterwards to see whether
    /// another report is owed before the next Wayland/stdin wake-up.
    pub fn build_state_report(&mut self) -> Value {
        json!({
            "userdata": self.userdata,
            "outputs": self.describe_outputs(),
            "seats": self.describe_seats(),
        })
    }

    /// `true` while any seat still has a button/scroll event queued that
    /// hasn't been placed in a report yet.
    pub fn has_pending_pointer_events(&self) -> bool {
        self.seats.iter().any(|s| {
            s.pointer
                .as_ref()
                .map(|p| !p.pending_buttons.is_empty() || !p.pending_scrolls.is_empty())
                .unwrap_or(false)
        })
    }

    fn describe_outputs(&self) -> Vec<Value> {
        self.outputs
            .iter()
            .filter_map(|o| {
                let name = o.name.as_ref()?;
                Some(json!({
                    "name": name,
                    "width": o.width,
                    "height": o.height,
                    "scale": o.scale,
                    "transform": format!("{:?}", o.transform),
                    "bars": o.bars.iter().map(|b| b.as_ref().map(describe_bar).unwrap_or(Value::Null)).collect::<Vec<_>>(),
                }))
            })
            .collect()
    }

    /// Needs `&mut self`: each seat's pointer is popped of at most one
    /// button and one scroll event here (spec §8 invariant 6).
    fn describe_seats(&mut self) -> Vec<Value> {
        let outputs = &self.outputs;
        self.seats
            .iter_mut()
            .map(|s| {
                json!({
                    "name": s.name,
                    "pointer": s.pointer.as_mut().map(|p| describe_pointer(outputs, p)),
                })
            })
            .collect()
    }
}

/// `focus`'s `surface_userdata` (spec §4.J) is looked up by path, not
/// cached on `PointerState`, so it always reflects the surface's current
/// `userdata` rather than whatever it was when focus was gained. `button`/
/// `scroll` each pop the oldest queued event so that N coalesced events
/// spread across N reports instead of the last one silently winning
/// (spec §8 invariant 6, scenario-adjacent to S3/S4).
fn describe_pointer(outputs: &[Output], pointer: &mut PointerState) -> Value {
    let focus = pointer.focus.as_ref().map(|(surface_ref, x, y)| {
        json!({
            "surface_userdata": surface_ref_userdata(outputs, surface_ref),
            "x": x,
            "y": y,
        })
    });
    let button = pointer.pending_buttons.pop_front().map(|b| {
        json!({
            "code": b.code,
            "state": if b.pressed { "pressed" } else { "released" },
            "serial": b.serial,
        })
    });
    let scroll = pointer.pending_scrolls.pop_front().map(|s| {
        json!({
            "axis": s.axis,
            "vector_length": s.vector_length,
        })
    });
    json!({ "focus": focus, "button": button, "scroll": scroll })
}

fn surface_ref_userdata(outputs: &[Output], surface_ref: &ParentRef) -> Value {
    match surface_ref {
        ParentRef::Bar { output_name, bar_index } => outputs
            .iter()
            .find(|o| o.name.as_deref() == Some(output_name.as_str()))
            .and_then(|o| o.bars.get(*bar_index))
            .and_then(|b| b.as_ref())
            .map(|b| b.common.userdata.clone())
            .unwrap_or(Value::Null),
        ParentRef::Popup { output_name, bar_index, popup_path } => outputs
            .iter()
            .find(|o| o.name.as_deref() == Some(output_name.as_str()))
            .and_then(|o| o.bars.get(*bar_index))
            .and_then(|b| b.as_ref())
            .and_then(|b| popup_at_path(&b.common.popups, popup_path))
            .map(|p| p.common.userdata.clone())
            .unwrap_or(Value::Null),
    }
}

fn describe_bar(bar: &Bar) -> Value {
    json!({
        "userdata": bar.common.userdata,
        "width": bar.common.width,
        "height": bar.common.height,
        "scale": bar.common.scale,
        "blocks": describe_block_boxes(&bar.common),
        "popups": describe_popup_slots(&bar.common.popups),
    })
}

/// A dismissed/rejected popup's slot is `null` rather than absent, so
/// sibling indices keep their positional meaning across reports (spec
/// §4.J, §8 boundary rule, scenario S3) — the same convention
/// `describe_outputs` already uses for failed bar slots.
fn describe_popup_slots(popups: &[Option<Popup>]) -> Vec<Value> {
    popups.iter().map(|p| p.as_ref().map(describe_popup).unwrap_or(Value::Null)).collect()
}

fn describe_popup(popup: &Popup) -> Value {
    json!({
        "userdata": popup.common.userdata,
        "width": popup.common.width,
        "height": popup.common.height,
        "scale": popup.common.scale,
        "blocks": describe_block_boxes(&popup.common),
        "popups": describe_popup_slots(&popup.common.popups),
    })
}

fn describe_block_boxes(common: &crate::surface::SurfaceCommon) -> Vec<Value> {
    common
        .block_boxes
        .iter()
        .map(|b| json!({ "x": b.x, "y": b.y, "width": b.width, "height": b.height }))
        .collect()
}

fn popup_at_path<'a>(popups: &'a [Option<Popup>], path: &[usize]) -> Option<&'a Popup> {
    let (&first, rest) = path.split_first()?;
    let popup = popups.get(first)?.as_ref()?;
    if rest.is_empty() {
        Some(popup)
    } else {
        popup_at_path(&popup.common.popups, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_at_path_rejects_empty_and_out_of_range() {
        let popups: Vec<Option<Popup>> = Vec::new();
        assert!(popup_at_path(&popups, &[0]).is_none());
        assert!(popup_at_path(&popups, &[]).is_none());
    }

    #[test]
    fn describe_popup_slots_nulls_dismissed_entries_without_shifting_siblings() {
        let popups: Vec<Option<Popup>> = vec![None, None];
        let described = describe_popup_slots(&popups);
        assert_eq!(described, vec![Value::Null, Value::Null]);
    }
}
