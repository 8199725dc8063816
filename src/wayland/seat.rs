//! Seat tracking, pointer sub-state, and the popup-grab serial ring (spec
//! §3 "Seat", §4.G grab resolution, §4.H pointer event handling).

use std::collections::VecDeque;

use smithay_client_toolkit::reexports::client::protocol::{wl_pointer, wl_seat};
use smithay_client_toolkit::seat::pointer::{PointerEvent, PointerEventKind, PointerHandler, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};
use smithay_client_toolkit::seat::{Capability, SeatHandler, SeatState};
use smithay_client_toolkit::{delegate_pointer, delegate_seat};
use wayland_client::{Connection, QueueHandle};
use wayland_protocols::wp::cursor_shape::v1::client::wp_cursor_shape_device_v1::WpCursorShapeDeviceV1;

use crate::renderer::Renderer;
use crate::surface::ParentRef;

/// The surface currently holding pointer focus, addressed the same way a
/// popup addresses its parent (spec §9): by path from the owning output
/// rather than a raw back-pointer. Reuses [`ParentRef`]'s shape since
/// "the surface under the pointer" and "a popup's parent" are both just
/// paths into the same tree.
pub type SurfaceRef = ParentRef;

fn surface_ref_output_name(r: &SurfaceRef) -> &str {
    match r {
        ParentRef::Bar { output_name, .. } => output_name,
        ParentRef::Popup { output_name, .. } => output_name,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ButtonEvent {
    pub code: u32,
    pub pressed: bool,
    pub serial: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollEvent {
    pub axis: u32,
    pub vector_length: f64,
}

/// Up to 256 recent button-press serials, searched newest-to-oldest for
/// popup grab resolution (spec §3, SPEC_FULL §3/§4.G). Never shrinks, like
/// the original's fixed `array_t`.
#[derive(Debug, Clone, Copy)]
pub struct GrabRing {
    serials: [Option<u32>; 256],
    cursor: u8,
}

impl Default for GrabRing {
    fn default() -> Self {
        Self { serials: [None; 256], cursor: 0 }
    }
}

impl GrabRing {
    pub fn record(&mut self, serial: u32) {
        self.serials[self.cursor as usize] = Some(serial);
        self.cursor = self.cursor.wrapping_add(1);
    }

    /// Walk backwards from the most-recently-written slot, stopping at a
    /// match or after one full wrap (SPEC_FULL §4.G — the newest matching
    /// press must win if a serial value is ever reused).
    pub fn contains(&self, serial: u32) -> bool {
        let mut idx = self.cursor;
        for _ in 0..self.serials.len() {
            idx = idx.wrapping_sub(1);
            if self.serials[idx as usize] == Some(serial) {
                return true;
            }
        }
        false
    }
}

pub struct PointerState {
    pub wl_pointer: wl_pointer::WlPointer,
    pub cursor_shape_device: Option<WpCursorShapeDeviceV1>,
    /// `None` unless a surface currently has pointer focus (spec §4.J).
    pub focus: Option<(SurfaceRef, f64, f64)>,
    /// Every button/scroll event queues here in arrival order rather than
    /// overwriting a single slot, so N events coalesced into one
    /// `pointer_frame` still produce N state reports, each popping its own
    /// event (SPEC_FULL §4.J, §8 invariant 6).
    pub pending_buttons: VecDeque<ButtonEvent>,
    pub pending_scrolls: VecDeque<ScrollEvent>,
}

impl PointerState {
    pub fn new(wl_pointer: wl_pointer::WlPointer, cursor_shape_device: Option<WpCursorShapeDeviceV1>) -> Self {
        Self {
            wl_pointer,
            cursor_shape_device,
            focus: None,
            pending_buttons: VecDeque::new(),
            pending_scrolls: VecDeque::new(),
        }
    }

    pub fn clear_focus_if_output(&mut self, output_name: &str) {
        if self.focus.as_ref().map(|(r, ..)| surface_ref_output_name(r) == output_name).unwrap_or(false) {
            self.focus = None;
        }
    }
}

pub struct Seat {
    pub wl_seat: wl_seat::WlSeat,
    pub name: Option<String>,
    pub pointer: Option<PointerState>,
    pub grab_ring: GrabRing,
}

impl Seat {
    pub fn new(wl_seat: wl_seat::WlSeat) -> Self {
        Self { wl_seat, name: None, pointer: None, grab_ring: GrabRing::default() }
    }

    /// Spec §4.G: the first seat whose ring contains the requested serial
    /// becomes the grab seat.
    pub fn owns_grab_serial(&self, serial: u32) -> bool {
        self.grab_ring.contains(serial)
    }
}

impl SeatHandler for Renderer {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, seat: wl_seat::WlSeat) {
        self.seats.push(Seat::new(seat));
    }

    fn new_capability(&mut self, _conn: &Connection, qh: &QueueHandle<Self>, seat: wl_seat::WlSeat, capability: Capability) {
        if capability != Capability::Pointer {
            return;
        }
        let wl_pointer = self.seat_state.get_pointer(qh, &seat).expect("wl_seat advertised pointer capability");
        let cursor_shape_device = self
            .cursor_shape_manager
            .as_ref()
            .map(|mgr| mgr.get_pointer(&wl_pointer, qh, ()));
        if let Some(s) = self.seats.iter_mut().find(|s| s.wl_seat == seat) {
            s.pointer = Some(PointerState::new(wl_pointer, cursor_shape_device));
        }
    }

    fn remove_capability(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, seat: wl_seat::WlSeat, capability: Capability) {
        if capability != Capability::Pointer {
            return;
        }
        if let Some(s) = self.seats.iter_mut().find(|s| s.wl_seat == seat) {
            s.pointer = None;
        }
        self.state_dirty = true;
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, seat: wl_seat::WlSeat) {
        self.seats.retain(|s| s.wl_seat != seat);
        self.state_dirty = true;
    }
}

impl PointerHandler for Renderer {
    /// Every pointer event forces exactly one state report, per spec §5
    /// ("every pointer event produces exactly one report, forced, even if
    /// it didn't mutate any surface") and §4.H.
    fn pointer_frame(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, pointer: &wl_pointer::WlPointer, events: &[PointerEvent]) {
        let seat_idx = match self.seats.iter().position(|s| s.pointer.as_ref().map(|p| &p.wl_pointer) == Some(pointer)) {
            Some(i) => i,
            None => return,
        };

        for event in events {
            let surface_ref = self.find_surface_ref(&event.surface);
            let seat = &mut self.seats[seat_idx];
            let Some(ptr) = seat.pointer.as_mut() else { continue };

            match event.kind {
                PointerEventKind::Enter { .. } => {
                    if let Some(r) = surface_ref {
                        ptr.focus = Some((r, event.position.0, event.position.1));
                    }
                }
                PointerEventKind::Leave { .. } => {
                    ptr.focus = None;
                }
                PointerEventKind::Motion { .. } => {
                    if let Some((_, x, y)) = ptr.focus.as_mut() {
                        *x = event.position.0;
                        *y = event.position.1;
                    }
                }
                PointerEventKind::Press { button, serial, .. } => {
                    ptr.pending_buttons.push_back(ButtonEvent { code: button, pressed: true, serial });
                    if matches!(button, BTN_LEFT | BTN_RIGHT | BTN_MIDDLE) {
                        seat.grab_ring.record(serial);
                    }
                }
                PointerEventKind::Release { button, serial, .. } => {
                    ptr.pending_buttons.push_back(ButtonEvent { code: button, pressed: false, serial });
                }
                PointerEventKind::Axis { vertical, horizontal, .. } => {
                    let (axis, vector_length) = if vertical.absolute != 0.0 {
                        (0u32, vertical.absolute)
                    } else {
                        (1u32, horizontal.absolute)
                    };
                    ptr.pending_scrolls.push_back(ScrollEvent { axis, vector_length });
                }
                _ => {}
            }
        }

        self.state_dirty = true;
        self.force_report = true;
    }
}

delegate_seat!(Renderer);
delegate_pointer!(Renderer);
