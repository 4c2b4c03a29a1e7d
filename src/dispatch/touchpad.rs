//! Touchpad dispatch (spec §4.6): layers the tap FSM and its slot-transition
//! derivation on top of the shared pipeline. Palm classification is an
//! external collaborator (spec §4.3: "a palm-classified touch (external
//! collaborator)"); the engine only consumes its verdict.

use crate::device::Device;
use crate::event::{codes, EventSink, RawEvent};
use crate::pipeline;
use crate::seat::Seat;
use crate::tap::{SlotTransition, TapEngine};
use crate::tap::touch::TapTouch;

/// Classifies whether a touch at `(x, y)` on `device_slot` is accidental
/// palm contact. The default [`NeverPalm`] never flags a touch, matching an
/// embedder that has no palm heuristic wired in.
pub trait PalmClassifier {
    fn is_palm(&mut self, device_slot: usize, x: f64, y: f64) -> bool;
}

#[derive(Debug, Default)]
pub struct NeverPalm;

impl PalmClassifier for NeverPalm {
    fn is_palm(&mut self, _device_slot: usize, _x: f64, _y: f64) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Begin,
    Continue,
    End,
}

pub struct TouchpadDispatch {
    tap: TapEngine,
    touches: Vec<TapTouch>,
    /// Whether each device slot was reporting a touch as of the previous
    /// frame — `MtSlot` itself has no such flag, since seat-slot
    /// allocation is a pipeline concern, not a touch-lifecycle one.
    active: Vec<bool>,
    /// Raw `(slot, lifecycle)` events observed since the last `SYN_REPORT`,
    /// in arrival order.
    dirty: Vec<(usize, Lifecycle)>,
    clickpad: bool,
    clickpad_button_pressed: bool,
    palm: Box<dyn PalmClassifier>,
}

impl TouchpadDispatch {
    pub fn new(num_slots: usize, clickpad: bool) -> Self {
        TouchpadDispatch {
            tap: TapEngine::new(),
            touches: vec![TapTouch::default(); num_slots.max(1)],
            active: vec![false; num_slots.max(1)],
            dirty: Vec::new(),
            clickpad,
            clickpad_button_pressed: false,
            palm: Box::new(NeverPalm),
        }
    }

    pub fn with_palm_classifier(mut self, palm: Box<dyn PalmClassifier>) -> Self {
        self.palm = palm;
        self
    }

    pub fn tap_state(&self) -> crate::tap::TapState {
        self.tap.state()
    }

    pub fn ingest(&mut self, device: &mut Device, seat: &mut Seat, event: RawEvent, sink: &mut dyn EventSink) {
        let is_syn_report = event.is_syn_report();
        let is_tracking_id = event.kind == codes::EV_ABS && event.code == codes::ABS_MT_TRACKING_ID;
        let is_position = event.kind == codes::EV_ABS && (event.code == codes::ABS_MT_POSITION_X || event.code == codes::ABS_MT_POSITION_Y);
        let is_clickpad_button = self.clickpad && event.kind == codes::EV_KEY && event.code == codes::BTN_LEFT;
        let time = event.timestamp_ms;

        pipeline::ingest(device, seat, event, sink);

        if is_clickpad_button {
            self.clickpad_button_pressed = event.value != 0;
        }

        if is_tracking_id {
            let slot = device.slots.current_index();
            self.ensure_capacity(slot + 1);
            let lifecycle = if event.value >= 0 { Lifecycle::Begin } else { Lifecycle::End };
            self.active[slot] = lifecycle == Lifecycle::Begin;
            self.dirty.push((slot, lifecycle));
        } else if is_position {
            let slot = device.slots.current_index();
            self.ensure_capacity(slot + 1);
            if self.active.get(slot).copied().unwrap_or(false) {
                self.dirty.push((slot, Lifecycle::Continue));
            }
        }

        if is_syn_report {
            self.drive_tap_frame(device, sink, time);
        }
    }

    fn ensure_capacity(&mut self, len: usize) {
        if self.touches.len() < len {
            self.touches.resize(len, TapTouch::default());
            self.active.resize(len, false);
        }
    }

    fn drive_tap_frame(&mut self, device: &mut Device, sink: &mut dyn EventSink, time: u64) {
        if self.dirty.is_empty() {
            if self.clickpad_button_pressed {
                self.tap.process_frame(device.config.tap_enabled, &mut self.touches, &[], true, self.active.iter().filter(|&&a| a).count(), time, device.id, sink);
            }
            return;
        }

        let transitions: Vec<(usize, SlotTransition)> = self
            .dirty
            .drain(..)
            .map(|(slot, lifecycle)| {
                let transition = match lifecycle {
                    Lifecycle::Begin => {
                        let raw = device.slots.get(slot).map(|s| (s.x, s.y)).unwrap_or((0.0, 0.0));
                        let point = device.normalize_mt_point(raw.0, raw.1);
                        let is_palm = self.palm.is_palm(slot, raw.0, raw.1);
                        SlotTransition::Begin { point, is_palm }
                    }
                    Lifecycle::Continue => {
                        let raw = device.slots.get(slot).map(|s| (s.x, s.y)).unwrap_or((0.0, 0.0));
                        SlotTransition::Continue { point: device.normalize_mt_point(raw.0, raw.1) }
                    }
                    Lifecycle::End => SlotTransition::End,
                };
                (slot, transition)
            })
            .collect();

        let nfingers_down = self.active.iter().filter(|&&a| a).count();
        self.tap.process_frame(device.config.tap_enabled, &mut self.touches, &transitions, self.clickpad_button_pressed, nfingers_down, time, device.id, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AbsInfo, DeviceCapability, Identity};
    use crate::event::{DeviceId, SemanticEvent};

    struct Recorder(Vec<SemanticEvent>);
    impl EventSink for Recorder {
        fn handle_event(&mut self, event: SemanticEvent) {
            self.0.push(event);
        }
    }

    fn touchpad(num_slots: usize) -> Device {
        let abs = AbsInfo { min: 0, max: 3000, resolution: 40, fake_resolution: false };
        Device::new(
            DeviceId(3),
            Identity { name: "touchpad".into(), vendor: 0, product: 0, bustype: 0 },
            DeviceCapability::TOUCH | DeviceCapability::POINTER,
            abs,
            abs,
            num_slots,
            1000,
        )
    }

    #[test]
    fn single_finger_tap_through_raw_mt_stream_presses_left() {
        let mut device = touchpad(2);
        let mut seat = Seat::new("seat0");
        let mut sink = Recorder(Vec::new());
        let mut dispatch = TouchpadDispatch::new(2, true);

        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_SLOT, 0, 0), &mut sink);
        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_TRACKING_ID, 1, 0), &mut sink);
        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_X, 1000, 0), &mut sink);
        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_Y, 1000, 0), &mut sink);
        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 0), &mut sink);
        assert_eq!(dispatch.tap_state(), crate::tap::TapState::Touch);

        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_SLOT, 0, 10), &mut sink);
        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_TRACKING_ID, -1, 10), &mut sink);
        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 10), &mut sink);

        assert_eq!(dispatch.tap_state(), crate::tap::TapState::Tapped);
        let left_press = sink.0.iter().any(|e| matches!(e, SemanticEvent::PointerButton { button: crate::event::Button::Left, state: crate::event::ButtonState::Pressed, .. }));
        assert!(left_press);
    }

    #[test]
    fn separate_button_touchpad_ignores_btn_left_for_tap_button_event() {
        let mut device = touchpad(1);
        let mut seat = Seat::new("seat0");
        let mut sink = Recorder(Vec::new());
        let mut dispatch = TouchpadDispatch::new(1, false);

        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_SLOT, 0, 0), &mut sink);
        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_TRACKING_ID, 1, 0), &mut sink);
        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_KEY, codes::BTN_LEFT, 1, 0), &mut sink);
        dispatch.ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 0), &mut sink);

        assert_eq!(dispatch.tap_state(), crate::tap::TapState::Touch);
    }
}
