//! The per-device event-processing pipeline (spec §4.1): ingest raw events,
//! accumulate into the pending-event discriminant, flush at `SYN_REPORT`,
//! and emit semantic events. Handles `SYN_DROPPED` resync and the
//! configuration-mutation gating that applies `left_handed`/scroll-method
//! changes only at an all-buttons-up boundary.

use crate::device::keys::KeyEdge;
use crate::device::{Device, DeviceCapability};
use crate::event::{codes, Button, ButtonState, DeviceId, EventSink, KeyState as EventKeyState, PendingEvent, RawEvent, ScrollAxis, SemanticEvent};
use crate::ratelimit::RateLimitVerdict;
use crate::scroll::{ButtonScrollOutcome, ScrollMethod};
use crate::seat::Seat;

/// Ingest one decoded kernel record for `device`. Call repeatedly as the
/// event source yields records; a `SYN_REPORT` triggers [`flush`]
/// internally.
pub fn ingest(device: &mut Device, seat: &mut Seat, event: RawEvent, sink: &mut dyn EventSink) {
    if event.is_syn_report() {
        flush(device, seat, event.timestamp_ms, sink);
        return;
    }
    if event.is_syn_dropped() {
        handle_syn_dropped(device, seat, event.timestamp_ms, sink);
        return;
    }

    match event.kind {
        codes::EV_REL => handle_rel(device, seat, event, sink),
        codes::EV_ABS => handle_abs(device, seat, event, sink),
        codes::EV_KEY => handle_key(device, seat, event, sink),
        _ => {}
    }
}

fn arm_relative(device: &mut Device, seat: &mut Seat, time: u64, sink: &mut dyn EventSink, dx: f64, dy: f64) {
    match device.pending {
        PendingEvent::RelativeMotion { dx: odx, dy: ody } => {
            device.pending = PendingEvent::RelativeMotion { dx: odx + dx, dy: ody + dy };
        }
        PendingEvent::None => {
            device.pending = PendingEvent::RelativeMotion { dx, dy };
        }
        _ => {
            flush(device, seat, time, sink);
            device.pending = PendingEvent::RelativeMotion { dx, dy };
        }
    }
}

fn handle_rel(device: &mut Device, seat: &mut Seat, event: RawEvent, sink: &mut dyn EventSink) {
    match event.code {
        codes::REL_X => arm_relative(device, seat, event.timestamp_ms, sink, event.value as f64, 0.0),
        codes::REL_Y => arm_relative(device, seat, event.timestamp_ms, sink, 0.0, event.value as f64),
        codes::REL_WHEEL | codes::REL_HWHEEL => {
            if !device.pending.is_none() {
                flush(device, seat, event.timestamp_ms, sink);
            }
            let axis = if event.code == codes::REL_WHEEL { ScrollAxis::Vertical } else { ScrollAxis::Horizontal };
            let value = device.scroll.wheel_tick(event.value);
            sink.handle_event(SemanticEvent::PointerAxis {
                device: device.id,
                time: event.timestamp_ms,
                axis,
                value,
            });
        }
        _ => {}
    }
}

fn handle_abs(device: &mut Device, seat: &mut Seat, event: RawEvent, sink: &mut dyn EventSink) {
    if device.is_multitouch() {
        handle_mt_abs(device, seat, event, sink);
    } else {
        handle_single_abs(device, event);
    }
}

fn handle_single_abs(device: &mut Device, event: RawEvent) {
    match event.code {
        codes::ABS_X => device.abs_x_value = event.value as f64,
        codes::ABS_Y => device.abs_y_value = event.value as f64,
        _ => return,
    }

    let is_touch = device.has_capability(DeviceCapability::TOUCH);
    if is_touch && device.single_touch_seat_slot.is_none() {
        // Coordinates before BTN_TOUCH goes down just update the
        // not-yet-visible touch position; nothing to arm yet.
        return;
    }
    if device.pending.is_none() {
        device.pending = PendingEvent::AbsoluteMotion {
            x: device.abs_x_value,
            y: device.abs_y_value,
        };
    } else if let PendingEvent::AbsoluteMotion { .. } = device.pending {
        device.pending = PendingEvent::AbsoluteMotion {
            x: device.abs_x_value,
            y: device.abs_y_value,
        };
    }
}

fn handle_mt_abs(device: &mut Device, seat: &mut Seat, event: RawEvent, sink: &mut dyn EventSink) {
    match event.code {
        codes::ABS_MT_SLOT => {
            if event.value >= 0 {
                if !device.pending.is_none() {
                    flush(device, seat, event.timestamp_ms, sink);
                }
                device.slots.set_current(event.value as usize);
            }
        }
        codes::ABS_MT_TRACKING_ID => {
            let slot = device.slots.current_index();
            let new = if event.value >= 0 {
                PendingEvent::AbsoluteMtDown { slot }
            } else {
                PendingEvent::AbsoluteMtUp { slot }
            };
            if !device.pending.is_none() {
                flush(device, seat, event.timestamp_ms, sink);
            }
            device.pending = new;
        }
        codes::ABS_MT_POSITION_X => {
            device.slots.current_mut().x = event.value as f64;
            arm_mt_motion(device);
        }
        codes::ABS_MT_POSITION_Y => {
            device.slots.current_mut().y = event.value as f64;
            arm_mt_motion(device);
        }
        _ => {}
    }
}

fn arm_mt_motion(device: &mut Device) {
    if device.pending.is_none() {
        device.pending = PendingEvent::AbsoluteMtMotion { slot: device.slots.current_index() };
    }
}

fn handle_key(device: &mut Device, seat: &mut Seat, event: RawEvent, sink: &mut dyn EventSink) {
    if crate::device::key_value_is_autorepeat(event.value) {
        return;
    }

    if !device.pending.is_none() {
        flush(device, seat, event.timestamp_ms, sink);
    }

    let pressed = event.value != 0;

    if event.code == codes::BTN_TOUCH && device.has_capability(DeviceCapability::TOUCH) && !device.is_multitouch() {
        device.pending = if pressed {
            PendingEvent::AbsoluteTouchDown {
                x: device.abs_x_value,
                y: device.abs_y_value,
            }
        } else {
            PendingEvent::AbsoluteTouchUp
        };
        return;
    }

    if is_button_code(event.code) && device.has_capability(DeviceCapability::POINTER) {
        handle_button(device, event.code, pressed, event.timestamp_ms, sink);
        return;
    }

    let edge = device.keys.apply(event.code, pressed);
    if let (KeyEdge::Pressed, Some(led)) = (edge, crate::led::led_for_key_code(event.code)) {
        seat.notify_led(led, device.toggle_led(led));
    }
    match edge {
        KeyEdge::Pressed => emit_key(device.id, event.timestamp_ms, event.code, EventKeyState::Pressed, sink),
        KeyEdge::Released => emit_key(device.id, event.timestamp_ms, event.code, EventKeyState::Released, sink),
        KeyEdge::None => {}
    }
}

fn emit_key(device: DeviceId, time: u64, code: u32, state: EventKeyState, sink: &mut dyn EventSink) {
    sink.handle_event(SemanticEvent::KeyboardKey { device, time, key_code: code, state });
}

const BTN_RANGE_START: u32 = 0x100;
const BTN_RANGE_END: u32 = 0x160;

fn is_button_code(code: u32) -> bool {
    (BTN_RANGE_START..BTN_RANGE_END).contains(&code)
}

fn handle_button(device: &mut Device, code: u32, pressed: bool, time: u64, sink: &mut dyn EventSink) {
    if device.scroll.method == ScrollMethod::Button {
        match device.scroll.on_button(code, pressed, time) {
            ButtonScrollOutcome::Armed | ButtonScrollOutcome::Suppressed => {
                maybe_apply_pending_config(device, time);
                return;
            }
            ButtonScrollOutcome::Click => {
                let button = left_handed_swap(device, Button::from_code(code));
                sink.handle_event(SemanticEvent::PointerButton { device: device.id, time, button, state: ButtonState::Pressed });
                sink.handle_event(SemanticEvent::PointerButton { device: device.id, time, button, state: ButtonState::Released });
                maybe_apply_pending_config(device, time);
                return;
            }
            ButtonScrollOutcome::ScrollEnded(events) => {
                for (axis, value) in events {
                    sink.handle_event(SemanticEvent::PointerAxis { device: device.id, time, axis, value });
                }
                maybe_apply_pending_config(device, time);
                return;
            }
            ButtonScrollOutcome::NotRelevant => {}
        }
    }

    let edge = device.keys.apply(code, pressed);
    if !matches!(edge, KeyEdge::None) {
        let button = left_handed_swap(device, Button::from_code(code));
        let state = match edge {
            KeyEdge::Pressed => ButtonState::Pressed,
            KeyEdge::Released => ButtonState::Released,
            KeyEdge::None => unreachable!(),
        };
        sink.handle_event(SemanticEvent::PointerButton { device: device.id, time, button, state });
    }

    if !pressed {
        maybe_apply_pending_config(device, time);
    }
}

fn left_handed_swap(device: &Device, button: Button) -> Button {
    if !device.config.left_handed_current() {
        return button;
    }
    match button {
        Button::Left => Button::Right,
        Button::Right => Button::Left,
        other => other,
    }
}

/// Apply pending `left_handed`/scroll-method changes once no hardware
/// button is down (spec §4.1).
fn maybe_apply_pending_config(device: &mut Device, _time: u64) {
    if device.keys.down_codes().iter().any(|&c| is_button_code(c)) {
        return;
    }
    device.config.apply_pending();
    device.scroll.apply_pending_method();
}

/// Flush whatever is pending for `device`, emitting the semantic event(s)
/// it implies, then a touch-frame if any touch slot changed this cycle.
pub fn flush(device: &mut Device, seat: &mut Seat, time: u64, sink: &mut dyn EventSink) {
    let pending = std::mem::take(&mut device.pending);
    let mut touch_emitted = false;

    match pending {
        PendingEvent::None => {}
        PendingEvent::RelativeMotion { dx, dy } => {
            flush_relative_motion(device, time, dx, dy, sink);
        }
        PendingEvent::AbsoluteMotion { x, y } => {
            let (cx, cy) = device.calibration.apply(x, y);
            if device.has_capability(DeviceCapability::TOUCH) {
                if let Some(seat_slot) = device.single_touch_seat_slot {
                    sink.handle_event(SemanticEvent::TouchMotion {
                        device: device.id,
                        time,
                        device_slot: 0,
                        seat_slot,
                        x: cx,
                        y: cy,
                    });
                    touch_emitted = true;
                }
            } else {
                sink.handle_event(SemanticEvent::PointerMotionAbsolute { device: device.id, time, x: cx, y: cy });
            }
        }
        PendingEvent::AbsoluteTouchDown { x, y } => {
            let seat_slot = seat.allocate_slot();
            device.single_touch_seat_slot = seat_slot;
            if let Some(seat_slot) = seat_slot {
                let (cx, cy) = device.calibration.apply(x, y);
                sink.handle_event(SemanticEvent::TouchDown {
                    device: device.id,
                    time,
                    device_slot: 0,
                    seat_slot,
                    x: cx,
                    y: cy,
                });
                touch_emitted = true;
            }
        }
        PendingEvent::AbsoluteTouchUp => {
            if let Some(seat_slot) = device.single_touch_seat_slot.take() {
                seat.release_slot(seat_slot);
                sink.handle_event(SemanticEvent::TouchUp { device: device.id, time, device_slot: 0, seat_slot });
                touch_emitted = true;
            }
        }
        PendingEvent::AbsoluteMtDown { slot } => {
            if device.slots.get(slot).and_then(|s| s.seat_slot).is_some() {
                crate::error::InvariantViolation::KernelBug.log(&format!("duplicate ABS_MT_TRACKING_ID down for already-active slot {slot}"));
            } else {
                let seat_slot = seat.allocate_slot();
                if let Some(s) = device.slots.get_mut(slot) {
                    s.seat_slot = seat_slot;
                }
                if let Some(seat_slot) = seat_slot {
                    let (x, y) = device.slots.get(slot).map(|s| (s.x, s.y)).unwrap_or((0.0, 0.0));
                    let (cx, cy) = device.calibration.apply(x, y);
                    sink.handle_event(SemanticEvent::TouchDown {
                        device: device.id,
                        time,
                        device_slot: slot,
                        seat_slot,
                        x: cx,
                        y: cy,
                    });
                    touch_emitted = true;
                }
            }
        }
        PendingEvent::AbsoluteMtUp { slot } => {
            let released = device.slots.get_mut(slot).and_then(|s| s.seat_slot.take());
            if let Some(seat_slot) = released {
                seat.release_slot(seat_slot);
                sink.handle_event(SemanticEvent::TouchUp { device: device.id, time, device_slot: slot, seat_slot });
                touch_emitted = true;
            }
        }
        PendingEvent::AbsoluteMtMotion { slot } => {
            if let Some(s) = device.slots.get(slot) {
                if let Some(seat_slot) = s.seat_slot {
                    let (cx, cy) = device.calibration.apply(s.x, s.y);
                    sink.handle_event(SemanticEvent::TouchMotion {
                        device: device.id,
                        time,
                        device_slot: slot,
                        seat_slot,
                        x: cx,
                        y: cy,
                    });
                    touch_emitted = true;
                }
            }
        }
    }

    if touch_emitted {
        sink.handle_event(SemanticEvent::TouchFrame { device: device.id, time });
    }

    device.last_frame_time = time;
}

fn flush_relative_motion(device: &mut Device, time: u64, dx: f64, dy: f64, sink: &mut dyn EventSink) {
    let (ndx, ndy) = device.normalize_rel(dx, dy);

    if device.scroll.method == ScrollMethod::Button {
        if device.scroll.is_button_armed() && !device.scroll.active && device.scroll.hold_deadline_elapsed(time) {
            device.scroll.activate();
        }
        if device.scroll.active {
            for (axis, value) in device.scroll.divert_motion(ndx, ndy) {
                sink.handle_event(SemanticEvent::PointerAxis { device: device.id, time, axis, value });
            }
            return;
        }
        if device.scroll.is_button_armed() {
            device.scroll.divert_motion(ndx, ndy);
            return;
        }
    }

    let dt = time.saturating_sub(device.last_frame_time).min(u32::MAX as u64) as u32;
    let filtered = device.filter.filter(crate::filter::NormalizedDelta { dx: ndx, dy: ndy }, dt);

    if filtered.accelerated.dx == 0.0 && filtered.accelerated.dy == 0.0 && ndx == 0.0 && ndy == 0.0 {
        return;
    }

    sink.handle_event(SemanticEvent::PointerMotion {
        device: device.id,
        time,
        dx: filtered.accelerated.dx,
        dy: filtered.accelerated.dy,
        dx_unaccel: filtered.unaccelerated.dx,
        dy_unaccel: filtered.unaccelerated.dy,
    });
}

fn handle_syn_dropped(device: &mut Device, seat: &mut Seat, time: u64, sink: &mut dyn EventSink) {
    flush(device, seat, time, sink);

    match device.test_syn_dropped_rate_limit(time) {
        RateLimitVerdict::Pass => {
            tracing::warn!(target: "evdev_gestures::syn_dropped", device = device.id.0, "kernel event buffer overflowed, resyncing");
        }
        RateLimitVerdict::Threshold => {
            tracing::warn!(target: "evdev_gestures::syn_dropped", device = device.id.0, "SYN_DROPPED warnings approaching the rate limit, further warnings suppressed");
        }
        RateLimitVerdict::Exceeded => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AbsInfo, Identity};

    struct Recorder(Vec<SemanticEvent>);
    impl EventSink for Recorder {
        fn handle_event(&mut self, event: SemanticEvent) {
            self.0.push(event);
        }
    }

    fn mouse() -> Device {
        let abs = AbsInfo { min: 0, max: 0, resolution: 0, fake_resolution: true };
        Device::new(
            DeviceId(0),
            Identity { name: "mouse".into(), vendor: 0, product: 0, bustype: 0 },
            DeviceCapability::POINTER,
            abs,
            abs,
            0,
            1000,
        )
    }

    fn touchscreen(num_slots: usize) -> Device {
        let abs = AbsInfo { min: 0, max: 3000, resolution: 40, fake_resolution: false };
        Device::new(
            DeviceId(1),
            Identity { name: "touchscreen".into(), vendor: 0, product: 0, bustype: 0 },
            DeviceCapability::TOUCH,
            abs,
            abs,
            num_slots,
            1000,
        )
        .with_direct_input(true)
    }

    #[test]
    fn relative_motion_coalesces_across_two_rel_events_then_flushes_on_syn() {
        let mut device = mouse();
        let mut seat = Seat::new("seat0");
        let mut sink = Recorder(Vec::new());

        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_REL, codes::REL_X, 5, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_REL, codes::REL_Y, -3, 0), &mut sink);
        assert!(sink.0.is_empty());
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 0), &mut sink);

        assert_eq!(sink.0.len(), 1);
        match sink.0[0] {
            SemanticEvent::PointerMotion { dx, dy, .. } => {
                assert!((dx - 5.0).abs() < 1e-9);
                assert!((dy - (-3.0)).abs() < 1e-9);
            }
            other => panic!("expected PointerMotion, got {other:?}"),
        }
    }

    #[test]
    fn multitouch_down_allocates_seat_slot_and_emits_frame() {
        let mut device = touchscreen(5);
        let mut seat = Seat::new("seat0");
        let mut sink = Recorder(Vec::new());

        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_SLOT, 0, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_TRACKING_ID, 7, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_X, 1000, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_Y, 1000, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 0), &mut sink);

        assert!(matches!(sink.0[0], SemanticEvent::TouchDown { seat_slot: 0, device_slot: 0, .. }));
        assert!(matches!(sink.0[1], SemanticEvent::TouchFrame { .. }));
        assert!(seat.is_slot_allocated(0));
    }

    #[test]
    fn syn_dropped_is_rate_limited_after_five_in_one_window() {
        let mut device = mouse();
        let mut seat = Seat::new("seat0");
        let mut sink = Recorder(Vec::new());
        for _ in 0..4 {
            ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_DROPPED, 0, 0), &mut sink);
        }
        assert_eq!(device.test_syn_dropped_rate_limit(1), RateLimitVerdict::Threshold);
        assert_eq!(device.test_syn_dropped_rate_limit(1), RateLimitVerdict::Exceeded);
    }

    #[test]
    fn two_slots_moving_in_the_same_frame_both_flush() {
        let mut device = touchscreen(5);
        let mut seat = Seat::new("seat0");
        let mut sink = Recorder(Vec::new());

        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_SLOT, 0, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_TRACKING_ID, 1, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_X, 1000, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_Y, 1000, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_SLOT, 1, 10), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_TRACKING_ID, 2, 10), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_X, 1200, 10), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_Y, 1000, 10), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 10), &mut sink);
        sink.0.clear();

        // Both slots move within the same SYN frame: slot 0's motion must
        // flush before ABS_MT_SLOT switches the current slot to 1, or its
        // TouchMotion is silently dropped (pending only holds one slot).
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_SLOT, 0, 20), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_X, 1010, 20), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_SLOT, 1, 20), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_X, 1210, 20), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 20), &mut sink);

        let motions: Vec<usize> = sink
            .0
            .iter()
            .filter_map(|e| match e {
                SemanticEvent::TouchMotion { device_slot, .. } => Some(*device_slot),
                _ => None,
            })
            .collect();
        assert_eq!(motions, vec![0, 1]);
    }

    #[test]
    fn duplicate_mt_down_on_active_slot_is_dropped_without_leaking_seat_slot() {
        let mut device = touchscreen(2);
        let mut seat = Seat::new("seat0");
        let mut sink = Recorder(Vec::new());

        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_SLOT, 0, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_TRACKING_ID, 1, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_X, 1000, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_POSITION_Y, 1000, 0), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 0), &mut sink);
        assert_eq!(seat.allocated_count(), 1);
        sink.0.clear();

        // A buggy driver sends a second MT_DOWN for the same slot without
        // an intervening MT_UP; the kernel-bug path drops it rather than
        // allocating (and leaking) a second seat slot for one finger.
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_ABS, codes::ABS_MT_TRACKING_ID, 2, 30), &mut sink);
        ingest(&mut device, &mut seat, RawEvent::new(codes::EV_SYN, codes::SYN_REPORT, 0, 30), &mut sink);

        assert_eq!(seat.allocated_count(), 1);
        assert!(sink.0.iter().all(|e| !matches!(e, SemanticEvent::TouchDown { .. })));
    }
}
