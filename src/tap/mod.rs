//! The 15-state tap-to-click finite-state machine (spec §4.3). Ported
//! transition-for-transition from the reference implementation's
//! `tp_tap_*_handle_event` functions; do not reorder states or collapse
//! transitions without re-checking the original state diagram.

pub mod touch;

use crate::error::InvariantViolation;
use crate::event::{Button, ButtonState, DeviceId, EventSink, SemanticEvent};
use touch::{TapTouch, TouchTapState};

pub const TAP_TIMEOUT_MS: u64 = 180;
pub const DRAG_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapState {
    Idle,
    Touch,
    Touch2,
    Touch3,
    Hold,
    Touch2Hold,
    Touch3Hold,
    Tapped,
    Dragging,
    DraggingWait,
    DraggingOrDoubletap,
    Dragging2,
    Multitap,
    MultitapDown,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapEvent {
    Touch,
    Motion,
    Release,
    Button,
    Timeout,
}

/// Extra facts a `Release`/`Button` transition needs that the FSM itself
/// doesn't track: whether the touch ending this frame was still eligible
/// to tap, and whether every finger is now up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TapEventContext {
    pub touch_still_tapping: bool,
    pub all_fingers_up: bool,
}

fn nfingers_button(nfingers: u8) -> Option<Button> {
    match nfingers {
        1 => Some(Button::Left),
        2 => Some(Button::Right),
        3 => Some(Button::Middle),
        _ => None,
    }
}

/// Global tap FSM state for one touchpad, shared across all its slots.
#[derive(Debug, Clone)]
pub struct TapEngine {
    state: TapState,
    timer_deadline: Option<u64>,
    /// Bit `n` set iff the tap engine currently reports button for
    /// `n` fingers as pressed (mirrors `tp->tap.buttons_pressed`).
    buttons_pressed: u8,
    multitap_last_time: u64,
}

impl Default for TapEngine {
    fn default() -> Self {
        TapEngine {
            state: TapState::Idle,
            timer_deadline: None,
            buttons_pressed: 0,
            multitap_last_time: 0,
        }
    }
}

impl TapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn armed_deadline(&self) -> Option<u64> {
        self.timer_deadline
    }

    /// Invariant 4 (spec §8): `IDLE` implies no timer armed and no
    /// tap-held button.
    pub fn is_idle_and_clean(&self) -> bool {
        self.state == TapState::Idle && self.timer_deadline.is_none() && self.buttons_pressed == 0
    }

    fn notify(&mut self, sink: &mut dyn EventSink, device: DeviceId, time: u64, nfingers: u8, pressed: bool) {
        let Some(button) = nfingers_button(nfingers) else {
            return;
        };
        let bit = 1u8 << nfingers;
        if pressed {
            self.buttons_pressed |= bit;
        } else {
            self.buttons_pressed &= !bit;
        }
        sink.handle_event(SemanticEvent::PointerButton {
            device,
            time,
            button,
            state: if pressed { ButtonState::Pressed } else { ButtonState::Released },
        });
    }

    fn set_timer(&mut self, time: u64) {
        self.timer_deadline = Some(time + TAP_TIMEOUT_MS);
    }

    fn set_drag_timer(&mut self, time: u64) {
        self.timer_deadline = Some(time + DRAG_TIMEOUT_MS);
    }

    fn clear_timer(&mut self) {
        self.timer_deadline = None;
    }

    /// Drive one event through the FSM from its current state.
    pub fn handle_event(&mut self, event: TapEvent, ctx: TapEventContext, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match self.state {
            TapState::Idle => self.on_idle(event, time),
            TapState::Touch => self.on_touch(event, time, device, sink),
            TapState::Hold => self.on_hold(event, time),
            TapState::Tapped => self.on_tapped(event, time, device, sink),
            TapState::Touch2 => self.on_touch2(event, ctx, time, device, sink),
            TapState::Touch2Hold => self.on_touch2_hold(event, time),
            TapState::Touch3 => self.on_touch3(event, ctx, time, device, sink),
            TapState::Touch3Hold => self.on_touch3_hold(event, time),
            TapState::DraggingOrDoubletap => self.on_dragging_or_doubletap(event, time, device, sink),
            TapState::Dragging => self.on_dragging(event, time, device, sink),
            TapState::DraggingWait => self.on_dragging_wait(event, time, device, sink),
            TapState::Dragging2 => self.on_dragging2(event, time, device, sink),
            TapState::Multitap => self.on_multitap(event, time, device, sink),
            TapState::MultitapDown => self.on_multitap_down(event, time, device, sink),
            TapState::Dead => self.on_dead(event, ctx),
        }

        if matches!(self.state, TapState::Idle | TapState::Dead) {
            self.clear_timer();
        }
    }

    fn on_idle(&mut self, event: TapEvent, time: u64) {
        match event {
            TapEvent::Touch => {
                self.state = TapState::Touch;
                self.set_timer(time);
            }
            TapEvent::Release | TapEvent::Timeout => {}
            TapEvent::Motion => {
                InvariantViolation::InternalBug.log("tap MOTION event with no fingers down");
            }
            TapEvent::Button => self.state = TapState::Dead,
        }
    }

    fn on_touch(&mut self, event: TapEvent, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Touch => {
                self.state = TapState::Touch2;
                self.set_timer(time);
            }
            TapEvent::Release => {
                self.state = TapState::Tapped;
                self.notify(sink, device, time, 1, true);
                self.set_timer(time);
            }
            TapEvent::Timeout | TapEvent::Motion => {
                self.state = TapState::Hold;
                self.clear_timer();
            }
            TapEvent::Button => self.state = TapState::Dead,
        }
    }

    fn on_hold(&mut self, event: TapEvent, time: u64) {
        match event {
            TapEvent::Touch => {
                self.state = TapState::Touch2;
                self.set_timer(time);
            }
            TapEvent::Release => self.state = TapState::Idle,
            TapEvent::Motion | TapEvent::Timeout => {}
            TapEvent::Button => self.state = TapState::Dead,
        }
    }

    fn on_tapped(&mut self, event: TapEvent, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Motion | TapEvent::Release => {
                InvariantViolation::InternalBug.log("tap event when fingers are up");
            }
            TapEvent::Touch => {
                self.state = TapState::DraggingOrDoubletap;
                self.set_timer(time);
            }
            TapEvent::Timeout => {
                self.state = TapState::Idle;
                self.notify(sink, device, time, 1, false);
            }
            TapEvent::Button => {
                self.state = TapState::Dead;
                self.notify(sink, device, time, 1, false);
            }
        }
    }

    fn on_touch2(&mut self, event: TapEvent, ctx: TapEventContext, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Touch => {
                self.state = TapState::Touch3;
                self.set_timer(time);
            }
            TapEvent::Release => {
                self.state = TapState::Hold;
                if ctx.touch_still_tapping {
                    self.notify(sink, device, time, 2, true);
                    self.notify(sink, device, time, 2, false);
                }
                self.clear_timer();
            }
            TapEvent::Motion => {
                self.clear_timer();
                self.state = TapState::Touch2Hold;
            }
            TapEvent::Timeout => self.state = TapState::Touch2Hold,
            TapEvent::Button => self.state = TapState::Dead,
        }
    }

    fn on_touch2_hold(&mut self, event: TapEvent, time: u64) {
        match event {
            TapEvent::Touch => {
                self.state = TapState::Touch3;
                self.set_timer(time);
            }
            TapEvent::Release => self.state = TapState::Hold,
            TapEvent::Motion | TapEvent::Timeout => self.state = TapState::Touch2Hold,
            TapEvent::Button => self.state = TapState::Dead,
        }
    }

    fn on_touch3(&mut self, event: TapEvent, ctx: TapEventContext, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Touch => {
                self.state = TapState::Dead;
                self.clear_timer();
            }
            TapEvent::Motion | TapEvent::Timeout => {
                self.state = TapState::Touch3Hold;
                self.clear_timer();
            }
            TapEvent::Release => {
                self.state = TapState::Touch2Hold;
                if ctx.touch_still_tapping {
                    self.notify(sink, device, time, 3, true);
                    self.notify(sink, device, time, 3, false);
                }
            }
            TapEvent::Button => self.state = TapState::Dead,
        }
    }

    fn on_touch3_hold(&mut self, event: TapEvent, time: u64) {
        match event {
            TapEvent::Touch => {
                self.state = TapState::Dead;
                self.set_timer(time);
            }
            TapEvent::Release => self.state = TapState::Touch2Hold,
            TapEvent::Motion | TapEvent::Timeout => {}
            TapEvent::Button => self.state = TapState::Dead,
        }
    }

    fn on_dragging_or_doubletap(&mut self, event: TapEvent, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Touch => self.state = TapState::Dragging2,
            TapEvent::Release => {
                self.state = TapState::Multitap;
                self.notify(sink, device, time, 1, false);
                self.notify(sink, device, time, 1, true);
                self.notify(sink, device, time, 1, false);
            }
            TapEvent::Motion | TapEvent::Timeout => self.state = TapState::Dragging,
            TapEvent::Button => {
                self.state = TapState::Dead;
                self.notify(sink, device, time, 1, false);
            }
        }
    }

    fn on_dragging(&mut self, event: TapEvent, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Touch => self.state = TapState::Dragging2,
            TapEvent::Release => {
                self.state = TapState::DraggingWait;
                self.set_drag_timer(time);
            }
            TapEvent::Motion | TapEvent::Timeout => {}
            TapEvent::Button => {
                self.state = TapState::Dead;
                self.notify(sink, device, time, 1, false);
            }
        }
    }

    fn on_dragging_wait(&mut self, event: TapEvent, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Touch => {
                self.state = TapState::Dragging;
                self.clear_timer();
            }
            TapEvent::Release | TapEvent::Motion => {}
            TapEvent::Timeout => {
                self.state = TapState::Idle;
                self.notify(sink, device, time, 1, false);
            }
            TapEvent::Button => {
                self.state = TapState::Dead;
                self.notify(sink, device, time, 1, false);
            }
        }
    }

    fn on_dragging2(&mut self, event: TapEvent, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Release => self.state = TapState::Dragging,
            TapEvent::Touch => {
                self.state = TapState::Dead;
                self.notify(sink, device, time, 1, false);
            }
            TapEvent::Motion | TapEvent::Timeout => {}
            TapEvent::Button => {
                self.state = TapState::Dead;
                self.notify(sink, device, time, 1, false);
            }
        }
    }

    fn on_multitap(&mut self, event: TapEvent, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Release | TapEvent::Motion => {
                InvariantViolation::InternalBug.log("tap event with no fingers down");
            }
            TapEvent::Touch => {
                self.state = TapState::MultitapDown;
                self.multitap_last_time = time;
                self.notify(sink, device, time, 1, true);
                self.set_timer(time);
            }
            TapEvent::Timeout => self.state = TapState::Idle,
            TapEvent::Button => {
                self.state = TapState::Idle;
                self.clear_timer();
            }
        }
    }

    fn on_multitap_down(&mut self, event: TapEvent, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        match event {
            TapEvent::Release => {
                self.state = TapState::Multitap;
                self.notify(sink, device, time, 1, false);
            }
            TapEvent::Touch => {
                self.state = TapState::Dragging2;
                self.clear_timer();
            }
            TapEvent::Motion | TapEvent::Timeout => {
                self.state = TapState::Dragging;
                self.clear_timer();
            }
            TapEvent::Button => {
                self.state = TapState::Dead;
                self.notify(sink, device, time, 1, false);
                self.clear_timer();
            }
        }
    }

    fn on_dead(&mut self, event: TapEvent, ctx: TapEventContext) {
        if event == TapEvent::Release && ctx.all_fingers_up {
            self.state = TapState::Idle;
        }
    }

    /// Release any synthetic buttons the tap engine is holding and settle
    /// into `DEAD` (a finger is still down, so a lingering touch can't
    /// cause a spurious tap) or `IDLE` (spec §4.3, disable path).
    pub fn disable(&mut self, any_finger_down: bool, time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        for nfingers in 1..=3u8 {
            if self.buttons_pressed & (1 << nfingers) != 0 {
                self.notify(sink, device, time, nfingers, false);
            }
        }
        self.clear_timer();
        self.state = if any_finger_down { TapState::Dead } else { TapState::Idle };
    }
}

/// Filter motion while waiting on a tap-vs-drag decision (spec §4.3: "in
/// any state where motion exceeding the move threshold would move to the
/// next state, filter that motion until we actually exceed it").
pub fn filters_motion(state: TapState) -> bool {
    matches!(
        state,
        TapState::Touch | TapState::Tapped | TapState::DraggingOrDoubletap | TapState::Touch2 | TapState::Touch3 | TapState::MultitapDown
    )
}

/// One slot's transition this frame, derived by the caller from the raw
/// multitouch pipeline (spec §4.3 "Event derivation").
#[derive(Debug, Clone, Copy)]
pub enum SlotTransition {
    Begin { point: (f64, f64), is_palm: bool },
    End,
    Continue { point: (f64, f64) },
}

impl TapEngine {
    /// Drive one SYN frame's worth of per-slot transitions through the FSM,
    /// exactly as `tp_tap_handle_state` does: queued button press first,
    /// then each dirty touch in turn. Returns whether pointer motion should
    /// be filtered this frame (spec §4.3 `filter_motion`).
    #[allow(clippy::too_many_arguments)]
    pub fn process_frame(
        &mut self,
        enabled: bool,
        touches: &mut [TapTouch],
        transitions: &[(usize, SlotTransition)],
        clickpad_button_pressed: bool,
        nfingers_down: usize,
        time: u64,
        device: DeviceId,
        sink: &mut dyn EventSink,
    ) -> bool {
        if !enabled {
            return false;
        }

        if clickpad_button_pressed {
            self.handle_event(TapEvent::Button, TapEventContext::default(), time, device, sink);
        }

        for &(idx, transition) in transitions {
            if clickpad_button_pressed {
                if let Some(t) = touches.get_mut(idx) {
                    t.state = TouchTapState::Dead;
                }
            }

            match transition {
                SlotTransition::Begin { point, is_palm } => {
                    if let Some(t) = touches.get_mut(idx) {
                        t.begin(point);
                    }
                    self.handle_event(TapEvent::Touch, TapEventContext::default(), time, device, sink);
                    if is_palm {
                        self.handle_event(TapEvent::Motion, TapEventContext::default(), time, device, sink);
                    }
                }
                SlotTransition::End => {
                    let touch_still_tapping = touches.get(idx).map(|t| t.state == TouchTapState::Touch).unwrap_or(false);
                    self.handle_event(
                        TapEvent::Release,
                        TapEventContext {
                            touch_still_tapping,
                            all_fingers_up: nfingers_down == 0,
                        },
                        time,
                        device,
                        sink,
                    );
                    if let Some(t) = touches.get_mut(idx) {
                        t.state = TouchTapState::Idle;
                    }
                }
                SlotTransition::Continue { point } => {
                    if let Some(t) = touches.get_mut(idx) {
                        t.update(point);
                        if self.state != TapState::Idle && t.exceeds_motion_threshold() {
                            for other in touches.iter_mut() {
                                if other.state == TouchTapState::Touch {
                                    other.state = TouchTapState::Dead;
                                }
                            }
                            self.handle_event(TapEvent::Motion, TapEventContext::default(), time, device, sink);
                        }
                    }
                }
            }
        }

        filters_motion(self.state)
    }

    /// Drive the armed timer's expiry through the FSM and demote every
    /// still-down touch to `DEAD` (spec §4.3: the timeout always resolves
    /// the ambiguity the FSM was waiting on).
    pub fn process_timeout(&mut self, touches: &mut [TapTouch], time: u64, device: DeviceId, sink: &mut dyn EventSink) {
        self.handle_event(TapEvent::Timeout, TapEventContext::default(), time, device, sink);
        for t in touches.iter_mut() {
            if t.state != TouchTapState::Idle {
                t.state = TouchTapState::Dead;
            }
        }
    }
}
