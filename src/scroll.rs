//! Scroll coordinator: axis-wheel ticks, button-held scroll activation, and
//! the build-up/threshold mechanism shared by every scroll method.

use crate::event::ScrollAxis;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ScrollDirection: u8 {
        const HORIZONTAL = 1 << 0;
        const VERTICAL = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollMethod {
    #[default]
    None,
    TwoFinger,
    Edge,
    Button,
}

/// Default axis build-up threshold (normalized units) before a scroll axis
/// is considered "started".
pub const DEFAULT_THRESHOLD: f64 = 5.0;

/// Deadline after a scroll-button press before the device commits to scroll
/// mode (spec §4.4).
pub const BUTTON_HOLD_DEADLINE_MS: u64 = 200;

#[derive(Debug, Clone, Copy)]
struct ButtonHoldState {
    press_time_ms: u64,
    motion_exceeded: bool,
}

/// Outcome of feeding a hardware button transition into
/// [`ScrollState::on_button`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonScrollOutcome {
    /// This button/method combination isn't the scroll button; the caller
    /// should handle it as an ordinary button event.
    NotRelevant,
    /// The hold deadline was armed; suppress the hardware press until the
    /// deadline or an early release resolves it.
    Armed,
    /// Released before the deadline with no threshold-exceeding motion:
    /// emit a synthetic press+release of the configured button.
    Click,
    /// Released after a live scroll session: the caller should emit a
    /// zero-value axis event per axis returned.
    ScrollEnded(Vec<(ScrollAxis, f64)>),
    /// Released before the deadline, but motion already exceeded the
    /// threshold: neither click nor scroll.
    Suppressed,
}

/// Per-device scroll coordinator state (spec §3, §4.4).
#[derive(Debug, Clone)]
pub struct ScrollState {
    pub method: ScrollMethod,
    /// Requested method, applied to `method` only at an all-buttons-up
    /// boundary (spec §4.1 configuration-mutation gating).
    pub want_method: ScrollMethod,
    pub button: u32,
    pub natural_scroll: bool,
    pub threshold: f64,
    pub active: bool,
    pub direction: ScrollDirection,
    pub buildup_horizontal: f64,
    pub buildup_vertical: f64,
    button_hold: Option<ButtonHoldState>,
}

impl Default for ScrollState {
    fn default() -> Self {
        ScrollState {
            method: ScrollMethod::None,
            want_method: ScrollMethod::None,
            button: crate::event::codes::BTN_MIDDLE,
            natural_scroll: false,
            threshold: DEFAULT_THRESHOLD,
            active: false,
            direction: ScrollDirection::empty(),
            buildup_horizontal: 0.0,
            buildup_vertical: 0.0,
            button_hold: None,
        }
    }
}

impl ScrollState {
    /// Map one discrete wheel tick to a signed axis value (spec: "each tick
    /// maps to a ±10-unit axis event, sign-inverted by the natural-scroll
    /// flag").
    pub fn wheel_tick(&self, raw_value: i32) -> f64 {
        self.sign(raw_value as f64 * 10.0)
    }

    fn sign(&self, value: f64) -> f64 {
        if self.natural_scroll {
            -value
        } else {
            value
        }
    }

    /// Feed a hardware transition of `code` into the button-scroll state
    /// machine. Only meaningful when `method == ScrollMethod::Button` and
    /// `code == self.button`; other combinations return `NotRelevant` so
    /// the caller falls back to ordinary button handling.
    pub fn on_button(&mut self, code: u32, pressed: bool, time_ms: u64) -> ButtonScrollOutcome {
        if self.method != ScrollMethod::Button || code != self.button {
            return ButtonScrollOutcome::NotRelevant;
        }

        if pressed {
            self.button_hold = Some(ButtonHoldState {
                press_time_ms: time_ms,
                motion_exceeded: false,
            });
            return ButtonScrollOutcome::Armed;
        }

        if self.active {
            return ButtonScrollOutcome::ScrollEnded(self.deactivate());
        }

        let exceeded = self.button_hold.map(|h| h.motion_exceeded).unwrap_or(false);
        self.button_hold = None;
        if exceeded {
            ButtonScrollOutcome::Suppressed
        } else {
            ButtonScrollOutcome::Click
        }
    }

    /// Whether the scroll-button hold deadline armed at `press_time_ms` has
    /// elapsed by `now_ms`; `true` means the caller should call
    /// [`Self::activate`].
    pub fn hold_deadline_elapsed(&self, now_ms: u64) -> bool {
        self.button_hold
            .map(|h| now_ms.saturating_sub(h.press_time_ms) >= BUTTON_HOLD_DEADLINE_MS)
            .unwrap_or(false)
    }

    pub fn is_button_armed(&self) -> bool {
        self.button_hold.is_some()
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Promote `want_method` to `method`. Call only at an all-buttons-up
    /// boundary, same as [`crate::config::DeviceConfig::apply_pending`].
    pub fn apply_pending_method(&mut self) {
        self.method = self.want_method;
    }

    /// Divert a motion delta into the build-up/axis mechanism. Before
    /// activation this only feeds the build-up accumulators (used to
    /// decide whether a button release still counts as a click). After
    /// activation it returns the non-zero axis events to emit this frame.
    pub fn divert_motion(&mut self, dx: f64, dy: f64) -> Vec<(ScrollAxis, f64)> {
        self.buildup_horizontal += dx;
        self.buildup_vertical += dy;

        if !self.active {
            if self.buildup_horizontal.abs() >= self.threshold || self.buildup_vertical.abs() >= self.threshold {
                if let Some(hold) = self.button_hold.as_mut() {
                    hold.motion_exceeded = true;
                }
            }
            return Vec::new();
        }

        let mut events = Vec::new();

        if !self.direction.contains(ScrollDirection::VERTICAL) {
            let starts = if self.direction.contains(ScrollDirection::HORIZONTAL) {
                dy.abs() >= self.threshold
            } else {
                self.buildup_vertical.abs() >= self.threshold
            };
            if starts {
                self.direction.insert(ScrollDirection::VERTICAL);
            }
        }
        if self.direction.contains(ScrollDirection::VERTICAL) {
            events.push((ScrollAxis::Vertical, self.sign(self.buildup_vertical)));
            self.buildup_vertical = 0.0;
        }

        if !self.direction.contains(ScrollDirection::HORIZONTAL) {
            let starts = if self.direction.contains(ScrollDirection::VERTICAL) {
                dx.abs() >= self.threshold
            } else {
                self.buildup_horizontal.abs() >= self.threshold
            };
            if starts {
                self.direction.insert(ScrollDirection::HORIZONTAL);
            }
        }
        if self.direction.contains(ScrollDirection::HORIZONTAL) {
            events.push((ScrollAxis::Horizontal, self.sign(self.buildup_horizontal)));
            self.buildup_horizontal = 0.0;
        }

        events
    }

    /// Stop an active scroll session: zero out every axis that was active,
    /// clear direction and build-up, and return the zero events to emit.
    pub fn deactivate(&mut self) -> Vec<(ScrollAxis, f64)> {
        let mut events = Vec::new();
        if self.direction.contains(ScrollDirection::VERTICAL) {
            events.push((ScrollAxis::Vertical, 0.0));
        }
        if self.direction.contains(ScrollDirection::HORIZONTAL) {
            events.push((ScrollAxis::Horizontal, 0.0));
        }
        self.direction = ScrollDirection::empty();
        self.buildup_horizontal = 0.0;
        self.buildup_vertical = 0.0;
        self.active = false;
        self.button_hold = None;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::codes::BTN_MIDDLE;

    #[test]
    fn quick_release_before_deadline_is_a_click() {
        let mut scroll = ScrollState {
            method: ScrollMethod::Button,
            button: BTN_MIDDLE,
            ..Default::default()
        };
        assert_eq!(scroll.on_button(BTN_MIDDLE, true, 0), ButtonScrollOutcome::Armed);
        assert!(!scroll.hold_deadline_elapsed(100));
        assert_eq!(scroll.on_button(BTN_MIDDLE, false, 100), ButtonScrollOutcome::Click);
    }

    #[test]
    fn sustained_hold_past_deadline_scrolls() {
        let mut scroll = ScrollState {
            method: ScrollMethod::Button,
            button: BTN_MIDDLE,
            ..Default::default()
        };
        scroll.on_button(BTN_MIDDLE, true, 0);
        assert!(scroll.hold_deadline_elapsed(300));
        scroll.activate();

        let events = scroll.divert_motion(0.0, 20.0);
        assert_eq!(events, vec![(ScrollAxis::Vertical, 20.0)]);

        match scroll.on_button(BTN_MIDDLE, false, 600) {
            ButtonScrollOutcome::ScrollEnded(ended) => {
                assert_eq!(ended, vec![(ScrollAxis::Vertical, 0.0)]);
            }
            other => panic!("expected ScrollEnded, got {other:?}"),
        }
    }

    #[test]
    fn natural_scroll_inverts_wheel_sign() {
        let normal = ScrollState::default();
        let mut natural = ScrollState::default();
        natural.natural_scroll = true;
        assert_eq!(normal.wheel_tick(1), 10.0);
        assert_eq!(natural.wheel_tick(1), -10.0);
    }

    #[test]
    fn orthogonal_axis_requires_single_event_threshold() {
        let mut scroll = ScrollState::default();
        scroll.activate();
        // vertical starts via accumulated build-up.
        scroll.divert_motion(0.0, 5.0);
        assert!(scroll.direction.contains(ScrollDirection::VERTICAL));
        // horizontal: a single small delta shouldn't start it...
        let events = scroll.divert_motion(2.0, 0.0);
        assert!(!scroll.direction.contains(ScrollDirection::HORIZONTAL));
        assert!(events.iter().all(|(axis, _)| *axis != ScrollAxis::Horizontal));
        // ...but one that meets the threshold in a single event does.
        scroll.divert_motion(5.0, 0.0);
        assert!(scroll.direction.contains(ScrollDirection::HORIZONTAL));
    }
}
