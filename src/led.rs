//! LED propagation (SPEC_FULL supplement, grounded on `evdev_device_led_update`
//! in `examples/original_source/src/evdev.c`): lock-key transitions on one
//! keyboard should light the same LED on every keyboard sharing a seat.
//! Actually driving an `EV_LED` write to a kernel device is an external
//! collaborator's job (out of scope, like device enumeration); the engine
//! only owns the trait boundary and a no-op default.

/// The three lock-key LEDs evdev keyboards commonly expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Led {
    NumLock,
    CapsLock,
    ScrollLock,
}

/// Sink for LED state changes, implemented by the embedder to fan a
/// lock-key toggle out to every keyboard on the seat.
pub trait LedState {
    fn set_led(&mut self, led: Led, on: bool);
}

/// Default sink: drops every LED change. Used when the embedder doesn't
/// care to propagate LED state (e.g. headless testing).
#[derive(Debug, Default)]
pub struct NoopLed;

impl LedState for NoopLed {
    fn set_led(&mut self, _led: Led, _on: bool) {}
}

/// Map a lock-key code transition to the LED it toggles, if any.
pub fn led_for_key_code(code: u32) -> Option<Led> {
    match code {
        crate::event::codes::KEY_NUMLOCK => Some(Led::NumLock),
        crate::event::codes::KEY_CAPSLOCK => Some(Led::CapsLock),
        crate::event::codes::KEY_SCROLLLOCK => Some(Led::ScrollLock),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<(Led, bool)>);
    impl LedState for Recorder {
        fn set_led(&mut self, led: Led, on: bool) {
            self.0.push((led, on));
        }
    }

    #[test]
    fn noop_led_drops_everything() {
        let mut led = NoopLed;
        led.set_led(Led::CapsLock, true);
    }

    #[test]
    fn recorder_observes_toggles() {
        let mut rec = Recorder::default();
        rec.set_led(Led::NumLock, true);
        rec.set_led(Led::NumLock, false);
        assert_eq!(rec.0, vec![(Led::NumLock, true), (Led::NumLock, false)]);
    }

    #[test]
    fn led_for_key_code_recognizes_lock_keys() {
        assert_eq!(led_for_key_code(crate::event::codes::KEY_CAPSLOCK), Some(Led::CapsLock));
        assert_eq!(led_for_key_code(crate::event::codes::BTN_LEFT), None);
    }
}
