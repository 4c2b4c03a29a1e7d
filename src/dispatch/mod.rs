//! Polymorphic per-device dispatch (spec §4.6): a touchpad's extra gesture
//! logic (tap-to-click, palm-injected motion) layers on top of the same
//! pipeline fallback devices use. A tagged sum is used in place of a trait
//! object, per the "prefer a tagged sum over dynamic dispatch" guidance —
//! there are exactly two variants and neither needs independent compilation.

pub mod fallback;
pub mod touchpad;

use crate::device::Device;
use crate::event::{EventSink, RawEvent};
use crate::seat::Seat;
use fallback::FallbackDispatch;
use touchpad::TouchpadDispatch;

/// One device's dispatch-specific extra state, selected once at device-add
/// time per [`crate::device::Device::is_touchpad_like`].
pub enum DeviceDispatch {
    Fallback(FallbackDispatch),
    Touchpad(TouchpadDispatch),
}

impl DeviceDispatch {
    /// Select the dispatch variant per spec §4.6's rule, defaulting new
    /// touchpads to clickpad behavior (no separate physical buttons) —
    /// callers with a separate-button touchpad should build
    /// [`TouchpadDispatch`] directly and pass `clickpad: false`.
    pub fn for_device(device: &Device) -> Self {
        if device.is_touchpad_like() {
            DeviceDispatch::Touchpad(TouchpadDispatch::new(device.slots.len(), true))
        } else {
            DeviceDispatch::Fallback(FallbackDispatch::new())
        }
    }

    pub fn ingest(&mut self, device: &mut Device, seat: &mut Seat, event: RawEvent, sink: &mut dyn EventSink) {
        match self {
            DeviceDispatch::Fallback(d) => d.ingest(device, seat, event, sink),
            DeviceDispatch::Touchpad(d) => d.ingest(device, seat, event, sink),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AbsInfo, DeviceCapability, Identity};
    use crate::event::DeviceId;

    #[test]
    fn mouse_gets_fallback_dispatch() {
        let abs = AbsInfo { min: 0, max: 0, resolution: 0, fake_resolution: true };
        let device = Device::new(DeviceId(0), Identity { name: "mouse".into(), vendor: 0, product: 0, bustype: 0 }, DeviceCapability::POINTER, abs, abs, 0, 1000);
        assert!(matches!(DeviceDispatch::for_device(&device), DeviceDispatch::Fallback(_)));
    }

    #[test]
    fn indirect_multitouch_device_gets_touchpad_dispatch() {
        let abs = AbsInfo { min: 0, max: 3000, resolution: 40, fake_resolution: false };
        let device = Device::new(
            DeviceId(1),
            Identity { name: "touchpad".into(), vendor: 0, product: 0, bustype: 0 },
            DeviceCapability::TOUCH | DeviceCapability::POINTER,
            abs,
            abs,
            5,
            1000,
        );
        assert!(matches!(DeviceDispatch::for_device(&device), DeviceDispatch::Touchpad(_)));
    }
}
