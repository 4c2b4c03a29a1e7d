//! Per-device state: hardware key bitmaps, multitouch slot arrays, the
//! pending-event accumulator, calibration, and the other per-device facets
//! listed in spec §3.

pub mod keys;
pub mod mt;

use crate::config::DeviceConfig;
use crate::event::{codes, DeviceId, PendingEvent};
use crate::filter::{FlatMotionFilter, MotionFilter};
use crate::matrix::Calibration;
use crate::scroll::ScrollState;
use keys::KeyState;
use mt::SlotArray;

bitflags::bitflags! {
    /// Capabilities a device exposes, mirroring libinput's
    /// `LIBINPUT_DEVICE_CAP_*` set restricted to what spec §1 scopes in.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DeviceCapability: u8 {
        const POINTER = 1 << 0;
        const KEYBOARD = 1 << 1;
        const TOUCH = 1 << 2;
    }
}

/// Identity fields read from the kernel device node at add time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub vendor: u16,
    pub product: u16,
    pub bustype: u16,
}

/// Absolute-axis descriptor for `ABS_X`/`ABS_Y` (and their `ABS_MT_*`
/// counterparts, which share the same descriptor on protocol-B devices).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsInfo {
    pub min: i32,
    pub max: i32,
    pub resolution: i32,
    /// Set when the kernel did not report a resolution and the engine
    /// substituted a guessed one — calibration math still works, but DPI
    /// derived from it should be treated with suspicion, exactly as
    /// libinput flags `fake_resolution` devices.
    pub fake_resolution: bool,
}

impl AbsInfo {
    pub fn span(&self) -> f64 {
        (self.max - self.min).max(1) as f64
    }
}

/// One opened input node and all mutable state the pipeline and dispatch
/// layer need to process its events.
pub struct Device {
    pub id: DeviceId,
    pub capabilities: DeviceCapability,
    pub identity: Identity,
    pub abs_x: AbsInfo,
    pub abs_y: AbsInfo,

    pub slots: SlotArray,
    pub keys: KeyState,
    pub pending: PendingEvent,

    /// Accumulated relative delta since the last flush.
    pub rel_dx: f64,
    pub rel_dy: f64,
    /// Current absolute position for non-multitouch `ABS_X`/`ABS_Y`
    /// devices (plain touchscreens and absolute pointers).
    pub abs_x_value: f64,
    pub abs_y_value: f64,

    pub calibration: Calibration,
    pub dpi: u32,

    pub scroll: ScrollState,
    pub config: DeviceConfig,

    pub filter: Box<dyn MotionFilter>,

    pub suspended: bool,
    pub removed: bool,
    pub direct_input: bool,

    /// The single non-multitouch touch slot's seat-slot allocation, for
    /// `ABSOLUTE_TOUCH_*` pending events on single-touch touchscreens.
    pub single_touch_seat_slot: Option<u32>,

    /// Last time (ms) a frame was processed, used to feed `dt_ms` into the
    /// motion filter.
    pub last_frame_time: u64,

    last_syn_dropped_rate_limit: crate::ratelimit::RateLimiter,

    /// Bitmask of currently-on lock-key LEDs, flipped on each press edge
    /// (spec supplement: LED propagation, see [`crate::led`]).
    led_on: u8,
}

impl Device {
    pub fn new(id: DeviceId, identity: Identity, capabilities: DeviceCapability, abs_x: AbsInfo, abs_y: AbsInfo, num_mt_slots: usize, dpi: u32) -> Self {
        let touchpad_like = capabilities.contains(DeviceCapability::TOUCH) && num_mt_slots >= 1;
        let reports_btn_left = capabilities.contains(DeviceCapability::POINTER) && !touchpad_like;
        let tap_default = !reports_btn_left;

        Device {
            id,
            capabilities,
            identity,
            abs_x,
            abs_y,
            slots: SlotArray::new(num_mt_slots),
            keys: KeyState::new(),
            pending: PendingEvent::None,
            rel_dx: 0.0,
            rel_dy: 0.0,
            abs_x_value: 0.0,
            abs_y_value: 0.0,
            calibration: Calibration::new(abs_x.span(), abs_y.span()),
            dpi,
            scroll: ScrollState::default(),
            config: DeviceConfig::new(tap_default),
            filter: Box::new(FlatMotionFilter::default()),
            suspended: false,
            removed: false,
            direct_input: false,
            single_touch_seat_slot: None,
            last_frame_time: 0,
            last_syn_dropped_rate_limit: crate::ratelimit::RateLimiter::syn_dropped_default(),
            led_on: 0,
        }
    }

    /// Flip the tracked on/off state for `led` and return the new state.
    pub fn toggle_led(&mut self, led: crate::led::Led) -> bool {
        let bit = 1u8 << (led as u8);
        self.led_on ^= bit;
        self.led_on & bit != 0
    }

    pub fn has_capability(&self, cap: DeviceCapability) -> bool {
        self.capabilities.contains(cap)
    }

    pub fn is_multitouch(&self) -> bool {
        self.has_capability(DeviceCapability::TOUCH) && self.slots.len() > 1
    }

    /// Test the `SYN_DROPPED` warning rate limiter at `time_ms`, per spec
    /// §4.1 ("rate-limits the user-visible warning ≤ 5 per 30 s").
    pub fn test_syn_dropped_rate_limit(&mut self, time_ms: u64) -> crate::ratelimit::RateLimitVerdict {
        self.last_syn_dropped_rate_limit.test(time_ms)
    }

    /// Whether `BTN_LEFT` is among this device's reportable codes — used
    /// by the configuration default for `tap.enabled` (spec §6: "default =
    /// true iff device lacks BTN_LEFT").
    pub fn reports_btn_left(&self) -> bool {
        self.has_capability(DeviceCapability::POINTER) && !self.is_touchpad_like()
    }

    /// Selection rule for touchpad-vs-fallback dispatch (spec §4.6):
    /// lacks `INPUT_PROP_DIRECT`, has `BTN_TOOL_FINGER`, lacks
    /// `BTN_TOOL_PEN`, and has absolute or MT axes.
    pub fn is_touchpad_like(&self) -> bool {
        self.has_capability(DeviceCapability::TOUCH) && self.slots.len() >= 1 && !self.is_direct_input()
    }

    /// `INPUT_PROP_DIRECT` devices (touchscreens) report coordinates that
    /// map directly onto a display; touchpads are indirect (relative to a
    /// pointer). Tracked here as a plain flag rather than re-deriving from
    /// `BTN_TOOL_PEN`/`BTN_TOOL_FINGER`, which the embedder already
    /// resolved when constructing the device.
    pub fn is_direct_input(&self) -> bool {
        self.direct_input
    }

    pub fn normalize_rel(&self, dx: f64, dy: f64) -> (f64, f64) {
        let scale = 1000.0 / self.dpi.max(1) as f64;
        (dx * scale, dy * scale)
    }

    /// Convert a raw `ABS_MT_POSITION_{X,Y}` point to the 1000-dpi-reference
    /// normalized space the tap FSM's motion threshold is expressed in
    /// (spec §4.3: "3 mm in normalized coordinates"), using the axis
    /// resolution (units/mm) reported by the kernel.
    pub fn normalize_mt_point(&self, x: f64, y: f64) -> (f64, f64) {
        let res_x = if self.abs_x.resolution > 0 { self.abs_x.resolution as f64 } else { 1.0 };
        let res_y = if self.abs_y.resolution > 0 { self.abs_y.resolution as f64 } else { 1.0 };
        (x / res_x * crate::tap::touch::NORMALIZED_UNITS_PER_MM, y / res_y * crate::tap::touch::NORMALIZED_UNITS_PER_MM)
    }
}

impl Device {
    pub fn with_direct_input(mut self, direct: bool) -> Self {
        self.direct_input = direct;
        self
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("capabilities", &self.capabilities)
            .field("suspended", &self.suspended)
            .field("removed", &self.removed)
            .finish()
    }
}

pub(crate) fn key_value_is_autorepeat(value: i32) -> bool {
    value == codes::KEY_VALUE_AUTOREPEAT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_device(caps: DeviceCapability, mt_slots: usize) -> Device {
        let abs = AbsInfo {
            min: 0,
            max: 3000,
            resolution: 40,
            fake_resolution: false,
        };
        Device::new(
            DeviceId(0),
            Identity {
                name: "test device".into(),
                vendor: 0x1234,
                product: 0x5678,
                bustype: 0x03,
            },
            caps,
            abs,
            abs,
            mt_slots,
            1000,
        )
    }

    #[test]
    fn multitouch_requires_more_than_one_slot() {
        let single = test_device(DeviceCapability::TOUCH, 1);
        assert!(!single.is_multitouch());
        let multi = test_device(DeviceCapability::TOUCH, 5);
        assert!(multi.is_multitouch());
    }

    #[test]
    fn normalize_rel_scales_to_reference_dpi() {
        let device = test_device(DeviceCapability::POINTER, 0);
        let (dx, dy) = device.normalize_rel(2000.0, 1000.0);
        assert!((dx - 2000.0).abs() < 1e-9);
        assert!((dy - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn touchpad_like_requires_touch_and_indirect_input() {
        let touchpad = test_device(DeviceCapability::TOUCH | DeviceCapability::POINTER, 5);
        assert!(touchpad.is_touchpad_like());
        let touchscreen = test_device(DeviceCapability::TOUCH, 1).with_direct_input(true);
        assert!(!touchscreen.is_touchpad_like());
    }
}
