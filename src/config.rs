//! Per-device configuration facet (spec §6). The engine receives a typed
//! configuration value from an external collaborator; it never reads CLI
//! flags, environment variables, or persisted state directly.

/// `send_events.mode` (spec §6): `Disabled` triggers device suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendEventsMode {
    #[default]
    Enabled,
    Disabled,
}

/// One device's configuration, split into values that take effect
/// immediately (`tap`, `natural_scroll`, `send_events`, `accel`,
/// `calibration`) and `left_handed`, which is asynchronous (spec §4.1
/// configuration-mutation gating). The scroll *method* and *button* have
/// the same want/current split but live on [`crate::scroll::ScrollState`]
/// since that's what actually consumes them; all are promoted together at
/// the same all-buttons-up boundary.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub tap_enabled: bool,
    pub natural_scroll: bool,
    pub send_events: SendEventsMode,
    /// Pointer-acceleration profile input, clamped to `[-1, 1]`.
    pub accel_speed: f64,
    pub calibration_matrix: [f64; 6],

    left_handed_current: bool,
    left_handed_wanted: bool,
}

impl DeviceConfig {
    /// `tap.enabled` defaults to true iff the device lacks `BTN_LEFT` (spec
    /// §6) — callers derive the default from `Device::reports_btn_left`.
    pub fn new(tap_default: bool) -> Self {
        DeviceConfig {
            tap_enabled: tap_default,
            natural_scroll: false,
            send_events: SendEventsMode::Enabled,
            accel_speed: 0.0,
            calibration_matrix: crate::matrix::Matrix3::IDENTITY.coefficients(),
            left_handed_current: false,
            left_handed_wanted: false,
        }
    }

    pub fn set_accel_speed(&mut self, speed: f64) {
        self.accel_speed = speed.clamp(-1.0, 1.0);
    }

    /// Reads return the *wanted* value, not the effective one (spec §5).
    pub fn left_handed_wanted(&self) -> bool {
        self.left_handed_wanted
    }

    pub fn left_handed_current(&self) -> bool {
        self.left_handed_current
    }

    pub fn request_left_handed(&mut self, wanted: bool) {
        self.left_handed_wanted = wanted;
    }

    /// Promote `left_handed_wanted` to current. Call only at an
    /// all-buttons-up boundary (spec §4.1: "applied only when no hardware
    /// button is currently down; the check is performed on every button
    /// release").
    pub fn apply_pending(&mut self) {
        self.left_handed_current = self.left_handed_wanted;
    }

    pub fn has_pending_changes(&self) -> bool {
        self.left_handed_current != self.left_handed_wanted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_return_wanted_not_effective() {
        let mut cfg = DeviceConfig::new(true);
        cfg.request_left_handed(true);
        assert!(cfg.left_handed_wanted());
        assert!(!cfg.left_handed_current());
        cfg.apply_pending();
        assert!(cfg.left_handed_current());
    }

    #[test]
    fn accel_speed_clamps_to_unit_range() {
        let mut cfg = DeviceConfig::new(false);
        cfg.set_accel_speed(5.0);
        assert_eq!(cfg.accel_speed, 1.0);
        cfg.set_accel_speed(-5.0);
        assert_eq!(cfg.accel_speed, -1.0);
    }

    #[test]
    fn pending_changes_detected_until_applied() {
        let mut cfg = DeviceConfig::new(false);
        assert!(!cfg.has_pending_changes());
        cfg.request_left_handed(true);
        assert!(cfg.has_pending_changes());
        cfg.apply_pending();
        assert!(!cfg.has_pending_changes());
    }
}
