//! Seat-level touch-slot allocation: a bitmap of 32 seat slots shared by
//! every multitouch device attached to the seat, so two touchscreens can't
//! collide on the same client-visible slot number.

use crate::event::DeviceId;
use crate::led::{LedState, NoopLed};

/// Maximum number of concurrently tracked touches across all devices on a
/// seat (spec §3: "seat-wide touch-slot bitmap, 32 slots").
pub const MAX_SEAT_SLOTS: u32 = 32;

/// Owns the seat-wide touch-slot bitmap and the set of devices currently
/// attached.
pub struct Seat {
    name: String,
    allocated: u32,
    devices: Vec<DeviceId>,
    led: Box<dyn LedState>,
}

impl std::fmt::Debug for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seat").field("name", &self.name).field("allocated", &self.allocated).field("devices", &self.devices).finish()
    }
}

impl Seat {
    pub fn new(name: impl Into<String>) -> Self {
        Seat {
            name: name.into(),
            allocated: 0,
            devices: Vec::new(),
            led: Box::new(NoopLed),
        }
    }

    /// Install the embedder's LED sink, fanning lock-key toggles out to
    /// every keyboard on this seat.
    pub fn set_led_sink(&mut self, led: Box<dyn LedState>) {
        self.led = led;
    }

    pub fn notify_led(&mut self, led: crate::led::Led, on: bool) {
        self.led.set_led(led, on);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_device(&mut self, id: DeviceId) {
        if !self.devices.contains(&id) {
            self.devices.push(id);
        }
    }

    pub fn remove_device(&mut self, id: DeviceId) {
        self.devices.retain(|&d| d != id);
    }

    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    /// Allocate the lowest free seat slot, or `None` if all
    /// [`MAX_SEAT_SLOTS`] are in use — a touch that can't get a slot is
    /// simply not tracked, matching libinput's `seat_slot` exhaustion
    /// behavior.
    pub fn allocate_slot(&mut self) -> Option<u32> {
        for bit in 0..MAX_SEAT_SLOTS {
            if self.allocated & (1 << bit) == 0 {
                self.allocated |= 1 << bit;
                return Some(bit);
            }
        }
        None
    }

    pub fn release_slot(&mut self, slot: u32) {
        if slot < MAX_SEAT_SLOTS {
            self.allocated &= !(1 << slot);
        }
    }

    pub fn is_slot_allocated(&self, slot: u32) -> bool {
        slot < MAX_SEAT_SLOTS && self.allocated & (1 << slot) != 0
    }

    pub fn allocated_count(&self) -> u32 {
        self.allocated.count_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_slot() {
        let mut seat = Seat::new("seat0");
        assert_eq!(seat.allocate_slot(), Some(0));
        assert_eq!(seat.allocate_slot(), Some(1));
        seat.release_slot(0);
        assert_eq!(seat.allocate_slot(), Some(0));
    }

    #[test]
    fn exhausts_after_max_seat_slots() {
        let mut seat = Seat::new("seat0");
        for _ in 0..MAX_SEAT_SLOTS {
            assert!(seat.allocate_slot().is_some());
        }
        assert_eq!(seat.allocate_slot(), None);
    }

    #[test]
    fn device_membership_is_a_set() {
        let mut seat = Seat::new("seat0");
        seat.add_device(DeviceId(1));
        seat.add_device(DeviceId(1));
        assert_eq!(seat.devices(), &[DeviceId(1)]);
        seat.remove_device(DeviceId(1));
        assert!(seat.devices().is_empty());
    }
}
