//! Multitouch slot array: per-device tracking of protocol-B `ABS_MT_SLOT`
//! touch points and their seat-slot allocation.

/// One hardware multitouch slot's tracked state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MtSlot {
    pub x: f64,
    pub y: f64,
    /// The seat slot this device slot currently owns, or `None` if the
    /// slot is inactive (no finger currently tracked, or the seat ran out
    /// of free slots at touch-down time).
    pub seat_slot: Option<u32>,
}

/// The fixed-size array of multitouch slots for one device, plus which one
/// `ABS_MT_SLOT` currently points at.
#[derive(Debug, Clone)]
pub struct SlotArray {
    slots: Vec<MtSlot>,
    current: usize,
}

impl SlotArray {
    /// `num_slots` comes from the device's `ABS_MT_SLOT` absinfo maximum.
    pub fn new(num_slots: usize) -> Self {
        SlotArray {
            slots: vec![MtSlot::default(); num_slots.max(1)],
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Select the slot addressed by subsequent `ABS_MT_POSITION_*` /
    /// `ABS_MT_TRACKING_ID` events.
    pub fn set_current(&mut self, index: usize) {
        if index < self.slots.len() {
            self.current = index;
        }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &MtSlot {
        &self.slots[self.current]
    }

    pub fn current_mut(&mut self) -> &mut MtSlot {
        &mut self.slots[self.current]
    }

    pub fn get(&self, index: usize) -> Option<&MtSlot> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MtSlot> {
        self.slots.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &MtSlot)> {
        self.slots.iter().enumerate()
    }

    /// Any slot still owning a seat slot — used when a device is removed
    /// to know which seat slots must be released.
    pub fn active_seat_slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.iter().filter_map(|s| s.seat_slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_current_out_of_range_is_ignored() {
        let mut slots = SlotArray::new(4);
        slots.set_current(2);
        assert_eq!(slots.current_index(), 2);
        slots.set_current(99);
        assert_eq!(slots.current_index(), 2);
    }

    #[test]
    fn active_seat_slots_reports_only_assigned() {
        let mut slots = SlotArray::new(2);
        slots.set_current(0);
        slots.current_mut().seat_slot = Some(3);
        let active: Vec<u32> = slots.active_seat_slots().collect();
        assert_eq!(active, vec![3]);
    }
}
