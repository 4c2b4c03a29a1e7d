//! Hardware key/button state: a bitmap tracking which codes are currently
//! down, plus a saturating press-count per code used to collapse
//! autorepeat and multi-source presses (e.g. two physical keys mapping to
//! the same code) into a single 0↔1 edge.
//!
//! Mirrors `hw_key_mask`/`key_count`/`update_key_down_count` in
//! `evdev.c`: the bitmap and the counts are deliberately separate, since a
//! code can be "down" while its count is any positive number.

use crate::error::InvariantViolation;

/// Number of distinct key/button codes tracked, matching evdev's `KEY_CNT`.
pub const KEY_CNT: usize = 768;

const WORD_BITS: usize = u64::BITS as usize;
const WORDS: usize = KEY_CNT.div_ceil(WORD_BITS);

/// Result of feeding one press/release into [`KeyState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    /// Count was 0, is now 1: notify the client of a press.
    Pressed,
    /// Count was 1, is now 0: notify the client of a release.
    Released,
    /// Interior transition (still held, or a release with count already 0):
    /// nothing to notify.
    None,
}

/// Hardware key-state bitmap and per-code press-count array for one device.
#[derive(Debug, Clone)]
pub struct KeyState {
    hw_mask: [u64; WORDS],
    counts: Box<[u32; KEY_CNT]>,
}

impl Default for KeyState {
    fn default() -> Self {
        KeyState {
            hw_mask: [0; WORDS],
            counts: Box::new([0; KEY_CNT]),
        }
    }
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_down(&self, code: u32) -> bool {
        let code = code as usize;
        if code >= KEY_CNT {
            return false;
        }
        self.hw_mask[code / WORD_BITS] & (1 << (code % WORD_BITS)) != 0
    }

    fn set_bit(&mut self, code: usize, value: bool) {
        let word = &mut self.hw_mask[code / WORD_BITS];
        let mask = 1u64 << (code % WORD_BITS);
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Current press count for `code` (0 if never pressed or out of
    /// range).
    pub fn count(&self, code: u32) -> u32 {
        self.counts.get(code as usize).copied().unwrap_or(0)
    }

    /// Apply a press (`pressed = true`) or release (`pressed = false`) of
    /// `code`, updating the hardware bitmap and the press count, and
    /// returning whether this is a 0↔1 edge the client should be told
    /// about.
    ///
    /// A release when the count is already 0 is silently dropped (clamped,
    /// not underflowed). A count climbing past 32 is logged as an
    /// internal-bug warning but does not panic.
    pub fn apply(&mut self, code: u32, pressed: bool) -> KeyEdge {
        let idx = code as usize;
        if idx >= KEY_CNT {
            return KeyEdge::None;
        }

        self.set_bit(idx, pressed);

        let count = &mut self.counts[idx];
        if pressed {
            *count += 1;
            if *count > 32 {
                InvariantViolation::InternalBug
                    .log(&format!("key count for code {code} reached abnormal values"));
            }
            if *count == 1 {
                KeyEdge::Pressed
            } else {
                KeyEdge::None
            }
        } else {
            if *count == 0 {
                return KeyEdge::None;
            }
            *count -= 1;
            if *count == 0 {
                KeyEdge::Released
            } else {
                KeyEdge::None
            }
        }
    }

    /// Every code currently down, in ascending order — used to synthesize
    /// releases on suspend.
    pub fn down_codes(&self) -> Vec<u32> {
        (0..KEY_CNT as u32).filter(|&c| self.count(c) > 0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_press_release_edges() {
        let mut keys = KeyState::new();
        assert_eq!(keys.apply(30, true), KeyEdge::Pressed);
        assert!(keys.is_down(30));
        assert_eq!(keys.apply(30, false), KeyEdge::Released);
        assert!(!keys.is_down(30));
    }

    #[test]
    fn repeated_press_only_edges_once() {
        let mut keys = KeyState::new();
        assert_eq!(keys.apply(1, true), KeyEdge::Pressed);
        assert_eq!(keys.apply(1, true), KeyEdge::None);
        assert_eq!(keys.apply(1, true), KeyEdge::None);
        assert_eq!(keys.apply(1, false), KeyEdge::None);
        assert_eq!(keys.apply(1, false), KeyEdge::Released);
    }

    #[test]
    fn release_without_press_is_dropped_not_underflowed() {
        let mut keys = KeyState::new();
        assert_eq!(keys.apply(5, false), KeyEdge::None);
        assert_eq!(keys.count(5), 0);
    }

    #[test]
    fn down_codes_lists_held_keys() {
        let mut keys = KeyState::new();
        keys.apply(2, true);
        keys.apply(9, true);
        assert_eq!(keys.down_codes(), vec![2, 9]);
    }
}
