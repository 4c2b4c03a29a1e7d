//! Pointer-acceleration filter contract.
//!
//! Acceleration profile curves are out of scope (spec §1); the engine only
//! depends on this trait. An embedder supplies a concrete [`MotionFilter`]
//! (e.g. a flat/adaptive/custom profile) and the pipeline drives it once per
//! coalesced relative-motion event.

/// A normalized relative motion delta, pre-acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedDelta {
    pub dx: f64,
    pub dy: f64,
}

/// Result of running a [`MotionFilter`] over a [`NormalizedDelta`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilteredMotion {
    /// Accelerated delta, as presented to the pointer.
    pub accelerated: NormalizedDelta,
    /// Delta with acceleration undone (but calibration/normalization still
    /// applied) — what the client would see if no acceleration profile was
    /// active.
    pub unaccelerated: NormalizedDelta,
}

/// Contract for a pointer-acceleration profile.
///
/// Implementations may hold internal state (e.g. a trailing-average
/// velocity estimate) but must be deterministic for a given `(delta, dt)`
/// pair aside from that trailing state.
pub trait MotionFilter {
    /// Apply acceleration to `delta`, observed `dt_ms` after the previous
    /// call (used by velocity-sensitive profiles; `0` on the first call).
    fn filter(&mut self, delta: NormalizedDelta, dt_ms: u32) -> FilteredMotion;

    /// Profile input in `[-1, 1]`, corresponding to `accel.speed`.
    fn set_speed(&mut self, speed: f64);

    fn speed(&self) -> f64;
}

/// A filter that performs no acceleration: accelerated and unaccelerated
/// deltas are identical. Used as the engine's default and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatMotionFilter {
    speed: f64,
}

impl MotionFilter for FlatMotionFilter {
    fn filter(&mut self, delta: NormalizedDelta, _dt_ms: u32) -> FilteredMotion {
        FilteredMotion {
            accelerated: delta,
            unaccelerated: delta,
        }
    }

    fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(-1.0, 1.0);
    }

    fn speed(&self) -> f64 {
        self.speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_filter_passes_delta_through() {
        let mut filter = FlatMotionFilter::default();
        let result = filter.filter(NormalizedDelta { dx: 1.5, dy: -2.0 }, 8);
        assert_eq!(result.accelerated, result.unaccelerated);
        assert_eq!(result.accelerated.dx, 1.5);
    }

    #[test]
    fn speed_clamps_to_unit_range() {
        let mut filter = FlatMotionFilter::default();
        filter.set_speed(4.0);
        assert_eq!(filter.speed(), 1.0);
        filter.set_speed(-4.0);
        assert_eq!(filter.speed(), -1.0);
    }
}
