//! Pure rate-limiter value type, used to throttle the `SYN_DROPPED`
//! user-visible warning to at most `budget` occurrences per `window_ms`.

/// Outcome of a [`RateLimiter::test`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitVerdict {
    /// Still within budget; the caller should act on the event (e.g. log
    /// it).
    Pass,
    /// This call consumed the last token in the current window; the caller
    /// should act on the event but may want to note that further ones will
    /// be suppressed.
    Threshold,
    /// Budget exhausted for the current window; the caller should drop the
    /// event silently.
    Exceeded,
}

/// A fixed-window token-bucket limiter, driven entirely by caller-supplied
/// timestamps so it stays deterministic and testable (the engine never
/// calls into wall-clock time directly; all timestamps originate from
/// kernel event records).
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    window_ms: u64,
    budget: u32,
    tokens_used: u32,
    window_started_at: Option<u64>,
}

impl RateLimiter {
    pub fn new(window_ms: u64, budget: u32) -> Self {
        RateLimiter {
            window_ms,
            budget,
            tokens_used: 0,
            window_started_at: None,
        }
    }

    /// The limiter libinput itself uses for the `SYN_DROPPED` warning: at
    /// most 5 messages per 30 second window.
    pub fn syn_dropped_default() -> Self {
        Self::new(30_000, 5)
    }

    /// Consume one token at `time_ms`, rolling the window over if expired.
    pub fn test(&mut self, time_ms: u64) -> RateLimitVerdict {
        match self.window_started_at {
            Some(started) if time_ms.saturating_sub(started) < self.window_ms => {}
            _ => {
                self.window_started_at = Some(time_ms);
                self.tokens_used = 0;
            }
        }

        if self.tokens_used >= self.budget {
            return RateLimitVerdict::Exceeded;
        }

        self.tokens_used += 1;
        if self.tokens_used >= self.budget {
            RateLimitVerdict::Threshold
        } else {
            RateLimitVerdict::Pass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_until_budget_exhausted() {
        let mut rl = RateLimiter::new(30_000, 5);
        for _ in 0..4 {
            assert_eq!(rl.test(0), RateLimitVerdict::Pass);
        }
        assert_eq!(rl.test(0), RateLimitVerdict::Threshold);
        assert_eq!(rl.test(0), RateLimitVerdict::Exceeded);
    }

    #[test]
    fn window_resets_after_expiry() {
        let mut rl = RateLimiter::new(30_000, 1);
        assert_eq!(rl.test(0), RateLimitVerdict::Threshold);
        assert_eq!(rl.test(100), RateLimitVerdict::Exceeded);
        assert_eq!(rl.test(30_001), RateLimitVerdict::Threshold);
    }
}
