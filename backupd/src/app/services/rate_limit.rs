// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

/// Fixed-window request counter keyed by job id.
///
/// Windows are aligned to multiples of the window length since the Unix
/// epoch, so every key shares the same boundaries.
pub struct FixedWindowRateLimiter {
    limit: u32,
    window_secs: i64,
    windows: Mutex<HashMap<i64, (i64, u32)>>,
}

impl FixedWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window_secs: i64::try_from(window.as_secs()).unwrap_or(i64::MAX).max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request for `key` at `now`.
    pub fn check(&self, key: i64, now: OffsetDateTime) -> RateDecision {
        let ts = now.unix_timestamp();
        let window_start = ts.div_euclid(self.window_secs) * self.window_secs;
        let mut windows = self.windows.lock();
        windows.retain(|_, (start, _)| *start == window_start);
        let entry = windows.entry(key).or_insert((window_start, 0));
        if entry.1 >= self.limit {
            let retry_after = (window_start + self.window_secs - ts).max(1);
            return RateDecision::Limited {
                retry_after_secs: retry_after as u64,
            };
        }
        entry.1 += 1;
        RateDecision::Allowed {
            remaining: self.limit - entry.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn limits_within_a_window_and_resets_on_the_next() {
        let limiter = FixedWindowRateLimiter::new(3, Duration::from_secs(60));
        let start = datetime!(2026-06-01 10:00:05 UTC);
        for expected in [2, 1, 0] {
            assert_eq!(
                limiter.check(7, start),
                RateDecision::Allowed {
                    remaining: expected
                }
            );
        }
        assert_eq!(
            limiter.check(7, start + time::Duration::seconds(10)),
            RateDecision::Limited {
                retry_after_secs: 45
            }
        );
        assert!(matches!(
            limiter.check(7, datetime!(2026-06-01 10:01:00 UTC)),
            RateDecision::Allowed { remaining: 2 }
        ));
    }

    #[test]
    fn keys_are_counted_separately() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60));
        let now = datetime!(2026-06-01 10:00:00 UTC);
        assert!(matches!(limiter.check(1, now), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check(2, now), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check(1, now), RateDecision::Limited { .. }));
    }
}
