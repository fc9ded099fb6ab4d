//! Fixed-window message limiter.

use chrono::{DateTime, Utc};

use crate::bot::user::RateLimitState;
use crate::config::{RateLimitConfig, RateTier};

/// Pick the tier for a caller. Moderators share the default tier.
pub fn tier(config: &RateLimitConfig, is_admin: bool) -> RateTier {
    if is_admin { config.admin } else { config.default }
}

/// Count one message against the window.
///
/// The window restarts once more than `window_seconds` have passed since
/// `last_reset`. A rejected message is not counted.
pub fn check(state: &mut RateLimitState, tier: RateTier, now: DateTime<Utc>) -> bool {
    if (now - state.last_reset).num_milliseconds() > tier.window_seconds * 1000 {
        state.count = 0;
        state.last_reset = now;
    }
    if state.count >= tier.limit {
        return false;
    }
    state.count += 1;
    true
}
