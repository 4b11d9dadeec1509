//! Clock-skew tolerant validity windows.
//!
//! A checkpoint device and the issuing server do not share a clock, so every
//! validation path widens the claimed window by a tolerance it is handed
//! (online checks and offline devices use different values).

use chrono::{DateTime, Duration, Utc};

/// `now` is in range iff `valid_from - skew <= now <= valid_to + skew`.
///
/// A tolerance or widened bound chrono cannot represent is out of range.
pub fn is_within_window(
    now: DateTime<Utc>,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    skew_minutes: i64,
) -> bool {
    let Some(skew) = Duration::try_minutes(skew_minutes) else {
        return false;
    };
    match (
        valid_from.checked_sub_signed(skew),
        valid_to.checked_add_signed(skew),
    ) {
        (Some(start), Some(end)) => now >= start && now <= end,
        _ => false,
    }
}

/// Same check for a window that may be partially unknown. A missing bound
/// never admits.
pub fn is_claimed_window_open(
    now: DateTime<Utc>,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
    skew_minutes: i64,
) -> bool {
    match (valid_from, valid_to) {
        (Some(from), Some(to)) => is_within_window(now, from, to, skew_minutes),
        _ => false,
    }
}
