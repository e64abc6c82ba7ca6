//! Repository layer — entity-scoped database operations.
//!
//! Free functions over `&Connection`; timestamps are stored as
//! `%Y-%m-%d %H:%M:%S` text so lexicographic order matches time order.

mod ai_session;
mod case;
mod conversation;
mod medication;
mod order;
mod profile;
mod session;

use chrono::{NaiveDateTime, Timelike, Utc};

// Re-export all public items from sub-modules
pub use ai_session::*;
pub use case::*;
pub use conversation::*;
pub use medication::*;
pub use order::*;
pub use profile::*;
pub use session::*;

/// Current UTC time truncated to whole seconds, matching the stored
/// text precision so values survive a write/read round trip.
pub fn now_utc() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Storage encoding for timestamps.
pub(crate) fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a stored timestamp; falls back to the epoch on malformed values.
pub(crate) fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_through_text() {
        let now = now_utc();
        assert_eq!(parse_ts(&fmt_ts(now)), now);
    }

    #[test]
    fn text_order_matches_time_order() {
        let earlier = fmt_ts(parse_ts("2026-01-01 09:59:59"));
        let later = fmt_ts(parse_ts("2026-01-01 10:00:00"));
        assert!(earlier < later);
    }
}
