//! `HH:MM:SS` duration codec.
//!
//! The portal renders every call-time cell as `HH:MM:SS` — hours can grow
//! past two digits for monthly totals — or as an empty cell when the agent
//! has no data for that column. Decoding is strict: minutes and seconds are
//! exactly two digits below 60, hours are two digits or more with no
//! spurious leading zero, so a decode→encode round trip reproduces the
//! input byte for byte.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}|[1-9]\d{2,}):([0-5]\d):([0-5]\d)$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("malformed duration '{0}': expected HH:MM:SS")]
    Malformed(String),
}

/// Parse an `HH:MM:SS` string into whole seconds.
pub fn decode(text: &str) -> Result<u64, DurationError> {
    let caps = DURATION_RE
        .captures(text)
        .ok_or_else(|| DurationError::Malformed(text.to_string()))?;

    // The hours group is unbounded in length; an absurdly long capture can
    // still overflow u64, so the parse error maps back to Malformed.
    let hours: u64 = caps[1]
        .parse()
        .map_err(|_| DurationError::Malformed(text.to_string()))?;
    let minutes: u64 = caps[2]
        .parse()
        .map_err(|_| DurationError::Malformed(text.to_string()))?;
    let seconds: u64 = caps[3]
        .parse()
        .map_err(|_| DurationError::Malformed(text.to_string()))?;

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(|| DurationError::Malformed(text.to_string()))
}

/// Format whole seconds as `HH:MM:SS` (hours zero-padded to two digits).
pub fn encode(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_plain_durations() {
        assert_eq!(decode("00:00:00"), Ok(0));
        assert_eq!(decode("00:01:30"), Ok(90));
        assert_eq!(decode("02:15:07"), Ok(8107));
        // Monthly totals run past two hour digits.
        assert_eq!(decode("123:45:06"), Ok(123 * 3600 + 45 * 60 + 6));
    }

    #[test]
    fn rejects_malformed_durations() {
        for bad in [
            "", "1:2:3", "0:00:00", "00:60:00", "00:00:60", "00:61:00", "012:00:00", "aa:bb:cc",
            "00-00-00", "00:00", "00:00:00:00", " 00:00:00",
        ] {
            assert!(decode(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn encodes_with_two_digit_padding() {
        assert_eq!(encode(0), "00:00:00");
        assert_eq!(encode(90), "00:01:30");
        assert_eq!(encode(100 * 3600), "100:00:00");
    }

    proptest! {
        #[test]
        fn round_trips_any_valid_duration(h in 0u64..10_000, m in 0u64..60, s in 0u64..60) {
            let text = format!("{h:02}:{m:02}:{s:02}");
            let secs = decode(&text).unwrap();
            prop_assert_eq!(encode(secs), text);
        }
    }
}
