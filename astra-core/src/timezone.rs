//! Timezone resolution
//!
//! Pure utilities for turning a caller hint and stored subject preferences
//! into an effective timezone, and an instant into a local calendar-date
//! string. The orchestrator treats these as trusted: they never touch the
//! store and never fail, falling back to UTC when nothing better is known.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;

/// The timezone a request is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveZone {
    Named(Tz),
    Fixed(FixedOffset),
    Utc,
}

impl std::fmt::Display for EffectiveZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectiveZone::Named(tz) => f.write_str(tz.name()),
            EffectiveZone::Fixed(offset) => write!(f, "{offset}"),
            EffectiveZone::Utc => f.write_str("UTC"),
        }
    }
}

/// Resolve the effective timezone with the precedence:
/// explicit hint > stored IANA zone > stored numeric offset > UTC.
///
/// Unparseable hints and zones fall through to the next source rather than
/// erroring; a bad hint must not break guidance delivery.
pub fn resolve_zone(
    hint: Option<&str>,
    stored_iana: Option<&str>,
    stored_offset_minutes: Option<i32>,
) -> EffectiveZone {
    if let Some(zone) = hint.and_then(parse_iana) {
        return EffectiveZone::Named(zone);
    }
    if let Some(zone) = stored_iana.and_then(parse_iana) {
        return EffectiveZone::Named(zone);
    }
    if let Some(minutes) = stored_offset_minutes {
        if let Some(offset) = FixedOffset::east_opt(minutes * 60) {
            return EffectiveZone::Fixed(offset);
        }
    }
    EffectiveZone::Utc
}

fn parse_iana(name: &str) -> Option<Tz> {
    name.parse::<Tz>().ok()
}

/// The calendar date of `instant` in `zone`.
pub fn local_date(zone: &EffectiveZone, instant: DateTime<Utc>) -> NaiveDate {
    match zone {
        EffectiveZone::Named(tz) => instant.with_timezone(tz).date_naive(),
        EffectiveZone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        EffectiveZone::Utc => instant.date_naive(),
    }
}

/// The calendar date of `instant` in `zone`, formatted "YYYY-MM-DD".
pub fn local_date_str(zone: &EffectiveZone, instant: DateTime<Utc>) -> String {
    local_date(zone, instant).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(s: &str) -> DateTime<Utc> {
        s.parse::<DateTime<Utc>>().unwrap()
    }

    #[test]
    fn test_hint_wins_over_stored_zone() {
        let zone = resolve_zone(Some("Asia/Tokyo"), Some("Europe/Berlin"), Some(-300));
        assert_eq!(zone, EffectiveZone::Named(chrono_tz::Asia::Tokyo));
    }

    #[test]
    fn test_bad_hint_falls_through() {
        let zone = resolve_zone(Some("Mars/Olympus"), Some("Europe/Berlin"), None);
        assert_eq!(zone, EffectiveZone::Named(chrono_tz::Europe::Berlin));
    }

    #[test]
    fn test_offset_fallback() {
        let zone = resolve_zone(None, None, Some(-300));
        assert_eq!(
            zone,
            EffectiveZone::Fixed(FixedOffset::east_opt(-300 * 60).unwrap())
        );
    }

    #[test]
    fn test_utc_fallback() {
        assert_eq!(resolve_zone(None, None, None), EffectiveZone::Utc);
        assert_eq!(resolve_zone(Some("???"), Some(""), None), EffectiveZone::Utc);
    }

    #[test]
    fn test_local_date_straddles_midnight() {
        // 23:30 UTC on Jan 6 is already Jan 7 in Tokyo, still Jan 6 in New York.
        let at = instant("2026-01-06T23:30:00Z");
        let tokyo = resolve_zone(Some("Asia/Tokyo"), None, None);
        let new_york = resolve_zone(Some("America/New_York"), None, None);
        assert_eq!(local_date_str(&tokyo, at), "2026-01-07");
        assert_eq!(local_date_str(&new_york, at), "2026-01-06");
        assert_eq!(local_date_str(&EffectiveZone::Utc, at), "2026-01-06");
    }

    #[test]
    fn test_fixed_offset_date() {
        let at = instant("2026-01-06T01:30:00Z");
        let zone = resolve_zone(None, None, Some(-300));
        assert_eq!(local_date_str(&zone, at), "2026-01-05");
    }
}
