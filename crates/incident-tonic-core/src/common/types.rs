//! # Record Identifiers and Timestamps
//!
//! Shared definitions for how stored records are keyed and stamped, so the
//! server and any client decoding its responses agree on the formats.
//!
//! ## Type Aliases
//!
//! - [`RecordId`] - The key every store is indexed by.
//!
//! ## Constants
//!
//! - [`INCIDENT`] / [`GREETING`] - Entity names used in `NotFound` details.
//! - [`TIMESTAMP_PRECISION`] - Fractional-second precision of `created`.
//!
//! ## Formats
//!
//! - Generated identifiers are random (v4) UUIDs in lowercase hyphenated form,
//!   e.g. `67e55044-10b1-426f-9247-bb680e5fe0c8`.
//! - Timestamps are ISO-8601 in UTC with millisecond precision and a `Z`
//!   suffix, e.g. `2024-05-01T12:30:45.123Z`.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Identifier a record is stored under.
pub type RecordId = String;

/// Entity name reported when an incident lookup misses.
pub const INCIDENT: &str = "Incident";

/// Entity name reported when a greeting lookup misses.
pub const GREETING: &str = "Greeting";

/// Precision used when rendering `created` timestamps.
pub const TIMESTAMP_PRECISION: SecondsFormat = SecondsFormat::Millis;

/// Returns a freshly generated, universally unique record identifier.
pub fn new_record_id() -> RecordId {
    Uuid::new_v4().hyphenated().to_string()
}

/// Renders `at` as `YYYY-MM-DDTHH:mm:ss.sssZ`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(TIMESTAMP_PRECISION, true)
}

/// Current UTC time rendered with [`format_timestamp`].
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn record_ids_are_uuid_v4() {
        let id = new_record_id();
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(id, id.to_lowercase());
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn record_ids_do_not_repeat() {
        let ids: HashSet<_> = (0..1024).map(|_| new_record_id()).collect();
        assert_eq!(ids.len(), 1024);
    }

    #[test]
    fn timestamps_use_millis_and_zulu() {
        let at = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 45)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(7))
            .unwrap();
        assert_eq!(format_timestamp(at), "2024-05-01T12:30:45.007Z");
    }

    #[test]
    fn now_parses_back_as_rfc3339() {
        let rendered = timestamp_now();
        assert!(rendered.ends_with('Z'));
        let parsed = DateTime::parse_from_rfc3339(&rendered).unwrap();
        assert_eq!(format_timestamp(parsed.with_timezone(&Utc)), rendered);
    }
}
