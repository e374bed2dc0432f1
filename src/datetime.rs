//! ISO-8601 datetime parsing for `$date` values.

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::{Error, Result};

/// Parses an ISO-8601 / RFC 3339 timestamp (`YYYY-MM-DDTHH:MM:SS[.sss]` with
/// a `Z` or `±HH:MM` offset) into signed milliseconds since the Unix epoch.
/// Offsets without a colon (`±HHMM`) are tolerated as well. Extra
/// sub-millisecond precision truncates toward negative infinity.
pub(crate) fn parse_iso8601_epoch_millis(data: &[u8]) -> Result<i64> {
    let text = std::str::from_utf8(data).map_err(|_| invalid())?;
    let parsed = OffsetDateTime::parse(text, &Rfc3339)
        .or_else(|_| {
            let with_colon = insert_offset_colon(text).ok_or_else(invalid)?;
            OffsetDateTime::parse(&with_colon, &Rfc3339).map_err(|_| invalid())
        })?;
    let millis = parsed.unix_timestamp_nanos().div_euclid(1_000_000);
    i64::try_from(millis).map_err(|_| invalid())
}

fn invalid() -> Error {
    Error::parse("invalid $date value string")
}

// Rewrites a trailing "±HHMM" offset as "±HH:MM"; returns None when the tail
// doesn't have that shape.
fn insert_offset_colon(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    if bytes.len() < 5 {
        return None;
    }
    let sign_pos = bytes.len() - 5;
    if !(bytes[sign_pos] == b'+' || bytes[sign_pos] == b'-')
        || !bytes[sign_pos + 1..].iter().all(u8::is_ascii_digit)
    {
        return None;
    }
    // The tail is ASCII, so these are character boundaries.
    let (head, tail) = text.split_at(sign_pos);
    Some(format!("{}{}:{}", head, &tail[..3], &tail[3..]))
}
