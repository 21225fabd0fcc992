//! Lexical rules for SAML timestamps.
//!
//! Wire form is whole-second UTC with a trailing `Z`. Receivers must
//! tolerate sub-second digits, so parsing strips a fractional part before
//! interpreting the value; serialization never emits one.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Result, SamlError};

const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses a SAML instant, tolerating sub-second precision.
///
/// Anything other than a UTC (`Z`-suffixed) timestamp is rejected.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    let stripped = strip_fractional_seconds(value);
    let Some(body) = stripped.strip_suffix('Z') else {
        return Err(SamlError::ProtocolViolation(format!(
            "timestamp '{value}' is not expressed in UTC"
        )));
    };
    NaiveDateTime::parse_from_str(body, INSTANT_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| SamlError::InvalidValue {
            what: "timestamp",
            value: value.to_string(),
        })
}

/// Formats an instant in the canonical whole-second UTC form.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Enforces the strict `NotBefore < NotOnOrAfter` ordering shared by
/// `Conditions` and `SubjectConfirmationData`.
pub(crate) fn check_window(
    not_before: Option<DateTime<Utc>>,
    not_on_or_after: Option<DateTime<Utc>>,
) -> Result<()> {
    if let (Some(not_before), Some(not_on_or_after)) = (not_before, not_on_or_after)
        && not_before >= not_on_or_after
    {
        return Err(SamlError::ProtocolViolation(format!(
            "NotBefore ({}) must be earlier than NotOnOrAfter ({})",
            format_instant(not_before),
            format_instant(not_on_or_after)
        )));
    }
    Ok(())
}

fn strip_fractional_seconds(value: &str) -> Cow<'_, str> {
    let Some(dot) = value.find('.') else {
        return Cow::Borrowed(value);
    };
    let tail = &value[dot + 1..];
    let digits = tail.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() - digits - 1);
    out.push_str(&value[..dot]);
    out.push_str(&tail[digits..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_second_utc() {
        let parsed = parse_instant("2014-09-22T13:42:00Z").unwrap();
        assert_eq!(format_instant(parsed), "2014-09-22T13:42:00Z");
    }

    #[test]
    fn strips_subsecond_digits() {
        let parsed = parse_instant("2014-09-22T13:42:00.123456Z").unwrap();
        assert_eq!(format_instant(parsed), "2014-09-22T13:42:00Z");
    }

    #[test]
    fn rejects_offset_timestamps() {
        assert!(parse_instant("2014-09-22T13:42:00+02:00").is_err());
        assert!(parse_instant("2014-09-22T13:42:00").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_instant("not-a-timestamp").is_err());
        assert!(parse_instant("2014-99-99T13:42:00Z").is_err());
    }
}
