use crate::error::BharatError;
use crate::models::{ConversationSummary, Message};
use chrono::{DateTime, SecondsFormat, Utc};

/// Format used for every timestamp column
///
/// Fixed precision keeps lexicographic order equal to chronological order.
pub(crate) fn to_column(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp column written by [`to_column`]
///
/// # Errors
///
/// Returns a storage error when the column is not RFC 3339
pub(crate) fn from_column(value: &str) -> Result<DateTime<Utc>, BharatError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BharatError::Storage(format!("Invalid timestamp '{}': {}", value, e)))
}

/// A conversation row with its decoded message list
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConversation {
    /// Summary columns
    pub summary: ConversationSummary,
    /// All messages, oldest first
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_column_round_trip_keeps_micros() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(to_column(&ts), "2024-03-01T09:30:00.123456Z");
        assert_eq!(from_column(&to_column(&ts)).unwrap(), ts);
    }

    #[test]
    fn test_from_column_rejects_garbage() {
        let err = from_column("yesterday-ish").unwrap_err();
        assert!(matches!(err, BharatError::Storage(_)));
        assert!(err.to_string().contains("yesterday-ish"));
    }
}
