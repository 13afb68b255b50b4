use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub i64);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NotificationId {
    type Err = std::num::ParseIntError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim().parse().map(NotificationId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub is_read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Closed,
    Connecting,
    Open,
    ClosedOnError,
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelStatus::Closed => f.write_str("closed"),
            ChannelStatus::Connecting => f.write_str("connecting"),
            ChannelStatus::Open => f.write_str("live"),
            ChannelStatus::ClosedOnError => f.write_str("offline"),
        }
    }
}

/// What a push channel reports back to its subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    Notification(NotificationRecord),
    /// The connection dropped and the channel is retrying.
    Reconnecting { reason: String },
    /// The channel gave up; no further events follow.
    Failed { reason: String },
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn notification_record__should_read_backend_json() {
        // Given
        let raw = r#"{"id":7,"message":"Your order has shipped","timestamp":"2025-03-02T10:15:00Z","isRead":true}"#;

        // When
        let record: NotificationRecord = serde_json::from_str(raw).expect("parse record");

        // Then
        assert_eq!(record.id, NotificationId(7));
        assert_eq!(record.message, "Your order has shipped");
        assert_eq!(record.timestamp, datetime!(2025-03-02 10:15:00 UTC));
        assert!(record.is_read);
    }

    #[test]
    fn notification_record__should_default_to_unread_when_flag_missing() {
        let raw = r#"{"id":3,"message":"order shipped","timestamp":"2025-03-02T10:15:00+01:00"}"#;

        let record: NotificationRecord = serde_json::from_str(raw).expect("parse record");

        assert!(!record.is_read);
        assert_eq!(record.timestamp, datetime!(2025-03-02 09:15:00 UTC));
    }

    #[test]
    fn notification_id__should_parse_from_command_text() {
        assert_eq!(" 42 ".parse::<NotificationId>().expect("id"), NotificationId(42));
        assert!("abc".parse::<NotificationId>().is_err());
    }
}
