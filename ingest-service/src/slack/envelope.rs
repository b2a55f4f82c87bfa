//! Slack event envelope types.
//!
//! The Events API wraps everything in an envelope tagged by `type`. Only
//! a handful of kinds matter here; everything else deserializes to an
//! explicit `Unknown` variant and is ignored rather than errored.

use serde::Deserialize;

/// Outer envelope of an Events API request.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum SlackEnvelope {
    /// URL-verification handshake; answered by echoing the challenge.
    #[serde(rename = "url_verification")]
    UrlVerification { challenge: String },

    /// A subscribed workspace event.
    #[serde(rename = "event_callback")]
    EventCallback { event: InnerEvent },

    /// Any envelope kind this service does not handle.
    #[serde(other)]
    Unknown,
}

/// The event inside an `event_callback` envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum InnerEvent {
    /// A user's profile or account flags changed.
    #[serde(rename = "user_change")]
    UserChange { user: SlackUser },

    /// Any inner event kind this service does not handle.
    #[serde(other)]
    Unknown,
}

/// The slice of Slack's user object this service reads.
#[derive(Debug, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub tz: String,
    #[serde(default)]
    pub is_restricted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_verification() {
        let body = r#"{"type":"url_verification","token":"t","challenge":"chal-123"}"#;
        let envelope: SlackEnvelope = serde_json::from_str(body).unwrap();

        match envelope {
            SlackEnvelope::UrlVerification { challenge } => assert_eq!(challenge, "chal-123"),
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[test]
    fn test_parse_user_change_callback() {
        let body = r#"{
            "type": "event_callback",
            "event": {
                "type": "user_change",
                "user": {"id": "U1", "tz": "America/New_York", "is_restricted": true}
            }
        }"#;
        let envelope: SlackEnvelope = serde_json::from_str(body).unwrap();

        match envelope {
            SlackEnvelope::EventCallback {
                event: InnerEvent::UserChange { user },
            } => {
                assert_eq!(user.id, "U1");
                assert_eq!(user.tz, "America/New_York");
                assert!(user.is_restricted);
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_inner_event() {
        let body = r#"{
            "type": "event_callback",
            "event": {"type": "reaction_added", "reaction": "tada"}
        }"#;
        let envelope: SlackEnvelope = serde_json::from_str(body).unwrap();

        assert!(matches!(
            envelope,
            SlackEnvelope::EventCallback {
                event: InnerEvent::Unknown
            }
        ));
    }

    #[test]
    fn test_parse_unknown_envelope_kind() {
        let body = r#"{"type":"app_rate_limited","minute_rate_limited":1}"#;
        let envelope: SlackEnvelope = serde_json::from_str(body).unwrap();

        assert!(matches!(envelope, SlackEnvelope::Unknown));
    }

    #[test]
    fn test_user_defaults() {
        let body = r#"{
            "type": "event_callback",
            "event": {"type": "user_change", "user": {"id": "U2"}}
        }"#;
        let envelope: SlackEnvelope = serde_json::from_str(body).unwrap();

        match envelope {
            SlackEnvelope::EventCallback {
                event: InnerEvent::UserChange { user },
            } => {
                assert_eq!(user.tz, "");
                assert!(!user.is_restricted);
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }
}
