//! Slack integration: inbound request verification and event types.
//!
//! Everything that crosses the trust boundary from Slack goes through
//! `signature` first; `envelope` only models payloads that have already
//! been verified.

pub mod envelope;
pub mod signature;

pub use envelope::{InnerEvent, SlackEnvelope, SlackUser};
pub use signature::{verify_slack_signature, SignatureError};
