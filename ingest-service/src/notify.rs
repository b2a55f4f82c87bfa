//! Best-effort status relay to a Slack incoming webhook.
//!
//! Status lines are operator convenience, not data. The relay exposes no
//! failure channel: unconfigured means skip, a failed POST is logged at
//! warn and swallowed.

use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
struct WebhookBody<'a> {
    text: &'a str,
}

/// Fire-and-forget poster of human-readable status lines.
#[derive(Debug, Clone)]
pub struct StatusRelay {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl StatusRelay {
    pub fn new(client: reqwest::Client, webhook_url: Option<String>) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    /// Post one status line. Never fails from the caller's perspective.
    pub async fn send(&self, text: &str) {
        let Some(url) = self.webhook_url.as_deref() else {
            return;
        };

        if let Err(e) = self
            .client
            .post(url)
            .json(&WebhookBody { text })
            .send()
            .await
        {
            warn!(error = %e, "status_relay_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_without_url_is_a_noop() {
        let relay = StatusRelay::new(reqwest::Client::new(), None);
        // Must return without attempting any network call.
        relay.send("service starting").await;
    }
}
