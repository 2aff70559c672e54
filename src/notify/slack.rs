use anyhow::{Context, Result};
use reqwest::Client;

use super::{notify_http_client, Alert, Notifier};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(url: String) -> Result<Self> {
        Ok(Self {
            webhook_url: url,
            client: notify_http_client()?,
        })
    }
}

fn render(alert: &Alert) -> String {
    let mut text = format!(
        "*<{}|{}>*\n*Source:* {} \u{00b7} *Score:* {:.2} \u{00b7} *Pain points:* {}",
        alert.url,
        alert.title,
        alert.source.display_name(),
        alert.score,
        alert.pain_points,
    );
    if !alert.excerpt.is_empty() {
        text.push_str(&format!("\n>{}", alert.excerpt));
    }
    text.push_str(&format!("\n*Draft reply:*\n{}", alert.draft_reply));
    text
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let body = serde_json::json!({ "text": render(alert) });

        self.client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }
}
