use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;

use super::{notify_http_client, truncate, Alert, Notifier};

const BLURPLE: u32 = 0x5865F2;
const FOOTER: &str = "ch-scout-agent \u{2022} do not auto-post";
// Discord embed limits, in characters (the ellipsis counts).
const TITLE_MAX: usize = 256;
const FIELD_MAX: usize = 1024;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Result<Self> {
        Ok(Self {
            webhook,
            client: notify_http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let payload = DiscordWebhookPayload::from_alert(alert);

        let rsp = self
            .client
            .post(&self.webhook)
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("Discord webhook request failed: {e}"))?;
        rsp.error_for_status_ref()
            .map_err(|e| anyhow!("Discord webhook HTTP error: {e}"))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: &'static str,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: &'static str,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    url: String,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    fields: Vec<EmbedField>,
    footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
struct DiscordWebhookPayload {
    embeds: Vec<DiscordEmbed>,
}

/// Source key with its first letter upper-cased ("Stackoverflow").
fn source_label(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl DiscordWebhookPayload {
    fn from_alert(alert: &Alert) -> Self {
        let description = if alert.excerpt.is_empty() {
            None
        } else {
            Some(alert.excerpt.clone())
        };
        Self {
            embeds: vec![DiscordEmbed {
                title: truncate(&alert.title, TITLE_MAX - 1),
                url: alert.url.clone(),
                color: BLURPLE,
                description,
                fields: vec![
                    EmbedField {
                        name: "Source",
                        value: source_label(alert.source.as_str()),
                        inline: true,
                    },
                    EmbedField {
                        name: "Score",
                        value: format!("{:.2}", alert.score),
                        inline: true,
                    },
                    EmbedField {
                        name: "Pain points",
                        value: alert.pain_points.clone(),
                        inline: true,
                    },
                    EmbedField {
                        name: "Draft reply",
                        value: truncate(&alert.draft_reply, FIELD_MAX - 1),
                        inline: false,
                    },
                ],
                footer: EmbedFooter { text: FOOTER },
            }],
        }
    }
}
