// src/notify/telegram.rs
//! Telegram Bot API `sendMessage` with `parse_mode=HTML`. Every interpolated
//! string comes from an untrusted forum post and is escaped.

use anyhow::{bail, Context, Result};
use html_escape::{encode_double_quoted_attribute, encode_text};
use reqwest::Client;

use super::{notify_http_client, Alert, Notifier};

const API_BASE: &str = "https://api.telegram.org";
// Telegram caps a message at 4096 characters.
const MESSAGE_MAX: usize = 4096;

pub struct TelegramNotifier {
    api_base: String,
    bot_token: String,
    chat_id: String,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        Ok(Self {
            api_base: API_BASE.to_string(),
            bot_token,
            chat_id,
            client: notify_http_client()?,
        })
    }

    /// Point at another Bot API host (self-hosted server, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }
}

pub(crate) fn render_html(alert: &Alert) -> String {
    let mut out = format!(
        "<b><a href=\"{}\">{}</a></b>\n<b>Source:</b> {} | <b>Score:</b> {:.2} | <b>Pain points:</b> {}",
        encode_double_quoted_attribute(&alert.url),
        encode_text(&alert.title),
        alert.source.display_name(),
        alert.score,
        encode_text(&alert.pain_points),
    );
    if !alert.excerpt.is_empty() {
        out.push_str(&format!("\n\n<i>{}</i>", encode_text(&alert.excerpt)));
    }
    out.push_str(&format!(
        "\n\n<b>Draft reply:</b>\n<code>{}</code>",
        encode_text(&alert.draft_reply)
    ));
    if out.chars().count() > MESSAGE_MAX {
        // Escaped tags may be cut mid-way; fall back to a plain link.
        return format!(
            "{} ({:.2})\n{}",
            encode_text(&alert.title),
            alert.score,
            encode_text(&alert.url)
        )
        .chars()
        .take(MESSAGE_MAX)
        .collect();
    }
    out
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": render_html(alert),
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let rsp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("telegram sendMessage")?;
        let status = rsp.status();
        if !status.is_success() {
            let text = rsp.text().await.unwrap_or_default();
            bail!(
                "telegram returned {status}: {}",
                text.chars().take(200).collect::<String>()
            );
        }
        Ok(())
    }
}
