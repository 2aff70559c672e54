// src/notify/mod.rs
//! Alert fan-out: every configured channel is tried independently; the
//! fan-out succeeds if at least one channel delivered.

pub mod discord;
pub mod email;
pub mod slack;
pub mod telegram;
pub mod templates;

use anyhow::{Context, Result};
use metrics::counter;
use std::time::Duration;

use crate::config::Settings;
use crate::ingest::types::Source;
use crate::scoring::ScoredPost;

pub use discord::DiscordNotifier;
pub use email::EmailSender;
pub use slack::SlackNotifier;
pub use telegram::TelegramNotifier;

pub const NOTIFY_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const BODY_EXCERPT_CHARS: usize = 300;

/// Channel-neutral view of one alert, rendered once per post.
#[derive(Debug, Clone)]
pub struct Alert {
    pub source: Source,
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub score: f64,
    pub pain_points: String,
    pub excerpt: String,
    pub draft_reply: String,
}

impl Alert {
    pub fn from_scored(scored: &ScoredPost, api_base_url: &str) -> Self {
        let post = &scored.post;
        Self {
            source: post.source,
            external_id: post.external_id.clone(),
            title: post.title.clone(),
            url: post.url.clone(),
            score: scored.score,
            pain_points: scored.pain_points_label(),
            excerpt: truncate(&post.body, BODY_EXCERPT_CHARS),
            draft_reply: templates::draft_reply(&scored.matched_pain_points, api_base_url),
        }
    }
}

/// Cut to `max` chars, trimming trailing whitespace and appending an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}\u{2026}", cut.trim_end())
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Shared webhook client with the notification timeout applied.
pub fn notify_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(NOTIFY_HTTP_TIMEOUT)
        .build()
        .context("building notify http client")
}

pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
    api_base_url: String,
}

impl NotifierMux {
    pub fn new(channels: Vec<Box<dyn Notifier>>, api_base_url: impl Into<String>) -> Self {
        Self {
            channels,
            api_base_url: api_base_url.into(),
        }
    }

    /// Build every channel whose settings are present. A channel that fails
    /// to initialise is logged and left out.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

        if let Some(url) = &settings.discord_webhook_url {
            match DiscordNotifier::new(url.clone()) {
                Ok(n) => channels.push(Box::new(n)),
                Err(e) => tracing::warn!(target: "notify", channel = "discord", error = ?e, "channel init failed"),
            }
        }
        if let Some(url) = &settings.slack_webhook_url {
            match SlackNotifier::new(url.clone()) {
                Ok(n) => channels.push(Box::new(n)),
                Err(e) => tracing::warn!(target: "notify", channel = "slack", error = ?e, "channel init failed"),
            }
        }
        if let Some(tg) = &settings.telegram {
            match TelegramNotifier::new(tg.bot_token.clone(), tg.chat_id.clone()) {
                Ok(n) => channels.push(Box::new(n)),
                Err(e) => tracing::warn!(target: "notify", channel = "telegram", error = ?e, "channel init failed"),
            }
        }
        if let Some(email) = &settings.email {
            match EmailSender::from_settings(email) {
                Ok(n) => channels.push(Box::new(n)),
                Err(e) => tracing::warn!(target: "notify", channel = "email", error = ?e, "channel init failed"),
            }
        }

        Self::new(channels, settings.api_base_url.clone())
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver to every channel. True iff at least one succeeded. Never errors.
    pub async fn send(&self, scored: &ScoredPost) -> bool {
        if self.channels.is_empty() {
            tracing::warn!(target: "notify", "no notification channels configured");
            return false;
        }

        let alert = Alert::from_scored(scored, &self.api_base_url);
        let mut delivered = false;
        for ch in &self.channels {
            match ch.send(&alert).await {
                Ok(()) => {
                    tracing::info!(
                        target: "notify",
                        channel = ch.name(),
                        source = alert.source.as_str(),
                        external_id = %alert.external_id,
                        score = alert.score,
                        "notification sent"
                    );
                    delivered = true;
                }
                Err(e) => {
                    tracing::warn!(target: "notify", channel = ch.name(), error = ?e, "notification failed");
                    counter!("scout_notify_channel_failures_total", "channel" => ch.name()).increment(1);
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Post;
    use crate::scoring::PainPoint;
    use anyhow::bail;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        ok: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Notifier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn send(&self, _alert: &Alert) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok(())
            } else {
                bail!("boom")
            }
        }
    }

    fn scored() -> ScoredPost {
        ScoredPost {
            post: Post {
                source: Source::Reddit,
                external_id: "r1".into(),
                url: "https://reddit.com/r1".into(),
                title: "Companies House 429".into(),
                body: "word ".repeat(100),
                tags: vec![],
                created_at: Utc::now(),
            },
            score: 0.8,
            matched_pain_points: BTreeSet::from([PainPoint::RateLimit]),
        }
    }

    #[test]
    fn truncate_appends_ellipsis_only_when_needed() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcde fghij", 6), "abcde\u{2026}");
    }

    #[test]
    fn alert_renders_excerpt_and_draft() {
        let a = Alert::from_scored(&scored(), "https://api.example.test");
        assert!(a.excerpt.ends_with('\u{2026}'));
        assert!(a.excerpt.chars().count() <= BODY_EXCERPT_CHARS + 1);
        assert_eq!(a.pain_points, "rate_limit");
        assert!(a.draft_reply.contains("https://api.example.test"));
    }

    #[tokio::test]
    async fn empty_mux_reports_failure() {
        let mux = NotifierMux::new(vec![], "x");
        assert!(!mux.send(&scored()).await);
    }

    #[tokio::test]
    async fn one_success_is_enough_and_all_channels_are_tried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::new(
            vec![
                Box::new(Fixed { ok: false, calls: calls.clone() }),
                Box::new(Fixed { ok: true, calls: calls.clone() }),
                Box::new(Fixed { ok: false, calls: calls.clone() }),
            ],
            "x",
        );
        assert!(mux.send(&scored()).await);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn all_failing_channels_report_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::new(
            vec![
                Box::new(Fixed { ok: false, calls: calls.clone() }),
                Box::new(Fixed { ok: false, calls: calls.clone() }),
            ],
            "x",
        );
        assert!(!mux.send(&scored()).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
