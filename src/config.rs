// src/config.rs
//! Process settings, read once from the environment (after `.env`).
//! Bad values never abort startup: they fall back to the default with a warning.
//! Parsing runs before the subscriber exists, so warnings are collected on
//! [`Settings::warnings`] and emitted by [`Settings::log_warnings`].

use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::types::Source;
use crate::scoring::DEFAULT_SCORING_CONFIG_PATH;

pub const DEFAULT_API_BASE_URL: &str = "https://ch-api-production-b552.up.railway.app";
pub const DEFAULT_USER_AGENT: &str = "ch-scout-agent/1.0";
pub const DEFAULT_MIN_RELEVANCE_SCORE: f64 = 0.5;
pub const DEFAULT_LOOKBACK_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub from: String,
    pub to: String,
}

/// Poll period per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub stackoverflow: Duration,
    pub hackernews: Duration,
    pub reddit: Duration,
    pub github: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            stackoverflow: minutes(15),
            hackernews: minutes(30),
            reddit: minutes(30),
            github: minutes(15),
        }
    }
}

impl PollIntervals {
    pub fn for_source(&self, source: Source) -> Duration {
        match source {
            Source::StackOverflow => self.stackoverflow,
            Source::HackerNews => self.hackernews,
            Source::Reddit => self.reddit,
            Source::GitHub => self.github,
        }
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_env: String,
    pub log_level: String,

    pub discord_webhook_url: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub telegram: Option<TelegramSettings>,
    pub email: Option<EmailSettings>,

    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,

    pub api_base_url: String,
    pub stackoverflow_api_key: Option<String>,
    pub github_token: Option<String>,
    pub reddit_user_agent: String,

    pub min_relevance_score: f64,
    pub poll_intervals: PollIntervals,
    pub lookback_seconds: u64,

    pub scoring_config_path: PathBuf,
    /// `None` keeps whatever the scoring TOML says.
    pub dev_context_penalty: Option<bool>,
    pub scoring_dev_log: bool,

    /// Problems found while parsing, logged once tracing is up.
    pub warnings: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| {
            lookup(k)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut warnings = Vec::new();

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramSettings { bot_token, chat_id }),
            (None, None) => None,
            _ => {
                warnings.push("telegram needs both TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID; disabled".to_string());
                None
            }
        };

        let email = match (
            get("SMTP_HOST"),
            get("SMTP_USER"),
            get("SMTP_PASS"),
            get("NOTIFY_EMAIL_FROM"),
            get("NOTIFY_EMAIL_TO"),
        ) {
            (Some(smtp_host), Some(smtp_user), Some(smtp_pass), Some(from), Some(to)) => {
                Some(EmailSettings {
                    smtp_host,
                    smtp_user,
                    smtp_pass,
                    from,
                    to,
                })
            }
            (None, None, None, None, None) => None,
            _ => {
                warnings.push(
                    "email needs SMTP_HOST, SMTP_USER, SMTP_PASS, NOTIFY_EMAIL_FROM and NOTIFY_EMAIL_TO; disabled"
                        .to_string(),
                );
                None
            }
        };

        let defaults = PollIntervals::default();
        let poll_intervals = PollIntervals {
            stackoverflow: poll_minutes(&get, "POLL_INTERVAL_STACKOVERFLOW", defaults.stackoverflow, &mut warnings),
            hackernews: poll_minutes(&get, "POLL_INTERVAL_HACKERNEWS", defaults.hackernews, &mut warnings),
            reddit: poll_minutes(&get, "POLL_INTERVAL_REDDIT", defaults.reddit, &mut warnings),
            github: poll_minutes(&get, "POLL_INTERVAL_GITHUB", defaults.github, &mut warnings),
        };

        let min_relevance_score = match get("MIN_RELEVANCE_SCORE") {
            None => DEFAULT_MIN_RELEVANCE_SCORE,
            Some(raw) => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => v.clamp(0.0, 1.0),
                _ => {
                    warnings.push(format!("MIN_RELEVANCE_SCORE={raw:?} is not a number; using default"));
                    DEFAULT_MIN_RELEVANCE_SCORE
                }
            },
        };

        let lookback_seconds = match get("LOOKBACK_SECONDS") {
            None => DEFAULT_LOOKBACK_SECONDS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(v) if v > 0 => v,
                _ => {
                    warnings.push(format!("LOOKBACK_SECONDS={raw:?} is invalid; using default"));
                    DEFAULT_LOOKBACK_SECONDS
                }
            },
        };

        let dev_context_penalty = get("SCORING_DEV_CONTEXT_PENALTY")
            .and_then(|raw| parse_flag("SCORING_DEV_CONTEXT_PENALTY", &raw, &mut warnings));
        let scoring_dev_log = get("SCORING_DEV_LOG")
            .and_then(|raw| parse_flag("SCORING_DEV_LOG", &raw, &mut warnings))
            .unwrap_or(false);

        Self {
            app_env: get("APP_ENV").unwrap_or_else(|| "development".into()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            discord_webhook_url: get("SCOUT_WEBHOOK_URL"),
            slack_webhook_url: get("SLACK_WEBHOOK_URL"),
            telegram,
            email,
            supabase_url: get("SUPABASE_URL"),
            supabase_key: get("SUPABASE_KEY"),
            api_base_url: get("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.into()),
            stackoverflow_api_key: get("STACKOVERFLOW_API_KEY"),
            github_token: get("GITHUB_TOKEN"),
            reddit_user_agent: get("REDDIT_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
            min_relevance_score,
            poll_intervals,
            lookback_seconds,
            scoring_config_path: get("SCORING_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCORING_CONFIG_PATH)),
            dev_context_penalty,
            scoring_dev_log,
            warnings,
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    /// Emit the parse warnings. Call after `init_tracing`.
    pub fn log_warnings(&self) {
        for w in &self.warnings {
            tracing::warn!(target: "config", "{w}");
        }
    }
}

fn poll_minutes<G>(get: &G, key: &str, default: Duration, warnings: &mut Vec<String>) -> Duration
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.parse::<u64>() {
            Ok(m) if m > 0 => minutes(m),
            _ => {
                warnings.push(format!("{key}={raw:?} must be a positive number of minutes; using default"));
                default
            }
        },
    }
}

fn parse_flag(key: &str, raw: &str, warnings: &mut Vec<String>) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => {
            warnings.push(format!("{key}={raw:?} is not a recognised flag; ignoring"));
            None
        }
    }
}
