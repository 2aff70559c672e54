use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Alert, Notifier, NOTIFY_HTTP_TIMEOUT};
use crate::config::EmailSettings;

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    pub fn from_settings(cfg: &EmailSettings) -> Result<Self> {
        let creds = Credentials::new(cfg.smtp_user.clone(), cfg.smtp_pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .timeout(Some(NOTIFY_HTTP_TIMEOUT))
            .build();

        let from = cfg.from.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = cfg.to.parse().context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Self { mailer, from, to })
    }
}

fn subject(alert: &Alert) -> String {
    format!(
        "[scout] {} ({:.2}): {}",
        alert.source.display_name(),
        alert.score,
        alert.title
    )
}

fn body(alert: &Alert) -> String {
    format!(
        "{}\n{}\n\nSource: {}\nScore: {:.2}\nPain points: {}\n\n{}\n\nDraft reply:\n{}\n",
        alert.title,
        alert.url,
        alert.source.display_name(),
        alert.score,
        alert.pain_points,
        alert.excerpt,
        alert.draft_reply
    )
}

#[async_trait::async_trait]
impl Notifier for EmailSender {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(alert))
            .header(header::ContentType::TEXT_PLAIN)
            .body(body(alert))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
