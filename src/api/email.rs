//! Outbound mail and the supervised background tasks that deliver it.
//!
//! Handlers never wait on delivery: they hand a send to [`BackgroundTasks`],
//! which tracks it so shutdown can drain in-flight work. Each task is wrapped
//! in `catch_unwind`, so a failing or panicking send is logged and goes no
//! further.
//!
//! The default mailer for local dev is [`LogMailer`], which renders the
//! message and logs it instead of talking to an SMTP relay.

use super::errors::panic_message;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::{future::Future, panic::AssertUnwindSafe, time::Duration};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, Instrument, Span};

pub const USER_WELCOME_TEMPLATE: &str = "user_welcome.tmpl";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub plain_body: String,
}

/// Mail delivery abstraction. Retries, if any, belong to the implementation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, template: &str, data: &Value) -> Result<()>;
}

/// Render a named template with its data.
///
/// # Errors
/// Returns an error for unknown templates or missing fields.
pub fn render(recipient: &str, template: &str, data: &Value) -> Result<EmailMessage> {
    match template {
        USER_WELCOME_TEMPLATE => {
            let user_id = data
                .get("userID")
                .and_then(Value::as_i64)
                .ok_or_else(|| anyhow!("{template}: missing userID"))?;
            let token = data
                .get("activationToken")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("{template}: missing activationToken"))?;
            let ttl = data
                .get("activationTokenTTL")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("{template}: missing activationTokenTTL"))?;

            let plain_body = format!(
                "Hi,\n\n\
                 Thanks for signing up for a Relohelper account. We're excited to have you on board!\n\n\
                 For future reference, your user ID number is {user_id}.\n\n\
                 Please send a request to the `PUT /v1/users/activated` endpoint with the \
                 following JSON body to activate your account:\n\n\
                 {{\"token\": \"{token}\"}}\n\n\
                 Please note that this is a one-time use token and it will expire in {ttl}.\n\n\
                 Thanks,\n\nThe Relohelper Team\n"
            );

            Ok(EmailMessage {
                to_email: recipient.to_string(),
                subject: "Welcome to Relohelper!".to_string(),
                plain_body,
            })
        }
        other => Err(anyhow!("unknown email template: {other}")),
    }
}

/// Spell out a token lifetime for mail copy, e.g. "3 days" or "90 minutes".
/// Uses the largest unit that divides the duration exactly.
#[must_use]
pub fn human_duration(ttl: chrono::Duration) -> String {
    let seconds = ttl.num_seconds();
    let (count, unit) = [(86_400, "day"), (3_600, "hour"), (60, "minute")]
        .into_iter()
        .find(|(size, _)| seconds != 0 && seconds % size == 0)
        .map_or((seconds, "second"), |(size, unit)| (seconds / size, unit));
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Local dev mailer that logs the rendered message instead of sending it.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, template: &str, data: &Value) -> Result<()> {
        let message = render(recipient, template, data)?;
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.plain_body,
            "email send stub"
        );
        Ok(())
    }
}

/// Tracks fire-and-forget work so shutdown can wait for it.
#[derive(Clone, Debug, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` detached from the caller. Errors and panics are logged.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let span = Span::current();
        self.tracker.spawn(
            async move {
                match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(())) => debug!(task = name, "background task finished"),
                    Ok(Err(err)) => error!(task = name, "background task failed: {err:#}"),
                    Err(panic) => error!(
                        task = name,
                        "background task panicked: {}",
                        panic_message(panic.as_ref())
                    ),
                }
            }
            .instrument(span),
        );
    }

    /// Number of tasks still running.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Close the tracker and wait for running tasks.
    /// Returns `false` if the timeout elapsed first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if drained {
            debug!("background tasks drained");
        } else {
            error!(
                remaining = self.tracker.len(),
                "background tasks did not finish before shutdown timeout"
            );
        }
        drained
    }
}
