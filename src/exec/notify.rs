// src/exec/notify.rs

//! Outbound notifications.
//!
//! Channels are plain strings: chat channels (`#data-alerts`) or e-mail
//! recipients written as `mailto:someone@example.com`.

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::{Client, Url};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::{FlowError, Result};

use super::backend::BoxFuture;

const MAIL_PREFIX: &str = "mailto:";

/// A message for one or more channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channels: BTreeSet<String>,
    pub text: String,
}

impl Notification {
    pub fn new(channels: impl IntoIterator<Item = String>, text: impl Into<String>) -> Self {
        Self {
            channels: channels.into_iter().filter(|c| !c.trim().is_empty()).collect(),
            text: text.into(),
        }
    }

    pub fn mail_channel(address: &str) -> String {
        format!("{MAIL_PREFIX}{address}")
    }

    pub fn is_mail_channel(channel: &str) -> bool {
        channel.starts_with(MAIL_PREFIX)
    }
}

pub trait Notifier: Send + Sync {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<()>>;
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!(
                channels = ?notification.channels,
                text = %notification.text,
                "notification"
            );
            Ok(())
        })
    }
}

/// Posts chat notifications to a Slack incoming webhook.
///
/// Notifications without a chat channel go to the default channel, if any.
/// Mail channels are not handled here.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    webhook: Url,
    default_channel: Option<String>,
    http: Client,
}

impl SlackNotifier {
    pub fn new(webhook: &str, default_channel: Option<String>) -> Result<Self> {
        let webhook = Url::parse(webhook)
            .map_err(|e| FlowError::Config(format!("invalid [notify].slack_webhook: {e}")))?;
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            webhook,
            default_channel,
            http,
        })
    }

    async fn post(&self, notification: &Notification) -> Result<()> {
        let mut channels: Vec<&str> = notification
            .channels
            .iter()
            .map(String::as_str)
            .filter(|c| !Notification::is_mail_channel(c))
            .collect();

        if channels.is_empty() {
            match self.default_channel.as_deref() {
                Some(channel) => channels.push(channel),
                None => {
                    debug!("no chat channel for notification");
                    return Ok(());
                }
            }
        }

        for channel in channels {
            let payload = json!({ "channel": channel, "text": notification.text });
            let response = self
                .http
                .post(self.webhook.clone())
                .json(&payload)
                .send()
                .await?;

            if let Err(err) = response.error_for_status_ref() {
                warn!(channel, error = %err, "slack rejected notification");
                return Err(err.into());
            }
        }

        Ok(())
    }
}

impl Notifier for SlackNotifier {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.post(notification))
    }
}
