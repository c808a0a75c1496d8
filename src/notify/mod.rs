// mongobackup/src/notify/mod.rs
use anyhow::{Context, Result};
use serde_json::json;
use std::fmt::Display;
use tracing::info;

use crate::config::{BackupConfig, EmailAddresses};
use crate::utils::process::ProcessRunner;

pub const AWS_CLI: &str = "aws";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn success(backup_name: &str, message: &str) -> Self {
        Notification {
            subject: format!("Mongo backup ({}) completed.", backup_name),
            body: message.to_string(),
        }
    }

    pub fn failure(backup_name: &str, error: &impl Display) -> Self {
        Notification {
            subject: format!("Error occurred while mongo backup ({}).", backup_name),
            body: error.to_string(),
        }
    }
}

/// Sends run notifications through `aws ses send-email`.
///
/// Does nothing unless both sender and recipient are configured. There is no retry
/// and no delivery check.
pub struct Notifier<'a, R> {
    addresses: Option<&'a EmailAddresses>,
    region: Option<&'a str>,
    runner: &'a R,
}

impl<'a, R: ProcessRunner> Notifier<'a, R> {
    pub fn new(config: &'a BackupConfig, runner: &'a R) -> Self {
        Notifier {
            addresses: config.email.as_ref(),
            region: config.aws.region.as_deref(),
            runner,
        }
    }

    /// Returns whether a message was handed to the mail service.
    pub fn send(&self, notification: &Notification) -> Result<bool> {
        let Some(addresses) = self.addresses else {
            info!("EMAIL_FROM or EMAIL_TO not set, skipping \"{}\"", notification.subject);
            return Ok(false);
        };

        let args = build_send_email_args(addresses, self.region, notification);
        self.runner
            .run(AWS_CLI, &args)
            .with_context(|| format!("Failed to email {}", addresses.to))?;
        info!("📧 Sent \"{}\" to {}", notification.subject, addresses.to);
        Ok(true)
    }
}

pub fn build_send_email_args(
    addresses: &EmailAddresses,
    region: Option<&str>,
    notification: &Notification,
) -> Vec<String> {
    let message = json!({
        "Subject": { "Data": notification.subject, "Charset": "UTF-8" },
        "Body": { "Text": { "Data": notification.body, "Charset": "UTF-8" } },
    });

    let mut args = vec![
        "ses".to_string(),
        "send-email".to_string(),
        "--from".to_string(),
        addresses.from.clone(),
        "--destination".to_string(),
        format!("ToAddresses={}", addresses.to),
        "--message".to_string(),
        message.to_string(),
    ];
    if let Some(region) = region {
        args.push("--region".to_string());
        args.push(region.to_string());
    }
    args
}
