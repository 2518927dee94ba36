// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Email Dispatch
//!
//! Handlers publish an [`EmailIntent`] and move on; delivery happens in the
//! background and never blocks or fails a request.
//!
//! - [`ChannelDispatcher`] pushes intents onto a bounded queue (`try_send`)
//! - [`MailRelay`] drains the queue and POSTs each intent to a webhook, or
//!   logs it when no webhook is configured
//!
//! ## Shutdown
//!
//! The relay stops on its `CancellationToken` or when every dispatcher has
//! been dropped.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// Default queue depth between request handlers and the relay.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub const CONFIRMATION_TEMPLATE: &str = "email_confirmation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailIntent {
    pub recipient: String,
    pub template_id: String,
    pub subject: String,
    pub data: BTreeMap<String, String>,
}

impl EmailIntent {
    /// Confirmation email pointing at `confirmation_url`.
    pub fn confirmation(recipient: &str, confirmation_url: &str) -> Self {
        let data = BTreeMap::from([
            ("confirmation_url".to_string(), confirmation_url.to_string()),
            ("user_email".to_string(), recipient.to_string()),
        ]);
        Self {
            recipient: recipient.to_string(),
            template_id: CONFIRMATION_TEMPLATE.to_string(),
            subject: "Confirm your email address".to_string(),
            data,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("email queue is full")]
    QueueFull,

    #[error("email relay has stopped")]
    Closed,
}

/// Fire-and-forget publisher of email intents.
pub trait EmailDispatcher: Send + Sync {
    fn publish(&self, intent: EmailIntent) -> Result<(), DispatchError>;
}

#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<EmailIntent>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiving end for a [`MailRelay`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EmailIntent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EmailDispatcher for ChannelDispatcher {
    fn publish(&self, intent: EmailIntent) -> Result<(), DispatchError> {
        self.tx.try_send(intent).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

/// Background worker delivering queued intents.
pub struct MailRelay {
    rx: mpsc::Receiver<EmailIntent>,
    webhook: Option<Url>,
    http: Client,
}

impl MailRelay {
    pub fn new(rx: mpsc::Receiver<EmailIntent>, webhook: Option<Url>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { rx, webhook, http })
    }

    /// Run until cancelled or until all senders are dropped.
    ///
    /// ```rust,ignore
    /// tokio::spawn(relay.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            webhook = self.webhook.as_ref().map(Url::as_str).unwrap_or("<none>"),
            "Mail relay starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Mail relay shutting down");
                    return;
                }
                next = self.rx.recv() => match next {
                    Some(intent) => self.deliver(&intent).await,
                    None => {
                        info!("Mail relay queue closed");
                        return;
                    }
                },
            }
        }
    }

    async fn deliver(&self, intent: &EmailIntent) {
        let Some(webhook) = &self.webhook else {
            info!(
                recipient = %intent.recipient,
                template = %intent.template_id,
                "Email intent logged (no webhook configured)"
            );
            return;
        };

        match self.http.post(webhook.clone()).json(intent).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(
                    recipient = %intent.recipient,
                    template = %intent.template_id,
                    "Email intent delivered"
                );
            }
            Ok(resp) => {
                warn!(
                    recipient = %intent.recipient,
                    status = %resp.status(),
                    "Mail relay: webhook rejected email intent"
                );
            }
            Err(e) => {
                warn!(
                    recipient = %intent.recipient,
                    error = %e,
                    "Mail relay: failed to deliver email intent"
                );
            }
        }
    }
}
