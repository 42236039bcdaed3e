//! Lifecycle notifications.
//!
//! Ticket operations hand a [`Notification`] to the [`NotificationDispatcher`]
//! and return immediately. A detached worker drains the bounded queue and
//! delivers each event through a [`Mailer`]; delivery failures are logged
//! and never reach the operation that produced the event.

pub mod email;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use email::{render, EmailMessage, SmtpMailer};

/// Ticket fields every template shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketContext {
    pub ticket_id: i32,
    pub subject: String,
    pub requester_name: String,
    pub branch_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    TicketCreated {
        ticket: TicketContext,
        description: String,
        created_by: String,
    },
    StatusChanged {
        ticket: TicketContext,
        old_status: String,
        new_status: String,
        changed_by: String,
    },
    Assigned {
        ticket: TicketContext,
        assignee_name: String,
        changed_by: String,
    },
}

impl LifecycleEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TicketCreated { .. } => "ticket_created",
            Self::StatusChanged { .. } => "status_changed",
            Self::Assigned { .. } => "assigned",
        }
    }

    pub fn ticket(&self) -> &TicketContext {
        match self {
            Self::TicketCreated { ticket, .. }
            | Self::StatusChanged { ticket, .. }
            | Self::Assigned { ticket, .. } => ticket,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub event: LifecycleEvent,
}

impl Notification {
    /// Drops empty addresses and duplicates, keeping first-seen order.
    pub fn new(recipients: impl IntoIterator<Item = String>, event: LifecycleEvent) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for address in recipients {
            let address = address.trim().to_string();
            if !address.is_empty() && !unique.contains(&address) {
                unique.push(address);
            }
        }
        Self {
            recipients: unique,
            event,
        }
    }
}

/// Sending half of the notification queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Notification>,
}

pub struct NotificationReceiver {
    inner: mpsc::Receiver<Notification>,
}

impl NotificationReceiver {
    pub async fn recv(&mut self) -> Option<Notification> {
        self.inner.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Notification> {
        self.inner.try_recv().ok()
    }

    /// Everything currently queued.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Some(n) = self.try_recv() {
            out.push(n);
        }
        out
    }
}

impl NotificationDispatcher {
    pub fn channel(capacity: usize) -> (Self, NotificationReceiver) {
        let (sender, inner) = mpsc::channel(capacity.max(1));
        (Self { sender }, NotificationReceiver { inner })
    }

    /// Queues a notification without waiting. Returns `false` when the
    /// event was dropped: no recipients, a full queue or a stopped worker.
    pub fn send(&self, notification: Notification) -> bool {
        let kind = notification.event.kind();
        let ticket_id = notification.event.ticket().ticket_id;

        if notification.recipients.is_empty() {
            debug!("Skipping {kind} notification for ticket {ticket_id}: no recipients");
            return false;
        }

        match self.sender.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Notification queue full, dropping {kind} for ticket {ticket_id}");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Notification worker stopped, dropping {kind} for ticket {ticket_id}");
                false
            }
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Used when no SMTP relay is configured.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, message: &EmailMessage) -> anyhow::Result<()> {
        info!(
            "Email not sent (no SMTP relay): '{}' to {} recipient(s)",
            message.subject,
            message.to.len()
        );
        Ok(())
    }
}

/// Drains the queue until every dispatcher handle is dropped.
pub fn spawn_delivery_worker(mut receiver: NotificationReceiver, mailer: Arc<dyn Mailer>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = receiver.recv().await {
            let message = render(&notification);
            if let Err(e) = mailer.deliver(&message).await {
                error!(
                    "Failed to deliver {} notification for ticket {}: {e:#}",
                    notification.event.kind(),
                    notification.event.ticket().ticket_id
                );
            }
        }
        debug!("Notification worker stopped");
    })
}
