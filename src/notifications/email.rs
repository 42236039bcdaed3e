use anyhow::{anyhow, Context};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use tracing::{info, warn};

use super::{LifecycleEvent, Mailer, Notification, TicketContext};
use crate::config::EmailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn ticket_rows(ticket: &TicketContext) -> String {
    format!(
        "<p><strong>Subject:</strong> {}</p>\n<p><strong>Requester:</strong> {}</p>\n<p><strong>Branch:</strong> {}</p>",
        html_escape(&ticket.subject),
        html_escape(&ticket.requester_name),
        html_escape(ticket.branch_name.as_deref().unwrap_or("N/A")),
    )
}

fn layout(heading: &str, rows: &str) -> String {
    format!(
        "<html><body>\n<h2>{}</h2>\n{rows}\n<p>This is an automated message from the IT helpdesk.</p>\n</body></html>",
        html_escape(heading)
    )
}

pub fn render(notification: &Notification) -> EmailMessage {
    let (subject, rows) = match &notification.event {
        LifecycleEvent::TicketCreated {
            ticket,
            description,
            created_by,
        } => (
            format!("New Ticket Created: #{} - {}", ticket.ticket_id, ticket.subject),
            format!(
                "{}\n<p><strong>Description:</strong> {}</p>\n<p><strong>Created by:</strong> {}</p>",
                ticket_rows(ticket),
                html_escape(description),
                html_escape(created_by),
            ),
        ),
        LifecycleEvent::StatusChanged {
            ticket,
            old_status,
            new_status,
            changed_by,
        } => (
            format!("Ticket #{} Status Updated to {}", ticket.ticket_id, new_status),
            format!(
                "{}\n<p><strong>Status:</strong> {} &rarr; {}</p>\n<p><strong>Updated by:</strong> {}</p>",
                ticket_rows(ticket),
                html_escape(old_status),
                html_escape(new_status),
                html_escape(changed_by),
            ),
        ),
        LifecycleEvent::Assigned {
            ticket,
            assignee_name,
            changed_by,
        } => (
            format!("Ticket #{} Assigned to {}", ticket.ticket_id, assignee_name),
            format!(
                "{}\n<p><strong>Assigned to:</strong> {}</p>\n<p><strong>Assigned by:</strong> {}</p>",
                ticket_rows(ticket),
                html_escape(assignee_name),
                html_escape(changed_by),
            ),
        ),
    };

    EmailMessage {
        to: notification.recipients.clone(),
        html_body: layout(&subject, &rows),
        subject,
    }
}

/// Delivers through an SMTP relay. Uses the blocking transport on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> anyhow::Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| anyhow!("Invalid SMTP_FROM address: {e}"))?;

        let transport = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => SmtpTransport::relay(&config.smtp_host)
                .with_context(|| format!("SMTP relay error for {}", config.smtp_host))?
                .port(config.smtp_port)
                .credentials(Credentials::new(user.clone(), pass.clone()))
                .build(),
            _ => SmtpTransport::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build(),
        };

        info!("SMTP mailer configured for {}:{}", config.smtp_host, config.smtp_port);
        Ok(Self { transport, from })
    }

    fn build(&self, message: &EmailMessage) -> anyhow::Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML);

        let mut recipients = 0;
        for address in &message.to {
            match address.parse::<Mailbox>() {
                Ok(mailbox) => {
                    builder = builder.to(mailbox);
                    recipients += 1;
                }
                Err(e) => warn!("Skipping invalid recipient address: {e}"),
            }
        }
        if recipients == 0 {
            return Err(anyhow!("No valid recipients for '{}'", message.subject));
        }

        builder
            .body(message.html_body.clone())
            .context("Failed to build email")
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let email = self.build(message)?;
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .context("Email task failed")?
            .context("Failed to send email")?;
        info!("Email '{}' sent to {} recipient(s)", message.subject, message.to.len());
        Ok(())
    }
}
