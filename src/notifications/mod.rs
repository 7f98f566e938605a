//! Order confirmation email.
//!
//! Notifications run after the order transaction has committed. Callers spawn them and only
//! log the outcome, so a failure here can never undo or fail an order.
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Failed to build message: {0}")]
    Build(String),
    #[error("SMTP transport error: {0}")]
    Transport(String),
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// One line of an order confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationLine {
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl ConfirmationLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub email: String,
    pub client_name: String,
    pub order_id: i32,
    pub total: Decimal,
    pub lines: Vec<ConfirmationLine>,
}

impl OrderConfirmation {
    pub fn subject(&self) -> String {
        format!("Order #{} confirmed", self.order_id)
    }

    /// HTML body listing every line and the order total
    pub fn render_html(&self) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            "<h2>Thank you for your order, {}!</h2><p>Order number: <strong>#{}</strong></p>",
            escape_html(&self.client_name),
            self.order_id
        );
        html.push_str(
            "<table><thead><tr><th>Product</th><th>Quantity</th><th>Unit price</th><th>Subtotal</th></tr></thead><tbody>",
        );
        for line in &self.lines {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&line.product_name),
                line.quantity,
                line.unit_price,
                line.line_total()
            );
        }
        let _ = write!(
            html,
            "</tbody></table><p>Total: <strong>{}</strong></p>",
            self.total
        );
        html
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError>;
}

/// Sends confirmations through an SMTP relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        from: &str,
    ) -> Result<Self, NotificationError> {
        let from: Mailbox = from
            .parse()
            .map_err(|_| NotificationError::InvalidAddress(from.to_string()))?;

        let transport = match credentials {
            Some((username, password)) => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| NotificationError::Transport(e.to_string()))?
                .credentials(Credentials::new(username, password))
                .port(port)
                .build(),
            // No auth, e.g. a local Mailpit
            None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                .port(port)
                .build(),
        };

        Ok(Self { transport, from })
    }

    pub fn build_message(&self, confirmation: &OrderConfirmation) -> Result<Message, NotificationError> {
        let to: Mailbox = confirmation
            .email
            .parse()
            .map_err(|_| NotificationError::InvalidAddress(confirmation.email.clone()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(confirmation.subject())
            .header(ContentType::TEXT_HTML)
            .body(confirmation.render_html())
            .map_err(|e| NotificationError::Build(e.to_string()))
    }
}

#[async_trait]
impl OrderNotifier for SmtpNotifier {
    #[instrument(skip(self, confirmation), fields(order_id = confirmation.order_id))]
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError> {
        let message = self.build_message(confirmation)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        info!(order_id = confirmation.order_id, "Order confirmation email sent");
        Ok(())
    }
}

/// Logs confirmations instead of sending them; used when SMTP is not configured
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError> {
        info!(
            order_id = confirmation.order_id,
            email = %confirmation.email,
            total = %confirmation.total,
            lines = confirmation.lines.len(),
            "SMTP not configured, order confirmation not emailed"
        );
        Ok(())
    }
}

/// Picks the SMTP notifier when a host is configured
pub fn notifier_from_config(config: &AppConfig) -> Result<Arc<dyn OrderNotifier>, NotificationError> {
    match config.smtp_host.as_deref().filter(|host| !host.is_empty()) {
        Some(host) => {
            let credentials = config
                .smtp_username
                .clone()
                .map(|user| (user, config.smtp_password.clone().unwrap_or_default()));
            let notifier = SmtpNotifier::new(host, config.smtp_port, credentials, &config.smtp_from)?;
            info!(host, port = config.smtp_port, "SMTP notifier configured");
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}
