use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::info;

use super::{AlertTrigger, Notifier, SaleAlert};
use crate::config::EmailConfig;
use crate::{AppError, Result};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends plain-text sale alerts over SMTP.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let missing = |field: &str| AppError::Notification(format!("email {} is not configured", field));

        let server = config.smtp_server.as_deref().ok_or_else(|| missing("smtp_server"))?;
        let username = config.username.clone().ok_or_else(|| missing("username"))?;
        let password = config.password.clone().ok_or_else(|| missing("password"))?;

        let from: Mailbox = config.from_address.as_deref().unwrap_or(&username).parse()?;
        let to: Mailbox = config.to_address.as_deref().unwrap_or(&username).parse()?;

        let builder = if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server)
        };

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(username, password))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport, from, to })
    }

    fn build_message(&self, alert: &SaleAlert) -> Result<Message> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(format_subject(alert))
            .header(header::ContentType::TEXT_PLAIN)
            .body(format_body(alert))?;
        Ok(message)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, alert: &SaleAlert) -> Result<()> {
        let message = self.build_message(alert)?;
        self.transport.send(message).await?;
        info!("Email notification sent for {}", alert.product_name);
        Ok(())
    }
}

pub fn format_subject(alert: &SaleAlert) -> String {
    format!("Sale Monitor: {} at ${:.2}", alert.product_name, alert.current_price)
}

pub fn format_body(alert: &SaleAlert) -> String {
    let mut lines = vec![
        format!("Product: {}", alert.product_name),
        format!("URL: {}", alert.url),
        format!("Current price: ${:.2}", alert.current_price),
    ];

    if let Some(previous) = alert.previous_price {
        match alert.discount_percent() {
            Some(discount) => lines.push(format!("Previous price: ${:.2} ({:.1}% off)", previous, discount)),
            None => lines.push(format!("Previous price: ${:.2}", previous)),
        }
    }

    if let Some(target) = alert.target_price {
        lines.push(format!("Target price: ${:.2}", target));
    }

    let reason = match alert.trigger {
        AlertTrigger::TargetPrice => "target price reached",
        AlertTrigger::Discount => "discount threshold reached",
    };
    lines.push(format!("Triggered by: {}", reason));

    lines.join("\n")
}
