//! Sale alerts: when to send them and how they are delivered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::NotificationsConfig;
use crate::Result;

pub mod email;
pub mod policy;

pub use email::EmailNotifier;
pub use policy::{alert_trigger, cooldown_allows, discount_percent, evaluate_alert};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertTrigger {
    TargetPrice,
    Discount,
}

impl AlertTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTrigger::TargetPrice => "target_price",
            AlertTrigger::Discount => "discount",
        }
    }
}

impl fmt::Display for AlertTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleAlert {
    pub product_name: String,
    pub url: String,
    pub current_price: f64,
    pub previous_price: Option<f64>,
    pub target_price: Option<f64>,
    pub trigger: AlertTrigger,
}

impl SaleAlert {
    pub fn discount_percent(&self) -> Option<f64> {
        self.previous_price
            .and_then(|previous| discount_percent(previous, self.current_price))
    }
}

/// A delivery channel for sale alerts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, alert: &SaleAlert) -> Result<()>;
}

/// Build the notifiers enabled in `config`.
pub fn build_notifiers(config: &NotificationsConfig) -> Result<Vec<Arc<dyn Notifier>>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if config.email.enabled {
        notifiers.push(Arc::new(EmailNotifier::from_config(&config.email)?));
    }

    if notifiers.is_empty() {
        tracing::info!("No notifiers enabled");
    }
    Ok(notifiers)
}
