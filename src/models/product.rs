use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub const DEFAULT_COOLDOWN_HOURS: u32 = 24;

/// A monitored product as listed in the products CSV. The URL is the unique key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Product {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(custom(function = "validate_page_url"))]
    pub url: String,
    /// CSS selector for the price; empty means rely on auto-detection.
    pub selector: String,
    #[validate(range(min = 0.0, message = "target_price must not be negative"))]
    pub target_price: Option<f64>,
    /// Percentage drop from the previous price that triggers an alert.
    #[validate(range(min = 0.0, max = 100.0, message = "discount_threshold must be between 0 and 100"))]
    pub discount_threshold: Option<f64>,
    pub enabled: bool,
    pub notification_cooldown_hours: u32,
}

fn validate_page_url(url: &str) -> Result<(), ValidationError> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => {
            let mut err = ValidationError::new("url");
            err.message = Some("url must be an http(s) URL".into());
            Err(err)
        }
    }
}

impl Product {
    pub fn new(name: impl Into<String>, url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            selector: selector.into(),
            target_price: None,
            discount_threshold: None,
            enabled: true,
            notification_cooldown_hours: DEFAULT_COOLDOWN_HOURS,
        }
    }

    pub fn with_target_price(mut self, target_price: f64) -> Self {
        self.target_price = Some(target_price);
        self
    }

    pub fn with_discount_threshold(mut self, threshold: f64) -> Self {
        self.discount_threshold = Some(threshold);
        self
    }

    pub fn with_cooldown_hours(mut self, hours: u32) -> Self {
        self.notification_cooldown_hours = hours;
        self
    }
}
