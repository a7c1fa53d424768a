use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::extraction::PriceSource;

/// Persisted per-product state, keyed by URL. Sorted so the file diffs cleanly.
pub type StateMap = BTreeMap<String, ProductState>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProductState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_source: Option<PriceSource>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_notification_sent: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_notification_price: Option<f64>,
}

/// RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc()))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw))),
    }
}

impl ProductState {
    /// Record a fresh observation, shifting the old current price into `last_price`.
    pub fn observe(&mut self, price: f64, source: PriceSource, checked_at: DateTime<Utc>) {
        self.last_price = self.current_price;
        self.current_price = Some(price);
        self.last_source = Some(source);
        self.last_checked = Some(checked_at);
    }

    pub fn record_notification(&mut self, price: f64, sent_at: DateTime<Utc>) {
        self.last_notification_sent = Some(sent_at);
        self.last_notification_price = Some(price);
    }
}
