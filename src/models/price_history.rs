use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Outcome of a single price check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum CheckStatus {
    Success,
    NotFound,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Success => "success",
            CheckStatus::NotFound => "not_found",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PriceRecord {
    pub id: i64,
    pub product_url: String,
    pub product_name: String,
    pub price: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub check_status: CheckStatus,
}

/// A transition between two consecutive successful checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceChange {
    pub timestamp: DateTime<Utc>,
    pub old_price: f64,
    pub new_price: f64,
}

impl PriceChange {
    pub fn difference(&self) -> f64 {
        self.new_price - self.old_price
    }

    pub fn percent_change(&self) -> Option<f64> {
        (self.old_price > 0.0).then(|| self.difference() / self.old_price * 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceStats {
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub current_price: f64,
    pub count: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct TrackedProduct {
    pub product_url: String,
    pub product_name: String,
}
