use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::extraction::{PriceExtractor, PriceSource};
use crate::models::{CheckStatus, Product, StateMap};
use crate::notifications::{build_notifiers, evaluate_alert, Notifier, SaleAlert};
use crate::storage::{load_state, read_products, save_state, PriceHistoryStore};
use crate::utils::FileLock;
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleSummary {
    /// Enabled products that were checked.
    pub checked: usize,
    /// Products whose price was found and stored.
    pub updated: usize,
    pub failed: usize,
    pub notifications_sent: usize,
}

/// Result of checking one product.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckOutcome {
    pub price: Option<f64>,
    pub source: Option<PriceSource>,
    pub notified: bool,
}

/// Runs one pass over the product catalog: extract, record, update state, alert.
pub struct PriceMonitor {
    extractor: PriceExtractor,
    history: Option<PriceHistoryStore>,
    notifiers: Vec<Arc<dyn Notifier>>,
    products_csv: PathBuf,
    state_file: PathBuf,
    lock_timeout: Duration,
}

impl PriceMonitor {
    pub fn new(
        extractor: PriceExtractor,
        products_csv: impl Into<PathBuf>,
        state_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            extractor,
            history: None,
            notifiers: Vec::new(),
            products_csv: products_csv.into(),
            state_file: state_file.into(),
            lock_timeout: Duration::from_secs(10),
        }
    }

    /// Wire everything from configuration, opening the history database.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let extractor = PriceExtractor::new(&config.scraper)?;
        let history = PriceHistoryStore::open(&config.storage.history_db).await?;
        let notifiers = build_notifiers(&config.notifications)?;

        Ok(Self::new(extractor, &config.storage.products_csv, &config.storage.state_file)
            .with_history(history)
            .with_notifiers(notifiers)
            .with_lock_timeout(Duration::from_secs(config.storage.lock_timeout_secs)))
    }

    pub fn with_history(mut self, history: PriceHistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_notifiers(mut self, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        self.notifiers = notifiers;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn history(&self) -> Option<&PriceHistoryStore> {
        self.history.as_ref()
    }

    pub fn products_csv(&self) -> &Path {
        &self.products_csv
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Same as [`run_cycle`](Self::run_cycle) with an explicit clock.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleSummary> {
        let started = Instant::now();
        let _lock = FileLock::acquire(&self.state_file, self.lock_timeout).await?;

        let products = read_products(&self.products_csv)?;
        let mut state = load_state(&self.state_file);

        let enabled: Vec<&Product> = products.iter().filter(|p| p.enabled).collect();
        info!(
            "Checking {} enabled products from {}",
            enabled.len(),
            self.products_csv.display()
        );

        let mut summary = CycleSummary {
            checked: enabled.len(),
            ..CycleSummary::default()
        };

        for product in enabled {
            let outcome = self.check_product(product, &mut state, now).await;
            match outcome.price {
                Some(_) => summary.updated += 1,
                None => summary.failed += 1,
            }
            if outcome.notified {
                summary.notifications_sent += 1;
            }
        }

        save_state(&self.state_file, &state)?;

        info!(
            "Cycle finished in {}ms: {} checked, {} updated, {} failed, {} notifications. State saved to {}",
            started.elapsed().as_millis(),
            summary.checked,
            summary.updated,
            summary.failed,
            summary.notifications_sent,
            self.state_file.display()
        );
        Ok(summary)
    }

    /// Check a single catalog entry by URL right now, regardless of its
    /// enabled flag. State and history are updated as in a full cycle.
    pub async fn check_url(&self, url: &str) -> Result<CheckOutcome> {
        let now = Utc::now();
        let _lock = FileLock::acquire(&self.state_file, self.lock_timeout).await?;

        let products = read_products(&self.products_csv)?;
        let product = products
            .iter()
            .find(|p| p.url == url)
            .ok_or_else(|| AppError::NotFound {
                resource: format!("product {}", url),
            })?;

        let mut state = load_state(&self.state_file);
        let outcome = self.check_product(product, &mut state, now).await;
        save_state(&self.state_file, &state)?;
        Ok(outcome)
    }

    async fn check_product(&self, product: &Product, state: &mut StateMap, now: DateTime<Utc>) -> CheckOutcome {
        let result = self.extractor.extract_price(&product.url, &product.selector).await;

        let (Some(price), Some(source)) = (result.price(), result.source()) else {
            warn!("{}: price not found", product.name);
            self.record_history(product, None, CheckStatus::NotFound, now).await;
            return CheckOutcome::default();
        };

        self.record_history(product, Some(price), CheckStatus::Success, now).await;

        let entry = state.entry(product.url.clone()).or_default();
        entry.name = product.name.clone();
        entry.url = product.url.clone();
        entry.selector = product.selector.clone();

        let previous = entry.current_price;
        entry.observe(price, source, now);

        match previous {
            None => info!("{}: ${:.2}", product.name, price),
            Some(old) if old != price => info!("{}: ${:.2} (was ${:.2})", product.name, price, old),
            Some(_) => info!("{}: ${:.2} (no change)", product.name, price),
        }

        let mut outcome = CheckOutcome {
            price: Some(price),
            source: Some(source),
            notified: false,
        };

        if let Some(alert) = evaluate_alert(product, price, previous, entry, now)
            && self.dispatch(&alert).await
        {
            entry.record_notification(price, now);
            outcome.notified = true;
        }

        outcome
    }

    async fn record_history(&self, product: &Product, price: Option<f64>, status: CheckStatus, now: DateTime<Utc>) {
        let Some(history) = &self.history else { return };
        if let Err(e) = history
            .record_price(&product.url, &product.name, price, status, Some(now))
            .await
        {
            error!("Failed to record history for {}: {}", product.url, e);
        }
    }

    /// Send to every notifier. True when at least one delivery succeeded.
    async fn dispatch(&self, alert: &SaleAlert) -> bool {
        if self.notifiers.is_empty() {
            info!(
                "{}: {} alert at ${:.2} (no notifiers configured)",
                alert.product_name, alert.trigger, alert.current_price
            );
            return false;
        }

        let mut delivered = false;
        for notifier in &self.notifiers {
            match notifier.notify(alert).await {
                Ok(()) => {
                    metrics::counter!("sale_monitor_notifications_total", "notifier" => notifier.name())
                        .increment(1);
                    delivered = true;
                }
                Err(e) => error!("{} notification failed for {}: {}", notifier.name(), alert.product_name, e),
            }
        }
        delivered
    }
}
