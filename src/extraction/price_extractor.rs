use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::auto_detector::PriceAutoDetector;
use super::text::{element_text, looks_like_single_price, parse_price};
use crate::config::ScraperConfig;
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::Result;

/// Which strategy produced a price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Manual,
    Auto,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Manual => "manual",
            PriceSource::Auto => "auto",
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A price and its provenance, or neither. The two are never set independently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    price: Option<f64>,
    source: Option<PriceSource>,
}

impl ExtractionResult {
    pub fn found(price: f64, source: PriceSource) -> Self {
        Self {
            price: Some(price),
            source: Some(source),
        }
    }

    pub fn not_found() -> Self {
        Self {
            price: None,
            source: None,
        }
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn source(&self) -> Option<PriceSource> {
        self.source
    }

    /// `"manual"`, `"auto"`, or `""` on total failure.
    pub fn source_tag(&self) -> &'static str {
        self.source.map(|s| s.as_str()).unwrap_or("")
    }

    pub fn is_found(&self) -> bool {
        self.price.is_some()
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct PriceExtractor {
    fetcher: Arc<dyn PageFetcher>,
    sleeper: Arc<dyn Sleeper>,
    detector: PriceAutoDetector,
    max_retries: u32,
}

impl PriceExtractor {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config)?;
        Ok(Self::with_parts(
            Arc::new(fetcher),
            Arc::new(TokioSleeper),
            config.max_retries,
        ))
    }

    pub fn with_parts(
        fetcher: Arc<dyn PageFetcher>,
        sleeper: Arc<dyn Sleeper>,
        max_retries: u32,
    ) -> Self {
        Self {
            fetcher,
            sleeper,
            detector: PriceAutoDetector::new(),
            max_retries,
        }
    }

    pub fn with_detector(mut self, detector: PriceAutoDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn detector(&self) -> &PriceAutoDetector {
        &self.detector
    }

    /// Delay after the zero-based `attempt` failed: 1s, 2s, 4s, ...
    pub fn backoff_delay(attempt: u32) -> Duration {
        Duration::from_secs(1u64 << attempt.min(16))
    }

    /// Fetch `url` and pull a price out of it, trying `selector` first and
    /// auto-detection second. Every attempt re-fetches the page, whether the
    /// previous one failed in transport or found no price.
    pub async fn extract_price(&self, url: &str, selector: &str) -> ExtractionResult {
        for attempt in 0..self.max_retries {
            match self.fetcher.fetch(url).await {
                Ok(page) if page.is_ok() => {
                    if let Some(result) = self.extract_from_html(&page.body, selector) {
                        metrics::counter!("sale_monitor_extractions_total", "source" => result.source_tag())
                            .increment(1);
                        return result;
                    }
                    tracing::warn!(
                        "No price found on {} (attempt {}/{})",
                        url,
                        attempt + 1,
                        self.max_retries
                    );
                }
                Ok(page) => {
                    metrics::counter!("sale_monitor_fetch_failures_total").increment(1);
                    tracing::warn!("GET {} -> {}", url, page.status);
                }
                Err(e) => {
                    metrics::counter!("sale_monitor_fetch_failures_total").increment(1);
                    tracing::error!(
                        "Request failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                }
            }

            if attempt + 1 < self.max_retries {
                self.sleeper.sleep(Self::backoff_delay(attempt)).await;
            }
        }

        metrics::counter!("sale_monitor_extractions_total", "source" => "none").increment(1);
        ExtractionResult::not_found()
    }

    /// Manual selector, then auto-detection, over one parsed document.
    /// Returns `None` when neither yields a parseable price.
    pub fn extract_from_html(&self, html: &str, selector: &str) -> Option<ExtractionResult> {
        let document = Html::parse_document(html);

        if !selector.trim().is_empty() {
            match first_price(&document, selector) {
                Ok(Some(price)) => return Some(ExtractionResult::found(price, PriceSource::Manual)),
                Ok(None) => {}
                Err(e) => tracing::warn!("{}", e),
            }
        }

        let detection = self.detector.detect_in(&document);
        if !detection.is_found() {
            tracing::debug!("Auto-detection found no price candidates");
            return None;
        }

        match detected_price(&document, &detection.selector) {
            Ok(Some(price)) => {
                tracing::info!(
                    "Auto-detected price {:.2} via '{}' ({})",
                    price,
                    detection.selector,
                    detection.platform
                );
                Some(ExtractionResult::found(price, PriceSource::Auto))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }
}

// Ok(None) covers both a selector miss and text that does not parse.
fn first_price(document: &Html, selector: &str) -> std::result::Result<Option<f64>, String> {
    let css_selector = Selector::parse(selector)
        .map_err(|e| format!("Invalid CSS selector '{}': {:?}", selector, e))?;

    let Some(element) = document.select(&css_selector).next() else {
        tracing::warn!("Selector not found: {}", selector);
        return Ok(None);
    };

    let text = element_text(&element);
    let price = parse_price(&text);
    if price.is_none() {
        tracing::warn!("Failed to parse price from: {}", text);
    }
    Ok(price)
}

// The detector accepts a pattern when any match qualifies, so read the price
// from the first element that passes the same heuristic.
fn detected_price(document: &Html, selector: &str) -> std::result::Result<Option<f64>, String> {
    let css_selector = Selector::parse(selector)
        .map_err(|e| format!("Invalid CSS selector '{}': {:?}", selector, e))?;

    let price = document
        .select(&css_selector)
        .map(|element| element_text(&element))
        .find(|text| looks_like_single_price(text))
        .and_then(|text| parse_price(&text));
    if price.is_none() {
        tracing::warn!("No single price under detected selector: {}", selector);
    }
    Ok(price)
}
