use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use super::patterns::{default_catalog, PricePattern};
use super::text::{element_text, looks_like_single_price};

/// Outcome of one detection pass. The empty selector is the "not found" sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionResult {
    pub selector: String,
    pub platform: String,
    pub confidence: f64,
}

impl DetectionResult {
    pub fn not_found() -> Self {
        Self {
            selector: String::new(),
            platform: String::new(),
            confidence: 0.0,
        }
    }

    pub fn is_found(&self) -> bool {
        !self.selector.is_empty()
    }

    fn from_pattern(pattern: &PricePattern) -> Self {
        Self {
            selector: pattern.selector.clone(),
            platform: pattern.platform.as_str().to_string(),
            confidence: pattern.confidence,
        }
    }
}

/// Finds the price element on pages from well-known storefront platforms.
pub struct PriceAutoDetector {
    patterns: Vec<PricePattern>,
    last_detection: RwLock<Option<DetectionResult>>,
}

impl Default for PriceAutoDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceAutoDetector {
    pub fn new() -> Self {
        Self::with_patterns(default_catalog())
    }

    pub fn with_patterns(patterns: Vec<PricePattern>) -> Self {
        Self {
            patterns,
            last_detection: RwLock::new(None),
        }
    }

    pub fn patterns(&self) -> &[PricePattern] {
        &self.patterns
    }

    pub fn detect(&self, html: &str) -> DetectionResult {
        let document = Html::parse_document(html);
        self.detect_in(&document)
    }

    /// Scans every pattern and keeps the strictly highest confidence, so ties
    /// go to the earlier entry.
    pub fn detect_in(&self, document: &Html) -> DetectionResult {
        let mut best: Option<&PricePattern> = None;

        for pattern in &self.patterns {
            if best.is_some_and(|b| pattern.confidence <= b.confidence) {
                continue;
            }

            let selector = match Selector::parse(&pattern.selector) {
                Ok(selector) => selector,
                Err(e) => {
                    tracing::debug!("Skipping unparseable pattern '{}': {:?}", pattern.selector, e);
                    continue;
                }
            };

            let matched = document
                .select(&selector)
                .any(|element| looks_like_single_price(&element_text(&element)));

            if matched {
                best = Some(pattern);
            }
        }

        match best {
            Some(pattern) => {
                let result = DetectionResult::from_pattern(pattern);
                tracing::debug!(
                    "Auto-detected price selector '{}' ({}, confidence {:.2})",
                    result.selector,
                    result.platform,
                    result.confidence
                );
                if let Ok(mut last) = self.last_detection.write() {
                    *last = Some(result.clone());
                }
                result
            }
            None => DetectionResult::not_found(),
        }
    }

    /// Most recent successful detection. Diagnostic only.
    pub fn last_detection(&self) -> Option<DetectionResult> {
        self.last_detection.read().ok().and_then(|last| last.clone())
    }
}
