use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Shopify,
    WooCommerce,
    BigCommerce,
    Magento,
    Generic,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Shopify => "shopify",
            Platform::WooCommerce => "woocommerce",
            Platform::BigCommerce => "bigcommerce",
            Platform::Magento => "magento",
            Platform::Generic => "generic",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry: a selector that tends to hold the price on `platform`,
/// weighted by how reliable it has proven to be.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePattern {
    pub selector: String,
    pub platform: Platform,
    pub confidence: f64,
}

impl PricePattern {
    pub fn new(selector: impl Into<String>, platform: Platform, confidence: f64) -> Self {
        Self {
            selector: selector.into(),
            platform,
            confidence,
        }
    }
}

// Most specific first within each family, generic catch-alls last.
const CATALOG: &[(&str, Platform, f64)] = &[
    // Shopify
    (".price__sale .price-item--sale", Platform::Shopify, 0.98),
    (".product-single__price .money", Platform::Shopify, 0.95),
    (".product__price .money", Platform::Shopify, 0.95),
    ("[data-product-price]", Platform::Shopify, 0.90),
    (".price--main", Platform::Shopify, 0.90),
    (".product-price", Platform::Shopify, 0.85),
    // WooCommerce
    ("p.price ins .woocommerce-Price-amount", Platform::WooCommerce, 0.96),
    (".woocommerce-Price-amount.amount", Platform::WooCommerce, 0.95),
    ("p.price .amount", Platform::WooCommerce, 0.90),
    (".summary .price", Platform::WooCommerce, 0.85),
    // BigCommerce
    (".productView-price .price--withTax", Platform::BigCommerce, 0.96),
    (".productView-price", Platform::BigCommerce, 0.95),
    ("[data-product-price-with-tax]", Platform::BigCommerce, 0.90),
    // Magento
    ("[data-price-type=\"finalPrice\"]", Platform::Magento, 0.95),
    (".price-box .price", Platform::Magento, 0.90),
    (".product-info-price .price", Platform::Magento, 0.85),
    // Generic
    ("[itemprop=\"price\"]", Platform::Generic, 0.80),
    ("[data-price]", Platform::Generic, 0.75),
    (".current-price", Platform::Generic, 0.75),
    (".product-price", Platform::Generic, 0.70),
    (".sale-price", Platform::Generic, 0.70),
    (".final-price", Platform::Generic, 0.70),
    (".price", Platform::Generic, 0.60),
    ("#price", Platform::Generic, 0.60),
];

/// The built-in catalog, in declaration order.
pub fn default_catalog() -> Vec<PricePattern> {
    CATALOG
        .iter()
        .map(|(selector, platform, confidence)| PricePattern::new(*selector, *platform, *confidence))
        .collect()
}
