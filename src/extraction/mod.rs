//! Price extraction: text parsing, the platform pattern catalog, selector
//! auto-detection, and the fetch-and-extract orchestration built on them.

pub mod auto_detector;
pub mod patterns;
pub mod price_extractor;
pub mod text;

pub use auto_detector::{DetectionResult, PriceAutoDetector};
pub use patterns::{default_catalog, Platform, PricePattern};
pub use price_extractor::{ExtractionResult, PriceExtractor, PriceSource, Sleeper, TokioSleeper};
pub use text::{is_likely_price, is_single_price, parse_price};
