pub mod cli;
pub mod config;
pub mod extraction;
pub mod fetcher;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod scheduler;
pub mod storage;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use extraction::{ExtractionResult, PriceExtractor, PriceSource};
pub use monitor::{CheckOutcome, CycleSummary, PriceMonitor};
pub use scheduler::CheckScheduler;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
