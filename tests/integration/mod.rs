// Shared fixtures for the integration suite: a local HTTP storefront,
// recording sleeper/notifier doubles and a temporary data directory.

pub mod extraction_tests;
pub mod monitor_tests;
pub mod storage_tests;
pub mod web_tests;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sale_monitor::config::ScraperConfig;
use sale_monitor::extraction::Sleeper;
use sale_monitor::fetcher::HttpFetcher;
use sale_monitor::models::Product;
use sale_monitor::notifications::{Notifier, SaleAlert};
use sale_monitor::storage::{write_products, PriceHistoryStore};
use sale_monitor::{AppError, PriceExtractor, PriceMonitor};

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Keeps every alert it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<SaleAlert>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SaleAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, alert: &SaleAlert) -> sale_monitor::Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn notify(&self, _alert: &SaleAlert) -> sale_monitor::Result<()> {
        Err(AppError::Notification("smtp unreachable".into()))
    }
}

pub fn scraper_config(max_retries: u32) -> ScraperConfig {
    ScraperConfig {
        user_agent: "SaleMonitor-Test/1.0".to_string(),
        request_timeout: 5,
        max_retries,
    }
}

pub fn extractor(max_retries: u32, sleeper: Arc<RecordingSleeper>) -> PriceExtractor {
    let fetcher = HttpFetcher::new(&scraper_config(max_retries)).unwrap();
    PriceExtractor::with_parts(Arc::new(fetcher), sleeper, max_retries)
}

pub fn product_page(price_markup: &str) -> String {
    format!(
        "<html><head><title>Item</title></head><body><h1>Item</h1>{}</body></html>",
        price_markup
    )
}

/// Serve `body` with status 200 at `route`, replacing whatever was mounted.
pub async fn serve_page(server: &MockServer, route: &str, body: String) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn memory_history() -> PriceHistoryStore {
    PriceHistoryStore::connect("sqlite::memory:").await.unwrap()
}

/// Catalog and state files in a throwaway directory.
pub struct DataDir {
    pub dir: TempDir,
    pub products_csv: PathBuf,
    pub state_file: PathBuf,
}

impl DataDir {
    pub fn with_products(products: &[Product]) -> Self {
        let dir = TempDir::new().unwrap();
        let products_csv = dir.path().join("products.csv");
        let state_file = dir.path().join("state").join("price_state.json");
        write_products(&products_csv, products).unwrap();
        Self {
            dir,
            products_csv,
            state_file,
        }
    }

    pub fn monitor(&self, extractor: PriceExtractor) -> PriceMonitor {
        PriceMonitor::new(extractor, &self.products_csv, &self.state_file)
            .with_lock_timeout(Duration::from_secs(2))
    }
}
