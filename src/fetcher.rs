use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::ScraperConfig;
use crate::Result;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_DEFAULT: &str = "en-US,en;q=0.5";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    pub final_url: String, // After redirects
    pub response_time_ms: u64,
}

impl FetchedPage {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// HTTP boundary of the extractor. A transport failure is an `Err`; any
/// response, whatever its status, is an `Ok`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_DEFAULT));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let start_time = Instant::now();

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchedPage {
            status,
            body,
            final_url,
            response_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}
