use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResponse, AppState};
use crate::extraction::PriceSource;
use crate::models::{PriceRecord, PriceStats, Product, DEFAULT_COOLDOWN_HOURS};
use crate::monitor::CheckOutcome;
use crate::storage::{add_product as store_product, load_state, read_products, remove_product, update_product};

const DEFAULT_HISTORY_DAYS: u32 = 30;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Form values arrive either as JSON numbers or as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    /// Blank text clears the value.
    fn to_f64(&self, field: &str) -> Result<Option<f64>, ApiError> {
        match self {
            NumberOrText::Number(n) => Ok(Some(*n)),
            NumberOrText::Text(t) if t.trim().is_empty() => Ok(None),
            NumberOrText::Text(t) => t
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("{} must be a number", field))),
        }
    }

    fn to_hours(&self) -> Result<Option<u32>, ApiError> {
        let invalid = || ApiError::bad_request("notification_cooldown_hours must be a non-negative integer");
        match self.to_f64("notification_cooldown_hours")? {
            None => Ok(None),
            Some(h) if h >= 0.0 && h.fract() == 0.0 && h <= f64::from(u32::MAX) => Ok(Some(h as u32)),
            Some(_) => Err(invalid()),
        }
    }
}

fn parse_optional(value: &Option<NumberOrText>, field: &str) -> Result<Option<f64>, ApiError> {
    match value {
        Some(v) => v.to_f64(field),
        None => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
pub struct AddProductRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub selector: String,
    pub target_price: Option<NumberOrText>,
    pub discount_threshold: Option<NumberOrText>,
    pub enabled: Option<bool>,
    pub notification_cooldown_hours: Option<NumberOrText>,
}

impl AddProductRequest {
    fn into_product(self) -> Result<Product, ApiError> {
        let cooldown = match &self.notification_cooldown_hours {
            Some(v) => v.to_hours()?.unwrap_or(DEFAULT_COOLDOWN_HOURS),
            None => DEFAULT_COOLDOWN_HOURS,
        };

        Ok(Product {
            name: self.name.trim().to_string(),
            url: self.url.trim().to_string(),
            selector: self.selector.trim().to_string(),
            target_price: parse_optional(&self.target_price, "target_price")?,
            discount_threshold: parse_optional(&self.discount_threshold, "discount_threshold")?,
            enabled: self.enabled.unwrap_or(true),
            notification_cooldown_hours: cooldown,
        })
    }
}

/// Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub url: String,
    pub name: Option<String>,
    pub selector: Option<String>,
    pub target_price: Option<NumberOrText>,
    pub discount_threshold: Option<NumberOrText>,
    pub enabled: Option<bool>,
    pub notification_cooldown_hours: Option<NumberOrText>,
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub url: Option<String>,
    pub days: Option<u32>,
}

impl HistoryParams {
    fn require_url(&self) -> Result<&str, ApiError> {
        self.url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("URL parameter required"))
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub url: Option<String>,
}

/// A catalog entry joined with its last observed state.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductView {
    pub name: String,
    pub url: String,
    pub selector: String,
    pub target_price: Option<f64>,
    pub discount_threshold: Option<f64>,
    pub enabled: bool,
    pub notification_cooldown_hours: u32,
    pub current_price: Option<f64>,
    pub last_price: Option<f64>,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_source: Option<PriceSource>,
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "sale-monitor"
    }))
}

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<ProductView>> {
    let products = read_products(state.monitor.products_csv())?;
    let states = load_state(state.monitor.state_file());

    let views = products
        .into_iter()
        .map(|p| {
            let observed = states.get(&p.url);
            ProductView {
                current_price: observed.and_then(|s| s.current_price),
                last_price: observed.and_then(|s| s.last_price),
                last_checked: observed.and_then(|s| s.last_checked),
                last_source: observed.and_then(|s| s.last_source),
                name: p.name,
                url: p.url,
                selector: p.selector,
                target_price: p.target_price,
                discount_threshold: p.discount_threshold,
                enabled: p.enabled,
                notification_cooldown_hours: p.notification_cooldown_hours,
            }
        })
        .collect();

    Ok(Json(ApiResponse::success(views)))
}

pub async fn add_product(
    State(state): State<AppState>,
    Json(request): Json<AddProductRequest>,
) -> ApiResult<Product> {
    let product = request.into_product()?;
    let added = store_product(state.monitor.products_csv(), product, state.monitor.lock_timeout()).await?;
    Ok(Json(ApiResponse::success(added)))
}

pub async fn update_product_handler(
    State(state): State<AppState>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<Product> {
    let target_price = request
        .target_price
        .as_ref()
        .map(|v| v.to_f64("target_price"))
        .transpose()?;
    let discount_threshold = request
        .discount_threshold
        .as_ref()
        .map(|v| v.to_f64("discount_threshold"))
        .transpose()?;
    let cooldown = request
        .notification_cooldown_hours
        .as_ref()
        .map(NumberOrText::to_hours)
        .transpose()?;

    let updated = update_product(
        state.monitor.products_csv(),
        &request.url,
        state.monitor.lock_timeout(),
        |product| {
            if let Some(name) = request.name {
                product.name = name.trim().to_string();
            }
            if let Some(selector) = request.selector {
                product.selector = selector.trim().to_string();
            }
            if let Some(target_price) = target_price {
                product.target_price = target_price;
            }
            if let Some(threshold) = discount_threshold {
                product.discount_threshold = threshold;
            }
            if let Some(enabled) = request.enabled {
                product.enabled = enabled;
            }
            if let Some(hours) = cooldown {
                product.notification_cooldown_hours = hours.unwrap_or(DEFAULT_COOLDOWN_HOURS);
            }
        },
    )
    .await?;

    Ok(Json(ApiResponse::success(updated)))
}

pub async fn toggle_product(State(state): State<AppState>, Json(request): Json<UrlRequest>) -> ApiResult<Product> {
    let updated = update_product(
        state.monitor.products_csv(),
        &request.url,
        state.monitor.lock_timeout(),
        |product| product.enabled = !product.enabled,
    )
    .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_product(State(state): State<AppState>, Json(request): Json<UrlRequest>) -> ApiResult<Product> {
    let removed = remove_product(state.monitor.products_csv(), &request.url, state.monitor.lock_timeout()).await?;
    Ok(Json(ApiResponse::success(removed)))
}

pub async fn check_product(State(state): State<AppState>, Json(request): Json<UrlRequest>) -> ApiResult<CheckOutcome> {
    let outcome = state.monitor.check_url(&request.url).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn product_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Vec<PriceRecord>> {
    let url = params.require_url()?;
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    let records = state.history.get_history(url, Some(days), None).await?;
    Ok(Json(ApiResponse::success(records)))
}

pub async fn product_stats(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Option<PriceStats>> {
    let url = params.require_url()?;
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    let stats = state.history.get_stats(url, Some(days)).await?;
    Ok(Json(ApiResponse::success(stats)))
}

pub async fn export_history(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let mut buffer = Vec::new();
    let url = params.url.as_deref().filter(|u| !u.trim().is_empty());
    state.history.export_csv(&mut buffer, url).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"price_history.csv\""),
        ],
        buffer,
    )
        .into_response())
}

pub async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Sale Monitor</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        table { border-collapse: collapse; width: 100%; }
        th, td { padding: 8px 12px; border-bottom: 1px solid #ddd; text-align: left; }
        th { background: #f8f9fa; }
        .below-target { color: #2e7d32; font-weight: bold; }
        .disabled { color: #999; }
        .muted { color: #777; font-size: 0.9em; }
    </style>
</head>
<body>
    <h1>Sale Monitor</h1>
    <p class="muted"><a href="/api/history/export">Download price history (CSV)</a></p>
    <table>
        <thead>
            <tr>
                <th>Product</th><th>Current</th><th>Previous</th><th>Target</th>
                <th>Discount %</th><th>Last checked</th><th>Source</th>
            </tr>
        </thead>
        <tbody id="products"><tr><td colspan="7">Loading...</td></tr></tbody>
    </table>
    <script>
        const fmt = (v) => v == null ? '-' : '$' + Number(v).toFixed(2);
        fetch('/api/products')
            .then(response => response.json())
            .then(body => {
                const rows = (body.data || []).map(p => {
                    const hit = p.current_price != null && p.target_price != null && p.current_price <= p.target_price;
                    const cls = !p.enabled ? 'disabled' : (hit ? 'below-target' : '');
                    return '<tr class="' + cls + '">' +
                        '<td><a href="' + p.url + '">' + p.name + '</a></td>' +
                        '<td>' + fmt(p.current_price) + '</td>' +
                        '<td>' + fmt(p.last_price) + '</td>' +
                        '<td>' + fmt(p.target_price) + '</td>' +
                        '<td>' + (p.discount_threshold == null ? '-' : p.discount_threshold) + '</td>' +
                        '<td>' + (p.last_checked || 'never') + '</td>' +
                        '<td>' + (p.last_source || '-') + '</td>' +
                        '</tr>';
                });
                document.getElementById('products').innerHTML =
                    rows.join('') || '<tr><td colspan="7">No products configured</td></tr>';
            })
            .catch(error => {
                document.getElementById('products').innerHTML =
                    '<tr><td colspan="7">Error loading products: ' + error + '</td></tr>';
            });
    </script>
</body>
</html>"#;
