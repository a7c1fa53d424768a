use csv::StringRecord;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use validator::Validate;

use crate::models::{Product, DEFAULT_COOLDOWN_HOURS};
use crate::utils::FileLock;
use crate::{AppError, Result};

const REQUIRED_COLUMNS: [&str; 3] = ["name", "url", "selector"];
const HEADER: [&str; 7] = [
    "name",
    "url",
    "target_price",
    "discount_threshold",
    "selector",
    "enabled",
    "notification_cooldown_hours",
];

fn parse_optional_f64(value: Option<&str>) -> Option<f64> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_enabled(value: Option<&str>) -> bool {
    match value {
        Some(v) => !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no" | "n"),
        None => true,
    }
}

/// Blank means the default. Negative or fractional hours are rejected and
/// also fall back to the default, with a warning.
fn parse_cooldown(value: Option<&str>) -> u32 {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => DEFAULT_COOLDOWN_HOURS,
        Some(v) => v.parse::<u32>().unwrap_or_else(|_| {
            warn!(
                "Invalid notification_cooldown_hours '{}', using {}",
                v, DEFAULT_COOLDOWN_HOURS
            );
            DEFAULT_COOLDOWN_HOURS
        }),
    }
}

fn format_optional_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Read the product catalog. Optional columns are parsed leniently.
pub fn read_products(path: impl AsRef<Path>) -> Result<Vec<Product>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AppError::NotFound {
            resource: format!("products CSV at {}", path.display()),
        });
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| column(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "CSV is missing required columns: {}",
            missing.join(", ")
        )));
    }

    let name_idx = column("name");
    let url_idx = column("url");
    let selector_idx = column("selector");
    let target_idx = column("target_price");
    let threshold_idx = column("discount_threshold");
    let enabled_idx = column("enabled");
    let cooldown_idx = column("notification_cooldown_hours");

    let field = |record: &StringRecord, idx: Option<usize>| -> Option<String> {
        idx.and_then(|i| record.get(i)).map(|v| v.trim().to_string())
    };

    let mut products = Vec::new();
    for record in reader.records() {
        let record = record?;
        products.push(Product {
            name: field(&record, name_idx).unwrap_or_default(),
            url: field(&record, url_idx).unwrap_or_default(),
            selector: field(&record, selector_idx).unwrap_or_default(),
            target_price: parse_optional_f64(field(&record, target_idx).as_deref()),
            discount_threshold: parse_optional_f64(field(&record, threshold_idx).as_deref()),
            enabled: parse_enabled(field(&record, enabled_idx).as_deref()),
            notification_cooldown_hours: parse_cooldown(field(&record, cooldown_idx).as_deref()),
        });
    }

    Ok(products)
}

/// Replace the catalog atomically with `products` under the canonical header.
pub fn write_products(path: impl AsRef<Path>, products: &[Product]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(HEADER)?;
        for product in products {
            writer.write_record([
                product.name.clone(),
                product.url.clone(),
                format_optional_f64(product.target_price),
                format_optional_f64(product.discount_threshold),
                product.selector.clone(),
                product.enabled.to_string(),
                product.notification_cooldown_hours.to_string(),
            ])?;
        }
        writer.flush()?;
    }
    tmp.as_file_mut().flush()?;
    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;
    Ok(())
}

/// Validate and append a product, holding the catalog lock for the
/// read-modify-write. Duplicate URLs are rejected.
pub async fn add_product(path: impl AsRef<Path>, product: Product, lock_timeout: Duration) -> Result<Product> {
    product.validate()?;

    let path = path.as_ref();
    let _lock = FileLock::acquire(path, lock_timeout).await?;

    let mut products = if path.exists() { read_products(path)? } else { Vec::new() };

    if products.iter().any(|p| p.url == product.url) {
        return Err(AppError::Conflict(format!("Product with URL {} already exists", product.url)));
    }

    products.push(product.clone());
    write_products(path, &products)?;
    info!("Added product '{}' ({})", product.name, product.url);

    Ok(product)
}

/// Apply `edit` to the product with `url` and rewrite the catalog.
/// The edited product is validated before anything is written.
pub async fn update_product<F>(path: impl AsRef<Path>, url: &str, lock_timeout: Duration, edit: F) -> Result<Product>
where
    F: FnOnce(&mut Product),
{
    let path = path.as_ref();
    let _lock = FileLock::acquire(path, lock_timeout).await?;

    let mut products = read_products(path)?;
    let product = products
        .iter_mut()
        .find(|p| p.url == url)
        .ok_or_else(|| AppError::NotFound {
            resource: format!("product {}", url),
        })?;

    edit(product);
    product.validate()?;
    let updated = product.clone();

    write_products(path, &products)?;
    Ok(updated)
}

pub async fn remove_product(path: impl AsRef<Path>, url: &str, lock_timeout: Duration) -> Result<Product> {
    let path = path.as_ref();
    let _lock = FileLock::acquire(path, lock_timeout).await?;

    let mut products = read_products(path)?;
    let index = products
        .iter()
        .position(|p| p.url == url)
        .ok_or_else(|| AppError::NotFound {
            resource: format!("product {}", url),
        })?;

    let removed = products.remove(index);
    write_products(path, &products)?;
    info!("Removed product '{}' ({})", removed.name, removed.url);
    Ok(removed)
}
