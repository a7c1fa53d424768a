use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::models::{CheckStatus, PriceChange, PriceRecord, PriceStats, TrackedProduct};
use crate::Result;

/// Append-only log of price checks backed by SQLite.
#[derive(Clone)]
pub struct PriceHistoryStore {
    pool: SqlitePool,
}

/// Timestamps are stored as fixed-width RFC 3339 text so that string
/// comparison in SQL matches chronological order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl PriceHistoryStore {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("Opened price history database: {}", path.display());
        Self::with_pool(pool).await
    }

    /// Connect using a sqlx URL such as `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Every in-memory connection is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_url TEXT NOT NULL,
                product_name TEXT NOT NULL,
                price REAL,
                timestamp TEXT NOT NULL,
                check_status TEXT NOT NULL DEFAULT 'success'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_product_url ON price_history(product_url)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_timestamp ON price_history(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn record_price(
        &self,
        product_url: &str,
        product_name: &str,
        price: Option<f64>,
        status: CheckStatus,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let timestamp = timestamp.unwrap_or_else(Utc::now);

        sqlx::query(
            r#"
            INSERT INTO price_history (product_url, product_name, price, timestamp, check_status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(product_url)
        .bind(product_name)
        .bind(price)
        .bind(format_ts(timestamp))
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        debug!("Recorded {} check for {}", status, product_url);
        Ok(())
    }

    /// History for one product, newest first.
    pub async fn get_history(
        &self,
        product_url: &str,
        days: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Vec<PriceRecord>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, product_url, product_name, price, timestamp, check_status \
             FROM price_history WHERE product_url = ",
        );
        query.push_bind(product_url);

        if let Some(days) = days {
            let cutoff = Utc::now() - Duration::days(i64::from(days));
            query.push(" AND timestamp >= ").push_bind(format_ts(cutoff));
        }

        query.push(" ORDER BY timestamp DESC, id DESC");

        if let Some(limit) = limit {
            query.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let records = query
            .build_query_as::<PriceRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Distinct (url, name) pairs that have any history, ordered by name.
    pub async fn get_all_products(&self) -> Result<Vec<TrackedProduct>> {
        let products = sqlx::query_as::<_, TrackedProduct>(
            "SELECT DISTINCT product_url, product_name FROM price_history ORDER BY product_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Transitions between consecutive successful checks, newest first.
    pub async fn get_price_changes(&self, product_url: &str, days: Option<u32>) -> Result<Vec<PriceChange>> {
        let history = self.get_history(product_url, days, None).await?;

        let mut changes = Vec::new();
        let mut previous: Option<f64> = None;

        for record in history.iter().rev() {
            if record.check_status != CheckStatus::Success {
                continue;
            }
            let Some(price) = record.price else { continue };
            if let Some(old_price) = previous
                && old_price != price
            {
                changes.push(PriceChange {
                    timestamp: record.timestamp,
                    old_price,
                    new_price: price,
                });
            }
            previous = Some(price);
        }

        changes.reverse();
        Ok(changes)
    }

    /// Delete records older than `retention_days`. Zero keeps everything.
    pub async fn cleanup_old_records(&self, retention_days: u32) -> Result<u64> {
        if retention_days == 0 {
            return Ok(0);
        }

        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let result = sqlx::query("DELETE FROM price_history WHERE timestamp < ?")
            .bind(format_ts(cutoff))
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!("Removed {} history records older than {} days", deleted, retention_days);
        }
        Ok(deleted)
    }

    /// Summary over successful checks; `None` when there are none.
    pub async fn get_stats(&self, product_url: &str, days: Option<u32>) -> Result<Option<PriceStats>> {
        let history = self.get_history(product_url, days, None).await?;

        let successful: Vec<(DateTime<Utc>, f64)> = history
            .iter()
            .filter(|r| r.check_status == CheckStatus::Success)
            .filter_map(|r| r.price.map(|p| (r.timestamp, p)))
            .collect();

        let (Some(newest), Some(oldest)) = (successful.first(), successful.last()) else {
            return Ok(None);
        };

        let prices = successful.iter().map(|(_, p)| *p);
        let min_price = prices.clone().fold(f64::INFINITY, f64::min);
        let max_price = prices.clone().fold(f64::NEG_INFINITY, f64::max);
        let avg_price = prices.sum::<f64>() / successful.len() as f64;

        Ok(Some(PriceStats {
            min_price,
            max_price,
            avg_price,
            current_price: newest.1,
            count: successful.len() as i64,
            first_seen: oldest.0,
            last_seen: newest.0,
        }))
    }

    /// Write history as CSV, newest first. Returns the number of data rows.
    pub async fn export_csv<W: Write>(&self, writer: W, product_url: Option<&str>) -> Result<usize> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT product_name, product_url, price, timestamp, check_status FROM price_history",
        );
        if let Some(url) = product_url {
            query.push(" WHERE product_url = ").push_bind(url);
        }
        query.push(" ORDER BY timestamp DESC, id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["product_name", "product_url", "price", "timestamp", "status"])?;

        for row in &rows {
            let price: Option<f64> = row.try_get("price")?;
            let name: String = row.try_get("product_name")?;
            let url: String = row.try_get("product_url")?;
            let timestamp: String = row.try_get("timestamp")?;
            let status: String = row.try_get("check_status")?;
            let price = price.map(|p| p.to_string()).unwrap_or_default();

            csv_writer.write_record([name.as_str(), url.as_str(), price.as_str(), timestamp.as_str(), status.as_str()])?;
        }

        csv_writer.flush()?;
        Ok(rows.len())
    }

    /// Count rows whose stored name differs from the catalog name.
    pub async fn count_name_mismatches(&self, names: &HashMap<String, String>) -> Result<u64> {
        let mut total = 0u64;
        for (url, name) in names {
            let row = sqlx::query(
                "SELECT COUNT(1) AS count FROM price_history WHERE product_url = ? AND product_name <> ?",
            )
            .bind(url)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
            let count: i64 = row.try_get("count")?;
            total += count as u64;
        }
        Ok(total)
    }

    /// Rewrite stored names to match `url -> name`. Returns updated rows.
    pub async fn normalize_names(&self, names: &HashMap<String, String>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0u64;

        for (url, name) in names {
            let result = sqlx::query(
                "UPDATE price_history SET product_name = ? WHERE product_url = ? AND product_name <> ?",
            )
            .bind(name)
            .bind(url)
            .bind(name)
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected();
        }

        tx.commit().await?;
        if updated > 0 {
            info!("Normalized {} history rows", updated);
        }
        Ok(updated)
    }
}
