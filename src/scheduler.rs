use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::monitor::{CycleSummary, PriceMonitor};
use crate::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub completed_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_summary: Option<CycleSummary>,
    pub last_error: Option<String>,
}

/// Drives [`PriceMonitor`] cycles on a fixed interval. Cycles never overlap.
pub struct CheckScheduler {
    monitor: Arc<PriceMonitor>,
    interval: Duration,
    run_on_start: bool,
    retention_days: u32,
    cycle_lock: Mutex<()>,
    stats: RwLock<SchedulerStats>,
}

impl CheckScheduler {
    pub fn new(monitor: Arc<PriceMonitor>, config: &SchedulerConfig, retention_days: u32) -> Self {
        Self {
            monitor,
            interval: Duration::from_secs(config.interval_minutes.max(1) * 60),
            run_on_start: config.run_on_start,
            retention_days,
            cycle_lock: Mutex::new(()),
            stats: RwLock::new(SchedulerStats::default()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }

    /// One cycle followed by history retention cleanup.
    pub async fn run_once(&self) -> Result<CycleSummary> {
        let _guard = self.cycle_lock.lock().await;
        let started_at = Utc::now();

        let outcome = self.monitor.run_cycle().await;

        {
            let mut stats = self.stats.write().await;
            stats.last_run = Some(started_at);
            match &outcome {
                Ok(summary) => {
                    stats.completed_runs += 1;
                    stats.last_summary = Some(*summary);
                    stats.last_error = None;
                }
                Err(e) => {
                    stats.failed_runs += 1;
                    stats.last_error = Some(e.to_string());
                }
            }
        }

        if self.retention_days > 0
            && let Some(history) = self.monitor.history()
            && let Err(e) = history.cleanup_old_records(self.retention_days).await
        {
            error!("History cleanup failed: {}", e);
        }

        outcome
    }

    /// Run cycles every interval until `shutdown` resolves. A cycle in
    /// progress is allowed to finish.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let start = if self.run_on_start {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Scheduler started: checking prices every {} minutes",
            self.interval.as_secs() / 60
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("Price check cycle failed: {}", e);
                    }
                }
            }
        }
    }
}
