use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "sale-monitor")]
#[command(about = "Watch product pages and alert on price drops")]
#[command(version)]
pub struct Cli {
    /// Products catalog CSV
    #[arg(long, global = true, env = "PRODUCTS_CSV")]
    pub products_csv: Option<String>,

    /// Per-product state JSON file
    #[arg(long, global = true, env = "STATE_FILE")]
    pub state_file: Option<String>,

    /// SQLite price history database
    #[arg(long, global = true, env = "HISTORY_DB")]
    pub history_db: Option<String>,

    #[arg(long, global = true, env = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "TIMEOUT")]
    pub timeout: Option<u64>,

    /// Fetch attempts per product
    #[arg(long, global = true, env = "MAX_RETRIES")]
    pub max_retries: Option<u32>,

    #[arg(long, global = true, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check every enabled product once (default)
    Check,

    /// Check on a fixed interval until interrupted
    Watch {
        #[arg(long)]
        interval_minutes: Option<u64>,
    },

    /// Serve the dashboard and JSON API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Also run the interval checker in the same process
        #[arg(long)]
        watch: bool,
    },

    /// Extract a price from one URL and print it
    Extract {
        #[arg(long)]
        url: String,

        /// CSS selector to try before auto-detection
        #[arg(long, default_value = "")]
        selector: String,
    },

    /// Price history maintenance
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Write history as CSV
    Export {
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,

        /// Only this product
        #[arg(long)]
        url: Option<String>,
    },

    /// Delete records older than the retention window
    Cleanup {
        #[arg(long)]
        retention_days: Option<u32>,
    },

    /// Rewrite stored product names from the catalog (dry run unless --apply)
    NormalizeNames {
        #[arg(long)]
        apply: bool,
    },
}

impl Cli {
    /// Flags win over every other configuration source.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(path) = &self.products_csv {
            config.storage.products_csv = path.clone();
        }
        if let Some(path) = &self.state_file {
            config.storage.state_file = path.clone();
        }
        if let Some(path) = &self.history_db {
            config.storage.history_db = path.clone();
        }
        if let Some(agent) = &self.user_agent {
            config.scraper.user_agent = agent.clone();
        }
        if let Some(timeout) = self.timeout {
            config.scraper.request_timeout = timeout;
        }
        if let Some(retries) = self.max_retries {
            config.scraper.max_retries = retries;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.to_lowercase();
        }

        match &self.command {
            Some(Commands::Watch {
                interval_minutes: Some(minutes),
            }) => config.scheduler.interval_minutes = *minutes,
            Some(Commands::Serve { host, port, .. }) => {
                if let Some(host) = host {
                    config.server.host = host.clone();
                }
                if let Some(port) = port {
                    config.server.port = *port;
                }
            }
            Some(Commands::History(HistoryCommand::Cleanup {
                retention_days: Some(days),
            })) => config.storage.history_retention_days = *days,
            _ => {}
        }
    }
}
