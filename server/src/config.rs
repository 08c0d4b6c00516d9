//! Runtime settings for the admin module

use shared::{SteamId, CHAT_BATCH_SIZE, CHAT_FLUSH_INTERVAL_SECS, OPERATOR_STEAM_ID};
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://admin_tools.db";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Buffered records that trigger an immediate flush
    pub batch_size: usize,
    pub flush_interval: Duration,
    /// Upper bound on any single storage call
    pub store_timeout: Duration,
    /// Records kept while storage is failing; older ones are dropped past this
    pub max_pending: usize,
    /// Failed write attempts after which a record is given up on
    pub max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: CHAT_BATCH_SIZE,
            flush_interval: Duration::from_secs(CHAT_FLUSH_INTERVAL_SECS),
            store_timeout: Duration::from_secs(5),
            max_pending: 5_000,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleConfig {
    pub database_url: String,
    pub operator: SteamId,
    pub pipeline: PipelineConfig,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            operator: OPERATOR_STEAM_ID,
            pipeline: PipelineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModuleConfig::default();
        assert_eq!(config.operator, SteamId(76561197997290818));
        assert_eq!(config.pipeline.batch_size, 50);
        assert_eq!(config.pipeline.flush_interval, Duration::from_secs(10));
        assert!(config.pipeline.max_pending >= config.pipeline.batch_size);
        assert!(config.pipeline.max_attempts > 1);
    }
}
