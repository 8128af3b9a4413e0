use std::path::PathBuf;

use crate::ConfigError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub instagram_username: Option<String>,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub scroll_pause_ms: u64,
    pub checkpoint_interval_secs: u64,
    pub max_collection_secs: u64,
    pub rotate_after_stalls: u32,
    pub stall_ceiling: u32,
    pub min_iterations: u32,
    pub bottom_confirmations: u32,
    pub stale_ceiling: u32,
    pub stale_escalation: u32,
    pub max_page_refreshes: u32,
    pub max_reauth_attempts: u32,
    pub expected_total_ratio: f64,
    pub ghost_threshold: f64,
    pub enrich_limit: usize,
}

impl AppConfig {
    /// Directory holding follower checkpoints, one subdirectory per target.
    #[must_use]
    pub fn followers_dir(&self) -> PathBuf {
        self.data_dir.join("followers")
    }

    /// Directory holding raw engagement source files.
    #[must_use]
    pub fn engagement_dir(&self) -> PathBuf {
        self.data_dir.join("engagement")
    }

    /// Directory receiving CSV exports.
    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }

    /// Resolves the account to operate on: an explicit value wins, otherwise
    /// the logged-in `INSTAGRAM_USERNAME`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when neither is available.
    pub fn resolve_target(&self, explicit: Option<&str>) -> Result<String, ConfigError> {
        explicit
            .map(str::to_owned)
            .or_else(|| self.instagram_username.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("INSTAGRAM_USERNAME".to_string()))
    }
}
