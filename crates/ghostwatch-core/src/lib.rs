pub mod app_config;
pub mod config;
pub mod followers;
pub mod parse;
pub mod records;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use followers::{
    categorize_followers, follower_statistics, has_low_engagement_potential, is_potential_bot,
    merge_records, merge_snapshots, FollowerCategories, FollowerStatistics,
};
pub use parse::{find_count_in_text, parse_count};
pub use records::{AccountType, FollowerSnapshot, ProfileDetails, Record, RecordSet};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
