use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_fraction = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value > 0.0 && value <= 1.0 {
            Ok(value)
        } else {
            Err(invalid(var, format!("{value} is outside (0, 1]")))
        }
    };

    let data_dir = PathBuf::from(or_default("GHOSTWATCH_DATA_DIR", "data"));
    let log_level = or_default("GHOSTWATCH_LOG_LEVEL", "info");
    let instagram_username = lookup("INSTAGRAM_USERNAME")
        .ok()
        .filter(|v| !v.trim().is_empty());

    let max_retries = parse_u32("GHOSTWATCH_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("GHOSTWATCH_RETRY_BACKOFF_BASE_MS", "2000")?;
    let scroll_pause_ms = parse_u64("GHOSTWATCH_SCROLL_PAUSE_MS", "2500")?;
    let checkpoint_interval_secs = parse_u64("GHOSTWATCH_CHECKPOINT_INTERVAL_SECS", "60")?;
    let max_collection_secs = parse_u64("GHOSTWATCH_MAX_COLLECTION_SECS", "10800")?;
    let rotate_after_stalls = parse_u32("GHOSTWATCH_ROTATE_AFTER_STALLS", "3")?;
    let stall_ceiling = parse_u32("GHOSTWATCH_STALL_CEILING", "18")?;
    let min_iterations = parse_u32("GHOSTWATCH_MIN_ITERATIONS", "10")?;
    let bottom_confirmations = parse_u32("GHOSTWATCH_BOTTOM_CONFIRMATIONS", "3")?;
    let stale_ceiling = parse_u32("GHOSTWATCH_STALE_CEILING", "15")?;
    let stale_escalation = parse_u32("GHOSTWATCH_STALE_ESCALATION", "3")?;
    let max_page_refreshes = parse_u32("GHOSTWATCH_MAX_PAGE_REFRESHES", "3")?;
    let max_reauth_attempts = parse_u32("GHOSTWATCH_MAX_REAUTH_ATTEMPTS", "2")?;
    let expected_total_ratio = parse_fraction("GHOSTWATCH_EXPECTED_TOTAL_RATIO", "0.95")?;
    let ghost_threshold = parse_fraction("GHOSTWATCH_GHOST_THRESHOLD", "0.1")?;
    let enrich_limit = parse_usize("GHOSTWATCH_ENRICH_LIMIT", "20")?;

    if rotate_after_stalls == 0 {
        return Err(invalid(
            "GHOSTWATCH_ROTATE_AFTER_STALLS",
            "must be at least 1".to_string(),
        ));
    }

    Ok(AppConfig {
        data_dir,
        log_level,
        instagram_username,
        max_retries,
        retry_backoff_base_ms,
        scroll_pause_ms,
        checkpoint_interval_secs,
        max_collection_secs,
        rotate_after_stalls,
        stall_ceiling,
        min_iterations,
        bottom_confirmations,
        stale_ceiling,
        stale_escalation,
        max_page_refreshes,
        max_reauth_attempts,
        expected_total_ratio,
        ghost_threshold,
        enrich_limit,
    })
}
