use std::path::PathBuf;

use tracing::level_filters::LevelFilter;

const DISCORD_TOKEN: &str = "DISCORD_TOKEN";

pub fn get_discord_token() -> Option<String> {
    std::env::var(DISCORD_TOKEN).ok().filter(|token| !token.is_empty())
}

const CHANNEL_ID: &str = "CHANNEL_ID";

pub fn get_channel_id() -> Option<String> {
    std::env::var(CHANNEL_ID).ok().filter(|id| !id.is_empty())
}

const UPDATE_INTERVAL: &str = "UPDATE_INTERVAL";

pub fn get_update_interval() -> Option<u64> {
    std::env::var(UPDATE_INTERVAL).ok().and_then(|res| res.parse().ok())
}

const UPTIME_CHECK_INTERVAL: &str = "UPTIME_CHECK_INTERVAL";

pub fn get_uptime_check_interval() -> Option<u64> {
    std::env::var(UPTIME_CHECK_INTERVAL)
        .ok()
        .and_then(|res| res.parse().ok())
}

const LOG_LEVEL: &str = "LOG_LEVEL";

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

pub fn get_log_level() -> LevelFilter {
    let level_from_env = std::env::var(LOG_LEVEL);
    level_from_env.map_or(DEFAULT_LOG_LEVEL, |res| {
        res.to_lowercase().parse().unwrap_or(DEFAULT_LOG_LEVEL)
    })
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    PathBuf::from(path)
}

/// Human readable byte count, 1024-based (`8.0GB`).
pub fn bytes_to_human(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.1}{unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1}PB")
}
