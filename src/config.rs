use std::path::PathBuf;

pub const DEFAULT_LOG_FILTER: &str = "rosterd=info";

/// Startup settings, read from the environment once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `ROSTERD_LOG`: tracing filter directives.
    pub log_filter: String,
    /// `ROSTERD_LOG_FILE`: append-only diagnostic log. Stderr when unset.
    pub log_file: Option<PathBuf>,
    /// `ROSTERD_WORKSPACE`: workspace opened before the first request.
    pub workspace: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_file: None,
            workspace: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Config {
            log_filter: non_empty("ROSTERD_LOG")
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_file: non_empty("ROSTERD_LOG_FILE").map(PathBuf::from),
            workspace: non_empty("ROSTERD_WORKSPACE").map(PathBuf::from),
        }
    }
}
