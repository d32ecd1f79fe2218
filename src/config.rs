use std::path::PathBuf;
use std::str::FromStr;

/// Application-level constants
pub const APP_NAME: &str = "FrontDesk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default length of a bookable slot.
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// Maximum clinical records returned by a history lookup.
pub const DEFAULT_HISTORY_LIMIT: usize = 25;

/// Passages pulled from the knowledge base per informational query.
pub const DEFAULT_RETRIEVAL_K: usize = 4;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Get the application data directory
/// ~/FrontDesk/ on all platforms, or the working directory when there is no home.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite store location
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("frontdesk.db")
}

/// Directory scanned for knowledge-base documents and sample reports
pub fn default_sources_dir() -> PathBuf {
    app_data_dir().join("sources")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "frontdesk=info,warn"
}

/// Runtime settings. Every field has a default and can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub sources_dir: PathBuf,
    pub ollama_url: String,
    pub model: String,
    pub llm_timeout_secs: u64,
    pub slot_minutes: u32,
    pub history_limit: usize,
    pub retrieval_k: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            sources_dir: default_sources_dir(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            slot_minutes: DEFAULT_SLOT_MINUTES,
            history_limit: DEFAULT_HISTORY_LIMIT,
            retrieval_k: DEFAULT_RETRIEVAL_K,
        }
    }
}

impl Settings {
    /// Read settings from `FRONTDESK_*` / `OLLAMA_URL` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            db_path: lookup("FRONTDESK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            sources_dir: lookup("FRONTDESK_SOURCES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.sources_dir),
            ollama_url: lookup("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            model: lookup("FRONTDESK_MODEL").unwrap_or(defaults.model),
            llm_timeout_secs: parse_or(
                &lookup,
                "FRONTDESK_LLM_TIMEOUT_SECS",
                defaults.llm_timeout_secs,
            ),
            slot_minutes: parse_or(&lookup, "FRONTDESK_SLOT_MINUTES", defaults.slot_minutes),
            history_limit: parse_or(&lookup, "FRONTDESK_HISTORY_LIMIT", defaults.history_limit),
            retrieval_k: parse_or(&lookup, "FRONTDESK_RETRIEVAL_K", defaults.retrieval_k),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, default = %default, "Ignoring unparseable setting");
                default
            }
        },
    }
}
