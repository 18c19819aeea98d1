//! Environment-driven configuration
//!
//! Every setting has a default so a bare checkout runs against a local
//! backend. Values that are present but malformed are rejected.

use crate::error::AgentError;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:11434";
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.duckduckgo.com/";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the completion backend
    pub backend_url: String,
    /// Model identifier; `None` means discover it from the backend
    pub model: Option<String>,
    pub request_timeout: Duration,
    pub max_iterations: usize,
    /// Number of most-recent turns replayed to the model each call
    pub history_window: usize,
    pub memory_path: PathBuf,
    pub memory_tail_chars: usize,
    /// Sandbox directory for agent file writes and screenshots
    pub reports_dir: PathBuf,
    /// Lets `read_file` fall back to paths outside the sandbox
    pub read_fallback: bool,
    pub search_endpoint: String,
    pub search_timeout: Duration,
    pub analytics_url: Option<String>,
    pub browser_headless: bool,
    pub background_presets: bool,
    pub port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            model: None,
            request_timeout: Duration::from_secs(90),
            max_iterations: 15,
            history_window: 10,
            memory_path: PathBuf::from("memory/relational_memory.txt"),
            memory_tail_chars: 3000,
            reports_dir: PathBuf::from("reports"),
            read_fallback: false,
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            search_timeout: Duration::from_secs(15),
            analytics_url: None,
            browser_headless: true,
            background_presets: false,
            port: 8080,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (process env, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend_url = get("AGENT_BACKEND_URL")
            .unwrap_or(defaults.backend_url)
            .trim_end_matches('/')
            .to_string();

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => defaults.port,
        };

        Ok(Self {
            backend_url,
            model: get("AGENT_MODEL"),
            request_timeout: secs_or(&get, "AGENT_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            max_iterations: positive_or(&get, "AGENT_MAX_ITERATIONS", defaults.max_iterations)?,
            history_window: positive_or(&get, "AGENT_HISTORY_WINDOW", defaults.history_window)?,
            memory_path: get("AGENT_MEMORY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.memory_path),
            memory_tail_chars: match get("AGENT_MEMORY_TAIL_CHARS") {
                Some(raw) => parse_value("AGENT_MEMORY_TAIL_CHARS", &raw)?,
                None => defaults.memory_tail_chars,
            },
            reports_dir: get("AGENT_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_dir),
            read_fallback: flag_or(&get, "AGENT_READ_FALLBACK", defaults.read_fallback)?,
            search_endpoint: get("SEARCH_ENDPOINT").unwrap_or(defaults.search_endpoint),
            search_timeout: secs_or(&get, "SEARCH_TIMEOUT_SECS", defaults.search_timeout)?,
            analytics_url: get("FINANCIAL_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            browser_headless: flag_or(&get, "BROWSER_HEADLESS", defaults.browser_headless)?,
            background_presets: flag_or(&get, "AGENT_BACKGROUND_PRESETS", defaults.background_presets)?,
            port,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| AgentError::Config(format!("{} has an invalid value: {}", key, raw)))
}

fn secs_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => Ok(Duration::from_secs(parse_value::<u64>(key, &raw)?)),
        None => Ok(default),
    }
}

fn positive_or<G>(get: &G, key: &str, default: usize) -> Result<usize>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => {
            let value: usize = parse_value(key, &raw)?;
            if value == 0 {
                return Err(AgentError::Config(format!("{} must be greater than zero", key)));
            }
            Ok(value)
        }
        None => Ok(default),
    }
}

fn flag_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AgentError::Config(format!("{} must be a boolean, got {}", key, v))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.max_iterations, 15);
        assert_eq!(config.history_window, 10);
        assert!(config.model.is_none());
        assert!(!config.read_fallback);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_overrides() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("AGENT_BACKEND_URL", "http://gpu-box:11434/"),
            ("AGENT_MODEL", "llama3.1:latest"),
            ("AGENT_MAX_ITERATIONS", "4"),
            ("AGENT_READ_FALLBACK", "true"),
            ("FINANCIAL_API_BASE_URL", "http://analytics:9000/"),
            ("API_PORT", "9090"),
        ]))
        .unwrap();

        assert_eq!(config.backend_url, "http://gpu-box:11434");
        assert_eq!(config.model.as_deref(), Some("llama3.1:latest"));
        assert_eq!(config.max_iterations, 4);
        assert!(config.read_fallback);
        assert_eq!(config.analytics_url.as_deref(), Some("http://analytics:9000"));
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AgentConfig::from_lookup(lookup(&[("AGENT_MAX_ITERATIONS", "many")]));
        assert!(matches!(err, Err(AgentError::Config(_))));

        let err = AgentConfig::from_lookup(lookup(&[("AGENT_HISTORY_WINDOW", "0")]));
        assert!(matches!(err, Err(AgentError::Config(_))));

        let err = AgentConfig::from_lookup(lookup(&[("BROWSER_HEADLESS", "maybe")]));
        assert!(matches!(err, Err(AgentError::Config(_))));
    }
}
