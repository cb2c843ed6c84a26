//! Server configuration, loaded from the environment.

use std::time::Duration;

/// One pre-provisioned team credential: `team:token[:ttl_secs]`.
#[derive(Debug, Clone)]
pub struct TeamTokenSpec {
    pub team_id: String,
    pub token: String,
    /// Validity window from process start; `None` means no expiry.
    pub ttl: Option<Duration>,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub bind_addr: String,

    /// Model backend base URL (OpenAI-compatible).
    pub model_base_url: String,

    /// Model backend API key; empty disables the backend (heuristics only).
    pub model_api_key: String,

    /// Model name sent with each request.
    pub model_name: String,

    /// Per-request model timeout. Kept inside the 10-15s suspension bound.
    pub model_timeout: Duration,

    /// Max attempts per stage before falling back.
    pub stage_max_attempts: u32,

    /// Base backoff between stage retries; doubles per attempt.
    pub stage_backoff: Duration,

    /// TTL for market-profile cache entries.
    pub market_cache_ttl: Duration,

    /// Max stage records retained per conversation (oldest dropped).
    pub memory_cap: usize,

    /// Per-source timeout for profile aggregation.
    pub source_timeout: Duration,

    /// Repository search endpoint for the external profile source.
    pub repo_search_url: String,

    /// Optional repository search token; empty disables the source.
    pub repo_search_token: String,

    /// Default number of matches returned by the team-building stage.
    pub team_stage_top_k: usize,

    /// Pre-provisioned team channel credentials.
    pub team_tokens: Vec<TeamTokenSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            model_base_url: "https://api.groq.com/openai/v1".to_string(),
            model_api_key: String::new(),
            model_name: "llama-3.3-70b-versatile".to_string(),
            model_timeout: Duration::from_secs(12),
            stage_max_attempts: 3,
            stage_backoff: Duration::from_millis(250),
            market_cache_ttl: Duration::from_secs(86_400),
            memory_cap: 256,
            source_timeout: Duration::from_secs(10),
            repo_search_url: "https://api.github.com".to_string(),
            repo_search_token: String::new(),
            team_stage_top_k: 5,
            team_tokens: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from `IDEAFLOW_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("IDEAFLOW_BIND_ADDR", defaults.bind_addr),
            model_base_url: env_or("IDEAFLOW_MODEL_BASE_URL", defaults.model_base_url),
            model_api_key: env_or("IDEAFLOW_MODEL_API_KEY", defaults.model_api_key),
            model_name: env_or("IDEAFLOW_MODEL_NAME", defaults.model_name),
            model_timeout: env_secs("IDEAFLOW_MODEL_TIMEOUT_SECS", defaults.model_timeout),
            stage_max_attempts: env_parse("IDEAFLOW_STAGE_MAX_ATTEMPTS", defaults.stage_max_attempts),
            stage_backoff: env_millis("IDEAFLOW_STAGE_BACKOFF_MS", defaults.stage_backoff),
            market_cache_ttl: env_secs("IDEAFLOW_MARKET_CACHE_TTL_SECS", defaults.market_cache_ttl),
            memory_cap: env_parse("IDEAFLOW_MEMORY_CAP", defaults.memory_cap),
            source_timeout: env_secs("IDEAFLOW_SOURCE_TIMEOUT_SECS", defaults.source_timeout),
            repo_search_url: env_or("IDEAFLOW_REPO_SEARCH_URL", defaults.repo_search_url),
            repo_search_token: env_or("IDEAFLOW_REPO_SEARCH_TOKEN", defaults.repo_search_token),
            team_stage_top_k: env_parse("IDEAFLOW_TEAM_STAGE_TOP_K", defaults.team_stage_top_k),
            team_tokens: parse_team_tokens(
                &std::env::var("IDEAFLOW_TEAM_TOKENS").unwrap_or_default(),
            ),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Parse `team:token[:ttl_secs]` entries, comma separated.
///
/// Malformed entries are skipped; credential issuance is out of scope so
/// this list is the only way tokens enter the system.
fn parse_team_tokens(raw: &str) -> Vec<TeamTokenSpec> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let mut parts = entry.splitn(3, ':');
            let team_id = parts.next()?.trim();
            let token = parts.next()?.trim();
            if team_id.is_empty() || token.is_empty() {
                return None;
            }
            let ttl = parts
                .next()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Some(TeamTokenSpec {
                team_id: team_id.to_string(),
                token: token.to_string(),
                ttl,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_within_bounds() {
        let config = Config::default();
        assert!(config.model_timeout >= Duration::from_secs(10));
        assert!(config.model_timeout <= Duration::from_secs(15));
        assert_eq!(config.stage_max_attempts, 3);
    }

    #[test]
    fn test_parse_team_tokens() {
        let tokens = parse_team_tokens("team-1:secret, team-2:other:3600,,bad");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].team_id, "team-1");
        assert_eq!(tokens[0].token, "secret");
        assert!(tokens[0].ttl.is_none());
        assert_eq!(tokens[1].ttl, Some(Duration::from_secs(3600)));
    }
}
