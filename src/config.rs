//! Runtime configuration, read from the environment.

use std::env;

use url::Url;

use crate::error::{FetchError, Result};

/// Public GitHub REST API origin.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default tracing filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "github_user_search=info";

/// Settings shared by every request the app makes.
#[derive(Debug, Clone)]
pub struct Config {
    /// Origin all endpoints are derived from.
    pub api_base_url: Url,
    /// Sent as `User-Agent`; GitHub rejects requests without one.
    pub user_agent: String,
}

impl Config {
    /// Create a config pointing at the given API origin.
    pub fn new(api_base_url: &str) -> Result<Self> {
        Ok(Self {
            api_base_url: parse_origin(api_base_url)?,
            user_agent: default_user_agent(),
        })
    }

    /// Read `GITHUB_API_URL` and `GITHUB_USER_AGENT`, falling back to defaults.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_values(
            env::var("GITHUB_API_URL").ok().as_deref(),
            env::var("GITHUB_USER_AGENT").ok().as_deref(),
        )
    }

    // Unset and blank values both mean "use the default".
    fn from_values(api_base_url: Option<&str>, user_agent: Option<&str>) -> Result<Self> {
        let present = |v: &&str| !v.trim().is_empty();

        let mut config = Self::new(api_base_url.filter(present).unwrap_or(DEFAULT_API_URL))?;
        if let Some(agent) = user_agent.filter(present) {
            config.user_agent = agent.to_string();
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("github-user-search/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_origin(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(FetchError::Config("API URL cannot be empty".into()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| FetchError::Config(format!("invalid API URL {trimmed:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::Config(
            "API URL must start with http:// or https://".into(),
        ));
    }
    if url.cannot_be_a_base() {
        return Err(FetchError::Config(format!("API URL {trimmed:?} cannot be a base")));
    }

    Ok(url)
}
