use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{FetchError, Result};

/// Number of users requested per search.
pub const SEARCH_PAGE_SIZE: u32 = 5;

/// Performs the single GET a fetcher needs.
///
/// Implementations return the body text of a successful (2xx) response and
/// classify everything else as a [`FetchError`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_text(&self, url: &Url) -> Result<String>;
}

/// Creates a preconfigured HTTP client with the headers GitHub expects.
pub fn build_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github.v3+json"),
    );
    let agent = HeaderValue::from_str(&config.user_agent)
        .map_err(|e| FetchError::Config(format!("invalid user agent: {e}")))?;
    headers.insert(USER_AGENT, agent);

    Ok(Client::builder().default_headers(headers).build()?)
}

/// Derives the GitHub URLs the app reads from.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: Url) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(FetchError::Config(format!("{base} cannot be a base URL")));
        }
        Ok(Self { base })
    }

    /// `{origin}/search/users?q={query}&page=1&per_page=5`
    ///
    /// The query is encoded as-is; search qualifiers like `type:org` pass
    /// straight through to GitHub.
    pub fn search_users(&self, query: &str) -> Url {
        let mut url = self.with_segments(&["search", "users"]);
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("page", "1")
            .append_pair("per_page", &SEARCH_PAGE_SIZE.to_string());
        url
    }

    /// `{origin}/users/{login}/repos`
    pub fn user_repos(&self, login: &str) -> Url {
        self.with_segments(&["users", login, "repos"])
    }

    fn with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        // Always Ok: `new` rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// The reqwest-backed [`Transport`] used by the desktop app.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
}

impl GitHubClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: build_client(config)?,
        })
    }
}

#[async_trait]
impl Transport for GitHubClient {
    async fn get_text(&self, url: &Url) -> Result<String> {
        debug!(%url, "GET");

        let response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_response(status, &body));
        }

        Ok(response.text().await?)
    }
}
