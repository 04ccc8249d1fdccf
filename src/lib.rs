//! GitHub user search: look up accounts by login fragment and expand each
//! one to list its repositories.
//!
//! The Slint desktop shell lives in `main.rs`; everything here is UI
//! independent so it can be tested against a mock or local HTTP server.

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod views;

pub use client::{Endpoints, GitHubClient, Transport};
pub use config::Config;
pub use error::{ErrorInfo, FetchError, Result};
pub use fetch::{FetchContext, FetchState, FetchStatus, Notification, ResourceFetcher};
pub use models::{RepositorySummary, SearchResponse, UserSummary};
pub use views::{RepoCard, RepoListView, SearchView, UserItem, UserSearch};
