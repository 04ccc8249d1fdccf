use std::fmt;

use crate::client::Endpoints;
use crate::fetch::{FetchContext, FetchState, ResourceFetcher};
use crate::models::{RepositorySummary, UserSummary};

pub const REPOS_ERROR_TEXT: &str = "Error fetching repositories.";
pub const NO_REPOSITORIES_TEXT: &str = "This user has no repository.";
pub const NO_DESCRIPTION_TEXT: &str = "No description.";

/// One repository, ready to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCard {
    pub id: u64,
    pub name: String,
    pub stars: u64,
    /// The repository description, or [`NO_DESCRIPTION_TEXT`].
    pub description: String,
}

impl From<&RepositorySummary> for RepoCard {
    fn from(repo: &RepositorySummary) -> Self {
        let description = repo
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(NO_DESCRIPTION_TEXT)
            .to_string();

        Self {
            id: repo.id,
            name: repo.name.clone(),
            stars: repo.stargazers_count,
            description,
        }
    }
}

/// What the expandable part of a row shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoListView {
    /// Collapsed, or expanded but not started yet.
    Hidden,
    Loading,
    Error(&'static str),
    Repositories(Vec<RepoCard>),
    Empty(&'static str),
}

/// A search result row that lazily lists the user's repositories.
pub struct UserItem {
    user: UserSummary,
    expanded: bool,
    endpoints: Endpoints,
    repos: ResourceFetcher<Vec<RepositorySummary>>,
}

impl UserItem {
    pub fn new(user: UserSummary, ctx: FetchContext, endpoints: Endpoints) -> Self {
        Self {
            user,
            expanded: false,
            endpoints,
            repos: ResourceFetcher::new(ctx),
        }
    }

    pub fn id(&self) -> u64 {
        self.user.id
    }

    pub fn user(&self) -> &UserSummary {
        &self.user
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn repos(&self) -> &ResourceFetcher<Vec<RepositorySummary>> {
        &self.repos
    }

    /// Called by the UI with the row's new expanded state.
    ///
    /// Expanding points the fetcher at the user's repositories; collapsing
    /// clears the target, so the next expand always fetches again.
    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
        let target = expanded.then(|| self.endpoints.user_repos(&self.user.login));
        self.repos.observe(target);
    }

    /// Fetch the repositories again after a failure. Returns `false`, doing
    /// nothing, unless the row is expanded and showing an error.
    pub fn retry(&self) -> bool {
        if !self.expanded || !matches!(self.repos.state(), FetchState::Error(_)) {
            return false;
        }
        self.repos.reload();
        true
    }

    pub fn view(&self) -> RepoListView {
        if !self.expanded {
            return RepoListView::Hidden;
        }

        match self.repos.state() {
            FetchState::Idle => RepoListView::Hidden,
            FetchState::Loading { .. } => RepoListView::Loading,
            FetchState::Error(_) => RepoListView::Error(REPOS_ERROR_TEXT),
            FetchState::Success(repos) if repos.is_empty() => {
                RepoListView::Empty(NO_REPOSITORIES_TEXT)
            }
            FetchState::Success(repos) => {
                RepoListView::Repositories(repos.iter().map(RepoCard::from).collect())
            }
        }
    }
}

impl fmt::Debug for UserItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserItem")
            .field("user", &self.user)
            .field("expanded", &self.expanded)
            .field("repos", &self.repos.state().status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTransport;
    use crate::error::FetchError;
    use crate::views::test_support::{context, endpoints};

    fn octocat() -> UserSummary {
        UserSummary {
            id: 1,
            login: "octocat".to_string(),
            avatar_url: "https://avatars.example/u/1".to_string(),
        }
    }

    fn repos_transport(times: usize, body: &'static str) -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_get_text()
            .withf(|url| url.as_str() == "https://api.github.com/users/octocat/repos")
            .times(times)
            .returning(move |_| Ok(body.to_string()));
        transport
    }

    #[tokio::test]
    async fn collapsed_row_shows_nothing_and_fetches_nothing() {
        let mut transport = MockTransport::new();
        transport.expect_get_text().never();

        let item = UserItem::new(octocat(), context(transport), endpoints());
        assert!(!item.is_expanded());
        assert_eq!(item.view(), RepoListView::Hidden);
        assert_eq!(item.repos().target(), None);
    }

    #[tokio::test]
    async fn expanding_shows_loading_then_cards() {
        let transport = repos_transport(
            1,
            r#"[
                {"id": 10, "name": "repo-a", "description": null, "stargazers_count": 3},
                {"id": 11, "name": "repo-b", "description": "Hello", "stargazers_count": 0}
            ]"#,
        );

        let mut item = UserItem::new(octocat(), context(transport), endpoints());
        item.set_expanded(true);
        assert_eq!(item.view(), RepoListView::Loading);

        item.repos().settled().await;
        assert_eq!(
            item.view(),
            RepoListView::Repositories(vec![
                RepoCard {
                    id: 10,
                    name: "repo-a".to_string(),
                    stars: 3,
                    description: NO_DESCRIPTION_TEXT.to_string(),
                },
                RepoCard {
                    id: 11,
                    name: "repo-b".to_string(),
                    stars: 0,
                    description: "Hello".to_string(),
                },
            ])
        );
    }

    #[tokio::test]
    async fn empty_repository_list_has_placeholder() {
        let transport = repos_transport(1, "[]");

        let mut item = UserItem::new(octocat(), context(transport), endpoints());
        item.set_expanded(true);
        item.repos().settled().await;

        assert_eq!(item.view(), RepoListView::Empty("This user has no repository."));
    }

    #[test]
    fn blank_description_uses_placeholder() {
        let repo = RepositorySummary {
            id: 1,
            name: "x".to_string(),
            description: Some("   ".to_string()),
            stargazers_count: 1,
        };
        assert_eq!(RepoCard::from(&repo).description, "No description.");
    }

    #[tokio::test]
    async fn collapse_then_expand_fetches_again() {
        let transport = repos_transport(2, "[]");

        let mut item = UserItem::new(octocat(), context(transport), endpoints());
        item.set_expanded(true);
        item.repos().settled().await;

        item.set_expanded(false);
        assert_eq!(item.view(), RepoListView::Hidden);
        assert!(item.repos().state().data().is_none());

        item.set_expanded(true);
        assert_eq!(item.view(), RepoListView::Loading);
        item.repos().settled().await;
        assert_eq!(item.view(), RepoListView::Empty(NO_REPOSITORIES_TEXT));
    }

    #[tokio::test]
    async fn failed_fetch_shows_generic_error() {
        let mut transport = MockTransport::new();
        transport.expect_get_text().times(1).returning(|_| {
            Err(FetchError::Response {
                status: 500,
                message: "boom".to_string(),
            })
        });

        let mut item = UserItem::new(octocat(), context(transport), endpoints());
        item.set_expanded(true);
        item.repos().settled().await;

        assert_eq!(item.view(), RepoListView::Error(REPOS_ERROR_TEXT));
    }

    #[tokio::test]
    async fn retry_after_failure_fetches_again() {
        let mut transport = MockTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_get_text()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(FetchError::Response {
                    status: 502,
                    message: "Bad Gateway".to_string(),
                })
            });
        transport
            .expect_get_text()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("[]".to_string()));

        let mut item = UserItem::new(octocat(), context(transport), endpoints());
        item.set_expanded(true);
        item.repos().settled().await;
        assert_eq!(item.view(), RepoListView::Error(REPOS_ERROR_TEXT));

        assert!(item.retry());
        assert_eq!(item.view(), RepoListView::Loading);
        item.repos().settled().await;
        assert_eq!(item.view(), RepoListView::Empty(NO_REPOSITORIES_TEXT));
    }

    #[tokio::test]
    async fn retry_is_ignored_unless_failed() {
        let transport = repos_transport(1, "[]");

        let mut item = UserItem::new(octocat(), context(transport), endpoints());
        assert!(!item.retry());

        item.set_expanded(true);
        item.repos().settled().await;
        assert!(!item.retry());
    }
}
