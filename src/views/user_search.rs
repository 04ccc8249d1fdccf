use std::sync::Arc;

use crate::client::Endpoints;
use crate::fetch::{FetchContext, FetchState, ResourceFetcher};
use crate::models::SearchResponse;

use super::UserItem;

pub const SEARCH_ERROR_TEXT: &str = "Error fetching users.";

/// What the area below the search box shows.
#[derive(Debug)]
pub enum SearchView<'a> {
    /// Nothing has been searched yet.
    Nothing,
    Loading,
    Error(&'static str),
    Results {
        header: String,
        rows: &'a [UserItem],
    },
    NoResults(String),
}

/// The search box, its last executed query, and the rows it produced.
pub struct UserSearch {
    ctx: FetchContext,
    endpoints: Endpoints,
    query: String,
    last_executed: Option<String>,
    users: ResourceFetcher<SearchResponse>,
    rows: Vec<UserItem>,
    // The response `rows` were built from.
    rows_source: Option<Arc<SearchResponse>>,
}

impl UserSearch {
    pub fn new(ctx: FetchContext, endpoints: Endpoints) -> Self {
        Self {
            users: ResourceFetcher::new(ctx.clone()),
            ctx,
            endpoints,
            query: String::new(),
            last_executed: None,
            rows: Vec::new(),
            rows_source: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn last_executed(&self) -> Option<&str> {
        self.last_executed.as_deref()
    }

    pub fn users(&self) -> &ResourceFetcher<SearchResponse> {
        &self.users
    }

    /// Whether the Search button should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// Run the current query. Returns `false`, changing nothing, when the
    /// query is blank.
    ///
    /// Submitting the same query twice fetches twice.
    pub fn submit(&mut self) -> bool {
        if !self.can_submit() {
            return false;
        }

        self.last_executed = Some(self.query.clone());
        self.users.request(self.endpoints.search_users(&self.query));
        true
    }

    /// Re-run the last search after a failure. Returns `false`, doing
    /// nothing, unless the search is showing an error.
    pub fn retry(&self) -> bool {
        if !matches!(self.users.state(), FetchState::Error(_)) {
            return false;
        }
        self.users.reload();
        true
    }

    /// Forward a retry click on a row's repository error line.
    pub fn retry_repos(&mut self, id: u64) -> bool {
        self.row_mut(id).is_some_and(|row| row.retry())
    }

    /// Rows for the current results, in server order.
    pub fn rows(&mut self) -> &[UserItem] {
        self.sync_rows();
        &self.rows
    }

    pub fn row_mut(&mut self, id: u64) -> Option<&mut UserItem> {
        self.sync_rows();
        self.rows.iter_mut().find(|row| row.id() == id)
    }

    /// Forward a row's expand/collapse toggle. Unknown ids are ignored.
    pub fn set_expanded(&mut self, id: u64, expanded: bool) -> bool {
        match self.row_mut(id) {
            Some(row) => {
                row.set_expanded(expanded);
                true
            }
            None => false,
        }
    }

    pub fn view(&mut self) -> SearchView<'_> {
        let Some(last) = self.last_executed.clone() else {
            return SearchView::Nothing;
        };
        self.sync_rows();

        match self.users.state() {
            FetchState::Idle => SearchView::Nothing,
            FetchState::Loading { .. } => SearchView::Loading,
            FetchState::Error(_) => SearchView::Error(SEARCH_ERROR_TEXT),
            FetchState::Success(response) if response.items.is_empty() => {
                SearchView::NoResults(format!("No Results Found for \"{last}\""))
            }
            FetchState::Success(_) => SearchView::Results {
                header: format!("Showing results for \"{last}\""),
                rows: &self.rows,
            },
        }
    }

    // Rows live only while a response is shown. Every new response gets
    // fresh rows, each with its own fetcher, collapsed.
    fn sync_rows(&mut self) {
        let state = self.users.state();
        let Some(response) = state.shared_data().filter(|_| !state.is_loading()) else {
            self.rows.clear();
            self.rows_source = None;
            return;
        };

        if let Some(source) = &self.rows_source {
            if Arc::ptr_eq(source, response) {
                return;
            }
        }

        self.rows = response
            .items
            .iter()
            .map(|user| UserItem::new(user.clone(), self.ctx.clone(), self.endpoints.clone()))
            .collect();
        self.rows_source = Some(Arc::clone(response));
    }
}
