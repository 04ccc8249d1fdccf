//! UI-independent view models.
//!
//! [`UserSearch`] owns the query and the search fetcher; each [`UserItem`]
//! owns its expanded flag and its own repositories fetcher. The desktop
//! shell turns the views they return into Slint models.

mod user_item;
mod user_search;

pub use user_item::{
    RepoCard, RepoListView, UserItem, NO_DESCRIPTION_TEXT, NO_REPOSITORIES_TEXT,
    REPOS_ERROR_TEXT,
};
pub use user_search::{SearchView, UserSearch, SEARCH_ERROR_TEXT};
