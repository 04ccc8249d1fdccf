#![windows_subsystem = "windows"]
mod avatar;
slint::include_modules!();

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use slint::{Model, ModelRc, SharedString, VecModel};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use github_user_search::client::build_client;
use github_user_search::config::DEFAULT_LOG_FILTER;
use github_user_search::views;
use github_user_search::{
    Config, Endpoints, FetchContext, GitHubClient, Notification, RepoListView, SearchView,
    UserSearch,
};

use avatar::AvatarStore;

/// How long an error toast stays on screen.
const TOAST_DURATION: Duration = Duration::from_secs(4);

fn main() -> anyhow::Result<()> {
    // Load .env variables
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    info!(api = %config.api_base_url, "starting GitHub user search");

    let endpoints = Endpoints::new(config.api_base_url.clone())?;
    let transport = GitHubClient::new(&config).context("Failed to build HTTP client")?;
    let avatar_client = build_client(&config).context("Failed to build HTTP client")?;

    // Background tokio runtime for async HTTP
    let rt = Arc::new(tokio::runtime::Runtime::new()?);

    let app = AppWindow::new()?;

    // Any fetcher or avatar update schedules a re-render on the UI thread.
    let request_refresh = {
        let app_weak = app.as_weak();
        move || {
            let _ = app_weak.upgrade_in_event_loop(|app| app.invoke_refresh());
        }
    };

    let (toast_tx, toast_rx) = mpsc::unbounded_channel();
    let ctx = FetchContext::new(Arc::new(transport), rt.handle().clone())
        .with_notifications(toast_tx)
        .with_change_listener(request_refresh.clone());

    let search = Rc::new(RefCell::new(UserSearch::new(ctx, endpoints)));
    let user_model = Rc::new(VecModel::<UserItem>::default());
    app.set_user_list(ModelRc::from(user_model.clone()));
    let avatars = Rc::new(AvatarStore::new(
        avatar_client,
        rt.handle().clone(),
        request_refresh,
    ));

    // =============================================
    //  CALLBACK: refresh (view models → Slint)
    // =============================================
    {
        let app_weak = app.as_weak();
        let search = Rc::clone(&search);
        let avatars = Rc::clone(&avatars);
        let user_model = Rc::clone(&user_model);

        app.on_refresh(move || {
            if let Some(app) = app_weak.upgrade() {
                render(&app, &user_model, &mut search.borrow_mut(), &avatars);
            }
        });
    }

    // =============================================
    //  CALLBACK: query-edited
    // =============================================
    {
        let app_weak = app.as_weak();
        let search = Rc::clone(&search);

        app.on_query_edited(move |text| {
            let mut search = search.borrow_mut();
            search.set_query(text.as_str());
            if let Some(app) = app_weak.upgrade() {
                app.set_can_search(search.can_submit());
            }
        });
    }

    // =============================================
    //  CALLBACK: search-requested (button or Enter)
    // =============================================
    {
        let search = Rc::clone(&search);

        app.on_search_requested(move |text| {
            let mut search = search.borrow_mut();
            search.set_query(text.as_str());
            if search.submit() {
                info!(query = %search.query(), "search submitted");
            }
        });
    }

    // =============================================
    //  CALLBACK: user-toggled (expand / collapse a row)
    // =============================================
    {
        let search = Rc::clone(&search);

        app.on_user_toggled(move |id, expanded| {
            let Ok(id) = id.parse::<u64>() else {
                warn!(%id, "toggle for malformed user id");
                return;
            };
            if !search.borrow_mut().set_expanded(id, expanded) {
                warn!(id, "toggle for a user that is no longer listed");
            }
        });
    }

    // =============================================
    //  CALLBACK: retry after a failed fetch
    // =============================================
    {
        let search = Rc::clone(&search);

        app.on_search_retry_requested(move || {
            if search.borrow().retry() {
                info!("search retried");
            }
        });
    }
    {
        let search = Rc::clone(&search);

        app.on_repos_retry_requested(move |id| {
            let Ok(id) = id.parse::<u64>() else {
                warn!(%id, "retry for malformed user id");
                return;
            };
            if search.borrow_mut().retry_repos(id) {
                info!(id, "repositories retried");
            }
        });
    }

    spawn_toasts(&rt, toast_rx, app.as_weak());

    app.invoke_refresh();

    // Run the Slint event loop
    app.run()?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Copy the current view models into the window's properties.
fn render(
    app: &AppWindow,
    user_model: &VecModel<UserItem>,
    search: &mut UserSearch,
    avatars: &AvatarStore,
) {
    app.set_can_search(search.can_submit());

    // `listed` holds the avatars worth keeping once a response is on screen.
    let (state, status, rows, listed): (SearchState, String, Vec<UserItem>, Option<HashSet<u64>>) =
        match search.view() {
            SearchView::Nothing => (SearchState::Idle, String::new(), Vec::new(), None),
            SearchView::Loading => (SearchState::Loading, String::new(), Vec::new(), None),
            SearchView::Error(text) => (SearchState::Error, text.to_string(), Vec::new(), None),
            SearchView::NoResults(text) => {
                (SearchState::NoResults, text, Vec::new(), Some(HashSet::new()))
            }
            SearchView::Results { header, rows } => (
                SearchState::Results,
                header,
                rows.iter().map(|row| user_row(row, avatars)).collect(),
                Some(rows.iter().map(views::UserItem::id).collect()),
            ),
        };

    app.set_search_state(state);
    app.set_status_text(status.into());
    sync_user_model(user_model, rows);

    if let Some(ids) = listed {
        avatars.retain(&ids);
    }
}

/// Update `model` row by row when it lists the same users in the same order,
/// so Slint keeps the existing row elements. Otherwise replace the contents.
/// Returns whether the contents were replaced.
fn sync_user_model(model: &VecModel<UserItem>, rows: Vec<UserItem>) -> bool {
    let same_users =
        model.row_count() == rows.len() && model.iter().zip(&rows).all(|(old, new)| old.id == new.id);
    if !same_users {
        model.set_vec(rows);
        return true;
    }

    for (index, row) in rows.into_iter().enumerate() {
        model.set_row_data(index, row);
    }
    false
}

fn user_row(row: &views::UserItem, avatars: &AvatarStore) -> UserItem {
    let (repo_state, repo_message, repos) = match row.view() {
        RepoListView::Hidden => (RepoState::Hidden, "", Vec::new()),
        RepoListView::Loading => (RepoState::Loading, "", Vec::new()),
        RepoListView::Error(text) => (RepoState::Error, text, Vec::new()),
        RepoListView::Empty(text) => (RepoState::Empty, text, Vec::new()),
        RepoListView::Repositories(cards) => (
            RepoState::Loaded,
            "",
            cards
                .into_iter()
                .map(|card| RepoItem {
                    name: card.name.into(),
                    stars: card.stars.to_string().into(),
                    description: card.description.into(),
                })
                .collect(),
        ),
    };

    UserItem {
        id: row.id().to_string().into(),
        login: row.user().login.as_str().into(),
        avatar: avatars.image(row.user()),
        expanded: row.is_expanded(),
        repo_state,
        repo_message: SharedString::from(repo_message),
        repos: ModelRc::new(VecModel::from(repos)),
    }
}

/// Show each error notification as a toast, hiding it after a few seconds
/// unless a newer one replaced it.
fn spawn_toasts(
    rt: &tokio::runtime::Runtime,
    mut rx: mpsc::UnboundedReceiver<Notification>,
    app_weak: slint::Weak<AppWindow>,
) {
    let latest = Arc::new(AtomicU64::new(0));

    rt.spawn(async move {
        while let Some(note) = rx.recv().await {
            let ticket = latest.fetch_add(1, Ordering::SeqCst) + 1;
            let message: SharedString = note.message.into();

            let _ = app_weak.upgrade_in_event_loop(move |app| {
                app.set_toast_message(message);
                app.set_toast_visible(true);
            });

            let app_weak = app_weak.clone();
            let latest = Arc::clone(&latest);
            tokio::spawn(async move {
                tokio::time::sleep(TOAST_DURATION).await;
                if latest.load(Ordering::SeqCst) == ticket {
                    let _ = app_weak.upgrade_in_event_loop(|app| app.set_toast_visible(false));
                }
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use slint::platform::software_renderer::{MinimalSoftwareWindow, RepaintBufferType};
    use slint::platform::{Platform, WindowAdapter};

    fn item(id: u64, login: &str) -> UserItem {
        UserItem {
            id: id.to_string().into(),
            login: login.into(),
            ..Default::default()
        }
    }

    #[test]
    fn same_users_are_updated_in_place() {
        let model = VecModel::from(vec![item(1, "a"), item(2, "b")]);

        let mut expanded = item(1, "a");
        expanded.expanded = true;
        assert!(!sync_user_model(&model, vec![expanded, item(2, "b")]));

        assert_eq!(model.row_count(), 2);
        assert!(model.row_data(0).unwrap().expanded);
    }

    #[test]
    fn different_users_replace_the_rows() {
        let model = VecModel::from(vec![item(1, "a"), item(2, "b")]);

        assert!(sync_user_model(&model, vec![item(2, "b"), item(1, "a")]));
        assert_eq!(model.row_data(0).unwrap().id, "2");

        assert!(sync_user_model(&model, vec![item(9, "z")]));
        assert_eq!(model.row_count(), 1);

        assert!(sync_user_model(&model, Vec::new()));
        assert_eq!(model.row_count(), 0);
    }

    struct HeadlessPlatform(Rc<MinimalSoftwareWindow>);

    impl Platform for HeadlessPlatform {
        fn create_window_adapter(&self) -> Result<Rc<dyn WindowAdapter>, slint::PlatformError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn toast_is_sized_to_its_message() {
        let window = MinimalSoftwareWindow::new(RepaintBufferType::ReusedBuffer);
        slint::platform::set_platform(Box::new(HeadlessPlatform(window.clone()))).unwrap();

        let app = AppWindow::new().unwrap();
        app.window().set_size(slint::PhysicalSize::new(600, 760));
        app.set_toast_message("Internal Server Error".into());
        app.set_toast_visible(true);

        let height = app.get_toast_height();
        assert!(height > 0.0);
        assert!(height < 200.0, "toast is {height}px tall in a 760px window");
    }
}
