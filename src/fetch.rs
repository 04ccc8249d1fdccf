//! A reusable fetcher that turns one target URL into a [`FetchState`].
//!
//! Every consumer builds its own [`ResourceFetcher`]; nothing is cached or
//! shared between instances. Changing the target starts exactly one GET,
//! and the result is published on a `watch` channel. A response that
//! arrives after the target moved on is dropped, so the last issued request
//! always wins.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use url::Url;

use crate::client::Transport;
use crate::error::{ErrorInfo, Result};

/// The four mutually exclusive phases of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Error,
    Success,
}

/// Outcome of the most recent fetch for one target.
#[derive(Debug, PartialEq)]
pub enum FetchState<T> {
    /// No target.
    Idle,
    /// A request is in flight. `data` is whatever the previous target
    /// produced, kept around so it can still be shown.
    Loading { data: Option<Arc<T>> },
    Error(ErrorInfo),
    Success(Arc<T>),
}

impl<T> FetchState<T> {
    pub fn status(&self) -> FetchStatus {
        match self {
            Self::Idle => FetchStatus::Idle,
            Self::Loading { .. } => FetchStatus::Loading,
            Self::Error(_) => FetchStatus::Error,
            Self::Success(_) => FetchStatus::Success,
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.shared_data().map(|data| data.as_ref())
    }

    /// The data behind a cheap shared handle, for callers that need to tell
    /// one response apart from the next.
    pub fn shared_data(&self) -> Option<&Arc<T>> {
        match self {
            Self::Loading { data } => data.as_ref(),
            Self::Success(data) => Some(data),
            Self::Idle | Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Error(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

impl<T> Clone for FetchState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Loading { data } => Self::Loading { data: data.clone() },
            Self::Error(info) => Self::Error(info.clone()),
            Self::Success(data) => Self::Success(Arc::clone(data)),
        }
    }
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

/// A transient, user-facing message (shown as a toast by the desktop app).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub url: Url,
}

/// Called after any fetcher state change so a UI can re-render.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Everything a fetcher needs from its surroundings.
///
/// Cheap to clone; views hand a copy to every fetcher they create.
#[derive(Clone)]
pub struct FetchContext {
    transport: Arc<dyn Transport>,
    runtime: Handle,
    notifications: Option<mpsc::UnboundedSender<Notification>>,
    on_change: Option<ChangeListener>,
}

impl FetchContext {
    pub fn new(transport: Arc<dyn Transport>, runtime: Handle) -> Self {
        Self {
            transport,
            runtime,
            notifications: None,
            on_change: None,
        }
    }

    /// Send a [`Notification`] here whenever a fetch fails.
    pub fn with_notifications(mut self, tx: mpsc::UnboundedSender<Notification>) -> Self {
        self.notifications = Some(tx);
        self
    }

    pub fn with_change_listener(mut self, listener: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(listener));
        self
    }

    fn changed(&self) {
        if let Some(listener) = &self.on_change {
            listener();
        }
    }

    fn notify(&self, notification: Notification) {
        if let Some(tx) = &self.notifications {
            // Receiver gone means nobody is showing toasts anymore.
            let _ = tx.send(notification);
        }
    }
}

#[derive(Default)]
struct Cursor {
    target: Option<Url>,
    generation: u64,
}

struct Shared<T> {
    state: watch::Sender<FetchState<T>>,
    cursor: Mutex<Cursor>,
}

impl<T> Shared<T> {
    fn lock_cursor(&self) -> MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn finish(&self, ctx: &FetchContext, generation: u64, url: &Url, outcome: Result<T>) {
        let cursor = self.lock_cursor();
        if cursor.generation != generation {
            debug!(%url, generation, current = cursor.generation, "discarding stale response");
            return;
        }

        let next = match outcome {
            Ok(data) => {
                debug!(%url, generation, "fetch succeeded");
                FetchState::Success(Arc::new(data))
            }
            Err(err) => {
                warn!(%url, error = %err, "fetch failed");
                let info = ErrorInfo::from(&err);
                ctx.notify(Notification {
                    message: info.message.clone(),
                    url: url.clone(),
                });
                FetchState::Error(info)
            }
        };
        self.state.send_replace(next);
        drop(cursor);

        ctx.changed();
    }
}

/// Drives one GET per target change and exposes the result.
pub struct ResourceFetcher<T> {
    ctx: FetchContext,
    shared: Arc<Shared<T>>,
}

impl<T> ResourceFetcher<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(ctx: FetchContext) -> Self {
        let (state, _) = watch::channel(FetchState::Idle);
        Self {
            ctx,
            shared: Arc::new(Shared {
                state,
                cursor: Mutex::new(Cursor::default()),
            }),
        }
    }

    /// Point the fetcher at `target`.
    ///
    /// `None` goes idle without touching the network. A new URL starts one
    /// request. The current URL again does nothing; use [`reload`](Self::reload)
    /// for that.
    pub fn observe(&self, target: Option<Url>) {
        let mut cursor = self.shared.lock_cursor();
        if cursor.target == target {
            return;
        }
        cursor.target = target;
        self.start(&mut cursor);
        drop(cursor);

        self.ctx.changed();
    }

    /// Point the fetcher at `url` and always issue a request, even when it is
    /// already the current target.
    pub fn request(&self, url: Url) {
        let mut cursor = self.shared.lock_cursor();
        cursor.target = Some(url);
        self.start(&mut cursor);
        drop(cursor);

        self.ctx.changed();
    }

    /// Issue a fresh request for the current target, if there is one.
    pub fn reload(&self) {
        let mut cursor = self.shared.lock_cursor();
        if cursor.target.is_none() {
            return;
        }
        self.start(&mut cursor);
        drop(cursor);

        self.ctx.changed();
    }

    pub fn target(&self) -> Option<Url> {
        self.shared.lock_cursor().target.clone()
    }

    pub fn state(&self) -> FetchState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state.subscribe()
    }

    /// Wait until the fetcher is no longer loading and return that state.
    pub async fn settled(&self) -> FetchState<T> {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|state| !state.is_loading())
            .await
            .map(|state| FetchState::clone(&state));
        // The sender lives in `self`, so the channel cannot close under us.
        settled.unwrap_or_else(|_| self.state())
    }

    fn start(&self, cursor: &mut Cursor) {
        cursor.generation += 1;
        let generation = cursor.generation;

        let Some(url) = cursor.target.clone() else {
            self.shared.state.send_replace(FetchState::Idle);
            return;
        };

        self.shared.state.send_modify(|state| {
            let data = state.shared_data().cloned();
            *state = FetchState::Loading { data };
        });
        debug!(%url, generation, "fetch started");

        let shared = Arc::clone(&self.shared);
        let ctx = self.ctx.clone();
        self.ctx.runtime.spawn(async move {
            let outcome = fetch_json::<T>(ctx.transport.as_ref(), &url).await;
            shared.finish(&ctx, generation, &url, outcome);
        });
    }
}

async fn fetch_json<T: DeserializeOwned>(transport: &dyn Transport, url: &Url) -> Result<T> {
    let body = transport.get_text(url).await?;
    Ok(serde_json::from_str(&body)?)
}
