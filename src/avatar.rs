use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Client;
use slint::{Image, Rgba8Pixel, SharedPixelBuffer};
use tokio::runtime::Handle;
use tracing::debug;

use github_user_search::UserSummary;

/// Edge length, in pixels, of the avatar thumbnails shown in each row.
pub const AVATAR_SIZE: u32 = 80;

enum Slot {
    Pending,
    Ready {
        pixels: Vec<u8>,
        width: u32,
        height: u32,
    },
    Failed,
}

/// Downloads avatar thumbnails in the background and hands out Slint images.
///
/// Downloads hand back decoded pixels; `slint::Image` is not `Send`, so the
/// image is built once on the UI thread and cached there.
pub struct AvatarStore {
    client: Client,
    runtime: Handle,
    slots: Arc<Mutex<HashMap<u64, Slot>>>,
    images: RefCell<HashMap<u64, Image>>,
    on_ready: Arc<dyn Fn() + Send + Sync>,
}

impl AvatarStore {
    pub fn new(client: Client, runtime: Handle, on_ready: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            client,
            runtime,
            slots: Arc::new(Mutex::new(HashMap::new())),
            images: RefCell::new(HashMap::new()),
            on_ready: Arc::new(on_ready),
        }
    }

    /// The user's avatar, or an empty image until the download finishes.
    pub fn image(&self, user: &UserSummary) -> Image {
        if let Some(image) = self.images.borrow().get(&user.id) {
            return image.clone();
        }

        let mut slots = lock(&self.slots);
        match slots.get(&user.id) {
            Some(Slot::Ready {
                pixels,
                width,
                height,
            }) => {
                let buf = SharedPixelBuffer::<Rgba8Pixel>::clone_from_slice(pixels, *width, *height);
                let image = Image::from_rgba8(buf);
                self.images.borrow_mut().insert(user.id, image.clone());
                image
            }
            Some(Slot::Pending | Slot::Failed) => Image::default(),
            None => {
                slots.insert(user.id, Slot::Pending);
                self.spawn_download(user.id, user.avatar_url.clone());
                Image::default()
            }
        }
    }

    /// Forget every avatar except those of `ids`.
    pub fn retain(&self, ids: &HashSet<u64>) {
        lock(&self.slots).retain(|id, _| ids.contains(id));
        self.images.borrow_mut().retain(|id, _| ids.contains(id));
    }

    fn spawn_download(&self, id: u64, url: String) {
        let client = self.client.clone();
        let slots = Arc::clone(&self.slots);
        let on_ready = Arc::clone(&self.on_ready);

        self.runtime.spawn(async move {
            let slot = match download_avatar_pixels(&client, &url, AVATAR_SIZE).await {
                Some((pixels, width, height)) => Slot::Ready {
                    pixels,
                    width,
                    height,
                },
                None => {
                    debug!(%url, "avatar unavailable");
                    Slot::Failed
                }
            };
            // A pruned id stays pruned.
            if let Some(entry) = lock(&slots).get_mut(&id) {
                *entry = slot;
            }
            on_ready();
        });
    }
}

fn lock(slots: &Mutex<HashMap<u64, Slot>>) -> MutexGuard<'_, HashMap<u64, Slot>> {
    slots.lock().unwrap_or_else(|e| e.into_inner())
}

/// Ask GitHub's avatar CDN for a specific size.
fn sized_url(url: &str, size: u32) -> String {
    if url.contains('?') {
        format!("{url}&s={size}")
    } else {
        format!("{url}?s={size}")
    }
}

/// Downloads avatar image bytes and decodes them into raw RGBA pixels.
async fn download_avatar_pixels(client: &Client, url: &str, size: u32) -> Option<(Vec<u8>, u32, u32)> {
    let bytes = client
        .get(sized_url(url, size))
        .send()
        .await
        .ok()?
        .error_for_status()
        .ok()?
        .bytes()
        .await
        .ok()?;
    let decoded = image::load_from_memory(&bytes).ok()?;

    // The CDN sometimes ignores `s` and serves a larger cached image.
    let resized = decoded.thumbnail_exact(size, size);

    let rgba = resized.to_rgba8();
    let (w, h) = rgba.dimensions();

    Some((rgba.into_raw(), w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(runtime: &tokio::runtime::Runtime) -> AvatarStore {
        AvatarStore::new(Client::new(), runtime.handle().clone(), || {})
    }

    fn ready() -> Slot {
        Slot::Ready {
            pixels: vec![0; 4],
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn retain_drops_users_no_longer_listed() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let avatars = store(&runtime);
        {
            let mut slots = lock(&avatars.slots);
            slots.insert(1, ready());
            slots.insert(2, Slot::Failed);
            slots.insert(3, Slot::Pending);
        }

        avatars.retain(&HashSet::from([3]));

        let mut left: Vec<u64> = lock(&avatars.slots).keys().copied().collect();
        left.sort_unstable();
        assert_eq!(left, vec![3]);
    }

    #[test]
    fn ready_image_is_built_once_and_pruned_with_its_slot() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let avatars = store(&runtime);
        lock(&avatars.slots).insert(1, ready());
        let user = UserSummary {
            id: 1,
            login: "octocat".to_string(),
            avatar_url: "https://avatars.githubusercontent.com/u/1".to_string(),
        };

        let image = avatars.image(&user);
        let size = image.size();
        assert_eq!((size.width, size.height), (1, 1));
        assert!(avatars.images.borrow().contains_key(&1));

        avatars.retain(&HashSet::new());
        assert!(avatars.images.borrow().is_empty());
        assert!(lock(&avatars.slots).is_empty());
    }

    #[test]
    fn sized_url_appends_query() {
        assert_eq!(
            sized_url("https://avatars.githubusercontent.com/u/1", 80),
            "https://avatars.githubusercontent.com/u/1?s=80"
        );
    }

    #[test]
    fn sized_url_extends_existing_query() {
        assert_eq!(
            sized_url("https://avatars.githubusercontent.com/u/1?v=4", 80),
            "https://avatars.githubusercontent.com/u/1?v=4&s=80"
        );
    }
}
