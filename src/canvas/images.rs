//! Path-keyed image cache.
//!
//! Image elements ask the loader for a path. A cached image is returned right away;
//! otherwise one fetch is started and the caller gets `None`. Asking again while
//! that fetch is in flight does not start another one. Finished fetches come back
//! on the completion channel handed out by [`ImageLoader::new`]; the owner of that
//! receiver feeds them to [`ImageLoader::complete`] on the control thread and tells
//! interested scenes which path became available.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use image::GenericImageView;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{CanvasError, Result};

/// Fetches raw bytes for an image path.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Bytes>;
}

/// Fetches `http://{host}:{port}/aircraft-dir/{path}`.
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Url,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, host: &str, port: u16) -> Result<Self> {
        let base = Url::parse(&format!("http://{host}:{port}/aircraft-dir/"))
            .map_err(|e| CanvasError::Config(format!("bad image host {host}:{port}: {e}")))?;
        Ok(Self { client, base })
    }

    /// URL an image path is fetched from.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| CanvasError::Image(format!("bad image path {path}: {e}")))
    }
}

#[async_trait]
impl ByteFetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<Bytes> {
        let url = self.url_for(path)?;
        tracing::debug!(%url, "requesting image");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CanvasError::Transport(e.to_string()))?;
        response
            .bytes()
            .await
            .map_err(|e| CanvasError::Transport(e.to_string()))
    }
}

/// A decoded image ready for painting.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    pub path: String,
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
}

impl LoadedImage {
    /// Decode `bytes`, keeping the encoded form for the paint backend.
    pub fn decode(path: impl Into<String>, bytes: Bytes) -> Result<Self> {
        let decoded =
            image::load_from_memory(&bytes).map_err(|e| CanvasError::Image(e.to_string()))?;
        let (width, height) = decoded.dimensions();
        Ok(Self {
            path: path.into(),
            bytes,
            width,
            height,
        })
    }
}

/// Result of a background fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub path: String,
    pub result: Result<Bytes>,
}

/// Loader shared by every scene of the process.
pub type SharedImageLoader = Arc<Mutex<ImageLoader>>;

/// Lock a shared loader, recovering from a poisoned mutex.
pub fn lock_loader(loader: &SharedImageLoader) -> MutexGuard<'_, ImageLoader> {
    match loader.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Image byte cache with in-flight de-duplication.
pub struct ImageLoader {
    fetcher: Arc<dyn ByteFetcher>,
    cache: HashMap<String, LoadedImage>,
    in_flight: HashSet<String>,
    completions: mpsc::UnboundedSender<FetchOutcome>,
}

impl ImageLoader {
    /// Create a loader and the receiver its fetch completions arrive on.
    pub fn new(fetcher: Arc<dyn ByteFetcher>) -> (Self, mpsc::UnboundedReceiver<FetchOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                fetcher,
                cache: HashMap::new(),
                in_flight: HashSet::new(),
                completions: tx,
            },
            rx,
        )
    }

    /// Replace the fetcher (e.g. after the host changed).
    pub fn set_fetcher(&mut self, fetcher: Arc<dyn ByteFetcher>) {
        self.fetcher = fetcher;
    }

    /// Cached image for `path`, starting a fetch if none is cached or in flight.
    ///
    /// Failed fetches are not remembered: asking again after a failure fetches again.
    pub fn get_image(&mut self, path: &str) -> Option<LoadedImage> {
        if let Some(image) = self.cache.get(path) {
            return Some(image.clone());
        }
        if self.in_flight.contains(path) {
            return None;
        }
        self.start_fetch(path);
        None
    }

    pub fn is_in_flight(&self, path: &str) -> bool {
        self.in_flight.contains(path)
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.cache.contains_key(path)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn start_fetch(&mut self, path: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(path, "no async runtime; cannot fetch image");
            return;
        };

        self.in_flight.insert(path.to_owned());
        let fetcher = Arc::clone(&self.fetcher);
        let completions = self.completions.clone();
        let path = path.to_owned();
        runtime.spawn(async move {
            let result = fetcher.fetch(&path).await;
            // The receiver is gone only during shutdown.
            let _ = completions.send(FetchOutcome { path, result });
        });
    }

    /// Record a finished fetch. Returns the path when a new image became available.
    pub fn complete(&mut self, outcome: FetchOutcome) -> Option<String> {
        self.in_flight.remove(&outcome.path);
        let decoded = outcome
            .result
            .and_then(|bytes| LoadedImage::decode(outcome.path.clone(), bytes));
        match decoded {
            Ok(image) => {
                tracing::debug!(path = %outcome.path, width = image.width, height = image.height, "image loaded");
                self.cache.insert(outcome.path.clone(), image);
                Some(outcome.path)
            }
            Err(e) => {
                tracing::warn!(path = %outcome.path, error = %e, "image loading failed");
                None
            }
        }
    }

    /// Insert an already-decoded image.
    pub fn insert(&mut self, image: LoadedImage) {
        self.in_flight.remove(&image.path);
        self.cache.insert(image.path.clone(), image);
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("cached", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}
