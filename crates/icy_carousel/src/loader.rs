use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{LoadError, LoadResult, SetupError};
use crate::io::{FetchClient, SourceRef};
use crate::model::ImageRecord;
use crate::nodes::NodeLifecycleManager;
use crate::surface::{RenderSurface, TextureHandle};
use crate::texture::{decode_poster, fallback_image, fallback_key, is_fallback_key, RgbaData, TextureCache};

/// Size an image is scaled to, normally the poster size of its category
pub type PosterSize = (u32, u32);

/// What [`AsyncLoader::load`] did
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStart {
    /// Resource installed synchronously
    Ready(TextureHandle),
    /// Failed synchronously, the fallback was installed
    Fallback(LoadError),
    /// Network fetch in flight under this request id
    Pending(u64),
    /// Already has a resource, or the carousel is going away
    Skipped,
}

/// Result of a finished fetch, sent from the runtime to the logic side
pub struct LoadOutcome {
    pub index: usize,
    pub request_id: u64,
    pub url: String,
    pub poster: PosterSize,
    pub result: LoadResult<RgbaData>,
}

struct PendingRequest {
    request_id: u64,
    token: CancellationToken,
}

/// Decoded network images keyed by URL, FIFO bounded like the texture cache.
struct UrlImageCache {
    images: HashMap<String, RgbaData>,
    order: VecDeque<String>,
    capacity: usize,
}

impl UrlImageCache {
    fn new(capacity: usize) -> Self {
        Self {
            images: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, url: &str) -> Option<RgbaData> {
        self.images.get(url).cloned()
    }

    fn insert(&mut self, url: String, image: RgbaData) {
        if self.images.insert(url.clone(), image).is_some() {
            return;
        }
        self.order.push_back(url);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.images.remove(&oldest);
            }
        }
    }

    fn clear(&mut self) {
        self.images.clear();
        self.order.clear();
    }
}

/// Everything the loader installs results into
pub struct LoaderContext {
    pub surface: Arc<dyn RenderSurface>,
    pub cache: Arc<TextureCache>,
    pub nodes: Arc<NodeLifecycleManager>,
    pub fetcher: Arc<dyn FetchClient>,
}

/// Loads item images from local storage or the network.
///
/// Local images go through the texture cache right away. Network fetches run
/// on the loader's own Tokio runtime, at most one per index; their results
/// come back through [`poll_results`](Self::poll_results), which must be
/// called from the logic thread.
pub struct AsyncLoader {
    runtime: Option<tokio::runtime::Runtime>,
    surface: Arc<dyn RenderSurface>,
    cache: Arc<TextureCache>,
    nodes: Arc<NodeLifecycleManager>,
    fetcher: Arc<dyn FetchClient>,
    /// index -> in flight request
    pending: Mutex<HashMap<usize, PendingRequest>>,
    decoded: Mutex<UrlImageCache>,
    next_request: AtomicU64,
    result_tx: mpsc::UnboundedSender<LoadOutcome>,
    result_rx: mpsc::UnboundedReceiver<LoadOutcome>,
    timeout: Duration,
}

impl AsyncLoader {
    pub fn new(context: LoaderContext, timeout: Duration, decoded_capacity: usize) -> Result<Self, SetupError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("carousel-loader")
            .worker_threads(2)
            .enable_all()
            .build()?;
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        Ok(Self {
            runtime: Some(runtime),
            surface: context.surface,
            cache: context.cache,
            nodes: context.nodes,
            fetcher: context.fetcher,
            pending: Mutex::new(HashMap::new()),
            decoded: Mutex::new(UrlImageCache::new(decoded_capacity)),
            next_request: AtomicU64::new(1),
            result_tx,
            result_rx,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start loading the image of `index`. No-op if the index already has a resource.
    pub fn load(&self, index: usize, record: &ImageRecord, poster: PosterSize) -> LoadStart {
        if self.nodes.is_destroying() || self.nodes.has_resource(index) {
            return LoadStart::Skipped;
        }

        match SourceRef::classify(&record.source_ref) {
            SourceRef::Local(_) => match self.cache.try_acquire(&self.surface, &record.source_ref) {
                Ok(texture) => {
                    self.nodes.resource_ready(index, texture, false);
                    LoadStart::Ready(texture)
                }
                Err(err) => self.fail(index, err, poster),
            },
            SourceRef::Remote(url) => {
                let key = url.as_str();
                if let Some(texture) = self.cache.lookup(&self.surface, key) {
                    debug!("[AsyncLoader] texture cache hit for {}", key);
                    self.nodes.resource_ready(index, texture, false);
                    return LoadStart::Ready(texture);
                }
                let decoded = self.decoded.lock().get(key);
                if let Some(image) = decoded {
                    debug!("[AsyncLoader] decoded cache hit for {}", key);
                    return match self.cache.try_insert(&self.surface, key, &image) {
                        Ok(texture) => {
                            self.nodes.resource_ready(index, texture, false);
                            LoadStart::Ready(texture)
                        }
                        Err(err) => self.fail(index, err, poster),
                    };
                }
                LoadStart::Pending(self.spawn_fetch(index, url, poster))
            }
            SourceRef::Unsupported(reference) => self.fail(index, LoadError::UnsupportedReference(reference), poster),
        }
    }

    fn fail(&self, index: usize, err: LoadError, poster: PosterSize) -> LoadStart {
        self.install_fallback(index, &err, poster);
        LoadStart::Fallback(err)
    }

    fn spawn_fetch(&self, index: usize, url: Url, poster: PosterSize) -> u64 {
        let request_id = self.next_request.fetch_add(1, Ordering::AcqRel);
        let token = CancellationToken::new();

        let previous = self.pending.lock().insert(
            index,
            PendingRequest {
                request_id,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            debug!("[AsyncLoader] request {} for item {} superseded by {}", previous.request_id, index, request_id);
            previous.token.cancel();
        }

        let Some(runtime) = self.runtime.as_ref() else {
            return request_id;
        };

        let fetcher = Arc::clone(&self.fetcher);
        let result_tx = self.result_tx.clone();
        let timeout = self.timeout;
        debug!("[AsyncLoader] fetching {} for item {} (request {})", url, index, request_id);

        runtime.spawn(async move {
            let fetched = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("[AsyncLoader] request {} cancelled during fetch", request_id);
                    return;
                }
                result = tokio::time::timeout(timeout, fetcher.fetch(&url)) => result
            };

            let bytes = match fetched {
                Ok(result) => result,
                Err(_) => Err(LoadError::Timeout(timeout)),
            };

            let result = match bytes {
                Ok(bytes) => {
                    let cancel = token.clone();
                    let decoded = tokio::task::spawn_blocking(move || {
                        if cancel.is_cancelled() {
                            return Err(LoadError::Cancelled);
                        }
                        decode_poster(&bytes, poster.0, poster.1)
                    })
                    .await;
                    match decoded {
                        Ok(result) => result,
                        Err(err) => {
                            error!("[AsyncLoader] decode task for request {} panicked: {:?}", request_id, err);
                            Err(LoadError::Decode(format!("decoder panicked: {err}")))
                        }
                    }
                }
                Err(err) => Err(err),
            };

            if token.is_cancelled() || matches!(result, Err(LoadError::Cancelled)) {
                debug!("[AsyncLoader] discarding cancelled request {}", request_id);
                return;
            }

            let outcome = LoadOutcome {
                index,
                request_id,
                url: url.to_string(),
                poster,
                result,
            };
            if let Err(err) = result_tx.send(outcome) {
                warn!("[AsyncLoader] failed to send result: {}", err);
            }
        });

        request_id
    }

    /// Materialize finished fetches. Returns the indices that got a resource.
    pub fn poll_results(&mut self) -> Vec<usize> {
        let mut materialized = Vec::new();
        while let Ok(outcome) = self.result_rx.try_recv() {
            if let Some(index) = self.process(outcome) {
                materialized.push(index);
            }
        }
        materialized
    }

    /// Block until at least one result arrives or `timeout` passes, then poll.
    pub fn wait_results(&mut self, timeout: Duration) -> Vec<usize> {
        let Some(runtime) = self.runtime.as_ref() else {
            return Vec::new();
        };
        let result_rx = &mut self.result_rx;
        let received = runtime.block_on(async move { tokio::time::timeout(timeout, result_rx.recv()).await });
        let mut materialized = Vec::new();
        if let Ok(Some(outcome)) = received {
            materialized.extend(self.process(outcome));
        }
        materialized.extend(self.poll_results());
        materialized
    }

    fn process(&self, outcome: LoadOutcome) -> Option<usize> {
        let current = {
            let mut pending = self.pending.lock();
            match pending.get(&outcome.index) {
                Some(request) if request.request_id == outcome.request_id => {
                    pending.remove(&outcome.index);
                    true
                }
                _ => false,
            }
        };
        if !current {
            debug!("[AsyncLoader] dropping stale result {} for item {}", outcome.request_id, outcome.index);
            return None;
        }
        if self.nodes.is_destroying() {
            return None;
        }

        let LoadOutcome {
            index, url, poster, result, ..
        } = outcome;
        match result {
            Ok(image) => {
                self.decoded.lock().insert(url.clone(), image.clone());
                match self.cache.try_insert(&self.surface, &url, &image) {
                    Ok(texture) => {
                        self.nodes.resource_ready(index, texture, false);
                        Some(index)
                    }
                    Err(err) => self.install_fallback(index, &err, poster).map(|_| index),
                }
            }
            Err(err) => self.install_fallback(index, &err, poster).map(|_| index),
        }
    }

    /// Install the placeholder for `index`. The placeholder texture is cached per
    /// index, so repeated failures reuse it.
    pub fn install_fallback(&self, index: usize, err: &LoadError, poster: PosterSize) -> Option<TextureHandle> {
        if !err.wants_fallback() || self.nodes.is_destroying() {
            return None;
        }
        warn!("[AsyncLoader] item {} failed ({}), showing placeholder", index, err);

        let key = fallback_key(index);
        let texture = match self.cache.lookup(&self.surface, &key) {
            Some(texture) => texture,
            None => self.cache.insert(&self.surface, &key, &fallback_image(index, poster.0, poster.1))?,
        };
        self.nodes.resource_ready(index, texture, true);
        Some(texture)
    }

    /// Drop every cached placeholder. Placeholders belong to one data set.
    pub fn release_fallbacks(&self) -> usize {
        let released = self.cache.release_where(is_fallback_key);
        if released > 0 {
            debug!("[AsyncLoader] released {} placeholders", released);
        }
        released
    }

    pub fn cancel(&self, index: usize) -> bool {
        let removed = self.pending.lock().remove(&index);
        match removed {
            Some(request) => {
                request.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in flight request. Handles are collected under the lock
    /// and cancelled after it is released.
    pub fn cancel_all(&self) -> usize {
        let requests: Vec<PendingRequest> = self.pending.lock().drain().map(|(_, request)| request).collect();
        for request in &requests {
            request.token.cancel();
        }
        if !requests.is_empty() {
            debug!("[AsyncLoader] cancelled {} requests", requests.len());
        }
        requests.len()
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.pending.lock().contains_key(&index)
    }

    pub fn pending_request(&self, index: usize) -> Option<u64> {
        self.pending.lock().get(&index).map(|request| request.request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn clear_decoded(&self) {
        self.decoded.lock().clear();
    }
}

impl Drop for AsyncLoader {
    fn drop(&mut self) {
        self.cancel_all();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
