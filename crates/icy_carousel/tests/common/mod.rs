#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use icy_carousel::error::{LoadError, LoadResult};
use icy_carousel::io::{ByteSource, FetchClient};
use icy_carousel::model::{CarouselData, CarouselSource, ImageRecord};
use icy_carousel::surface::{HeadlessSurface, RenderSurface};
use icy_carousel::texture::TextureCache;
use icy_carousel::{Carousel, CarouselOptions};
use image::{ImageFormat, Rgba, RgbaImage};
use reqwest::Url;
use tokio::sync::Semaphore;

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Serves a fixed set of files and counts reads.
pub struct MemoryStore {
    files: HashMap<String, Vec<u8>>,
    reads: AtomicUsize,
}

impl MemoryStore {
    pub fn with_files(names: &[&str]) -> Arc<Self> {
        let files = names.iter().map(|name| (name.to_string(), png(4, 3))).collect();
        Arc::new(Self {
            files,
            reads: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ByteSource for MemoryStore {
    fn read(&self, reference: &str) -> LoadResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files.get(reference).cloned().ok_or_else(|| LoadError::Io {
            path: reference.into(),
            message: "no such file".to_string(),
        })
    }
}

/// Fetcher for every network situation a test needs.
pub struct ScriptedFetcher {
    mode: FetchMode,
    calls: AtomicUsize,
    gate: Semaphore,
}

pub enum FetchMode {
    Serve(Vec<u8>),
    Fail,
    Hang,
}

impl ScriptedFetcher {
    pub fn new(mode: FetchMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
        })
    }

    /// Fetches wait until [`open`](Self::open) is called.
    pub fn gated(mode: FetchMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        })
    }

    pub fn open(&self) {
        self.gate.add_permits(64);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchClient for ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> LoadResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await.map_err(|err| LoadError::Network(err.to_string()))?;
        match &self.mode {
            FetchMode::Serve(bytes) => Ok(bytes.clone()),
            FetchMode::Fail => Err(LoadError::Network(format!("{url}: 503 Service Unavailable"))),
            FetchMode::Hang => std::future::pending().await,
        }
    }
}

pub fn data(categories: &[&str], per_category: usize, source: impl Fn(&str, usize) -> String) -> CarouselData {
    let records = categories
        .iter()
        .flat_map(|category| (0..per_category).map(|k| ImageRecord::new(source(category, k), format!("{category} {k}"), *category)).collect::<Vec<_>>())
        .collect();
    CarouselData::new(CarouselSource {
        categories: categories.iter().map(|c| c.to_string()).collect(),
        records,
        ..Default::default()
    })
}

pub struct Harness {
    pub surface: Arc<HeadlessSurface>,
    pub carousel: Carousel,
}

pub fn harness(options: CarouselOptions, store: Arc<MemoryStore>, fetcher: Arc<ScriptedFetcher>) -> Harness {
    let surface = Arc::new(HeadlessSurface::new(900, 600));
    let context: Arc<dyn RenderSurface> = surface.clone();
    let cache = Arc::new(TextureCache::new(options.cache_capacity, store));
    let carousel = Carousel::new(options, context, cache, fetcher).unwrap();
    Harness { surface, carousel }
}
