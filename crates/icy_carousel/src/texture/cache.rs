use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::{decode_rgba, RgbaData};
use crate::error::LoadResult;
use crate::io::ByteSource;
use crate::surface::{same_surface, RenderSurface, TextureHandle};

struct CacheEntry {
    texture: TextureHandle,
    /// Surface the texture was uploaded to
    context: Weak<dyn RenderSurface>,
}

impl CacheEntry {
    fn is_valid_for(&self, context: &Arc<dyn RenderSurface>) -> bool {
        match self.context.upgrade() {
            Some(owner) => same_surface(&owner, context) && owner.is_alive() && owner.has_texture(self.texture.id),
            None => false,
        }
    }

    fn release(self) {
        if let Some(owner) = self.context.upgrade() {
            if owner.is_alive() {
                owner.release_texture(self.texture.id);
            }
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry)
    }
}

/// Bounded map from image reference to uploaded texture.
///
/// Eviction is FIFO by insertion time; a hit does not refresh an entry.
/// Entries whose surface went away are dropped the next time they are looked up.
pub struct TextureCache {
    state: Mutex<CacheState>,
    capacity: usize,
    source: Arc<dyn ByteSource>,
}

impl TextureCache {
    pub fn new(capacity: usize, source: Arc<dyn ByteSource>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
            source,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Keys from oldest to newest
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().order.iter().cloned().collect()
    }

    /// Return the texture for `key` if present and valid for `context`, purging it otherwise.
    pub fn lookup(&self, context: &Arc<dyn RenderSurface>, key: &str) -> Option<TextureHandle> {
        let (texture, owner) = {
            let state = self.state.lock();
            let entry = state.entries.get(key)?;
            (entry.texture, entry.context.clone())
        };

        let probe = CacheEntry { texture, context: owner };
        if probe.is_valid_for(context) {
            return Some(texture);
        }

        let removed = {
            let mut state = self.state.lock();
            match state.entries.get(key) {
                Some(entry) if entry.texture == texture => state.remove(key),
                _ => None,
            }
        };
        if let Some(entry) = removed {
            log::debug!("[TextureCache] purged stale entry '{}'", key);
            entry.release();
        }
        None
    }

    /// Return a cached texture or read, decode and upload `key` through the byte source.
    pub fn acquire(&self, context: &Arc<dyn RenderSurface>, key: &str) -> Option<TextureHandle> {
        match self.try_acquire(context, key) {
            Ok(texture) => Some(texture),
            Err(err) => {
                log::warn!("[TextureCache] can't load '{}': {}", key, err);
                None
            }
        }
    }

    pub fn try_acquire(&self, context: &Arc<dyn RenderSurface>, key: &str) -> LoadResult<TextureHandle> {
        if let Some(texture) = self.lookup(context, key) {
            return Ok(texture);
        }
        let bytes = self.source.read(key)?;
        let image = decode_rgba(&bytes)?;
        self.try_insert(context, key, &image)
    }

    /// Upload already decoded pixels and store them under `key`.
    pub fn insert(&self, context: &Arc<dyn RenderSurface>, key: &str, image: &RgbaData) -> Option<TextureHandle> {
        match self.try_insert(context, key, image) {
            Ok(texture) => Some(texture),
            Err(err) => {
                log::warn!("[TextureCache] upload of '{}' failed: {}", key, err);
                None
            }
        }
    }

    pub fn try_insert(&self, context: &Arc<dyn RenderSurface>, key: &str, image: &RgbaData) -> LoadResult<TextureHandle> {
        let texture = context.register_texture(image)?;

        let mut released = Vec::new();
        {
            let mut state = self.state.lock();
            if let Some(old) = state.remove(key) {
                released.push(old);
            }
            while state.entries.len() >= self.capacity {
                let Some(victim) = state.order.pop_front() else {
                    break;
                };
                if let Some(entry) = state.entries.remove(&victim) {
                    log::debug!("[TextureCache] capacity {} reached, evicting '{}'", self.capacity, victim);
                    released.push(entry);
                }
            }
            state.entries.insert(
                key.to_string(),
                CacheEntry {
                    texture,
                    context: Arc::downgrade(context),
                },
            );
            state.order.push_back(key.to_string());
        }

        for entry in released {
            entry.release();
        }
        Ok(texture)
    }

    pub fn release(&self, key: &str) {
        let removed = self.state.lock().remove(key);
        if let Some(entry) = removed {
            entry.release();
        }
    }

    /// Release every entry whose key matches `pred`. Returns how many were dropped.
    pub fn release_where(&self, pred: impl Fn(&str) -> bool) -> usize {
        let entries: Vec<CacheEntry> = {
            let mut state = self.state.lock();
            let keys: Vec<String> = state.order.iter().filter(|key| pred(key.as_str())).cloned().collect();
            keys.iter().filter_map(|key| state.remove(key)).collect()
        };
        let released = entries.len();
        for entry in entries {
            entry.release();
        }
        released
    }

    pub fn release_all(&self) {
        let entries: Vec<CacheEntry> = {
            let mut state = self.state.lock();
            state.order.clear();
            state.entries.drain().map(|(_, entry)| entry).collect()
        };
        log::debug!("[TextureCache] releasing {} textures", entries.len());
        for entry in entries {
            entry.release();
        }
    }
}
