use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{Decoration, EpochReclaimer, NodeArena, NodeId, RenderNode};
use crate::surface::{RenderStage, RenderSurface, SceneItem, TextureHandle};
use crate::viewport::Rect;

/// Per index state shared between the logic and the render side.
///
/// The entry only refers to its texture, the cache owns it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeEntry {
    pub node: Option<NodeId>,
    pub texture: Option<TextureHandle>,
    pub is_fallback: bool,
}

/// Logic side view of what should be on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSnapshot {
    pub items: Vec<(usize, Rect)>,
    pub selected: Option<usize>,
}

#[derive(Default)]
struct PublishedTree {
    nodes: Vec<NodeId>,
    traversable: bool,
}

#[derive(Default)]
struct SnapshotSlot {
    latest: FrameSnapshot,
    dirty: bool,
}

/// Owns the render nodes and hands them to the render thread.
///
/// Nodes are never freed synchronously. Replaced or detached nodes are
/// retired into an [`EpochReclaimer`] and freed by a deferred job on the
/// render thread once no traversal can still see them.
pub struct NodeLifecycleManager {
    entries: Mutex<BTreeMap<usize, NodeEntry>>,
    published: RwLock<PublishedTree>,
    snapshot: Mutex<SnapshotSlot>,
    arena: Arc<NodeArena>,
    reclaimer: Arc<EpochReclaimer<Vec<NodeId>>>,
    destroying: AtomicBool,
    reclaim_scheduled: Arc<AtomicBool>,
    /// Set by the render side when a published entry lost its texture
    lost_textures: AtomicBool,
}

impl Default for NodeLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeLifecycleManager {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            published: RwLock::new(PublishedTree::default()),
            snapshot: Mutex::new(SnapshotSlot::default()),
            arena: Arc::new(NodeArena::new()),
            reclaimer: Arc::new(EpochReclaimer::new()),
            destroying: AtomicBool::new(false),
            reclaim_scheduled: Arc::new(AtomicBool::new(false)),
            lost_textures: AtomicBool::new(false),
        }
    }

    pub fn is_destroying(&self) -> bool {
        self.destroying.load(Ordering::Acquire)
    }

    pub fn set_destroying(&self, destroying: bool) {
        self.destroying.store(destroying, Ordering::Release);
    }

    // --- logic side ---

    /// Attach a texture to `index`. Ignored while destroying.
    pub fn resource_ready(&self, index: usize, texture: TextureHandle, is_fallback: bool) -> bool {
        if self.is_destroying() {
            return false;
        }
        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(index).or_default();
            entry.texture = Some(texture);
            entry.is_fallback = is_fallback;
        }
        self.mark_dirty();
        true
    }

    pub fn has_resource(&self, index: usize) -> bool {
        self.entries.lock().get(&index).is_some_and(|e| e.texture.is_some())
    }

    pub fn entry(&self, index: usize) -> Option<NodeEntry> {
        self.entries.lock().get(&index).copied()
    }

    pub fn clear_resource(&self, index: usize) {
        if let Some(entry) = self.entries.lock().get_mut(&index) {
            entry.texture = None;
            entry.is_fallback = false;
        }
        self.mark_dirty();
    }

    pub fn publish(&self, snapshot: FrameSnapshot) {
        let mut slot = self.snapshot.lock();
        slot.latest = snapshot;
        slot.dirty = true;
    }

    pub fn mark_dirty(&self) {
        self.snapshot.lock().dirty = true;
    }

    /// Stop traversal of the current tree right away.
    pub fn hide(&self) {
        self.published.write().traversable = false;
    }

    pub fn is_traversable(&self) -> bool {
        self.published.read().traversable
    }

    pub fn published_len(&self) -> usize {
        self.published.read().nodes.len()
    }

    /// Clears every node reference under the node map lock and returns the
    /// detached ids. Nothing is freed here.
    pub fn detach_all(&self) -> Vec<NodeId> {
        let mut batch = Vec::new();
        {
            let mut entries = self.entries.lock();
            for entry in entries.values_mut() {
                if let Some(node) = entry.node.take() {
                    batch.push(node);
                }
            }
            let mut published = self.published.write();
            published.traversable = false;
            batch.append(&mut published.nodes);
        }
        batch.sort_unstable();
        batch.dedup();
        batch
    }

    pub fn clear_entries(&self) {
        self.entries.lock().clear();
        *self.snapshot.lock() = SnapshotSlot::default();
        self.lost_textures.store(false, Ordering::Release);
    }

    /// Hand a detached batch to deferred deletion.
    pub fn retire(&self, batch: Vec<NodeId>, surface: &dyn RenderSurface) {
        if batch.is_empty() {
            return;
        }
        log::debug!("[NodeLifecycle] retiring {} nodes", batch.len());
        self.reclaimer.retire(batch);
        self.schedule_reclaim(surface);
    }

    /// True once after the render side cleared a resource whose texture was gone.
    pub fn take_lost_textures(&self) -> bool {
        self.lost_textures.swap(false, Ordering::AcqRel)
    }

    pub fn live_nodes(&self) -> usize {
        self.arena.live_nodes()
    }

    pub fn pending_reclaim(&self) -> usize {
        self.reclaimer.pending()
    }

    pub fn node(&self, id: NodeId) -> Option<RenderNode> {
        self.arena.get(id)
    }

    fn schedule_reclaim(&self, surface: &dyn RenderSurface) {
        if self.reclaim_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let arena = Arc::clone(&self.arena);
        let reclaimer = Arc::clone(&self.reclaimer);
        let scheduled = Arc::clone(&self.reclaim_scheduled);
        surface.schedule_deferred(
            RenderStage::BeforeSynchronizing,
            Box::new(move || {
                scheduled.store(false, Ordering::Release);
                let freed = arena.free_all(reclaimer.collect().into_iter().flatten());
                if freed > 0 {
                    log::debug!("[NodeLifecycle] reclaimed {} nodes", freed);
                }
                let held = reclaimer.pending();
                if held > 0 {
                    log::debug!("[NodeLifecycle] {} batches still held by an active pass", held);
                }
            }),
        );
    }

    fn is_presentable(surface: &dyn RenderSurface) -> bool {
        let (width, height) = surface.size();
        surface.is_alive() && surface.is_exposed() && width > 0 && height > 0
    }

    fn rebuild(&self, snapshot: &FrameSnapshot, surface: &dyn RenderSurface) {
        let candidates: Vec<(usize, Rect, NodeEntry)> = {
            let entries = self.entries.lock();
            snapshot
                .items
                .iter()
                .filter_map(|(index, rect)| entries.get(index).filter(|e| e.texture.is_some()).map(|e| (*index, *rect, *e)))
                .collect()
        };

        // texture checks and node construction happen without the node map lock
        let mut invalid = Vec::new();
        let mut built = Vec::with_capacity(candidates.len());
        let mut retired = Vec::new();
        for (index, rect, entry) in candidates {
            let Some(texture) = entry.texture else {
                continue;
            };
            if !surface.has_texture(texture.id) {
                invalid.push((index, texture));
                continue;
            }
            let wanted = RenderNode {
                index,
                rect,
                texture,
                is_fallback: entry.is_fallback,
                decoration: (snapshot.selected == Some(index)).then(Decoration::selection),
            };
            let id = match entry.node {
                Some(id) if self.arena.get(id) == Some(wanted) => id,
                old => {
                    retired.extend(old);
                    self.arena.insert(wanted)
                }
            };
            built.push((index, texture, id));
        }

        {
            let mut entries = self.entries.lock();
            if self.is_destroying() {
                retired.extend(built.iter().map(|(_, _, id)| *id));
            } else {
                for (index, texture) in invalid {
                    if let Some(entry) = entries.get_mut(&index) {
                        if entry.texture == Some(texture) {
                            log::debug!("[NodeLifecycle] texture of item {} is gone, reloading", index);
                            entry.texture = None;
                            entry.is_fallback = false;
                            self.lost_textures.store(true, Ordering::Release);
                        }
                    }
                }

                let mut published_ids = Vec::with_capacity(built.len());
                for (index, texture, id) in built {
                    match entries.get_mut(&index) {
                        Some(entry) if entry.texture == Some(texture) => {
                            entry.node = Some(id);
                            published_ids.push(id);
                        }
                        _ => retired.push(id),
                    }
                }

                let keep: HashSet<NodeId> = published_ids.iter().copied().collect();
                for entry in entries.values_mut() {
                    if let Some(node) = entry.node {
                        if !keep.contains(&node) {
                            entry.node = None;
                            retired.push(node);
                        }
                    }
                }

                let mut published = self.published.write();
                published.nodes = published_ids;
                published.traversable = true;
            }
        }

        retired.sort_unstable();
        retired.dedup();
        self.retire(retired, surface);
    }
}

impl SceneItem for NodeLifecycleManager {
    fn update_paint_node(&self, surface: &dyn RenderSurface) {
        if self.reclaimer.pending() > 0 {
            self.schedule_reclaim(surface);
        }

        if self.is_destroying() || !Self::is_presentable(surface) {
            let batch = self.detach_all();
            if !batch.is_empty() {
                log::debug!("[NodeLifecycle] surface not presentable, dropping {} nodes", batch.len());
                self.retire(batch, surface);
            }
            self.mark_dirty();
            return;
        }

        let snapshot = {
            let mut slot = self.snapshot.lock();
            if !slot.dirty && self.is_traversable() {
                return;
            }
            slot.dirty = false;
            slot.latest.clone()
        };
        self.rebuild(&snapshot, surface);
    }

    fn traverse(&self, visitor: &mut dyn FnMut(&RenderNode)) {
        let _pass = self.reclaimer.pin();
        let ids = {
            let published = self.published.read();
            if !published.traversable {
                return;
            }
            published.nodes.clone()
        };
        for id in ids {
            match self.arena.get(id) {
                Some(node) => visitor(&node),
                None => log::error!("[NodeLifecycle] published node {:?} was freed during traversal", id),
            }
        }
    }
}
