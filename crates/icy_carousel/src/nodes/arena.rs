use parking_lot::RwLock;

use super::RenderNode;

/// Generational handle into a [`NodeArena`]. A freed slot bumps its generation,
/// so stale ids resolve to nothing instead of to a recycled node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    node: Option<RenderNode>,
}

#[derive(Default)]
struct ArenaInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

#[derive(Default)]
pub struct NodeArena {
    inner: RwLock<ArenaInner>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node: RenderNode) -> NodeId {
        let mut inner = self.inner.write();
        inner.live += 1;
        if let Some(slot) = inner.free.pop() {
            let entry = &mut inner.slots[slot as usize];
            entry.node = Some(node);
            return NodeId {
                slot,
                generation: entry.generation,
            };
        }
        let slot = inner.slots.len() as u32;
        inner.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId { slot, generation: 0 }
    }

    pub fn get(&self, id: NodeId) -> Option<RenderNode> {
        let inner = self.inner.read();
        let slot = inner.slots.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Frees the given nodes, returns how many were still alive.
    pub fn free_all(&self, ids: impl IntoIterator<Item = NodeId>) -> usize {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let mut freed = 0;
        for id in ids {
            let Some(slot) = inner.slots.get_mut(id.slot as usize) else {
                continue;
            };
            if slot.generation != id.generation || slot.node.is_none() {
                continue;
            }
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            inner.free.push(id.slot);
            inner.live -= 1;
            freed += 1;
        }
        freed
    }

    pub fn live_nodes(&self) -> usize {
        self.inner.read().live
    }
}
