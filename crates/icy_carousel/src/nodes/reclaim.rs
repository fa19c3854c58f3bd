use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

struct ReclaimState<T> {
    /// epoch -> number of passes pinned at it
    pins: BTreeMap<u64, usize>,
    /// (epoch at retirement, batch), oldest first
    retired: VecDeque<(u64, T)>,
}

/// Epoch based deferred reclamation.
///
/// Readers pin the current epoch for the duration of a pass. Retired batches
/// are tagged with the epoch they were retired in and the epoch advances, so a
/// batch may only be freed once every pass that could have observed it has
/// ended: its tag must be older than the oldest active pin.
pub struct EpochReclaimer<T> {
    epoch: AtomicU64,
    state: Mutex<ReclaimState<T>>,
}

/// Keeps an epoch pinned until dropped.
pub struct PassGuard<'a, T> {
    reclaimer: &'a EpochReclaimer<T>,
    epoch: u64,
}

impl<T> PassGuard<'_, T> {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl<T> Drop for PassGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.reclaimer.state.lock();
        if let Some(count) = state.pins.get_mut(&self.epoch) {
            *count -= 1;
            if *count == 0 {
                state.pins.remove(&self.epoch);
            }
        }
    }
}

impl<T> Default for EpochReclaimer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EpochReclaimer<T> {
    pub fn new() -> Self {
        Self {
            epoch: AtomicU64::new(0),
            state: Mutex::new(ReclaimState {
                pins: BTreeMap::new(),
                retired: VecDeque::new(),
            }),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn pin(&self) -> PassGuard<'_, T> {
        let mut state = self.state.lock();
        let epoch = self.epoch.load(Ordering::Acquire);
        *state.pins.entry(epoch).or_insert(0) += 1;
        PassGuard { reclaimer: self, epoch }
    }

    pub fn retire(&self, batch: T) {
        let mut state = self.state.lock();
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel);
        state.retired.push_back((epoch, batch));
    }

    /// Take every batch no active pass can still observe.
    pub fn collect(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let oldest_pin = state.pins.keys().next().copied().unwrap_or(u64::MAX);
        let mut freed = Vec::new();
        while state.retired.front().is_some_and(|(tag, _)| *tag < oldest_pin) {
            if let Some((_, batch)) = state.retired.pop_front() {
                freed.push(batch);
            }
        }
        freed
    }

    /// Retired batches not yet collected
    pub fn pending(&self) -> usize {
        self.state.lock().retired.len()
    }

    pub fn active_passes(&self) -> usize {
        self.state.lock().pins.values().sum()
    }
}
