use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::animator::{ScrollAnimator, ScrollTarget};
use crate::error::SetupError;
use crate::io::{FetchClient, HttpFetcher, LocalStore};
use crate::loader::{AsyncLoader, LoadStart, LoaderContext};
use crate::model::{CarouselData, ImageRecord};
use crate::navigation::{navigate, Direction, NavigationOutcome, SelectionState};
use crate::nodes::{FrameSnapshot, NodeLifecycleManager};
use crate::options::CarouselOptions;
use crate::scheduler::{ScheduledTask, TimerQueue};
use crate::surface::RenderSurface;
use crate::texture::TextureCache;
use crate::viewport::{visible_indices, CarouselLayout, LoadPlan, ViewportState};

/// Input the carousel reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselKey {
    Up,
    Down,
    Left,
    Right,
    /// Activate the selected item
    Ok,
    Info,
}

impl CarouselKey {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "up" => Some(CarouselKey::Up),
            "down" => Some(CarouselKey::Down),
            "left" => Some(CarouselKey::Left),
            "right" => Some(CarouselKey::Right),
            "ok" | "enter" | "return" => Some(CarouselKey::Ok),
            "info" | "i" => Some(CarouselKey::Info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CarouselEvent {
    SelectionChanged {
        index: usize,
        category: Option<String>,
        /// Legacy (row, column) position
        grid: Option<(usize, usize)>,
    },
    LinkActivated {
        action: String,
        record: ImageRecord,
    },
}

/// A category carousel bound to one render surface.
///
/// All methods run on the logic side. Time is passed in explicitly; `tick`
/// advances animations, runs due timers and materializes finished loads.
/// The render side only needs [`scene`](Self::scene).
pub struct Carousel {
    options: CarouselOptions,
    data: CarouselData,
    layout: CarouselLayout,
    viewport: ViewportState,
    selection: SelectionState,
    animator: ScrollAnimator,
    timers: TimerQueue,
    loader: AsyncLoader,
    cache: Arc<TextureCache>,
    nodes: Arc<NodeLifecycleManager>,
    surface: Arc<dyn RenderSurface>,
    events: Vec<CarouselEvent>,
    torn_down: bool,
}

impl Carousel {
    pub fn new(options: CarouselOptions, surface: Arc<dyn RenderSurface>, cache: Arc<TextureCache>, fetcher: Arc<dyn FetchClient>) -> Result<Self, SetupError> {
        let nodes = Arc::new(NodeLifecycleManager::new());
        let loader = AsyncLoader::new(
            LoaderContext {
                surface: surface.clone(),
                cache: cache.clone(),
                nodes: nodes.clone(),
                fetcher,
            },
            options.fetch.timeout(),
            options.cache_capacity,
        )?;
        let (width, height) = surface.size();

        Ok(Self {
            animator: ScrollAnimator::new(options.animation_duration()),
            layout: CarouselLayout::new(&CarouselData::default(), options.layout),
            viewport: ViewportState::new(width as f32, height as f32),
            options,
            data: CarouselData::default(),
            selection: SelectionState::default(),
            timers: TimerQueue::new(),
            loader,
            cache,
            nodes,
            surface,
            events: Vec::new(),
            torn_down: false,
        })
    }

    /// Carousel reading local images below `options.resource_root` and fetching remote ones over HTTP.
    pub fn with_defaults(options: CarouselOptions, surface: Arc<dyn RenderSurface>) -> Result<Self, SetupError> {
        let cache = Arc::new(TextureCache::new(options.cache_capacity, Arc::new(LocalStore::new(options.resource_root.clone()))));
        let fetcher = Arc::new(HttpFetcher::new(&options.fetch).map_err(SetupError::Fetcher)?);
        Self::new(options, surface, cache, fetcher)
    }

    pub fn options(&self) -> &CarouselOptions {
        &self.options
    }

    pub fn data(&self) -> &CarouselData {
        &self.data
    }

    pub fn layout(&self) -> &CarouselLayout {
        &self.layout
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn animator(&self) -> &ScrollAnimator {
        &self.animator
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn loader(&self) -> &AsyncLoader {
        &self.loader
    }

    pub fn cache(&self) -> &Arc<TextureCache> {
        &self.cache
    }

    /// Render side handle, safe to hand to another thread
    pub fn scene(&self) -> Arc<NodeLifecycleManager> {
        self.nodes.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn take_events(&mut self) -> Vec<CarouselEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replace the records. Everything that depended on the old set is dropped
    /// before the new layout is built.
    pub fn set_data(&mut self, data: CarouselData, now: Instant) {
        if self.torn_down {
            warn!("[Carousel] set_data after teardown ignored");
            return;
        }
        let data = if data.is_empty() {
            info!("[Carousel] no records, using default items");
            CarouselData::default_items()
        } else {
            data
        };

        let cancelled = self.loader.cancel_all();
        let batch = self.nodes.detach_all();
        self.nodes.retire(batch, self.surface.as_ref());
        self.nodes.clear_entries();
        self.loader.release_fallbacks();
        self.timers.clear();
        self.animator.stop_all();
        self.viewport.reset_offsets();
        self.selection.clear();

        self.layout = CarouselLayout::new(&data, self.options.layout);
        self.data = data;
        info!(
            "[Carousel] loaded {} items in {} categories ({} requests cancelled)",
            self.data.len(),
            self.data.categories().len(),
            cancelled
        );

        self.load_all(now);
        self.publish();
    }

    pub fn set_viewport_size(&mut self, width: f32, height: f32, now: Instant) {
        if (self.viewport.width - width).abs() < f32::EPSILON && (self.viewport.height - height).abs() < f32::EPSILON {
            return;
        }
        self.viewport.width = width;
        self.viewport.height = height;
        self.viewport.content_y = self.viewport.content_y.clamp(0.0, self.layout.max_content_y(height));
        for row in self.layout.rows() {
            let offset = self.viewport.category_offset(&row.name);
            let clamped = offset.clamp(0.0, row.max_offset(width));
            if (clamped - offset).abs() > f32::EPSILON {
                self.viewport.set_category_offset(&row.name, clamped);
            }
        }
        if !self.torn_down {
            self.timers.schedule_once(now + self.options.retry_delay(), ScheduledTask::LoadAll);
        }
        self.publish();
    }

    /// Load the visible items now and stagger the rest.
    pub fn load_all(&mut self, now: Instant) {
        if self.nodes.is_destroying() {
            return;
        }
        if !self.surface.is_ready() {
            debug!("[Carousel] surface not ready, retrying full load");
            self.timers.schedule_once(now + self.options.retry_delay(), ScheduledTask::LoadAll);
            return;
        }

        let visible = visible_indices(&self.viewport, &self.layout);
        if visible.len() > self.cache.capacity() {
            warn!("[Carousel] {} visible items but the texture cache holds {}", visible.len(), self.cache.capacity());
        }
        let budget = self.cache.capacity().saturating_sub(visible.len());
        let plan = LoadPlan::full(&visible, self.data.len(), self.options.stagger(), budget);
        debug!("[Carousel] full load: {} visible, {} staggered", plan.immediate.len(), plan.deferred.len());
        for index in plan.immediate {
            self.load(index, now);
        }
        for (delay, index) in plan.deferred {
            self.timers.schedule_after(now, delay, ScheduledTask::Load(index));
        }
    }

    /// Start loading one item unless it already has a resource or a request in flight.
    pub fn load(&mut self, index: usize, now: Instant) -> LoadStart {
        if self.nodes.is_destroying() {
            return LoadStart::Skipped;
        }
        if !self.surface.is_ready() {
            self.timers.schedule_after(now, self.options.retry_delay(), ScheduledTask::Load(index));
            return LoadStart::Skipped;
        }
        if self.nodes.has_resource(index) || self.loader.is_pending(index) {
            return LoadStart::Skipped;
        }
        let Some(record) = self.data.record(index) else {
            return LoadStart::Skipped;
        };

        let dims = self.data.dimensions_of(index);
        let poster = (dims.poster_width.max(1.0) as u32, dims.poster_height.max(1.0) as u32);
        let start = self.loader.load(index, record, poster);
        if matches!(start, LoadStart::Ready(_) | LoadStart::Fallback(_)) {
            self.publish();
        }
        start
    }

    /// Queue loads for visible items that have neither a resource nor a request.
    pub fn scroll_pass(&mut self, now: Instant) {
        if self.nodes.is_destroying() {
            return;
        }
        let visible = visible_indices(&self.viewport, &self.layout);
        let nodes = &self.nodes;
        let loader = &self.loader;
        let plan = LoadPlan::scroll(&visible, |index| !nodes.has_resource(index) && !loader.is_pending(index), self.options.scroll_load_delay());
        for (delay, index) in plan.deferred {
            // a staggered load may already be queued much later
            self.timers.schedule_no_later(now + delay, ScheduledTask::Load(index));
        }
    }

    pub fn navigate(&mut self, direction: Direction, now: Instant) -> bool {
        if self.torn_down {
            return false;
        }
        match navigate(direction, &self.selection, &self.viewport, &self.layout) {
            NavigationOutcome::Rejected => {
                debug!("[Carousel] {:?} rejected at {:?}", direction, self.selection.current);
                false
            }
            NavigationOutcome::Moved { index, horizontal, vertical } => {
                self.selection.select(index, &self.layout);
                if let Some((category, target)) = horizontal {
                    let from = self.viewport.category_offset(&category);
                    self.animator.animate_horizontal(&category, from, target, now);
                }
                if let Some(target) = vertical {
                    self.animator.animate_vertical(self.viewport.content_y, target, now);
                }

                let grid = self.selection.grid_position();
                debug!("[Carousel] selected item {} in {:?}, grid position {:?}", index, self.selection.category, grid);
                self.events.push(CarouselEvent::SelectionChanged {
                    index,
                    category: self.selection.category.clone(),
                    grid,
                });
                self.publish();
                true
            }
        }
    }

    /// Returns false if the key was not consumed.
    pub fn handle_key(&mut self, key: CarouselKey, now: Instant) -> bool {
        match key {
            CarouselKey::Up => self.navigate(Direction::Up, now),
            CarouselKey::Down => self.navigate(Direction::Down, now),
            CarouselKey::Left => self.navigate(Direction::Left, now),
            CarouselKey::Right => self.navigate(Direction::Right, now),
            CarouselKey::Ok => self.activate("OK"),
            CarouselKey::Info => self.activate("info"),
        }
    }

    fn activate(&mut self, action: &str) -> bool {
        let Some(record) = self.selection.current.and_then(|index| self.data.record(index)) else {
            return false;
        };
        info!("[Carousel] {} on '{}'", action, record.title);
        self.events.push(CarouselEvent::LinkActivated {
            action: action.to_string(),
            record: record.clone(),
        });
        true
    }

    /// Wheel scrolling. `dx` moves the selected category, `dy` the shared vertical offset.
    pub fn scroll_by(&mut self, dx: f32, dy: f32, now: Instant) {
        if self.torn_down {
            return;
        }
        if dx != 0.0 {
            let category = self.selection.category.clone().or_else(|| self.layout.rows().first().map(|row| row.name.clone()));
            if let Some(row) = category.and_then(|name| self.layout.rows().iter().find(|row| row.name == name)) {
                let offset = (self.viewport.category_offset(&row.name) + dx).clamp(0.0, row.max_offset(self.viewport.width));
                self.viewport.set_category_offset(&row.name, offset);
            }
        }
        if dy != 0.0 {
            self.viewport.content_y = (self.viewport.content_y + dy).clamp(0.0, self.layout.max_content_y(self.viewport.height));
        }
        self.scroll_pass(now);
        self.publish();
    }

    /// Advance the carousel to `now`. Returns the number of items whose image arrived.
    pub fn tick(&mut self, now: Instant) -> usize {
        if self.torn_down {
            return 0;
        }

        let updates = self.animator.tick(now);
        let scrolled = !updates.is_empty();
        for update in updates {
            match update.target {
                ScrollTarget::Vertical => self.viewport.content_y = update.value,
                ScrollTarget::Horizontal(category) => self.viewport.set_category_offset(&category, update.value),
            }
        }
        // the render side dropped items whose texture left the cache
        let lost = self.nodes.take_lost_textures();
        if lost {
            debug!("[Carousel] visible textures went missing, reloading");
        }
        if scrolled || lost {
            self.scroll_pass(now);
        }

        for task in self.timers.pop_due(now) {
            match task {
                ScheduledTask::LoadAll => self.load_all(now),
                ScheduledTask::Load(index) => {
                    self.load(index, now);
                }
                ScheduledTask::ScrollPass => self.scroll_pass(now),
            }
        }

        let arrived = self.loader.poll_results().len();
        self.publish();
        arrived
    }

    /// Block up to `timeout` for in flight fetches, then materialize what arrived.
    pub fn wait_for_loads(&mut self, timeout: Duration) -> usize {
        if self.torn_down || self.loader.pending_count() == 0 {
            return 0;
        }
        let arrived = self.loader.wait_results(timeout).len();
        self.publish();
        arrived
    }

    /// What the render side should show for the current state.
    pub fn snapshot(&self) -> FrameSnapshot {
        let items = visible_indices(&self.viewport, &self.layout)
            .into_iter()
            .filter_map(|index| self.layout.item_rect(&self.viewport, index).map(|rect| (index, rect)))
            .collect();
        FrameSnapshot {
            items,
            selected: self.selection.current,
        }
    }

    fn publish(&self) {
        if self.nodes.is_destroying() {
            return;
        }
        self.nodes.publish(self.snapshot());
        self.surface.request_update();
    }

    /// Shut the carousel down. Safe to call more than once; also runs on drop.
    ///
    /// Hiding the tree only requests a repaint, it does not wait for a render
    /// pass. A pass already running keeps its epoch pinned, so the nodes it can
    /// still reach stay alive until it ends.
    ///
    /// Nodes are only detached here. They are freed by a deferred job on the
    /// render side once no pass can still reach them.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.nodes.set_destroying(true);

        self.nodes.hide();
        self.surface.request_update();

        self.animator.stop_all();
        self.timers.clear();

        let cancelled = self.loader.cancel_all();

        let batch = self.nodes.detach_all();
        let detached = batch.len();
        self.nodes.retire(batch, self.surface.as_ref());

        self.nodes.clear_entries();
        self.data = CarouselData::default();
        self.layout = CarouselLayout::default();
        self.viewport.reset_offsets();
        self.selection.clear();
        self.loader.clear_decoded();
        self.loader.release_fallbacks();

        info!("[Carousel] torn down: {} requests cancelled, {} nodes detached", cancelled, detached);
    }
}

impl Drop for Carousel {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_names() {
        assert_eq!(CarouselKey::parse("Up"), Some(CarouselKey::Up));
        assert_eq!(CarouselKey::parse(" enter "), Some(CarouselKey::Ok));
        assert_eq!(CarouselKey::parse("i"), Some(CarouselKey::Info));
        assert_eq!(CarouselKey::parse("space"), None);
    }
}
