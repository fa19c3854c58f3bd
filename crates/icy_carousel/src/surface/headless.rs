use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{DeferredJob, RenderStage, RenderSurface, SceneItem, TextureHandle, TextureId};
use crate::error::{LoadError, LoadResult};
use crate::texture::RgbaData;

/// What happened during one [`HeadlessSurface::render_frame`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub jobs_run: usize,
    pub nodes_drawn: usize,
    /// Drawn nodes whose texture was not (or no longer) registered
    pub missing_textures: usize,
}

/// In-memory surface. Textures live in a map, deferred jobs in a queue that
/// [`render_frame`](Self::render_frame) drains at the right stage.
pub struct HeadlessSurface {
    textures: Mutex<HashMap<TextureId, RgbaData>>,
    jobs: Mutex<Vec<(RenderStage, DeferredJob)>>,
    next_id: AtomicU64,
    size: Mutex<(u32, u32)>,
    exposed: AtomicBool,
    ready: AtomicBool,
    alive: AtomicBool,
    update_requests: AtomicUsize,
    reject_uploads: AtomicBool,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            textures: Mutex::new(HashMap::new()),
            jobs: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            size: Mutex::new((width, height)),
            exposed: AtomicBool::new(true),
            ready: AtomicBool::new(true),
            alive: AtomicBool::new(true),
            update_requests: AtomicUsize::new(0),
            reject_uploads: AtomicBool::new(false),
        }
    }

    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock() = (width, height);
    }

    pub fn set_exposed(&self, exposed: bool) {
        self.exposed.store(exposed, Ordering::Release);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Make every following upload fail, simulating a lost graphics context.
    pub fn set_reject_uploads(&self, reject: bool) {
        self.reject_uploads.store(reject, Ordering::Release);
    }

    /// Marks the surface dead and drops all textures. Textures handed out before are invalid afterwards.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::Release);
        self.ready.store(false, Ordering::Release);
        let count = {
            let mut textures = self.textures.lock();
            let count = textures.len();
            textures.clear();
            count
        };
        log::info!("[HeadlessSurface] shut down, dropped {} textures", count);
    }

    pub fn texture_count(&self) -> usize {
        self.textures.lock().len()
    }

    pub fn texture(&self, id: TextureId) -> Option<RgbaData> {
        self.textures.lock().get(&id).cloned()
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn update_requests(&self) -> usize {
        self.update_requests.load(Ordering::Acquire)
    }

    /// Run the jobs queued for `stage`. Jobs scheduled while running wait for the next frame.
    pub fn run_jobs(&self, stage: RenderStage) -> usize {
        let due: Vec<DeferredJob> = {
            let mut jobs = self.jobs.lock();
            let (due, keep): (Vec<_>, Vec<_>) = jobs.drain(..).partition(|(s, _)| *s == stage);
            *jobs = keep;
            due.into_iter().map(|(_, job)| job).collect()
        };
        let count = due.len();
        for job in due {
            job();
        }
        count
    }

    /// One render pass: deferred jobs, sync, draw, post-render jobs.
    pub fn render_frame(&self, scene: &dyn SceneItem) -> FrameStats {
        let mut stats = FrameStats {
            jobs_run: self.run_jobs(RenderStage::BeforeSynchronizing),
            ..Default::default()
        };

        scene.update_paint_node(self);

        scene.traverse(&mut |node| {
            stats.nodes_drawn += 1;
            if !self.has_texture(node.texture.id) {
                stats.missing_textures += 1;
            }
        });

        stats.jobs_run += self.run_jobs(RenderStage::AfterRendering);
        stats
    }
}

impl RenderSurface for HeadlessSurface {
    fn register_texture(&self, image: &RgbaData) -> LoadResult<TextureHandle> {
        if !self.is_alive() || !self.is_ready() || self.reject_uploads.load(Ordering::Acquire) {
            return Err(LoadError::Upload("surface has no graphics context".to_string()));
        }
        if image.width == 0 || image.height == 0 {
            return Err(LoadError::Upload(format!("empty image {}x{}", image.width, image.height)));
        }
        let id = TextureId(self.next_id.fetch_add(1, Ordering::AcqRel));
        self.textures.lock().insert(id, image.clone());
        Ok(TextureHandle {
            id,
            width: image.width,
            height: image.height,
        })
    }

    fn release_texture(&self, id: TextureId) {
        self.textures.lock().remove(&id);
    }

    fn has_texture(&self, id: TextureId) -> bool {
        self.textures.lock().contains_key(&id)
    }

    fn schedule_deferred(&self, stage: RenderStage, job: DeferredJob) {
        self.jobs.lock().push((stage, job));
    }

    fn request_update(&self) {
        self.update_requests.fetch_add(1, Ordering::AcqRel);
    }

    fn is_exposed(&self) -> bool {
        self.exposed.load(Ordering::Acquire)
    }

    fn size(&self) -> (u32, u32) {
        *self.size.lock()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}
