//! The boundary between the carousel core and whatever presents it.
//!
//! A [`RenderSurface`] owns GPU-side textures and the render thread's job
//! queues. The carousel only ever talks to it through this trait; the crate
//! ships [`HeadlessSurface`] which keeps everything in memory.

use std::sync::Arc;

use crate::error::LoadResult;
use crate::nodes::RenderNode;
use crate::texture::RgbaData;

mod headless;
pub use headless::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// A texture uploaded to a surface. Plain data; the surface that issued it owns the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

/// Points in the render thread's frame at which deferred jobs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStage {
    /// Before the scene is synchronized with the logic side
    BeforeSynchronizing,
    /// After the frame has been drawn
    AfterRendering,
}

pub type DeferredJob = Box<dyn FnOnce() + Send + 'static>;

pub trait RenderSurface: Send + Sync {
    fn register_texture(&self, image: &RgbaData) -> LoadResult<TextureHandle>;
    fn release_texture(&self, id: TextureId);
    fn has_texture(&self, id: TextureId) -> bool;

    /// Queue `job` to run on the render thread at `stage` of the next frame.
    fn schedule_deferred(&self, stage: RenderStage, job: DeferredJob);
    fn request_update(&self);

    /// Attached to a visible window
    fn is_exposed(&self) -> bool;
    fn size(&self) -> (u32, u32);
    /// Has a usable graphics context
    fn is_ready(&self) -> bool;
    /// False once the surface is being torn down; textures it issued are then invalid.
    fn is_alive(&self) -> bool;
}

/// Render-thread side of something drawn on a surface.
pub trait SceneItem: Send + Sync {
    /// Bring the node tree in line with the latest logic-side state.
    fn update_paint_node(&self, surface: &dyn RenderSurface);

    /// Visit every published node. Nodes stay valid for the duration of the call.
    fn traverse(&self, visitor: &mut dyn FnMut(&RenderNode));
}

/// Identity comparison for surfaces that ignores vtable pointers.
pub fn same_surface(a: &Arc<dyn RenderSurface>, b: &Arc<dyn RenderSurface>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
