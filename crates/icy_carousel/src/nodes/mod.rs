mod arena;
mod lifecycle;
mod reclaim;

pub use arena::*;
pub use lifecycle::*;
pub use reclaim::*;

use crate::surface::TextureHandle;
use crate::viewport::Rect;

pub const SELECTION_SCALE: f32 = 1.1;
pub const SELECTION_BORDER_WIDTH: f32 = 2.0;
pub const SELECTION_BORDER_COLOR: [u8; 4] = [255, 255, 255, 255];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoration {
    /// Border drawn around the selected poster, which is scaled up by `scale`
    SelectionBorder { scale: f32, width: f32, color: [u8; 4] },
}

impl Decoration {
    pub fn selection() -> Self {
        Decoration::SelectionBorder {
            scale: SELECTION_SCALE,
            width: SELECTION_BORDER_WIDTH,
            color: SELECTION_BORDER_COLOR,
        }
    }
}

/// What the render thread draws for one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderNode {
    pub index: usize,
    pub rect: Rect,
    pub texture: TextureHandle,
    pub is_fallback: bool,
    pub decoration: Option<Decoration>,
}

impl RenderNode {
    /// Rect including the selection scale, centered on the item rect
    pub fn draw_rect(&self) -> Rect {
        match self.decoration {
            Some(Decoration::SelectionBorder { scale, .. }) => {
                let dx = self.rect.width * (scale - 1.0) / 2.0;
                let dy = self.rect.height * (scale - 1.0) / 2.0;
                self.rect.expand(dx, dy)
            }
            None => self.rect,
        }
    }
}
