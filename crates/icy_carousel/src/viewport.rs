use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::time::Duration;

use crate::model::{CarouselData, CategoryDimensions};
use crate::options::LayoutMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }

    /// Grow by `dx` left and right and `dy` top and bottom.
    pub fn expand(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x - dx, self.y - dy, self.width + 2.0 * dx, self.height + 2.0 * dy)
    }
}

/// Scroll position and size of the visible window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportState {
    /// Shared vertical offset
    pub content_y: f32,
    /// Horizontal offset per category
    pub category_x: HashMap<String, f32>,
    pub width: f32,
    pub height: f32,
}

impl ViewportState {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn category_offset(&self, category: &str) -> f32 {
        self.category_x.get(category).copied().unwrap_or(0.0)
    }

    pub fn set_category_offset(&mut self, category: &str, offset: f32) {
        self.category_x.insert(category.to_string(), offset);
    }

    pub fn reset_offsets(&mut self) {
        self.content_y = 0.0;
        self.category_x.clear();
    }
}

/// Placement of one category row in content coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    pub name: String,
    pub dimensions: CategoryDimensions,
    pub indices: Range<usize>,
    pub title_y: f32,
    /// Top of the posters
    pub row_y: f32,
}

impl RowLayout {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Distance of item `k` from the start of the row
    pub fn item_offset(&self, k: usize) -> f32 {
        k as f32 * (self.dimensions.poster_width + self.dimensions.item_spacing)
    }

    pub fn content_width(&self, viewport_width: f32) -> f32 {
        let n = self.len() as f32;
        if n == 0.0 {
            return 0.0;
        }
        let dims = &self.dimensions;
        let width = n * dims.poster_width + (n - 1.0) * dims.item_spacing;
        if width > viewport_width {
            width + dims.poster_width * 0.5
        } else {
            width
        }
    }

    pub fn max_offset(&self, viewport_width: f32) -> f32 {
        (self.content_width(viewport_width) - viewport_width).max(0.0)
    }
}

/// Row geometry for a data set, computed once per data load.
#[derive(Debug, Clone, Default)]
pub struct CarouselLayout {
    rows: Vec<RowLayout>,
    metrics: LayoutMetrics,
    content_height: f32,
}

impl CarouselLayout {
    pub fn new(data: &CarouselData, metrics: LayoutMetrics) -> Self {
        let mut rows = Vec::with_capacity(data.categories().len());
        let mut cursor = 0.0;
        let mut content_height = 0.0;
        for category in data.categories() {
            let title_y = cursor;
            let row_y = title_y + metrics.title_height + metrics.title_spacing;
            content_height = row_y + category.dimensions.row_height;
            cursor = content_height + metrics.row_spacing;
            rows.push(RowLayout {
                name: category.name.clone(),
                dimensions: category.dimensions,
                indices: category.indices.clone(),
                title_y,
                row_y,
            });
        }
        Self { rows, metrics, content_height }
    }

    pub fn rows(&self) -> &[RowLayout] {
        &self.rows
    }

    pub fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    pub fn content_height(&self) -> f32 {
        self.content_height
    }

    pub fn item_count(&self) -> usize {
        self.rows.last().map_or(0, |row| row.indices.end)
    }

    pub fn row_position(&self, category: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.name == category)
    }

    /// Row position and the row owning `index`
    pub fn row_of(&self, index: usize) -> Option<(usize, &RowLayout)> {
        self.rows.iter().enumerate().find(|(_, row)| row.indices.contains(&index))
    }

    /// Screen x of item `k` of `row` under horizontal offset `offset`
    pub fn item_x(&self, row: &RowLayout, k: usize, offset: f32) -> f32 {
        self.metrics.start_x + self.metrics.left_padding - offset + row.item_offset(k)
    }

    pub fn item_rect(&self, viewport: &ViewportState, index: usize) -> Option<Rect> {
        let (_, row) = self.row_of(index)?;
        let k = index - row.indices.start;
        let x = self.item_x(row, k, viewport.category_offset(&row.name));
        Some(Rect::new(
            x,
            row.row_y - viewport.content_y,
            row.dimensions.poster_width,
            row.dimensions.poster_height,
        ))
    }

    pub fn max_content_y(&self, viewport_height: f32) -> f32 {
        (self.content_height - viewport_height).max(0.0)
    }
}

/// Result of one visibility pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityScan {
    pub visible: BTreeSet<usize>,
    /// Items whose horizontal span was actually tested
    pub items_tested: usize,
    pub rows_skipped: usize,
}

/// Single pass over all rows. A row whose posters are more than one poster
/// height above or below the window is skipped without testing its items.
pub fn scan_visible(viewport: &ViewportState, layout: &CarouselLayout) -> VisibilityScan {
    let mut scan = VisibilityScan::default();
    if viewport.is_empty() {
        return scan;
    }

    for row in layout.rows() {
        let dims = &row.dimensions;
        let y = row.row_y - viewport.content_y;
        if y + dims.poster_height <= -dims.poster_height || y >= viewport.height + dims.poster_height {
            scan.rows_skipped += 1;
            continue;
        }

        let offset = viewport.category_offset(&row.name);
        let left = -dims.poster_width;
        let right = viewport.width + dims.poster_width;
        for (k, index) in row.indices.clone().enumerate() {
            scan.items_tested += 1;
            let x = layout.item_x(row, k, offset);
            if x + dims.poster_width > left && x < right {
                scan.visible.insert(index);
            }
        }
    }
    scan
}

pub fn visible_indices(viewport: &ViewportState, layout: &CarouselLayout) -> BTreeSet<usize> {
    scan_visible(viewport, layout).visible
}

/// Which loads to start now and which to start later
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadPlan {
    pub immediate: Vec<usize>,
    pub deferred: Vec<(Duration, usize)>,
}

impl LoadPlan {
    /// Visible items right away, offscreen item k after (k + 1) * stagger.
    ///
    /// At most `budget` offscreen items are preloaded; more would push the
    /// visible ones out of a cache that small.
    pub fn full(visible: &BTreeSet<usize>, item_count: usize, stagger: Duration, budget: usize) -> Self {
        let immediate = visible.iter().copied().collect();
        let deferred = (0..item_count)
            .filter(|index| !visible.contains(index))
            .take(budget)
            .enumerate()
            .map(|(k, index)| (stagger * (k as u32 + 1), index))
            .collect();
        Self { immediate, deferred }
    }

    /// Visible items that still need a load, all after the same short delay.
    pub fn scroll(visible: &BTreeSet<usize>, needs_load: impl Fn(usize) -> bool, delay: Duration) -> Self {
        Self {
            immediate: Vec::new(),
            deferred: visible.iter().copied().filter(|index| needs_load(*index)).map(|index| (delay, index)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.deferred.is_empty()
    }
}
