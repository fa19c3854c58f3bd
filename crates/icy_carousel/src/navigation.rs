use crate::viewport::{CarouselLayout, RowLayout, ViewportState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    /// Selection moves to `index`; scroll targets to animate towards, if any
    Moved {
        index: usize,
        horizontal: Option<(String, f32)>,
        vertical: Option<f32>,
    },
    /// Nothing to move to in that direction, the input may be handled elsewhere
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState {
    pub current: Option<usize>,
    pub category: Option<String>,
    /// Column count of the legacy grid position, only used for reporting
    pub items_per_row: usize,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            current: None,
            category: None,
            items_per_row: 5,
        }
    }
}

impl SelectionState {
    pub fn select(&mut self, index: usize, layout: &CarouselLayout) {
        self.current = Some(index);
        self.category = layout.row_of(index).map(|(_, row)| row.name.clone());
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.category = None;
    }

    /// (row, column) in a grid of `items_per_row` columns
    pub fn grid_position(&self) -> Option<(usize, usize)> {
        let per_row = self.items_per_row.max(1);
        self.current.map(|index| (index / per_row, index % per_row))
    }
}

/// Horizontal offset that centers item `k` of `row`.
pub fn centered_item_offset(row: &RowLayout, k: usize, viewport_width: f32) -> f32 {
    let target = row.item_offset(k) - (viewport_width - row.dimensions.poster_width) / 2.0;
    target.clamp(0.0, row.max_offset(viewport_width))
}

/// Vertical offset that centers `row` in the viewport.
pub fn centered_row_offset(row: &RowLayout, viewport: &ViewportState, layout: &CarouselLayout) -> f32 {
    let target = row.row_y - (viewport.height - row.dimensions.poster_height) / 2.0;
    target.clamp(0.0, layout.max_content_y(viewport.height))
}

pub fn navigate(direction: Direction, selection: &SelectionState, viewport: &ViewportState, layout: &CarouselLayout) -> NavigationOutcome {
    if layout.item_count() == 0 {
        return NavigationOutcome::Rejected;
    }
    let Some(current) = selection.current else {
        return NavigationOutcome::Moved {
            index: 0,
            horizontal: None,
            vertical: None,
        };
    };
    let Some((position, row)) = layout.row_of(current) else {
        return NavigationOutcome::Rejected;
    };

    match direction {
        Direction::Left | Direction::Right => {
            let next = if direction == Direction::Left {
                if current == row.indices.start {
                    return NavigationOutcome::Rejected;
                }
                current - 1
            } else {
                if current + 1 >= row.indices.end {
                    return NavigationOutcome::Rejected;
                }
                current + 1
            };
            let k = next - row.indices.start;
            NavigationOutcome::Moved {
                index: next,
                horizontal: Some((row.name.clone(), centered_item_offset(row, k, viewport.width))),
                vertical: None,
            }
        }
        Direction::Up | Direction::Down => {
            let target_position = if direction == Direction::Up {
                match position.checked_sub(1) {
                    Some(p) => p,
                    None => return NavigationOutcome::Rejected,
                }
            } else {
                position + 1
            };
            let Some(target) = layout.rows().get(target_position) else {
                return NavigationOutcome::Rejected;
            };
            if target.is_empty() {
                return NavigationOutcome::Rejected;
            }

            let (k, was_visible) = match closest_visible_to_center(target, viewport, layout) {
                Some(k) => (k, true),
                None => (0, false),
            };

            NavigationOutcome::Moved {
                index: target.indices.start + k,
                horizontal: (!was_visible).then(|| (target.name.clone(), centered_item_offset(target, k, viewport.width))),
                vertical: Some(centered_row_offset(target, viewport, layout)),
            }
        }
    }
}

/// Among the items of `row` fully inside the window under its current offset,
/// the one whose center is closest to the viewport center. Ties go to the lower index.
fn closest_visible_to_center(row: &RowLayout, viewport: &ViewportState, layout: &CarouselLayout) -> Option<usize> {
    let offset = viewport.category_offset(&row.name);
    let window_end = offset + viewport.width - row.dimensions.poster_width;
    let center = viewport.width / 2.0;

    let mut best: Option<(usize, f32)> = None;
    for k in 0..row.len() {
        let item_offset = row.item_offset(k);
        if item_offset < offset || item_offset > window_end {
            continue;
        }
        let distance = (layout.item_x(row, k, offset) + row.dimensions.poster_width / 2.0 - center).abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((k, distance));
        }
    }
    best.map(|(k, _)| k)
}
