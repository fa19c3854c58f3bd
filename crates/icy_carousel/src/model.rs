use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Category used by [`CarouselData::default_items`].
pub const DEFAULT_CATEGORY: &str = "Test Items";

/// Row geometry of a category.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CategoryDimensions {
    pub row_height: f32,
    pub poster_height: f32,
    pub poster_width: f32,
    pub item_spacing: f32,
}

impl Default for CategoryDimensions {
    fn default() -> Self {
        Self {
            row_height: 180.0,
            poster_height: 180.0,
            poster_width: 280.0,
            item_spacing: 20.0,
        }
    }
}

static DEFAULT_DIMENSIONS: Lazy<CategoryDimensions> = Lazy::new(CategoryDimensions::default);

/// One image in the carousel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ImageRecord {
    /// Local path, resource reference or http(s) URL
    #[serde(default, alias = "url")]
    pub source_ref: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub id: String,
    /// Event name (upper case) -> href
    #[serde(default)]
    pub action_links: BTreeMap<String, String>,
}

impl ImageRecord {
    pub fn new(source_ref: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            title: title.into(),
            category: category.into(),
            ..Default::default()
        }
    }
}

/// Serialized form of the carousel contents, as read from a data file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CarouselSource {
    /// Display order of the categories
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub records: Vec<ImageRecord>,
    #[serde(default)]
    pub dimensions: HashMap<String, CategoryDimensions>,
}

/// A category after grouping: its name, row geometry and the contiguous index range it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub dimensions: CategoryDimensions,
    pub indices: Range<usize>,
}

impl Category {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Records grouped by category.
///
/// An item's index is its position in the grouped order, so every category
/// owns one contiguous range. Categories without records are dropped.
#[derive(Debug, Clone, Default)]
pub struct CarouselData {
    records: Vec<ImageRecord>,
    categories: Vec<Category>,
}

impl CarouselData {
    pub fn new(source: CarouselSource) -> Self {
        let CarouselSource {
            categories: mut order,
            records,
            dimensions,
        } = source;

        for record in &records {
            if !order.iter().any(|c| c == &record.category) {
                order.push(record.category.clone());
            }
        }

        let mut grouped: Vec<ImageRecord> = Vec::with_capacity(records.len());
        let mut categories = Vec::new();
        for name in order {
            if categories.iter().any(|c: &Category| c.name == name) {
                continue;
            }
            let start = grouped.len();
            grouped.extend(records.iter().filter(|r| r.category == name).cloned());
            if grouped.len() == start {
                continue;
            }
            let dimensions = dimensions.get(&name).copied().unwrap_or(*DEFAULT_DIMENSIONS);
            categories.push(Category {
                name,
                dimensions,
                indices: start..grouped.len(),
            });
        }

        Self { records: grouped, categories }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let source: CarouselSource = serde_json::from_str(text)?;
        Ok(Self::new(source))
    }

    /// Five placeholder records in a single category, used when a source yields nothing.
    pub fn default_items() -> Self {
        let records = (0..5)
            .map(|i| ImageRecord {
                source_ref: format!(":/data/images/img{}.jpg", i % 5 + 1),
                title: format!("Test Item {}", i + 1),
                category: DEFAULT_CATEGORY.to_string(),
                id: i.to_string(),
                ..Default::default()
            })
            .collect();
        Self::new(CarouselSource {
            categories: vec![DEFAULT_CATEGORY.to_string()],
            records,
            dimensions: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&ImageRecord> {
        self.records.get(index)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Position of the category owning `index` in display order.
    pub fn category_position(&self, index: usize) -> Option<usize> {
        self.categories.iter().position(|c| c.indices.contains(&index))
    }

    pub fn category_of(&self, index: usize) -> Option<&Category> {
        self.category_position(index).map(|pos| &self.categories[pos])
    }

    pub fn dimensions_of(&self, index: usize) -> CategoryDimensions {
        self.category_of(index).map_or(*DEFAULT_DIMENSIONS, |c| c.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str, title: &str) -> ImageRecord {
        ImageRecord::new(format!("{title}.png"), title, category)
    }

    #[test]
    fn groups_by_declared_category_order() {
        let data = CarouselData::new(CarouselSource {
            categories: vec!["B".into(), "A".into()],
            records: vec![record("A", "a1"), record("B", "b1"), record("A", "a2"), record("C", "c1")],
            dimensions: HashMap::new(),
        });

        let names: Vec<_> = data.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert_eq!(data.categories()[1].indices, 1..3);
        assert_eq!(data.record(1).map(|r| r.title.as_str()), Some("a1"));
        assert_eq!(data.record(2).map(|r| r.title.as_str()), Some("a2"));
        assert_eq!(data.category_position(3), Some(2));
    }

    #[test]
    fn empty_categories_are_dropped() {
        let data = CarouselData::new(CarouselSource {
            categories: vec!["Empty".into(), "A".into()],
            records: vec![record("A", "a1")],
            dimensions: HashMap::new(),
        });
        assert_eq!(data.categories().len(), 1);
        assert_eq!(data.categories()[0].indices, 0..1);
    }

    #[test]
    fn missing_dimensions_use_defaults() {
        let mut dimensions = HashMap::new();
        dimensions.insert(
            "Wide".to_string(),
            CategoryDimensions {
                row_height: 240.0,
                poster_height: 200.0,
                poster_width: 152.0,
                item_spacing: 20.0,
            },
        );
        let data = CarouselData::new(CarouselSource {
            categories: vec![],
            records: vec![record("Wide", "w"), record("Plain", "p")],
            dimensions,
        });
        assert_eq!(data.dimensions_of(0).poster_width, 152.0);
        assert_eq!(data.dimensions_of(1), CategoryDimensions::default());
    }

    #[test]
    fn parses_json_with_url_alias() {
        let data = CarouselData::from_json(r#"{ "records": [ { "url": "https://example.com/a.jpg", "title": "A", "category": "Movies" } ] }"#).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.records()[0].source_ref, "https://example.com/a.jpg");
        assert_eq!(data.categories()[0].name, "Movies");
    }

    #[test]
    fn default_items_fill_one_category() {
        let data = CarouselData::default_items();
        assert_eq!(data.len(), 5);
        assert_eq!(data.categories()[0].name, DEFAULT_CATEGORY);
        assert_eq!(data.records()[4].title, "Test Item 5");
    }
}
