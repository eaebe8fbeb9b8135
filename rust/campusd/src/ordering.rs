//! Ordered lists for the custom-field designer. Categories and the fields
//! inside them are reordered locally and persisted as one payload.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::models::custom_fields::{CustomField, CustomFieldCategory};
use crate::models::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("unknown item: {0}")]
    UnknownItem(String),
    #[error("position {index} is out of range for {len} items")]
    OutOfRange { index: usize, len: usize },
}

pub trait Keyed {
    fn key(&self) -> &RecordId;
}

impl Keyed for CustomFieldCategory {
    fn key(&self) -> &RecordId {
        &self.id
    }
}

impl Keyed for CustomField {
    fn key(&self) -> &RecordId {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct OrderedList<T> {
    items: Vec<T>,
    dirty: bool,
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            dirty: false,
        }
    }
}

impl<T: Keyed> OrderedList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            dirty: false,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.key().as_str() == id)
    }

    /// Moves the item to `to`, shifting the ones in between.
    pub fn move_item(&mut self, id: &str, to: usize) -> Result<(), OrderError> {
        let from = self
            .position_of(id)
            .ok_or_else(|| OrderError::UnknownItem(id.to_string()))?;
        if to >= self.items.len() {
            return Err(OrderError::OutOfRange {
                index: to,
                len: self.items.len(),
            });
        }
        if from != to {
            let item = self.items.remove(from);
            self.items.insert(to, item);
            self.dirty = true;
        }
        Ok(())
    }

    pub fn take(&mut self, id: &str) -> Option<T> {
        let at = self.position_of(id)?;
        self.dirty = true;
        Some(self.items.remove(at))
    }

    /// Inserts at `at`, or at the end when `at` is past it.
    pub fn insert(&mut self, at: usize, item: T) {
        let at = at.min(self.items.len());
        self.items.insert(at, item);
        self.dirty = true;
    }
}

#[derive(Debug, Clone)]
pub struct CategoryGroup {
    pub category: CustomFieldCategory,
    pub fields: OrderedList<CustomField>,
}

impl Keyed for CategoryGroup {
    fn key(&self) -> &RecordId {
        &self.category.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderUpdate {
    pub categories: Vec<CategoryOrder>,
    pub fields: Vec<FieldOrder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryOrder {
    pub id: RecordId,
    pub order: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldOrder {
    pub id: RecordId,
    pub category_id: RecordId,
    pub sort_order: usize,
}

/// Working copy of the designer: categories in display order, each with its
/// fields in display order.
#[derive(Debug, Clone, Default)]
pub struct FieldLayout {
    groups: OrderedList<CategoryGroup>,
    /// Fields whose category is missing from the fetched set.
    unassigned: Vec<CustomField>,
}

impl FieldLayout {
    pub fn build(mut categories: Vec<CustomFieldCategory>, mut fields: Vec<CustomField>) -> Self {
        categories.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        fields.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.label.cmp(&b.label)));

        let mut groups: Vec<CategoryGroup> = categories
            .into_iter()
            .map(|category| CategoryGroup {
                category,
                fields: OrderedList::default(),
            })
            .collect();
        let mut unassigned = Vec::new();
        for f in fields {
            let slot = f
                .category_id
                .as_ref()
                .and_then(|c| groups.iter_mut().find(|g| &g.category.id == c));
            match slot {
                Some(g) => g.fields.items.push(f),
                None => unassigned.push(f),
            }
        }
        Self {
            groups: OrderedList::new(groups),
            unassigned,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.groups.is_dirty() || self.groups.items().iter().any(|g| g.fields.is_dirty())
    }

    pub fn move_category(&mut self, id: &str, to: usize) -> Result<(), OrderError> {
        self.groups.move_item(id, to)
    }

    fn group_of(&self, field_id: &str) -> Option<usize> {
        self.groups
            .items()
            .iter()
            .position(|g| g.fields.position_of(field_id).is_some())
    }

    /// Moves a field to `to` within `category_id`, which may be a different
    /// category than the one it is in now.
    pub fn move_field(&mut self, field_id: &str, category_id: &str, to: usize) -> Result<(), OrderError> {
        let src = self
            .group_of(field_id)
            .ok_or_else(|| OrderError::UnknownItem(field_id.to_string()))?;
        let dst = self
            .groups
            .position_of(category_id)
            .ok_or_else(|| OrderError::UnknownItem(category_id.to_string()))?;

        if src == dst {
            return self.groups.items[dst].fields.move_item(field_id, to);
        }
        let dst_len = self.groups.items[dst].fields.len();
        if to > dst_len {
            return Err(OrderError::OutOfRange {
                index: to,
                len: dst_len + 1,
            });
        }
        let Some(mut field) = self.groups.items[src].fields.take(field_id) else {
            return Err(OrderError::UnknownItem(field_id.to_string()));
        };
        field.category_id = Some(self.groups.items[dst].category.id.clone());
        self.groups.items[dst].fields.insert(to, field);
        Ok(())
    }

    /// Positions are 0-based and dense.
    pub fn commit_payload(&self) -> OrderUpdate {
        let mut categories = Vec::with_capacity(self.groups.len());
        let mut fields = Vec::new();
        for (i, g) in self.groups.items().iter().enumerate() {
            categories.push(CategoryOrder {
                id: g.category.id.clone(),
                order: i,
            });
            for (j, f) in g.fields.items().iter().enumerate() {
                fields.push(FieldOrder {
                    id: f.id.clone(),
                    category_id: g.category.id.clone(),
                    sort_order: j,
                });
            }
        }
        OrderUpdate { categories, fields }
    }

    pub fn mark_clean(&mut self) {
        self.groups.mark_clean();
        for g in self.groups.items.iter_mut() {
            g.fields.mark_clean();
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let groups: Vec<serde_json::Value> = self
            .groups
            .items()
            .iter()
            .map(|g| {
                json!({
                    "category": g.category,
                    "fields": g.fields.items(),
                })
            })
            .collect();
        json!({
            "categories": groups,
            "unassigned": self.unassigned,
            "dirty": self.is_dirty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layout() -> FieldLayout {
        let cats: Vec<CustomFieldCategory> = serde_json::from_value(json!([
            { "id": "medical", "name": "Medical", "order": 1 },
            { "id": "transport", "name": "Transport", "order": 0 }
        ]))
        .expect("categories");
        let fields: Vec<CustomField> = serde_json::from_value(json!([
            { "id": "f1", "label": "Allergies", "type": "text", "category_id": "medical", "sort_order": 0 },
            { "id": "f2", "label": "Blood group", "type": "text", "category_id": "medical", "sort_order": 1 },
            { "id": "f3", "label": "Bus route", "type": "text", "category_id": "transport", "sort_order": 0 },
            { "id": "f4", "label": "Legacy", "type": "text", "category_id": "gone" }
        ]))
        .expect("fields");
        FieldLayout::build(cats, fields)
    }

    #[test]
    fn build_sorts_by_stored_order() {
        let l = layout();
        let p = l.commit_payload();
        assert_eq!(p.categories[0].id.as_str(), "transport");
        assert_eq!(p.fields.len(), 3);
        assert!(!l.is_dirty());
        assert_eq!(l.to_json()["unassigned"][0]["id"], "f4");
    }

    #[test]
    fn moving_a_field_across_categories_renumbers_both() {
        let mut l = layout();
        l.move_field("f1", "transport", 0).expect("move");
        assert!(l.is_dirty());
        let p = l.commit_payload();
        let f1 = p.fields.iter().find(|f| f.id.as_str() == "f1").expect("f1");
        assert_eq!(f1.category_id.as_str(), "transport");
        assert_eq!(f1.sort_order, 0);
        let f3 = p.fields.iter().find(|f| f.id.as_str() == "f3").expect("f3");
        assert_eq!(f3.sort_order, 1);
        let f2 = p.fields.iter().find(|f| f.id.as_str() == "f2").expect("f2");
        assert_eq!(f2.sort_order, 0);
    }

    #[test]
    fn out_of_range_moves_leave_the_layout_untouched() {
        let mut l = layout();
        let e = l.move_field("f1", "transport", 5).expect_err("range");
        assert_eq!(e, OrderError::OutOfRange { index: 5, len: 2 });
        assert!(!l.is_dirty());
        assert!(matches!(l.move_category("nope", 0), Err(OrderError::UnknownItem(_))));
    }

    #[test]
    fn moving_to_the_same_slot_stays_clean() {
        let mut l = layout();
        l.move_category("medical", 0).expect("move");
        assert_eq!(l.commit_payload().categories[0].id.as_str(), "medical");
        l.mark_clean();
        assert!(!l.is_dirty());
        l.move_category("medical", 0).expect("no-op move");
        assert!(!l.is_dirty());
    }
}
