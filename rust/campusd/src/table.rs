//! Client-side search, categorical filters and pagination over a fetched
//! row set. The whole matching set is always fetched; only the slice is
//! shown.

use std::collections::BTreeMap;

use serde::Serialize;

/// Filter value meaning "no filter".
pub const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    search: String,
    filters: BTreeMap<String, String>,
    page: usize,
    page_size: usize,
}

impl TableQuery {
    pub fn new(page_size: usize) -> Self {
        Self {
            search: String::new(),
            filters: BTreeMap::new(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_search(&mut self, search: &str) {
        if self.search != search {
            self.search = search.to_string();
            self.page = 1;
        }
    }

    /// Blank or "all" clears the filter.
    pub fn set_filter(&mut self, field: &str, value: &str) {
        let v = value.trim();
        let changed = if v.is_empty() || v.eq_ignore_ascii_case(ALL) {
            self.filters.remove(field).is_some()
        } else {
            self.filters.insert(field.to_string(), v.to_string()).as_deref() != Some(v)
        };
        if changed {
            self.page = 1;
        }
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        let n = page_size.max(1);
        if n != self.page_size {
            self.page_size = n;
            self.page = 1;
        }
    }

    /// Applies optional `search`, `filters`, `pageSize`, `page` params in an
    /// order where an explicit page survives the resets the others cause.
    pub fn apply_params(&mut self, params: &serde_json::Value) {
        if let Some(s) = params.get("search").and_then(|v| v.as_str()) {
            self.set_search(s);
        }
        if let Some(f) = params.get("filters").and_then(|v| v.as_object()) {
            for (k, v) in f {
                let text = match v {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                self.set_filter(k, &text);
            }
        }
        if let Some(n) = params.get("pageSize").and_then(|v| v.as_u64()) {
            self.set_page_size(n as usize);
        }
        if let Some(n) = params.get("page").and_then(|v| v.as_u64()) {
            self.set_page(n as usize);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub search_fields: &'static [&'static str],
}

fn field_text(row: &serde_json::Value, field: &str) -> Option<String> {
    // dotted paths reach into nested objects, e.g. "school.name"
    let mut cur = row;
    for part in field.split('.') {
        cur = cur.get(part)?;
    }
    match cur {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn matches(row: &serde_json::Value, spec: &TableSpec, query: &TableQuery) -> bool {
    let needle = query.search.trim().to_lowercase();
    if !needle.is_empty() {
        let hit = spec.search_fields.iter().any(|f| {
            field_text(row, f)
                .map(|t| t.to_lowercase().contains(&needle))
                .unwrap_or(false)
        });
        if !hit {
            return false;
        }
    }
    query.filters.iter().all(|(field, want)| {
        field_text(row, field)
            .map(|t| t.eq_ignore_ascii_case(want))
            .unwrap_or(false)
    })
}

pub fn filter_rows<'a>(
    rows: &'a [serde_json::Value],
    spec: &TableSpec,
    query: &TableQuery,
) -> Vec<&'a serde_json::Value> {
    rows.iter().filter(|r| matches(r, spec, query)).collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub rows: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1))
}

/// Slices `rows` for `page` (1-based), clamping the page into range.
pub fn paginate<T: Clone>(rows: &[T], page: usize, page_size: usize) -> PageView<T> {
    let size = page_size.max(1);
    let count = page_count(rows.len(), size);
    let page = page.clamp(1, count.max(1));
    let start = ((page - 1) * size).min(rows.len());
    let end = (page * size).min(rows.len());
    PageView {
        rows: rows[start..end].to_vec(),
        total: rows.len(),
        page,
        page_size: size,
        page_count: count,
    }
}

pub fn view(
    rows: &[serde_json::Value],
    spec: &TableSpec,
    query: &TableQuery,
) -> PageView<serde_json::Value> {
    let filtered: Vec<serde_json::Value> = filter_rows(rows, spec, query).into_iter().cloned().collect();
    paginate(&filtered, query.page, query.page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLANS: TableSpec = TableSpec {
        search_fields: &["name", "description"],
    };

    fn plans() -> Vec<serde_json::Value> {
        vec![
            json!({ "id": 1, "name": "Basic", "monthly_price": 50, "is_active": true }),
            json!({ "id": 2, "name": "Pro", "monthly_price": 150, "is_active": true }),
        ]
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let mut q = TableQuery::new(10);
        q.set_search("pro");
        let v = view(&plans(), &PLANS, &q);
        assert_eq!(v.total, 1);
        assert_eq!(v.rows[0]["id"], 2);
    }

    #[test]
    fn search_and_filter_intersect() {
        let rows = vec![
            json!({ "id": 1, "school_name": "Oak Hill", "payment_status": "paid" }),
            json!({ "id": 2, "school_name": "Oakridge", "payment_status": "overdue" }),
            json!({ "id": 3, "school_name": "Pine", "payment_status": "overdue" }),
        ];
        let spec = TableSpec {
            search_fields: &["school_name"],
        };
        let mut q = TableQuery::new(10);
        q.set_search("OAK");
        q.set_filter("payment_status", "Overdue");
        let ids: Vec<i64> = filter_rows(&rows, &spec, &q)
            .iter()
            .filter_map(|r| r["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![2]);

        q.set_filter("payment_status", "all");
        assert_eq!(filter_rows(&rows, &spec, &q).len(), 2);
    }

    #[test]
    fn changing_inputs_resets_page() {
        let mut q = TableQuery::new(5);
        q.set_page(3);
        q.set_search("a");
        assert_eq!(q.page(), 1);

        q.set_page(3);
        q.set_search("a");
        assert_eq!(q.page(), 3, "same search keeps the page");

        q.set_filter("status", "paid");
        assert_eq!(q.page(), 1);
        q.set_page(2);
        q.set_filter("status", "paid");
        assert_eq!(q.page(), 2);
        q.set_filter("status", "");
        assert_eq!(q.page(), 1);

        q.set_page(4);
        q.set_page_size(20);
        assert_eq!(q.page(), 1);
    }

    #[test]
    fn explicit_page_param_applies_after_resets() {
        let mut q = TableQuery::new(5);
        q.apply_params(&json!({ "search": "x", "page": 2 }));
        assert_eq!(q.page(), 2);
        q.apply_params(&json!({ "search": "y" }));
        assert_eq!(q.page(), 1);
    }

    #[test]
    fn pagination_boundaries() {
        let rows: Vec<i32> = (0..23).collect();
        assert_eq!(page_count(23, 10), 3);
        let last = paginate(&rows, 3, 10);
        assert_eq!(last.rows.len(), 3);
        assert_eq!(last.page_count, 3);

        let rows: Vec<i32> = (0..20).collect();
        let last = paginate(&rows, 2, 10);
        assert_eq!(last.rows.len(), 10);
        assert_eq!(last.page_count, 2);

        let clamped = paginate(&rows, 9, 10);
        assert_eq!(clamped.page, 2);

        let empty: Vec<i32> = Vec::new();
        let v = paginate(&empty, 1, 10);
        assert_eq!(v.page_count, 0);
        assert_eq!(v.page, 1);
        assert!(v.rows.is_empty());
    }

    #[test]
    fn nested_fields_are_searchable() {
        let rows = vec![json!({ "id": "s1", "school": { "name": "Maple" } })];
        let spec = TableSpec {
            search_fields: &["school.name"],
        };
        let mut q = TableQuery::new(10);
        q.set_search("map");
        assert_eq!(filter_rows(&rows, &spec, &q).len(), 1);
    }
}
