//! CSV export of the rows a table currently shows (filtered, not paged).

use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// Dotted path into the row, e.g. `school.name`.
    pub key: &'static str,
    pub header: &'static str,
}

impl Column {
    pub const fn new(key: &'static str, header: &'static str) -> Self {
        Self { key, header }
    }
}

pub fn columns(pairs: &'static [(&'static str, &'static str)]) -> Vec<Column> {
    pairs.iter().map(|&(k, h)| Column::new(k, h)).collect()
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn cell_text(row: &serde_json::Value, key: &str) -> String {
    let mut cur = row;
    for part in key.split('.') {
        match cur.get(part) {
            Some(v) => cur = v,
            None => return String::new(),
        }
    }
    match cur {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// Header line then one line per row, `\n` terminated.
pub fn to_csv<'a, I>(cols: &[Column], rows: I) -> String
where
    I: IntoIterator<Item = &'a serde_json::Value>,
{
    let mut out = cols
        .iter()
        .map(|c| csv_quote(c.header))
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    for row in rows {
        let line = cols
            .iter()
            .map(|c| csv_quote(&cell_text(row, c.key)))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// `<prefix>-YYYY-MM-DD.csv`
pub fn file_name(prefix: &str, on: NaiveDate) -> String {
    format!("{}-{}.csv", prefix, on.format("%Y-%m-%d"))
}

pub fn write_text_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLS: &[(&str, &str)] = &[
        ("invoice_number", "Invoice"),
        ("school.name", "School"),
        ("amount", "Amount"),
        ("paid", "Paid"),
    ];

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_quote("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn rows_follow_column_order_with_nested_paths() {
        let rows = vec![
            json!({ "invoice_number": "INV-1", "school": { "name": "Maple, East" }, "amount": 120.5, "paid": true }),
            json!({ "invoice_number": "INV-2", "amount": 80, "paid": false }),
        ];
        let csv = to_csv(&columns(COLS), &rows);
        assert_eq!(
            csv,
            "Invoice,School,Amount,Paid\nINV-1,\"Maple, East\",120.5,Yes\nINV-2,,80,No\n"
        );
    }

    #[test]
    fn writes_into_missing_directories() {
        let dir = std::env::temp_dir().join(format!("campusd-export-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join(file_name("students", NaiveDate::from_ymd_opt(2025, 1, 9).expect("date")));
        write_text_file(&path, "a,b\n").expect("write");
        assert!(path.ends_with("students-2025-01-09.csv"));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "a,b\n");
        let _ = std::fs::remove_dir_all(dir);
    }
}
