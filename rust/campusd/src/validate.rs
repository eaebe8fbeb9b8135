use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// Field name -> first problem found for that field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    /// Message for a toast: the single error, or a summary when several
    /// fields are wrong.
    pub fn summary(&self) -> String {
        match self.0.len() {
            0 => String::new(),
            1 => self.0.values().next().cloned().unwrap_or_default(),
            n => format!("Please fix the {n} highlighted fields"),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, field: &str, label: &str, value: Option<&str>) -> Self {
        if value.map(|v| v.trim().is_empty()).unwrap_or(true) {
            self.errors.add(field, format!("{label} is required"));
        }
        self
    }

    pub fn required_number(self, field: &str, label: &str, value: Option<f64>) -> Self {
        let mut this = self;
        match value {
            None => this.errors.add(field, format!("{label} is required")),
            Some(v) if !v.is_finite() => this.errors.add(field, format!("{label} must be a number")),
            Some(_) => {}
        }
        this
    }

    /// Absent values pass; present ones must be >= 0.
    pub fn non_negative(mut self, field: &str, label: &str, value: Option<f64>) -> Self {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                self.errors.add(field, format!("{label} cannot be negative"));
            }
        }
        self
    }

    pub fn positive(mut self, field: &str, label: &str, value: Option<f64>) -> Self {
        if let Some(v) = value {
            if !v.is_finite() || v <= 0.0 {
                self.errors.add(field, format!("{label} must be greater than 0"));
            }
        }
        self
    }

    pub fn at_most(mut self, field: &str, label: &str, value: Option<f64>, max: f64) -> Self {
        if let Some(v) = value {
            if v > max {
                self.errors.add(field, format!("{label} cannot exceed {max}"));
            }
        }
        self
    }

    pub fn date(mut self, field: &str, label: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            if parse_date(v).is_none() {
                self.errors.add(field, format!("{label} must be a valid date"));
            }
        }
        self
    }

    pub fn non_empty_list(mut self, field: &str, label: &str, len: usize) -> Self {
        if len == 0 {
            self.errors.add(field, format!("{label} needs at least one entry"));
        }
        self
    }

    pub fn check(mut self, ok: bool, field: &str, message: &str) -> Self {
        if !ok {
            self.errors.add(field, message);
        }
        self
    }

    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let t = s.trim();
    let head = t.get(..10).unwrap_or(t);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
