use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::validate::{FieldErrors, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardOrientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdCardTemplate {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub orientation: CardOrientation,
    #[serde(default = "default_color")]
    pub primary_color: String,
    /// Keys from the placeholder set, in display order.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub footer_text: Option<String>,
}

pub const DEFAULT_COLOR: &str = "#1e3a8a";

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl IdCardTemplate {
    /// Colour safe to drop into a stylesheet: a `#rrggbb` value or a plain
    /// named colour. Anything else falls back to the default.
    pub fn band_color(&self) -> &str {
        let c = self.primary_color.trim();
        let named = !c.is_empty() && c.len() <= 20 && c.chars().all(|ch| ch.is_ascii_alphabetic());
        if is_hex_color(c) || named {
            c
        } else {
            DEFAULT_COLOR
        }
    }
}

/// Placeholders a template may show on the card.
pub const CARD_FIELDS: &[(&str, &str)] = &[
    ("student_name", "Name"),
    ("admission_number", "Admission No"),
    ("grade_level", "Grade"),
    ("section", "Section"),
    ("blood_group", "Blood Group"),
    ("guardian_phone", "Emergency Contact"),
    ("valid_until", "Valid Until"),
];

pub fn field_label(key: &str) -> Option<&'static str> {
    CARD_FIELDS.iter().find(|(k, _)| *k == key).map(|(_, l)| *l)
}

fn is_hex_color(s: &str) -> bool {
    let t = s.trim();
    t.len() == 7 && t.starts_with('#') && t[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdCardTemplateInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub orientation: Option<CardOrientation>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub footer_text: Option<String>,
}

impl IdCardTemplateInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let fields = self.fields.as_deref().unwrap_or_default();
        let unknown = fields.iter().find(|f| field_label(f).is_none());
        Validator::new()
            .required("name", "Template name", self.name.as_deref())
            .non_empty_list("fields", "Card fields", fields.len())
            .check(
                unknown.is_none(),
                "fields",
                &format!("Unknown card field: {}", unknown.map(|s| s.as_str()).unwrap_or("")),
            )
            .check(
                self.primary_color.as_deref().map(is_hex_color).unwrap_or(true),
                "primary_color",
                "Colour must look like #1e3a8a",
            )
            .finish()
    }
}
