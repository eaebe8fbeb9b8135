use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::validate::{FieldErrors, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    LongText,
    Number,
    Date,
    Checkbox,
    Select,
    MultiSelect,
    File,
}

impl FieldType {
    pub fn has_options(self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampusScope {
    #[default]
    All,
    Specific,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldCategory {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub campus_id: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: RecordId,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub category_id: Option<RecordId>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub campus_scope: CampusScope,
    #[serde(default)]
    pub applicable_school_ids: Vec<RecordId>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomFieldInput {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub category_id: Option<RecordId>,
    #[serde(default)]
    pub campus_scope: Option<CampusScope>,
    #[serde(default)]
    pub applicable_school_ids: Option<Vec<RecordId>>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

impl CustomFieldInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut v = Validator::new()
            .required("label", "Field label", self.label.as_deref())
            .check(self.field_type.is_some(), "type", "Field type is required")
            .required(
                "category_id",
                "Category",
                self.category_id.as_ref().map(|c| c.as_str()),
            );
        if self.field_type.map(FieldType::has_options).unwrap_or(false) {
            let options: Vec<&String> = self
                .options
                .iter()
                .flatten()
                .filter(|o| !o.trim().is_empty())
                .collect();
            v = v.non_empty_list("options", "Options", options.len());
            let mut seen = std::collections::HashSet::new();
            let unique = options.iter().all(|o| seen.insert(o.trim().to_lowercase()));
            v = v.check(unique, "options", "Options must be unique");
        }
        if self.campus_scope == Some(CampusScope::Specific) {
            let n = self.applicable_school_ids.as_ref().map(|v| v.len()).unwrap_or(0);
            v = v.non_empty_list("applicable_school_ids", "Applicable schools", n);
        }
        v.finish()
    }
}
