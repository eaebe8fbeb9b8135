use serde::{Deserialize, Serialize};

use super::RecordId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: RecordId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub admission_number: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

pub const EXPORT_COLUMNS: &[(&str, &str)] = &[
    ("admission_number", "Admission No"),
    ("first_name", "First Name"),
    ("last_name", "Last Name"),
    ("grade_level", "Grade"),
    ("section", "Section"),
    ("gender", "Gender"),
    ("guardian_name", "Guardian"),
    ("guardian_phone", "Guardian Phone"),
    ("status", "Status"),
];
