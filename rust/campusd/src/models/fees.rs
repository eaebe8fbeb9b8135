use serde::{Deserialize, Serialize};

use super::{round_money, RecordId};
use crate::validate::{FieldErrors, Validator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeComponent {
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeStructure {
    pub id: RecordId,
    pub school_id: RecordId,
    pub academic_year: String,
    #[serde(default)]
    pub grade_level_id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub components: Vec<FeeComponent>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl FeeStructure {
    pub fn total(&self) -> f64 {
        round_money(self.components.iter().map(|c| c.amount).sum())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeStructureInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub grade_level_id: Option<RecordId>,
    #[serde(default)]
    pub components: Option<Vec<FeeComponent>>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl FeeStructureInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let components = self.components.as_deref().unwrap_or_default();
        let mut v = Validator::new()
            .required("name", "Fee name", self.name.as_deref())
            .required("academic_year", "Academic year", self.academic_year.as_deref())
            .non_empty_list("components", "Fee components", components.len())
            .date("due_date", "Due date", self.due_date.as_deref());
        for (i, c) in components.iter().enumerate() {
            let field = format!("components.{i}");
            v = v
                .required(&field, "Component name", Some(c.name.as_str()))
                .non_negative(&field, "Component amount", Some(c.amount));
        }
        v.finish()
    }
}
