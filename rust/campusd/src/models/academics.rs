use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::validate::{FieldErrors, Validator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeLevel {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub campus_id: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Section {
    pub id: RecordId,
    pub name: String,
    pub capacity: i64,
    #[serde(default)]
    pub current_strength: i64,
    pub grade_level_id: RecordId,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Section {
    /// Derived; never sent back to the backend.
    pub fn available_seats(&self) -> i64 {
        (self.capacity - self.current_strength).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.available_seats() == 0
    }
}

impl Serialize for Section {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut st = s.serialize_struct("Section", 8)?;
        st.serialize_field("id", &self.id)?;
        st.serialize_field("name", &self.name)?;
        st.serialize_field("capacity", &self.capacity)?;
        st.serialize_field("current_strength", &self.current_strength)?;
        st.serialize_field("grade_level_id", &self.grade_level_id)?;
        st.serialize_field("is_active", &self.is_active)?;
        st.serialize_field("available_seats", &self.available_seats())?;
        st.serialize_field("is_full", &self.is_full())?;
        st.end()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub grade_level_id: Option<RecordId>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl SectionInput {
    /// `current_strength` comes from the cached section on update, so
    /// capacity cannot drop below the students already enrolled.
    pub fn validate(&self, current_strength: Option<i64>) -> Result<(), FieldErrors> {
        let capacity = self.capacity.map(|c| c as f64);
        let mut v = Validator::new()
            .required("name", "Section name", self.name.as_deref())
            .required(
                "grade_level_id",
                "Grade level",
                self.grade_level_id.as_ref().map(|g| g.as_str()),
            )
            .required_number("capacity", "Capacity", capacity)
            .non_negative("capacity", "Capacity", capacity);
        if let (Some(cap), Some(strength)) = (self.capacity, current_strength) {
            v = v.check(
                cap >= strength,
                "capacity",
                "Capacity cannot be lower than the current strength",
            );
        }
        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn available_seats_is_derived_and_serialized() {
        let s: Section = serde_json::from_value(json!({
            "id": 7, "name": "7-A", "capacity": 30, "current_strength": 28,
            "grade_level_id": 3, "available_seats": 999
        }))
        .expect("section");
        assert_eq!(s.available_seats(), 2);
        let v = serde_json::to_value(&s).expect("ser");
        assert_eq!(v["available_seats"], 2);
    }

    #[test]
    fn overfull_section_reports_zero_seats() {
        let s: Section = serde_json::from_value(json!({
            "id": 1, "name": "X", "capacity": 20, "current_strength": 25, "grade_level_id": 1
        }))
        .expect("section");
        assert_eq!(s.available_seats(), 0);
        assert!(s.is_full());
    }

    #[test]
    fn capacity_must_cover_current_strength() {
        let input = SectionInput {
            name: Some("8-B".into()),
            capacity: Some(20),
            grade_level_id: Some(RecordId::new("g1")),
            is_active: None,
        };
        assert!(input.validate(None).is_ok());
        let errs = input.validate(Some(24)).expect_err("too small");
        assert_eq!(
            errs.get("capacity"),
            Some("Capacity cannot be lower than the current strength")
        );
    }
}
