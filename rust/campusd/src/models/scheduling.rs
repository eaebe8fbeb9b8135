use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::validate::{FieldErrors, Validator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursePeriod {
    pub id: RecordId,
    pub course_name: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub enrolled_count: i64,
    #[serde(default)]
    pub term: Option<String>,
}

impl CoursePeriod {
    /// `None` when the period has no capacity limit.
    pub fn open_seats(&self) -> Option<i64> {
        self.capacity.map(|c| (c - self.enrolled_count).max(0))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentInput {
    #[serde(default)]
    pub student_id: Option<RecordId>,
    #[serde(default)]
    pub course_period_id: Option<RecordId>,
    #[serde(default)]
    pub effective_date: Option<String>,
}

impl EnrollmentInput {
    /// Seat availability is checked against the cached period when known;
    /// schedule conflicts are the backend's call.
    pub fn validate(&self, period: Option<&CoursePeriod>) -> Result<(), FieldErrors> {
        let has_seat = period.and_then(|p| p.open_seats()).map(|n| n > 0).unwrap_or(true);
        Validator::new()
            .required(
                "student_id",
                "Student",
                self.student_id.as_ref().map(|s| s.as_str()),
            )
            .required(
                "course_period_id",
                "Course period",
                self.course_period_id.as_ref().map(|s| s.as_str()),
            )
            .date("effective_date", "Effective date", self.effective_date.as_deref())
            .check(has_seat, "course_period_id", "This course period is full")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddDropAction {
    Add,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddDropEntry {
    pub id: RecordId,
    pub student_name: String,
    pub course_name: String,
    pub action: AddDropAction,
    pub date: String,
    #[serde(default)]
    pub performed_by: Option<String>,
}
