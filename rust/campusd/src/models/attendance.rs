use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{round_off_1_decimal, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: RecordId,
    #[serde(default)]
    pub student_name: Option<String>,
    pub date: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    pub student_id: String,
    pub student_name: String,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub students: Vec<StudentAttendance>,
    pub school_days: usize,
    pub overall_percentage: f64,
}

/// Late still counts as attended.
fn percentage(present: usize, late: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_off_1_decimal(100.0 * (present + late) as f64 / total as f64)
}

impl AttendanceSummary {
    /// Recomputed from the raw records on every call. Students are ordered
    /// by name, then id.
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut by_student: BTreeMap<String, StudentAttendance> = BTreeMap::new();
        let mut days = std::collections::BTreeSet::new();
        for r in records {
            days.insert(r.date.get(..10).unwrap_or(&r.date).to_string());
            let row = by_student
                .entry(r.student_id.to_string())
                .or_insert_with(|| StudentAttendance {
                    student_id: r.student_id.to_string(),
                    ..Default::default()
                });
            if row.student_name.is_empty() {
                if let Some(n) = &r.student_name {
                    row.student_name = n.clone();
                }
            }
            row.total += 1;
            match r.status {
                AttendanceStatus::Present => row.present += 1,
                AttendanceStatus::Absent => row.absent += 1,
                AttendanceStatus::Late => row.late += 1,
                AttendanceStatus::Excused => row.excused += 1,
            }
        }

        let mut students: Vec<StudentAttendance> = by_student
            .into_values()
            .map(|mut s| {
                s.percentage = percentage(s.present, s.late, s.total);
                s
            })
            .collect();
        students.sort_by(|a, b| {
            a.student_name
                .to_lowercase()
                .cmp(&b.student_name.to_lowercase())
                .then_with(|| a.student_id.cmp(&b.student_id))
        });

        let (p, l, t) = students
            .iter()
            .fold((0, 0, 0), |(p, l, t), s| (p + s.present, l + s.late, t + s.total));
        Self {
            students,
            school_days: days.len(),
            overall_percentage: percentage(p, l, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(student: i64, name: &str, date: &str, status: &str) -> AttendanceRecord {
        serde_json::from_value(json!({
            "student_id": student, "student_name": name, "date": date, "status": status
        }))
        .expect("record")
    }

    #[test]
    fn percentages_count_late_as_attended() {
        let rows = vec![
            rec(1, "Zara", "2025-03-03", "present"),
            rec(1, "Zara", "2025-03-04", "late"),
            rec(1, "Zara", "2025-03-05", "absent"),
            rec(2, "Adam", "2025-03-03", "present"),
            rec(2, "Adam", "2025-03-04", "excused"),
        ];
        let s = AttendanceSummary::from_records(&rows);
        assert_eq!(s.school_days, 3);
        assert_eq!(s.students[0].student_name, "Adam");
        assert_eq!(s.students[0].percentage, 50.0);
        assert_eq!(s.students[1].percentage, 66.7);
        assert_eq!(s.overall_percentage, 60.0);
    }

    #[test]
    fn empty_range_is_zero_not_nan() {
        let s = AttendanceSummary::from_records(&[]);
        assert_eq!(s.overall_percentage, 0.0);
        assert!(s.students.is_empty());
    }
}
