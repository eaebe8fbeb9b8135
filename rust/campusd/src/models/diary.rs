use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::validate::{parse_date, FieldErrors, Validator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryComment {
    pub id: RecordId,
    pub content: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: RecordId,
    /// HTML produced by the rich-text editor; passed through untouched.
    pub content: String,
    pub diary_date: String,
    #[serde(default)]
    pub day_of_week: Option<String>,
    #[serde(default)]
    pub enable_comments: bool,
    #[serde(default)]
    pub section_id: Option<RecordId>,
    #[serde(default)]
    pub comments: Vec<DiaryComment>,
}

pub fn day_name(w: Weekday) -> &'static str {
    match w {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Weekday name for a `YYYY-MM-DD` date, as shown next to each entry.
pub fn day_of_week(date: &str) -> Option<&'static str> {
    parse_date(date).map(|d| day_name(d.weekday()))
}

/// Visible text of an HTML fragment; used only to decide whether the
/// editor content is blank.
pub fn html_text(html: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ").trim().to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiaryEntryInput {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub diary_date: Option<String>,
    #[serde(default)]
    pub enable_comments: Option<bool>,
    #[serde(default)]
    pub section_id: Option<RecordId>,
    #[serde(default)]
    pub day_of_week: Option<String>,
}

impl DiaryEntryInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let text = self.content.as_deref().map(html_text);
        Validator::new()
            .required("content", "Diary content", text.as_deref())
            .required("diary_date", "Date", self.diary_date.as_deref())
            .date("diary_date", "Date", self.diary_date.as_deref())
            .required(
                "section_id",
                "Section",
                self.section_id.as_ref().map(|s| s.as_str()),
            )
            .finish()
    }

    /// Fills `day_of_week` from the date before the payload is sent.
    pub fn with_day_of_week(mut self) -> Self {
        if let Some(d) = self.diary_date.as_deref().and_then(day_of_week) {
            self.day_of_week = Some(d.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_html_is_treated_as_empty() {
        assert_eq!(html_text("<p><br></p>"), "");
        assert_eq!(html_text("<p>&nbsp;</p>"), "");
        assert_eq!(html_text("<p>Read <b>chapter 4</b></p>"), "Read chapter 4");

        let input = DiaryEntryInput {
            content: Some("<p> </p>".into()),
            diary_date: Some("2025-09-01".into()),
            section_id: Some(RecordId::new("s1")),
            ..Default::default()
        };
        let errs = input.validate().expect_err("blank");
        assert_eq!(errs.get("content"), Some("Diary content is required"));
    }

    #[test]
    fn day_of_week_is_derived_from_date() {
        let input = DiaryEntryInput {
            diary_date: Some("2025-09-01".into()),
            ..Default::default()
        }
        .with_day_of_week();
        assert_eq!(input.day_of_week.as_deref(), Some("Monday"));
        assert_eq!(day_of_week("not a date"), None);
    }
}
