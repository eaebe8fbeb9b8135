use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::validate::{FieldErrors, Validator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub subscription_plan: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchoolInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub subscription_plan: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

fn plausible_email(s: &str) -> bool {
    let t = s.trim();
    match t.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

impl SchoolInput {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let email_ok = self
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(plausible_email)
            .unwrap_or(true);
        Validator::new()
            .required("name", "School name", self.name.as_deref())
            .check(email_ok, "email", "Email address is not valid")
            .finish()
    }
}
