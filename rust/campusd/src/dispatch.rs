//! Write-side convention shared by every form and button: validate locally,
//! make exactly one backend call, then report the outcome with exactly one
//! toast.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::ApiError;
use crate::validate::FieldErrors;

const TOAST_BACKLOG: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: Uuid,
    pub kind: ToastKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Toast {
    fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Update,
    Delete,
    Custom(&'static str),
}

impl Verb {
    fn infinitive(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Custom(v) => v,
        }
    }

    fn past(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
            Self::Custom(v) => v,
        }
    }
}

/// Describes one user action. `name` identifies the trigger control; two
/// submissions with the same name cannot overlap.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub name: String,
    pub subject: &'static str,
    pub verb: Verb,
    pub success: Option<String>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, subject: &'static str, verb: Verb) -> Self {
        Self {
            name: name.into(),
            subject,
            verb,
            success: None,
        }
    }

    pub fn success(mut self, message: impl Into<String>) -> Self {
        self.success = Some(message.into());
        self
    }

    pub fn success_message(&self) -> String {
        if let Some(m) = &self.success {
            return m.clone();
        }
        let mut s = format!("{} {}", self.subject, self.verb.past());
        if let Some(first) = s.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        s
    }

    pub fn fallback_error(&self) -> String {
        format!("Failed to {} {}", self.verb.infinitive(), self.subject)
    }
}

#[derive(Debug)]
pub enum DispatchOutcome<T> {
    Completed { value: T, toast: Toast },
    Invalid { errors: FieldErrors, toast: Toast },
    Failed { error: ApiError, toast: Toast },
    /// The same action is already submitting; nothing was sent.
    Busy,
}

#[cfg(test)]
impl<T> DispatchOutcome<T> {
    pub fn toast(&self) -> Option<&Toast> {
        match self {
            Self::Completed { toast, .. } | Self::Invalid { toast, .. } | Self::Failed { toast, .. } => {
                Some(toast)
            }
            Self::Busy => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Default)]
pub struct Dispatcher {
    submitting: Mutex<HashSet<String>>,
    toasts: Mutex<VecDeque<Toast>>,
}

struct SubmittingGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    name: String,
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|p| p.into_inner());
        set.remove(&self.name);
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_submitting(&self, name: &str) -> bool {
        self.submitting
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(name)
    }

    fn begin(&self, name: &str) -> Option<SubmittingGuard<'_>> {
        let mut set = self.submitting.lock().unwrap_or_else(|p| p.into_inner());
        if !set.insert(name.to_string()) {
            return None;
        }
        Some(SubmittingGuard {
            set: &self.submitting,
            name: name.to_string(),
        })
    }

    fn push(&self, toast: Toast) -> Toast {
        let mut q = self.toasts.lock().unwrap_or_else(|p| p.into_inner());
        if q.len() >= TOAST_BACKLOG {
            q.pop_front();
        }
        q.push_back(toast.clone());
        toast
    }

    pub fn drain_toasts(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect()
    }

    pub fn dispatch<T, V, C>(&self, spec: &ActionSpec, validate: V, call: C) -> DispatchOutcome<T>
    where
        V: FnOnce() -> Result<(), FieldErrors>,
        C: FnOnce() -> Result<T, ApiError>,
    {
        let Some(_guard) = self.begin(&spec.name) else {
            warn!(action = %spec.name, "ignored submission while busy");
            return DispatchOutcome::Busy;
        };

        if let Err(errors) = validate() {
            let toast = self.push(Toast::new(ToastKind::Error, errors.summary()));
            return DispatchOutcome::Invalid { errors, toast };
        }

        match call() {
            Ok(value) => {
                info!(action = %spec.name, "action completed");
                let toast = self.push(Toast::new(ToastKind::Success, spec.success_message()));
                DispatchOutcome::Completed { value, toast }
            }
            Err(error) => {
                warn!(action = %spec.name, error = %error, "action failed");
                let message = error
                    .user_message()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| spec.fallback_error());
                let toast = self.push(Toast::new(ToastKind::Error, message));
                DispatchOutcome::Failed { error, toast }
            }
        }
    }
}

/// By-id splice of a cached list after a successful write.
#[derive(Debug, Clone)]
pub enum ListPatch {
    Insert(serde_json::Value),
    Replace(serde_json::Value),
    Remove(String),
}

/// Text form of an id value; integer ids and their string spelling compare
/// equal.
pub fn id_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn record_id(v: &serde_json::Value) -> Option<String> {
    v.get("id").and_then(id_text)
}

impl ListPatch {
    /// Applies the patch to a JSON array; non-arrays are left alone.
    pub fn apply(&self, list: &mut serde_json::Value) {
        let Some(rows) = list.as_array_mut() else {
            return;
        };
        match self {
            Self::Insert(row) => {
                let id = record_id(row);
                if id.is_some() && rows.iter().any(|r| record_id(r) == id) {
                    Self::Replace(row.clone()).apply(list);
                } else {
                    rows.insert(0, row.clone());
                }
            }
            Self::Replace(row) => {
                let id = record_id(row);
                if let Some(slot) = rows.iter_mut().find(|r| id.is_some() && record_id(r) == id) {
                    *slot = row.clone();
                }
            }
            Self::Remove(id) => rows.retain(|r| record_id(r).as_deref() != Some(id.as_str())),
        }
    }
}

/// Modal drafts keyed by form id. The submitted input is kept while the
/// modal is open and discarded when a submission succeeds.
#[derive(Debug, Default)]
pub struct FormDrafts {
    drafts: HashMap<String, serde_json::Value>,
}

impl FormDrafts {
    pub fn keep(&mut self, form_id: &str, input: serde_json::Value) {
        self.drafts.insert(form_id.to_string(), input);
    }

    pub fn close(&mut self, form_id: &str) {
        self.drafts.remove(form_id);
    }

    pub fn get(&self, form_id: &str) -> Option<&serde_json::Value> {
        self.drafts.get(form_id)
    }
}
