use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::binder::Binder;
use crate::config::Config;
use crate::db;
use crate::dispatch::{Dispatcher, FormDrafts};
use crate::ordering::FieldLayout;
use crate::table::TableQuery;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Selected tenant. Views that depend on a tenant read it from here; there
/// is no ambient default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    #[serde(default)]
    pub campus_id: Option<String>,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub api: ApiClient,
    pub context: TenantContext,
    pub binder: Binder<serde_json::Value>,
    pub dispatcher: Dispatcher,
    pub forms: FormDrafts,
    pub tables: HashMap<String, TableQuery>,
    pub layouts: HashMap<String, FieldLayout>,
}

impl AppState {
    pub fn new(config: Config, api: ApiClient) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            api,
            context: TenantContext::default(),
            binder: Binder::new(),
            dispatcher: Dispatcher::new(),
            forms: FormDrafts::default(),
            tables: HashMap::new(),
            layouts: HashMap::new(),
        }
    }

    /// Query state of a table view, created on first use with the stored
    /// page size for that table (or the configured default).
    pub fn table(&mut self, table_id: &str) -> &mut TableQuery {
        let default_size = self.config.page_size;
        let stored = self
            .db
            .as_ref()
            .and_then(|c| db::settings_get_json(c, &page_size_key(table_id)).ok().flatten())
            .and_then(|v| v.as_u64())
            .map(|n| n as usize);
        self.tables
            .entry(table_id.to_string())
            .or_insert_with(|| TableQuery::new(stored.unwrap_or(default_size)))
    }
}

pub fn page_size_key(table_id: &str) -> String {
    format!("table.{table_id}.pageSize")
}
