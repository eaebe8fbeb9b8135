use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "campus.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn session_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let v = conn
        .query_row("SELECT value FROM session WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    Ok(v)
}

pub fn session_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO session(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Sign-out: forgets the token and role but keeps settings.
pub fn session_clear(conn: &Connection) -> anyhow::Result<usize> {
    Ok(conn.execute("DELETE FROM session", [])?)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    if value.is_null() {
        conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
        return Ok(());
    }
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        params![key, serde_json::to_string(value)?],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_workspace() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("campusd-db-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn session_round_trips_and_clears() {
        let dir = temp_workspace();
        let conn = open_db(&dir).expect("open");
        session_set(&conn, "token", "abc").expect("set");
        session_set(&conn, "token", "def").expect("overwrite");
        assert_eq!(session_get(&conn, "token").expect("get").as_deref(), Some("def"));
        settings_set_json(&conn, "context", &json!({ "campusId": "c1" })).expect("settings");
        assert_eq!(session_clear(&conn).expect("clear"), 1);
        assert_eq!(session_get(&conn, "token").expect("get"), None);
        assert_eq!(
            settings_get_json(&conn, "context").expect("get"),
            Some(json!({ "campusId": "c1" }))
        );
        drop(conn);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn null_setting_deletes_the_key() {
        let dir = temp_workspace();
        let conn = open_db(&dir).expect("open");
        settings_set_json(&conn, "table.plans.pageSize", &json!(25)).expect("set");
        settings_set_json(&conn, "table.plans.pageSize", &serde_json::Value::Null).expect("unset");
        assert_eq!(settings_get_json(&conn, "table.plans.pageSize").expect("get"), None);
        drop(conn);
        let _ = std::fs::remove_dir_all(dir);
    }
}
