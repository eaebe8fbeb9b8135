mod api;
mod binder;
mod config;
mod dates;
mod db;
mod dispatch;
mod export;
mod ipc;
mod models;
mod ordering;
mod render;
mod table;
mod validate;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs go to stderr; stdout carries only protocol lines.
fn init_logging() {
    let filter = EnvFilter::try_from_env("CAMPUS_LOG").unwrap_or_else(|_| EnvFilter::new("campusd=info"));
    let json = std::env::var("CAMPUS_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn main() {
    dotenvy::dotenv().ok();
    init_logging();

    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %format!("{e:#}"), "invalid configuration");
            eprintln!("campusd: {e:#}");
            std::process::exit(2);
        }
    };
    let transport = match api::HttpTransport::new(cfg.http_timeout) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("campusd: {e}");
            std::process::exit(2);
        }
    };
    let client = api::ApiClient::new(Arc::new(transport), cfg.api_url.clone());
    let workspace = cfg.workspace.clone();
    let mut state = ipc::AppState::new(cfg, client);
    if let Some(path) = workspace {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            warn!(error = %format!("{e:#}"), "could not open configured workspace");
        }
    }
    info!(api = %state.api.base_url(), "campusd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // no id to answer with
                warn!(error = %e, "unparseable request line");
                let resp = ipc::err("", "bad_json", e.to_string(), None);
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
