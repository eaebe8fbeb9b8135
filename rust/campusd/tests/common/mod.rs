#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// One request as the fake backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub body: serde_json::Value,
    pub body_len: usize,
}

impl Recorded {
    pub fn is(&self, method: &str, path: &str) -> bool {
        self.method == method && self.path == path
    }
}

/// What the fake backend writes back. Most routes answer with JSON; `raw`
/// covers error pages and empty bodies.
pub struct Reply {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl From<(u16, serde_json::Value)> for Reply {
    fn from((status, payload): (u16, serde_json::Value)) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: payload.to_string(),
        }
    }
}

pub fn raw(status: u16, body: &str) -> Reply {
    Reply {
        status,
        content_type: "text/html",
        body: body.to_string(),
    }
}

/// Minimal HTTP/1.1 server answering every connection with whatever the
/// route function returns. Each response closes its connection.
pub struct MockBackend {
    pub url: String,
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    pub fn start<F, R>(route: F) -> Self
    where
        F: Fn(&Recorded) -> R + Send + 'static,
        R: Into<Reply>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock backend");
        let url = format!("http://{}", listener.local_addr().expect("addr"));
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve_one(stream, &route, &seen);
            }
        });
        Self { url, log }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().expect("log").clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests().iter().filter(|r| r.is(method, path)).count()
    }
}

// The request is logged before the response is written, so by the time the
// sidecar answers, the log already holds it.
fn serve_one<F, R>(stream: TcpStream, route: &F, log: &Mutex<Vec<Recorded>>) -> Option<()>
where
    F: Fn(&Recorded) -> R,
    R: Into<Reply>,
{
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut content_length = 0usize;
    loop {
        let mut h = String::new();
        reader.read_line(&mut h).ok()?;
        let h = h.trim_end();
        if h.is_empty() {
            break;
        }
        if let Some((k, v)) = h.split_once(':') {
            if k.trim().eq_ignore_ascii_case("content-length") {
                content_length = v.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    let body_len = body.len();
    let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (target, String::new()),
    };
    let rec = Recorded {
        method,
        path,
        query,
        body,
        body_len,
    };
    let reply: Reply = route(&rec).into();
    log.lock().ok()?.push(rec);
    let mut out = stream;
    let _ = write!(
        out,
        "HTTP/1.1 {} X\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        reply.status,
        reply.content_type,
        reply.body.len(),
        reply.body
    );
    let _ = out.flush();
    Some(())
}

pub fn envelope(data: serde_json::Value) -> (u16, serde_json::Value) {
    (200, json!({ "success": true, "data": data }))
}

pub fn failure(status: u16, message: &str) -> (u16, serde_json::Value) {
    (status, json!({ "success": false, "error": message }))
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl Sidecar {
    pub fn spawn(api_url: &str) -> Self {
        Self::spawn_with(api_url, &[])
    }

    /// Spawns with extra environment, e.g. Supabase settings pointing at
    /// the fake backend.
    pub fn spawn_with(api_url: &str, env: &[(&str, &str)]) -> Self {
        let exe = env!("CARGO_BIN_EXE_campusd");
        let mut cmd = Command::new(exe);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .env("CAMPUS_API_URL", api_url)
            .env("CAMPUS_HTTP_TIMEOUT_SECS", "5")
            .env("NO_PROXY", "127.0.0.1,localhost")
            .env_remove("CAMPUS_WORKSPACE")
            .env_remove("CAMPUS_PAGE_SIZE")
            .env_remove("CAMPUS_SUPABASE_URL")
            .env_remove("CAMPUS_SUPABASE_ANON_KEY")
            .env_remove("CAMPUS_LOGO_BUCKET");
        for (k, v) in env {
            cmd.env(k, v);
        }
        for var in ["HTTP_PROXY", "HTTPS_PROXY", "ALL_PROXY", "http_proxy", "https_proxy", "all_proxy"] {
            cmd.env_remove(var);
        }
        let mut child = cmd.spawn().expect("spawn campusd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
        }
    }

    pub fn send_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{line}").expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {line}");
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
        value
    }

    /// Like `request`, but the call must succeed; returns `result`.
    pub fn ok(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert_eq!(value["ok"], json!(true), "{method} failed: {value}");
        value["result"].clone()
    }

    /// The call must fail; returns `error`.
    pub fn fail(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert_eq!(value["ok"], json!(false), "{method} unexpectedly succeeded: {value}");
        value["error"].clone()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
