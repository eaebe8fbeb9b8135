//! Keyed cache of remote resources.
//!
//! A key is built from optional parts (tenant ids, filters); if any part is
//! missing there is no key and nothing is fetched. Fetches for one key are
//! coalesced, and every issued fetch carries a sequence number so that a
//! response can only replace data that is older than itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, warn};

use crate::api::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey(Vec<String>);

impl ResourceKey {
    /// Returns `None` when any part is missing or blank, which callers
    /// treat as "skip the fetch".
    pub fn from_parts(parts: &[Option<&str>]) -> Option<Self> {
        let mut out = Vec::with_capacity(parts.len());
        for p in parts {
            let p = p.map(str::trim).filter(|s| !s.is_empty())?;
            out.push(p.to_string());
        }
        if out.is_empty() {
            return None;
        }
        Some(Self(out))
    }

    pub fn resource(&self) -> &str {
        &self.0[0]
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// True when the key was incomplete and no fetch was issued.
    pub skipped: bool,
}

impl<T> Snapshot<T> {
    fn skipped() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
            skipped: true,
        }
    }
}

struct Entry<T> {
    data: Option<T>,
    error: Option<ApiError>,
    settled: bool,
    inflight: usize,
    issued: u64,
    applied: u64,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            settled: false,
            inflight: 0,
            issued: 0,
            applied: 0,
        }
    }
}

impl<T: Clone> Entry<T> {
    fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            data: self.data.clone(),
            is_loading: self.inflight > 0 && !self.settled,
            error: self.error.as_ref().map(|e| e.to_string()),
            skipped: false,
        }
    }
}

pub struct Binder<T> {
    entries: Mutex<HashMap<ResourceKey, Entry<T>>>,
    changed: Condvar,
}

impl<T> Default for Binder<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
        }
    }
}

impl<T: Clone> Binder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceKey, Entry<T>>> {
        // A panic inside a fetch closure never happens under the lock, so a
        // poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn snapshot(&self, key: Option<&ResourceKey>) -> Snapshot<T> {
        let Some(key) = key else {
            return Snapshot::skipped();
        };
        let entries = self.lock();
        entries
            .get(key)
            .map(|e| e.snapshot())
            .unwrap_or_else(|| Entry::default().snapshot())
    }

    /// Returns cached data when there is any, otherwise fetches.
    pub fn load<F>(&self, key: Option<&ResourceKey>, fetch: F) -> Snapshot<T>
    where
        F: FnOnce() -> Result<T, ApiError>,
    {
        let Some(k) = key else {
            return Snapshot::skipped();
        };
        {
            let entries = self.lock();
            if let Some(e) = entries.get(k) {
                if e.data.is_some() {
                    return e.snapshot();
                }
            }
        }
        self.mutate(key, fetch)
    }

    /// Revalidates the key. If a fetch for the same key is already in flight
    /// the caller waits for it instead of issuing a duplicate request.
    pub fn mutate<F>(&self, key: Option<&ResourceKey>, fetch: F) -> Snapshot<T>
    where
        F: FnOnce() -> Result<T, ApiError>,
    {
        let Some(k) = key else {
            return Snapshot::skipped();
        };
        let mut entries = self.lock();
        let busy = entries.get(k).map(|e| e.inflight > 0).unwrap_or(false);
        if busy {
            debug!(key = %k, "joining in-flight fetch");
            while entries.get(k).map(|e| e.inflight > 0).unwrap_or(false) {
                entries = self
                    .changed
                    .wait(entries)
                    .unwrap_or_else(|p| p.into_inner());
            }
            return entries
                .get(k)
                .map(|e| e.snapshot())
                .unwrap_or_else(|| Entry::default().snapshot());
        }
        // claim the fetch before releasing the lock so a concurrent caller
        // sees it as in flight
        let seq = Self::begin(&mut entries, k);
        drop(entries);
        self.complete(k, seq, fetch)
    }

    /// Always issues a new fetch, even while another one is in flight. The
    /// newer request wins regardless of completion order.
    pub fn refetch<F>(&self, key: Option<&ResourceKey>, fetch: F) -> Snapshot<T>
    where
        F: FnOnce() -> Result<T, ApiError>,
    {
        match key {
            Some(k) => {
                let seq = Self::begin(&mut self.lock(), k);
                self.complete(k, seq, fetch)
            }
            None => Snapshot::skipped(),
        }
    }

    fn begin(entries: &mut HashMap<ResourceKey, Entry<T>>, key: &ResourceKey) -> u64 {
        let e = entries.entry(key.clone()).or_default();
        e.issued += 1;
        e.inflight += 1;
        debug!(key = %key, seq = e.issued, "fetch issued");
        e.issued
    }

    fn complete<F>(&self, key: &ResourceKey, seq: u64, fetch: F) -> Snapshot<T>
    where
        F: FnOnce() -> Result<T, ApiError>,
    {
        let result = fetch();

        let mut entries = self.lock();
        let e = entries.entry(key.clone()).or_default();
        e.inflight = e.inflight.saturating_sub(1);
        e.settled = true;
        if seq > e.applied {
            e.applied = seq;
            match result {
                Ok(v) => {
                    e.data = Some(v);
                    e.error = None;
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "fetch failed");
                    e.error = Some(err);
                }
            }
        } else {
            debug!(key = %key, seq, applied = e.applied, "discarding stale response");
        }
        let snap = e.snapshot();
        drop(entries);
        self.changed.notify_all();
        snap
    }

    /// Replaces the cached value locally. Responses to fetches issued before
    /// this call are discarded when they arrive.
    pub fn set(&self, key: &ResourceKey, value: T) {
        let mut entries = self.lock();
        let e = entries.entry(key.clone()).or_default();
        e.issued += 1;
        e.applied = e.issued;
        e.data = Some(value);
        e.error = None;
        e.settled = true;
    }

    /// Edits cached data in place. Returns false when nothing is cached.
    pub fn patch<F>(&self, key: &ResourceKey, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let mut entries = self.lock();
        let Some(e) = entries.get_mut(key) else {
            return false;
        };
        let Some(data) = e.data.as_mut() else {
            return false;
        };
        f(data);
        e.issued += 1;
        e.applied = e.issued;
        true
    }

    /// Drops every idle entry whose resource name matches. In-flight entries
    /// are kept so waiting callers still see their result.
    pub fn invalidate_resource(&self, resource: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|k, e| k.resource() != resource || e.inflight > 0);
        before - entries.len()
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.lock().keys().cloned().collect()
    }
}
