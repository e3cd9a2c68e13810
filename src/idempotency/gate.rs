use crate::config::IdempotencySettings;
use crate::error::{AppError, Result};
use crate::idempotency::canonical::request_hash;
use crate::idempotency::response::{CreatedAt, CreatedResource, IdempotencyConflict};
use crate::idempotency::storage::{IdempotencyRecord, IdempotencyStore, MemoryIdempotencyStore};
use crate::observability::{get_metrics, mask_sensitive, LatencyTimer};
use axum::body::Body;
use axum::extract::OriginalUri;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Header carrying the client-chosen idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Counters for idempotency handling.
#[derive(Debug, Default)]
pub struct IdempotencyMetrics {
    pub total_requests: AtomicU64,
    pub passthrough_requests: AtomicU64,
    pub executed_requests: AtomicU64,
    pub stored_records: AtomicU64,
    pub replayed_requests: AtomicU64,
    pub conflicting_requests: AtomicU64,
}

impl IdempotencyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_passthrough(&self) {
        self.passthrough_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_executed(&self) {
        self.executed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stored(&self) {
        self.stored_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replayed(&self) {
        self.replayed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.conflicting_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            passthrough_requests: self.passthrough_requests.load(Ordering::Relaxed),
            executed_requests: self.executed_requests.load(Ordering::Relaxed),
            stored_records: self.stored_records.load(Ordering::Relaxed),
            replayed_requests: self.replayed_requests.load(Ordering::Relaxed),
            conflicting_requests: self.conflicting_requests.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub passthrough_requests: u64,
    pub executed_requests: u64,
    pub stored_records: u64,
    pub replayed_requests: u64,
    pub conflicting_requests: u64,
}

impl MetricsSnapshot {
    /// Share of keyed requests answered without running the handler.
    pub fn replay_rate(&self) -> f64 {
        let keyed = self.total_requests - self.passthrough_requests;
        if keyed == 0 {
            0.0
        } else {
            self.replayed_requests as f64 / keyed as f64
        }
    }
}

/// Configuration for the idempotency gate.
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    pub ttl: Duration,
    /// Serialize lookup, execution and store write per composite key.
    pub serialize_same_key: bool,
    pub max_body_bytes: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(86400), // 24 hours
            serialize_same_key: true,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl From<&IdempotencySettings> for IdempotencyConfig {
    fn from(settings: &IdempotencySettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.ttl_seconds),
            serialize_same_key: settings.serialize_same_key,
            max_body_bytes: settings.max_body_bytes,
        }
    }
}

/// One async mutex per composite key, dropped once nobody holds or awaits it.
#[derive(Debug, Default)]
struct KeyLocks {
    locks: Arc<DashMap<String, KeySlot>>,
}

/// `users` counts holders plus waiters and is only touched under the shard lock.
#[derive(Debug, Default)]
struct KeySlot {
    mutex: Arc<Mutex<()>>,
    users: usize,
}

/// Registered before waiting, so a cancelled waiter still releases its slot.
struct KeyLockGuard {
    key: String,
    locks: Arc<DashMap<String, KeySlot>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &str) -> KeyLockGuard {
        let mutex = {
            let mut slot = self.locks.entry(key.to_string()).or_default();
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };

        let mut held = KeyLockGuard {
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
            guard: None,
        };
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Entry::Occupied(mut slot) = self.locks.entry(self.key.clone()) {
            slot.get_mut().users -= 1;
            if slot.get().users == 0 {
                slot.remove();
            }
        }
    }
}

/// Decides whether a create request executes, replays or conflicts.
///
/// The gate is framework-light: it takes the raw request and a continuation
/// to the wrapped handler and returns the final response.
pub struct IdempotencyGate {
    store: Arc<dyn IdempotencyStore>,
    config: IdempotencyConfig,
    locks: KeyLocks,
    metrics: Arc<IdempotencyMetrics>,
}

impl IdempotencyGate {
    pub fn new(store: Arc<dyn IdempotencyStore>, config: IdempotencyConfig) -> Self {
        Self {
            store,
            config,
            locks: KeyLocks::default(),
            metrics: Arc::new(IdempotencyMetrics::new()),
        }
    }

    /// Gate over a fresh in-process store with default settings.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryIdempotencyStore::new()), IdempotencyConfig::default())
    }

    pub fn metrics(&self) -> Arc<IdempotencyMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// Runs `next` under idempotency protection.
    ///
    /// Only `POST` requests carrying a non-blank `Idempotency-Key` are gated;
    /// everything else goes straight to `next`. Store faults are returned as
    /// errors and never bypass deduplication.
    pub async fn process<F, Fut>(&self, resource: &str, request: Request<Body>, next: F) -> Result<Response>
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Response>,
    {
        self.metrics.record_request();

        let Some(client_key) = gated_key(&request) else {
            self.metrics.record_passthrough();
            get_metrics().record_idempotency_outcome(resource, "passthrough");
            return Ok(next(request).await);
        };

        let path = request_path(&request);
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, self.config.max_body_bytes)
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read request body: {}", e)))?;

        let hash = request_hash(parts.method.as_str(), &path, &bytes);
        let composite_key = format!("{}:{}", path, client_key);

        let _guard = if self.config.serialize_same_key {
            let timer = LatencyTimer::new();
            let guard = self.locks.acquire(&composite_key).await;
            get_metrics().record_idempotency_lock_wait(timer.elapsed_ms());
            Some(guard)
        } else {
            None
        };

        if let Some(existing) = self.store.get(&composite_key).await? {
            if existing.request_hash == hash {
                tracing::info!(
                    resource,
                    key = %mask_sensitive(&client_key, 2),
                    resource_id = existing.resource_id,
                    "Replaying idempotent create"
                );
                self.metrics.record_replayed();
                get_metrics().record_idempotency_outcome(resource, "replayed");
                return Ok(CreatedAt::new(&path, existing.resource_id).into_response());
            }

            tracing::warn!(
                resource,
                key = %mask_sensitive(&client_key, 2),
                resource_id = existing.resource_id,
                "Idempotency key reused with a different payload"
            );
            self.metrics.record_conflict();
            get_metrics().record_idempotency_outcome(resource, "conflict");
            return Ok(IdempotencyConflict::new(client_key, existing.resource_id).into_response());
        }

        self.metrics.record_executed();
        get_metrics().record_idempotency_outcome(resource, "executed");
        let response = next(Request::from_parts(parts, Body::from(bytes))).await;

        let created_id = match response.extensions().get::<CreatedResource>() {
            Some(CreatedResource(id)) if response.status() == StatusCode::CREATED => Some(*id),
            _ => None,
        };

        if let Some(resource_id) = created_id {
            let record = IdempotencyRecord::new(hash, resource_id);
            if let Err(e) = self.store.set(&composite_key, record, self.config.ttl).await {
                tracing::error!(
                    resource,
                    resource_id,
                    error = %e,
                    "Created resource but failed to store idempotency record"
                );
                return Err(e);
            }
            self.metrics.record_stored();
            get_metrics().record_idempotency_outcome(resource, "stored");
        }

        Ok(response)
    }

    #[cfg(test)]
    fn held_locks(&self) -> usize {
        self.locks.len()
    }
}

/// Returns the client key when the request is subject to the gate.
fn gated_key(request: &Request<Body>) -> Option<String> {
    if request.method() != Method::POST {
        return None;
    }

    let value = request.headers().get(IDEMPOTENCY_KEY_HEADER)?.to_str().ok()?;
    if value.trim().is_empty() {
        return None;
    }
    Some(value.to_string())
}

/// Path as routed by the outermost router, without the query string.
fn request_path(request: &Request<Body>) -> String {
    match request.extensions().get::<OriginalUri>() {
        Some(OriginalUri(uri)) => uri.path().to_string(),
        None => request.uri().path().to_string(),
    }
}

/// Background sweep that drops expired records from the in-process store.
pub struct IdempotencySweepJob {
    store: Arc<MemoryIdempotencyStore>,
    interval_seconds: u64,
}

impl IdempotencySweepJob {
    pub fn new(store: Arc<MemoryIdempotencyStore>, interval_seconds: u64) -> Self {
        Self {
            store,
            interval_seconds,
        }
    }

    /// Runs the sweep once.
    pub fn run_once(&self) -> usize {
        let purged = self.store.purge_expired();
        if purged > 0 {
            get_metrics().record_store_purge(purged as u64);
        }
        purged
    }

    /// Starts the sweep in a background task.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(self.interval_seconds.max(1)));

            loop {
                interval.tick().await;

                let purged = self.run_once();
                if purged > 0 {
                    tracing::info!("Purged {} expired idempotency records", purged);
                }
            }
        })
    }
}
