//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tidesync_core::config::{Config, ConfigBuilder};
use tidesync_core::domain::{EntityKey, OperationType};
use tidesync_core::ports::{IRemoteStore, RemoteError, RemoteRecord, RemoteResult};

/// How the mock answers mutations for one entity
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Accept,
    Reject(u16),
    Unavailable,
}

/// One mutation the mock received
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub operation: OperationType,
    pub entity: String,
    pub payload: Vec<u8>,
}

/// In-memory remote store with scriptable failures
#[derive(Default)]
pub struct MockRemote {
    records: Mutex<HashMap<String, RemoteRecord>>,
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<Vec<Call>>,
    all_unavailable: AtomicBool,
    unreachable: AtomicBool,
    latency: Mutex<Duration>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_behavior(&self, entity: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(entity.to_string(), behavior);
    }

    pub fn set_all_unavailable(&self, unavailable: bool) {
        self.all_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Seeds the remote with an existing record
    pub fn put_record(&self, entity: &str, data: &[u8], modified_at: DateTime<Utc>) {
        self.records.lock().unwrap().insert(
            entity.to_string(),
            RemoteRecord {
                entity: EntityKey::new(entity).unwrap(),
                data: data.to_vec(),
                modified_at,
            },
        );
    }

    pub fn record(&self, entity: &str) -> Option<RemoteRecord> {
        self.records.lock().unwrap().get(entity).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_entities(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.entity).collect()
    }

    async fn apply(
        &self,
        operation: OperationType,
        entity: &EntityKey,
        payload: &[u8],
    ) -> RemoteResult<()> {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.all_unavailable.load(Ordering::SeqCst) {
            return Err(RemoteError::unavailable("connection refused"));
        }

        self.calls.lock().unwrap().push(Call {
            operation,
            entity: entity.as_str().to_string(),
            payload: payload.to_vec(),
        });

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(entity.as_str())
            .cloned()
            .unwrap_or(Behavior::Accept);

        match behavior {
            Behavior::Accept => {
                let mut records = self.records.lock().unwrap();
                if operation == OperationType::Delete {
                    records.remove(entity.as_str());
                } else {
                    records.insert(
                        entity.as_str().to_string(),
                        RemoteRecord {
                            entity: entity.clone(),
                            data: payload.to_vec(),
                            modified_at: Utc::now(),
                        },
                    );
                }
                Ok(())
            }
            Behavior::Reject(status) => Err(RemoteError::rejected(status, "rejected by mock")),
            Behavior::Unavailable => Err(RemoteError::unavailable("service unavailable")),
        }
    }
}

#[async_trait]
impl IRemoteStore for MockRemote {
    async fn create(&self, entity: &EntityKey, payload: &[u8]) -> RemoteResult<()> {
        self.apply(OperationType::Create, entity, payload).await
    }

    async fn update(&self, entity: &EntityKey, patch: &[u8]) -> RemoteResult<()> {
        self.apply(OperationType::Update, entity, patch).await
    }

    async fn delete(&self, entity: &EntityKey) -> RemoteResult<()> {
        self.apply(OperationType::Delete, entity, &[]).await
    }

    async fn bulk_insert(&self, collection: &EntityKey, records: &[u8]) -> RemoteResult<()> {
        self.apply(OperationType::BulkInsert, collection, records)
            .await
    }

    async fn get_current_state(&self, entity: &EntityKey) -> RemoteResult<Option<RemoteRecord>> {
        if self.all_unavailable.load(Ordering::SeqCst) {
            return Err(RemoteError::unavailable("connection refused"));
        }
        Ok(self.record(entity.as_str()))
    }

    async fn is_reachable(&self) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }
}

/// Config with immediate retries so cycles can be driven back to back
pub fn fast_config() -> ConfigBuilder {
    ConfigBuilder::new()
        .sync_retry_delay_ms(0)
        .sync_max_retry_delay_ms(0)
        .sync_interval(3600)
}

pub fn config() -> Config {
    fast_config().build()
}

pub fn key(entity: &str) -> EntityKey {
    EntityKey::new(entity).unwrap()
}

/// Polls `check` until it holds or two seconds pass
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
