//! Shared test harness for store, cache and repository testing
//!
//! Provides `TestUser` (cacheable, no sort allow-list) and `TestAudit`
//! (uncached, sortable on `action` and `id`), instrumented port wrappers,
//! and helpers for creating test data.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod store_tests;

use async_trait::async_trait;
use crudkit::core::cache::{Cache, CacheError};
use crudkit::core::compiler::{CompiledQuery, Visibility};
use crudkit::core::entity::Id;
use crudkit::core::store::{Store, StoreError, Window};
use crudkit::prelude::Entity;
use crudkit::storage::InMemoryCache;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test entities
// ---------------------------------------------------------------------------

crudkit::impl_entity!(TestUser, "test_user", "test_users", cache = true, {
    name: String,
    email: String,
    age: i64,
    score: f64,
    active: bool,
});

crudkit::impl_entity!(
    TestAudit,
    "test_audit",
    "test_audits",
    cache = false,
    sortable = ["action", "id"],
    {
        action: String,
    }
);

pub fn create_test_user(name: &str, email: &str, age: i64, score: f64, active: bool) -> TestUser {
    TestUser::new(
        name.to_string(),
        email.to_string(),
        age,
        score,
        active,
    )
}

/// `count` users aged 1..=count, inserted straight into the store
pub async fn seed_users(store: &dyn Store<TestUser>, count: i64) -> Vec<TestUser> {
    let mut users = Vec::new();
    for age in 1..=count {
        let user = create_test_user(
            &format!("user{:02}", age),
            &format!("user{:02}@test.com", age),
            age,
            age as f64 / 2.0,
            age % 2 == 0,
        );
        users.push(store.insert(user).await.unwrap());
    }
    users
}

/// Assert all user-owned fields match
pub fn assert_same_fields(actual: &TestUser, expected: &TestUser) {
    assert_eq!(actual.name, expected.name);
    assert_eq!(actual.email, expected.email);
    assert_eq!(actual.age, expected.age);
    assert!((actual.score - expected.score).abs() < f64::EPSILON);
    assert_eq!(actual.active, expected.active);
}

// ---------------------------------------------------------------------------
// Cache doubles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    Get(String),
    Set(String),
    Delete(String),
}

/// `InMemoryCache` that records every call
#[derive(Clone, Default)]
pub struct RecordingCache {
    inner: InMemoryCache,
    ops: Arc<Mutex<Vec<CacheOp>>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<CacheOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Delete(pattern) => Some(pattern),
                _ => None,
            })
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    fn record(&self, op: CacheOp) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl Cache for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.record(CacheOp::Get(key.to_string()));
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.record(CacheOp::Set(key.to_string()));
        self.inner.set(key, value, ttl).await
    }

    async fn delete_by_pattern(&self, base: &str) -> Result<u64, CacheError> {
        self.record(CacheOp::Delete(base.to_string()));
        self.inner.delete_by_pattern(base).await
    }
}

/// Cache whose every call fails
#[derive(Clone, Default)]
pub struct FailingCache {
    calls: Arc<AtomicUsize>,
}

impl FailingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Backend("cache unreachable".to_string()))
    }
}

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        self.fail()
    }

    async fn delete_by_pattern(&self, _base: &str) -> Result<u64, CacheError> {
        self.fail()
    }
}

// ---------------------------------------------------------------------------
// Store probe
// ---------------------------------------------------------------------------

/// Store wrapper counting reads and mutations, with a switch that makes
/// every call fail with a connection error
pub struct ProbeStore<T: Entity> {
    inner: Arc<dyn Store<T>>,
    reads: AtomicUsize,
    mutations: AtomicUsize,
    offline: AtomicBool,
}

impl<T: Entity> ProbeStore<T> {
    pub fn new(inner: Arc<dyn Store<T>>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            mutations: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self, counter: &AtomicUsize) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Connection {
                backend: "probe".to_string(),
                message: "connection refused".to_string(),
            });
        }
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl<T: Entity> Store<T> for ProbeStore<T> {
    async fn find_by_id(
        &self,
        id: Id,
        preloads: &[String],
        visibility: Visibility,
    ) -> Result<Option<T>, StoreError> {
        self.check(&self.reads)?;
        self.inner.find_by_id(id, preloads, visibility).await
    }

    async fn query(
        &self,
        query: &CompiledQuery,
        window: Option<Window>,
    ) -> Result<Vec<T>, StoreError> {
        self.check(&self.reads)?;
        self.inner.query(query, window).await
    }

    async fn count(&self, query: &CompiledQuery) -> Result<u64, StoreError> {
        self.check(&self.reads)?;
        self.inner.count(query).await
    }

    async fn insert(&self, entity: T) -> Result<T, StoreError> {
        self.check(&self.mutations)?;
        self.inner.insert(entity).await
    }

    async fn save(&self, entity: &T) -> Result<u64, StoreError> {
        self.check(&self.mutations)?;
        self.inner.save(entity).await
    }

    async fn update_fields(&self, id: Id, fields: &Map<String, Value>) -> Result<u64, StoreError> {
        self.check(&self.mutations)?;
        self.inner.update_fields(id, fields).await
    }

    async fn soft_delete(&self, id: Id) -> Result<u64, StoreError> {
        self.check(&self.mutations)?;
        self.inner.soft_delete(id).await
    }

    async fn clear_tombstone(&self, id: Id) -> Result<u64, StoreError> {
        self.check(&self.mutations)?;
        self.inner.clear_tombstone(id).await
    }

    async fn hard_delete(&self, id: Id) -> Result<u64, StoreError> {
        self.check(&self.mutations)?;
        self.inner.hard_delete(id).await
    }
}
