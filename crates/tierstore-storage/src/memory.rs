//! In-memory storage backend.
//!
//! Records live in a `DashMap` keyed by ID. Data is lost on restart; this
//! backend exists for tests and for running the service without PostgreSQL.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::StorageResult;
use crate::error::StorageError;
use crate::record::Record;
use crate::traits::Repository;

/// In-memory repository for one record type.
pub struct MemoryRepository<R: Record> {
    records: DashMap<i64, R>,
    next_id: AtomicI64,
    reads: AtomicU64,
}

impl<R: Record> MemoryRepository<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicI64::new(1),
            reads: AtomicU64::new(0),
        }
    }

    /// Number of `find_by_id` / `find_all` calls served so far.
    ///
    /// Lets tests tell a cache hit from a store read.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R: Record> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> Repository<R> for MemoryRepository<R> {
    async fn create(&self, mut record: R) -> StorageResult<R> {
        record.validate()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        record.set_id(id);
        self.records.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<R>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.records.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, record: &R) -> StorageResult<R> {
        record.validate()?;
        let mut entry = self
            .records
            .get_mut(&record.id())
            .ok_or_else(|| StorageError::not_found(R::ENTITY, record.id()))?;

        let mut updated = record.clone();
        updated.set_created_at(entry.created_at());
        updated.keep_stored_fields(&entry);
        *entry = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> StorageResult<()> {
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(R::ENTITY, id))
    }

    async fn find_all(&self) -> StorageResult<Vec<R>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let mut all: Vec<R> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|record| record.id());
        Ok(all)
    }
}
