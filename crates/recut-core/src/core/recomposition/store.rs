//! Recomposition Stores
//!
//! The record store shared by trigger calls and status callbacks, and the
//! collaborator that supplies original composition configs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::config::CompositionConfig;
use super::record::RecompositionRecord;
use crate::core::settings::StoreSettings;
use crate::core::{CompositionId, CoreError, CoreResult, RecompositionId};

/// Mutation applied to a record under its lock. An `Err` discards the change.
pub type RecordUpdate = Box<dyn FnOnce(&mut RecompositionRecord) -> CoreResult<()> + Send>;

// =============================================================================
// Record Store
// =============================================================================

/// Keyed storage for recomposition records.
///
/// Implementations must serialize `update` calls per record id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: &str) -> CoreResult<RecompositionRecord>;

    /// Inserts or replaces a record
    async fn put(&self, record: RecompositionRecord) -> CoreResult<()>;

    /// Applies `apply` to the current record and returns the result
    async fn update(&self, id: &str, apply: RecordUpdate) -> CoreResult<RecompositionRecord>;

    async fn list(&self) -> Vec<RecompositionRecord>;

    async fn remove(&self, id: &str) -> CoreResult<RecompositionRecord>;

    /// Finds the record tracking a backend job
    async fn find_by_job(&self, job_id: &str) -> Option<RecompositionRecord> {
        self.list()
            .await
            .into_iter()
            .find(|r| r.rendering_job_id.as_deref() == Some(job_id))
    }
}

/// In-memory record store with one lock per record
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RecompositionId, Arc<Mutex<RecompositionRecord>>>>,
    /// Maximum number of records to keep
    max_records: usize,
    /// How long terminal records are kept
    terminal_expiry: Duration,
}

impl InMemoryRecordStore {
    pub fn new(max_records: usize, terminal_expiry: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_records: max_records.max(1),
            terminal_expiry,
        }
    }

    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self::new(
            settings.max_records,
            Duration::seconds(settings.terminal_expiry_sec as i64),
        )
    }

    /// 1000 records, terminal records kept for a day
    pub fn with_defaults() -> Self {
        Self::new(1000, Duration::days(1))
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn entry(&self, id: &str) -> CoreResult<Arc<Mutex<RecompositionRecord>>> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::RecompositionNotFound(id.to_string()))
    }

    /// Removes terminal records completed longer ago than the expiry
    pub async fn cleanup_expired(&self) -> usize {
        let cutoff = Utc::now() - self.terminal_expiry;
        let mut records = self.records.write().await;

        let mut expired = Vec::new();
        for (id, entry) in records.iter() {
            let record = entry.lock().await;
            if record.is_terminal() && record.completed_at.is_some_and(|at| at < cutoff) {
                expired.push(id.clone());
            }
        }

        for id in &expired {
            records.remove(id);
        }
        if !expired.is_empty() {
            debug!("Removed {} expired recomposition record(s)", expired.len());
        }
        expired.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, id: &str) -> CoreResult<RecompositionRecord> {
        let entry = self.entry(id).await?;
        let record = entry.lock().await;
        Ok(record.clone())
    }

    async fn put(&self, record: RecompositionRecord) -> CoreResult<()> {
        let mut records = self.records.write().await;

        if let Some(existing) = records.get(&record.recomposition_id) {
            *existing.lock().await = record;
            return Ok(());
        }

        if records.len() >= self.max_records {
            // Evict the oldest terminal record
            let mut oldest: Option<(RecompositionId, chrono::DateTime<Utc>)> = None;
            for (id, entry) in records.iter() {
                let existing = entry.lock().await;
                if existing.is_terminal()
                    && oldest.as_ref().map_or(true, |(_, at)| existing.created_at < *at)
                {
                    oldest = Some((id.clone(), existing.created_at));
                }
            }

            match oldest {
                Some((old_id, _)) => {
                    debug!("Evicting recomposition record {}", old_id);
                    records.remove(&old_id);
                }
                None => {
                    return Err(CoreError::StoreFull(format!(
                        "{} records and none are terminal",
                        records.len()
                    )));
                }
            }
        }

        records.insert(record.recomposition_id.clone(), Arc::new(Mutex::new(record)));
        Ok(())
    }

    async fn update(&self, id: &str, apply: RecordUpdate) -> CoreResult<RecompositionRecord> {
        let entry = self.entry(id).await?;
        let mut current = entry.lock().await;

        let mut working = current.clone();
        apply(&mut working)?;
        *current = working.clone();
        Ok(working)
    }

    async fn list(&self) -> Vec<RecompositionRecord> {
        let entries: Vec<_> = self.records.read().await.values().cloned().collect();

        let mut list = Vec::with_capacity(entries.len());
        for entry in entries {
            list.push(entry.lock().await.clone());
        }
        list.sort_by_key(|r| r.created_at);
        list
    }

    async fn remove(&self, id: &str) -> CoreResult<RecompositionRecord> {
        let entry = self
            .records
            .write()
            .await
            .remove(id)
            .ok_or_else(|| CoreError::RecompositionNotFound(id.to_string()))?;
        let record = entry.lock().await;
        Ok(record.clone())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// =============================================================================
// Composition Store
// =============================================================================

/// Source of the pre-edit composition config
#[async_trait]
pub trait CompositionStore: Send + Sync {
    async fn get_config(&self, composition_id: &str) -> CoreResult<CompositionConfig>;
}

#[derive(Default)]
pub struct InMemoryCompositionStore {
    configs: RwLock<HashMap<CompositionId, CompositionConfig>>,
}

impl InMemoryCompositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, composition_id: &str, config: CompositionConfig) {
        self.configs
            .write()
            .await
            .insert(composition_id.to_string(), config);
    }
}

#[async_trait]
impl CompositionStore for InMemoryCompositionStore {
    async fn get_config(&self, composition_id: &str) -> CoreResult<CompositionConfig> {
        self.configs
            .read()
            .await
            .get(composition_id)
            .cloned()
            .ok_or_else(|| CoreError::CompositionNotFound(composition_id.to_string()))
    }
}
