//! Schema Snapshot Store
//!
//! Keeps captured snapshots in memory so diffs can be requested by id.
//! Think of this as "git commits" for a schema description.

use crate::error::{AppError, AppResult};
use crate::snapshot::{diff_schemas, SchemaDiff, SchemaSnapshot, SnapshotSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Metadata about a snapshot (lightweight, used for listing)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub id: Uuid,
    pub source: SnapshotSource,
    pub timestamp: DateTime<Utc>,
    pub checksum: String,
    pub table_count: usize,
    pub relationship_count: usize,
    pub index_count: usize,
    pub health_score: u32,
    pub label: Option<String>,
    pub commit_hash: Option<String>,
}

impl From<&SchemaSnapshot> for SnapshotMetadata {
    fn from(snapshot: &SchemaSnapshot) -> Self {
        Self {
            id: snapshot.id,
            source: snapshot.source,
            timestamp: snapshot.timestamp,
            checksum: snapshot.checksum.clone(),
            table_count: snapshot.schema.tables.len(),
            relationship_count: snapshot.schema.relationships.len(),
            index_count: snapshot.schema.health.index_count,
            health_score: snapshot.schema.health.score,
            label: snapshot.label.clone(),
            commit_hash: snapshot.commit_hash.clone(),
        }
    }
}

/// Store for managing schema snapshots
pub struct SnapshotStore {
    /// Snapshot ID -> Snapshot
    snapshots: Arc<RwLock<HashMap<Uuid, SchemaSnapshot>>>,
    /// Source -> Most recently saved snapshot ID
    latest: Arc<RwLock<HashMap<SnapshotSource, Uuid>>>,
    /// Baseline snapshot ID (the "deployed" reference)
    baseline: Arc<RwLock<Option<Uuid>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            latest: Arc::new(RwLock::new(HashMap::new())),
            baseline: Arc::new(RwLock::new(None)),
        }
    }

    /// Store a snapshot; ids are unique within the store
    pub async fn save(&self, snapshot: SchemaSnapshot) -> AppResult<SnapshotMetadata> {
        let mut snapshots = self.snapshots.write().await;
        if snapshots.contains_key(&snapshot.id) {
            return Err(AppError::Validation(format!(
                "snapshot {} already exists",
                snapshot.id
            )));
        }

        let metadata = SnapshotMetadata::from(&snapshot);

        self.latest.write().await.insert(snapshot.source, snapshot.id);
        snapshots.insert(snapshot.id, snapshot);

        tracing::info!(
            "Saved {} snapshot {}: {} tables, {} relationships",
            metadata.source,
            metadata.id,
            metadata.table_count,
            metadata.relationship_count
        );

        Ok(metadata)
    }

    /// Get snapshot by ID
    pub async fn get_by_id(&self, snapshot_id: Uuid) -> Option<SchemaSnapshot> {
        let snapshots = self.snapshots.read().await;
        snapshots.get(&snapshot_id).cloned()
    }

    /// Get the most recently saved snapshot for a source
    pub async fn get_latest(&self, source: SnapshotSource) -> Option<SchemaSnapshot> {
        let id = *self.latest.read().await.get(&source)?;
        self.get_by_id(id).await
    }

    /// List all snapshots (metadata only), newest first
    pub async fn list(&self) -> Vec<SnapshotMetadata> {
        let snapshots = self.snapshots.read().await;

        let mut list: Vec<_> = snapshots.values().map(SnapshotMetadata::from).collect();
        list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        list
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }

    /// Set baseline snapshot (the "production" reference)
    pub async fn set_baseline(&self, snapshot_id: Uuid) -> AppResult<()> {
        if self.get_by_id(snapshot_id).await.is_none() {
            return Err(AppError::SnapshotNotFound { id: snapshot_id });
        }

        *self.baseline.write().await = Some(snapshot_id);

        tracing::info!("Set baseline to snapshot {}", snapshot_id);
        Ok(())
    }

    pub async fn get_baseline(&self) -> Option<SchemaSnapshot> {
        let baseline = *self.baseline.read().await;
        self.get_by_id(baseline?).await
    }

    /// Delete old snapshots, keeping the newest `keep`. The baseline is never pruned.
    pub async fn prune(&self, keep: usize) -> usize {
        let baseline = *self.baseline.read().await;
        let mut snapshots = self.snapshots.write().await;

        if snapshots.len() <= keep {
            return 0;
        }

        let mut by_age: Vec<(Uuid, DateTime<Utc>)> =
            snapshots.values().map(|s| (s.id, s.timestamp)).collect();
        by_age.sort_by(|a, b| b.1.cmp(&a.1));

        let to_remove: Vec<Uuid> = by_age
            .into_iter()
            .skip(keep)
            .map(|(id, _)| id)
            .filter(|id| Some(*id) != baseline)
            .collect();

        for id in &to_remove {
            snapshots.remove(id);
        }

        self.latest
            .write()
            .await
            .retain(|_, id| snapshots.contains_key(id));

        tracing::info!("Pruned {} old snapshots", to_remove.len());
        to_remove.len()
    }

    /// Diff two stored snapshots by id
    pub async fn diff(&self, from_id: Uuid, to_id: Uuid) -> AppResult<SchemaDiff> {
        let from = self
            .get_by_id(from_id)
            .await
            .ok_or(AppError::SnapshotNotFound { id: from_id })?;

        let to = self
            .get_by_id(to_id)
            .await
            .ok_or(AppError::SnapshotNotFound { id: to_id })?;

        Ok(diff_schemas(&from, &to))
    }

    /// Diff the baseline against a stored snapshot
    pub async fn diff_from_baseline(&self, to_id: Uuid) -> AppResult<SchemaDiff> {
        let baseline = self
            .get_baseline()
            .await
            .ok_or_else(|| AppError::Validation("no baseline snapshot set".to_string()))?;

        self.diff(baseline.id, to_id).await
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
