//! Schema Snapshot Module
//!
//! Point-in-time captures of a schema and the comparison between them:
//! - Schema snapshots (raw description + normalized form + provenance)
//! - Schema diff engine (comparing snapshots)
//! - Snapshot store (resolving snapshots by id for diff-by-reference)

pub mod diff;
pub mod store;

pub use diff::{
    diff_schemas, DiffEngine, DiffStatus, DiffSummary, FieldDiff, IndexDiff, SchemaDiff, TableDiff,
};
pub use store::{SnapshotMetadata, SnapshotStore};

use crate::config::AnalyzerConfig;
use crate::error::{AppError, AppResult};
use crate::models::SchemaDescription;
use crate::schema::{parse_schema, NormalizedSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Where a snapshot was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Deployed,
    Local,
    Git,
    Github,
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotSource::Deployed => "deployed",
            SnapshotSource::Local => "local",
            SnapshotSource::Git => "git",
            SnapshotSource::Github => "github",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SnapshotSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deployed" => Ok(SnapshotSource::Deployed),
            "local" => Ok(SnapshotSource::Local),
            "git" => Ok(SnapshotSource::Git),
            "github" => Ok(SnapshotSource::Github),
            other => Err(AppError::Validation(format!(
                "unknown snapshot source: {} (expected deployed, local, git or github)",
                other
            ))),
        }
    }
}

/// Complete schema snapshot at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSnapshot {
    pub id: Uuid,
    pub source: SnapshotSource,
    pub timestamp: DateTime<Utc>,
    pub description: SchemaDescription,
    pub schema: NormalizedSchema,
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    /// Optional label (e.g., "before adding memberships")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SchemaSnapshot {
    /// Validate and normalize a description into a new snapshot
    pub fn capture(
        description: SchemaDescription,
        source: SnapshotSource,
        config: &AnalyzerConfig,
    ) -> AppResult<Self> {
        let schema = parse_schema(&description, config)?;
        let checksum = Self::compute_checksum(&description)?;

        Ok(Self {
            id: Uuid::new_v4(),
            source,
            timestamp: Utc::now(),
            description,
            schema,
            checksum,
            commit_hash: None,
            commit_message: None,
            deployment_id: None,
            label: None,
        })
    }

    pub fn with_commit(mut self, hash: impl Into<String>, message: Option<String>) -> Self {
        self.commit_hash = Some(hash.into());
        self.commit_message = message;
        self
    }

    pub fn with_deployment(mut self, deployment_id: impl Into<String>) -> Self {
        self.deployment_id = Some(deployment_id.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Compute checksum from the raw description content
    pub fn compute_checksum(description: &SchemaDescription) -> AppResult<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(description)?);
        Ok(format!("{:x}", hasher.finalize()))
    }
}
