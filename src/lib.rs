//! schema-lens - schema normalization and analysis
//!
//! Turns a raw document-database schema description into a traversable model:
//! - Normalized tables with typed field trees and indexes
//! - Table-to-table relationships inferred from `id` references
//! - Health warnings with a 0-100 score
//! - Snapshots and structured diffs between them

pub mod config;
pub mod error;
pub mod models;
pub mod schema;
pub mod snapshot;

pub use config::{AnalyzerConfig, PenaltyWeights, Settings};
pub use error::{AppError, AppResult};
pub use models::{
    Cardinality, FieldKind, FieldType, IndexType, SchemaDescription, SchemaField, SchemaIndex,
    SchemaRelationship, SchemaTable, Validator,
};
pub use schema::{
    analyze_health, extract_relationships, normalize, parse_schema, HealthWarning,
    HealthWarningType, NormalizedSchema, SchemaHealth, Severity,
};
pub use snapshot::{
    diff_schemas, DiffStatus, DiffSummary, SchemaDiff, SchemaSnapshot, SnapshotSource,
    SnapshotStore,
};
