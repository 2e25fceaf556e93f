//! Schema Analysis Module
//!
//! The pipeline from a raw schema description to a traversable model:
//! - Validator normalization (typed field trees)
//! - Relationship extraction (table-to-table references)
//! - Health analysis (structural risks and a score)

pub mod cycles;
pub mod health;
pub mod normalizer;
pub mod relationships;

pub use health::{
    analyze_health, HealthAction, HealthAnalyzer, HealthWarning, HealthWarningType, SchemaHealth,
    Severity,
};
pub use normalizer::{infer_modules, normalize, normalize_table, Normalizer};
pub use relationships::extract_relationships;

use crate::config::AnalyzerConfig;
use crate::error::AppResult;
use crate::models::{SchemaDescription, SchemaRelationship, SchemaTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// A fully normalized schema: tables, their relationships and health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSchema {
    pub tables: BTreeMap<String, SchemaTable>,
    pub relationships: Vec<SchemaRelationship>,
    pub health: SchemaHealth,
}

/// Validate a description and run normalize → extract → analyze
pub fn parse_schema(
    description: &SchemaDescription,
    config: &AnalyzerConfig,
) -> AppResult<NormalizedSchema> {
    description.check()?;

    let modules = infer_modules(description.tables.iter().map(|t| t.table_name.as_str()));
    let tables: BTreeMap<String, SchemaTable> = description
        .tables
        .iter()
        .map(|definition| {
            let module = modules
                .get(&definition.table_name)
                .map(String::as_str)
                .unwrap_or(normalizer::DEFAULT_MODULE);
            let table = normalize_table(definition, module, config.max_depth);
            (table.name.clone(), table)
        })
        .collect();

    let relationships = extract_relationships(&tables);
    let health = HealthAnalyzer::new(config.clone()).analyze(&tables, &relationships);

    info!(
        "Parsed schema: {} tables, {} relationships, health score {}",
        tables.len(),
        relationships.len(),
        health.score
    );

    Ok(NormalizedSchema {
        tables,
        relationships,
        health,
    })
}
