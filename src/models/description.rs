//! Schema description models
//!
//! The JSON shape handed over by the upstream schema parser: tables with
//! their document validators and index declarations.

use crate::error::{validation_error, AppError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("table name pattern is valid"));

/// A complete schema description: every table plus the validation flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescription {
    #[validate(nested)]
    pub tables: Vec<TableDefinition>,
    #[serde(default)]
    pub schema_validation: bool,
}

/// A single table declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    #[serde(alias = "name")]
    #[validate(length(min = 1, max = 256, message = "Table name must be between 1 and 256 characters"))]
    #[validate(custom(function = "validate_table_name"))]
    pub table_name: String,

    /// Raw validator tree for documents; `None` when the table is untyped
    #[serde(default)]
    pub document_type: Option<serde_json::Value>,

    #[serde(default)]
    #[validate(nested)]
    pub indexes: Vec<DbIndexDefinition>,

    #[serde(default)]
    #[validate(nested)]
    pub search_indexes: Vec<SearchIndexDefinition>,

    #[serde(default)]
    #[validate(nested)]
    pub vector_indexes: Vec<VectorIndexDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub staged_db_indexes: Vec<DbIndexDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub staged_search_indexes: Vec<SearchIndexDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub staged_vector_indexes: Vec<VectorIndexDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DbIndexDefinition {
    #[serde(alias = "name")]
    #[validate(length(min = 1, message = "Index name is required"))]
    pub index_descriptor: String,

    #[validate(length(min = 1, message = "A database index needs at least one field"))]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexDefinition {
    #[serde(alias = "name")]
    #[validate(length(min = 1, message = "Index name is required"))]
    pub index_descriptor: String,

    #[validate(length(min = 1, message = "Search field is required"))]
    pub search_field: String,

    #[serde(default)]
    pub filter_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexDefinition {
    #[serde(alias = "name")]
    #[validate(length(min = 1, message = "Index name is required"))]
    pub index_descriptor: String,

    #[validate(length(min = 1, message = "Vector field is required"))]
    pub vector_field: String,

    #[validate(range(min = 1, message = "Vector dimensions must be positive"))]
    pub dimensions: u32,

    #[serde(default)]
    pub filter_fields: Vec<String>,
}

impl TableDefinition {
    /// Every index name declared on this table, across all index kinds
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes
            .iter()
            .chain(&self.staged_db_indexes)
            .map(|i| i.index_descriptor.as_str())
            .chain(
                self.search_indexes
                    .iter()
                    .chain(&self.staged_search_indexes)
                    .map(|i| i.index_descriptor.as_str()),
            )
            .chain(
                self.vector_indexes
                    .iter()
                    .chain(&self.staged_vector_indexes)
                    .map(|i| i.index_descriptor.as_str()),
            )
    }
}

impl SchemaDescription {
    /// Parse and validate a description from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let description: SchemaDescription = serde_json::from_str(json)?;
        description.check()?;
        Ok(description)
    }

    /// Field-level validation plus the cross-entry uniqueness rules
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;

        let mut seen_tables = HashSet::new();
        for table in &self.tables {
            if !seen_tables.insert(table.table_name.as_str()) {
                return Err(validation_error(format!(
                    "duplicate table name: {}",
                    table.table_name
                )));
            }

            let mut seen_indexes = HashSet::new();
            for index in table.index_names() {
                if !seen_indexes.insert(index) {
                    return Err(validation_error(format!(
                        "duplicate index name {} on table {}",
                        index, table.table_name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Validate a table identifier
fn validate_table_name(name: &str) -> Result<(), validator::ValidationError> {
    if !TABLE_NAME.is_match(name) {
        let mut err = validator::ValidationError::new("invalid_table_name");
        err.message = Some(
            "Invalid table name. Must start with a letter or underscore and contain only letters, digits, underscores."
                .into(),
        );
        return Err(err);
    }
    Ok(())
}
