//! Schema Diff Engine
//!
//! The core comparison engine that detects changes between schema snapshots.
//! Every table, field and index present on either side gets exactly one entry.

use crate::models::{FieldKind, SchemaField, SchemaIndex, SchemaTable};
use crate::snapshot::SchemaSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Status of a compared entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// Field-level comparison result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDiff {
    pub name: String,
    pub status: DiffStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_field: Option<SchemaField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_field: Option<SchemaField>,
    /// Human-readable description of what changed (modified only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_description: Option<String>,
}

/// Index-level comparison result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDiff {
    pub name: String,
    pub status: DiffStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_index: Option<SchemaIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_index: Option<SchemaIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_description: Option<String>,
}

/// Table-level comparison result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDiff {
    pub name: String,
    pub status: DiffStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_table: Option<SchemaTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_table: Option<SchemaTable>,
    /// Per-field entries; empty for added and removed tables
    pub field_diffs: Vec<FieldDiff>,
    /// Per-index entries; empty for added and removed tables
    pub index_diffs: Vec<IndexDiff>,
}

/// Summary statistics for the diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub tables_added: usize,
    pub tables_removed: usize,
    pub tables_modified: usize,
    pub fields_added: usize,
    pub fields_removed: usize,
    pub fields_modified: usize,
    pub indexes_added: usize,
    pub indexes_removed: usize,
    pub indexes_modified: usize,
}

impl DiffSummary {
    pub fn total_changes(&self) -> usize {
        self.tables_added
            + self.tables_removed
            + self.tables_modified
            + self.fields_added
            + self.fields_removed
            + self.fields_modified
            + self.indexes_added
            + self.indexes_removed
            + self.indexes_modified
    }
}

/// Complete schema diff result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDiff {
    pub from: SchemaSnapshot,
    pub to: SchemaSnapshot,
    pub table_diffs: BTreeMap<String, TableDiff>,
    pub summary: DiffSummary,
    pub computed_at: DateTime<Utc>,
}

impl SchemaDiff {
    pub fn has_changes(&self) -> bool {
        self.summary.total_changes() > 0
    }

    /// Table diffs that are not `unchanged`
    pub fn changed_tables(&self) -> impl Iterator<Item = &TableDiff> {
        self.table_diffs
            .values()
            .filter(|d| d.status != DiffStatus::Unchanged)
    }
}

/// Compare two snapshots
pub fn diff_schemas(from: &SchemaSnapshot, to: &SchemaSnapshot) -> SchemaDiff {
    DiffEngine::diff(from, to)
}

/// The diff engine that compares schema snapshots
pub struct DiffEngine;

impl DiffEngine {
    /// Compare two schema snapshots and return all differences
    pub fn diff(from: &SchemaSnapshot, to: &SchemaSnapshot) -> SchemaDiff {
        if from.checksum == to.checksum {
            debug!("Snapshots {} and {} share checksum {}", from.id, to.id, from.checksum);
        }

        let table_diffs = Self::diff_tables(&from.schema.tables, &to.schema.tables);
        let summary = Self::calculate_summary(&table_diffs);

        info!(
            "Diff {} → {}: {} tables added, {} removed, {} modified",
            from.id, to.id, summary.tables_added, summary.tables_removed, summary.tables_modified
        );

        SchemaDiff {
            from: from.clone(),
            to: to.clone(),
            table_diffs,
            summary,
            computed_at: Utc::now(),
        }
    }

    fn diff_tables(
        from_tables: &BTreeMap<String, SchemaTable>,
        to_tables: &BTreeMap<String, SchemaTable>,
    ) -> BTreeMap<String, TableDiff> {
        let mut diffs = BTreeMap::new();

        for (name, old) in from_tables {
            let diff = match to_tables.get(name) {
                Some(new) => Self::compare_tables(old, new),
                None => TableDiff {
                    name: name.clone(),
                    status: DiffStatus::Removed,
                    old_table: Some(old.clone()),
                    new_table: None,
                    field_diffs: Vec::new(),
                    index_diffs: Vec::new(),
                },
            };
            diffs.insert(name.clone(), diff);
        }

        for (name, added) in to_tables {
            if from_tables.contains_key(name) {
                continue;
            }
            diffs.insert(
                name.clone(),
                TableDiff {
                    name: name.clone(),
                    status: DiffStatus::Added,
                    old_table: None,
                    new_table: Some(added.clone()),
                    field_diffs: Vec::new(),
                    index_diffs: Vec::new(),
                },
            );
        }

        diffs
    }

    fn compare_tables(old: &SchemaTable, new: &SchemaTable) -> TableDiff {
        let field_diffs = Self::diff_fields(&old.fields, &new.fields);
        let index_diffs = Self::diff_indexes(&old.indexes, &new.indexes);

        let changed = field_diffs.iter().any(|d| d.status != DiffStatus::Unchanged)
            || index_diffs.iter().any(|d| d.status != DiffStatus::Unchanged);

        TableDiff {
            name: new.name.clone(),
            status: if changed {
                DiffStatus::Modified
            } else {
                DiffStatus::Unchanged
            },
            old_table: Some(old.clone()),
            new_table: Some(new.clone()),
            field_diffs,
            index_diffs,
        }
    }

    /// Entries follow the new declaration order, then fields that were removed
    fn diff_fields(old: &[SchemaField], new: &[SchemaField]) -> Vec<FieldDiff> {
        let old_map: HashMap<&str, &SchemaField> = old.iter().map(|f| (f.name.as_str(), f)).collect();
        let new_map: HashMap<&str, &SchemaField> = new.iter().map(|f| (f.name.as_str(), f)).collect();

        let mut diffs = Vec::new();

        for field in new {
            let diff = match old_map.get(field.name.as_str()) {
                None => FieldDiff {
                    name: field.name.clone(),
                    status: DiffStatus::Added,
                    old_field: None,
                    new_field: Some(field.clone()),
                    change_description: None,
                },
                Some(previous) => {
                    let change_description = Self::compare_fields(previous, field);
                    FieldDiff {
                        name: field.name.clone(),
                        status: if change_description.is_some() {
                            DiffStatus::Modified
                        } else {
                            DiffStatus::Unchanged
                        },
                        old_field: Some((*previous).clone()),
                        new_field: Some(field.clone()),
                        change_description,
                    }
                }
            };
            diffs.push(diff);
        }

        for field in old.iter().filter(|f| !new_map.contains_key(f.name.as_str())) {
            diffs.push(FieldDiff {
                name: field.name.clone(),
                status: DiffStatus::Removed,
                old_field: Some(field.clone()),
                new_field: None,
                change_description: None,
            });
        }

        diffs
    }

    /// `None` when the fields are deeply equal
    fn compare_fields(from: &SchemaField, to: &SchemaField) -> Option<String> {
        if from == to {
            return None;
        }

        let mut modifications = Vec::new();

        if from.field_type() != to.field_type() {
            modifications.push(format!("type: {} → {}", from.type_label(), to.type_label()));
        } else {
            match (&from.kind, &to.kind) {
                (FieldKind::Id { table: a }, FieldKind::Id { table: b }) if a != b => {
                    modifications.push(format!("reference: {} → {}", a, b));
                }
                (FieldKind::Literal { value: a }, FieldKind::Literal { value: b }) if a != b => {
                    modifications.push(format!("literal: {} → {}", a, b));
                }
                (FieldKind::Array { element: a }, FieldKind::Array { element: b }) if a != b => {
                    modifications.push(format!("element type: {} → {}", a.type_label(), b.type_label()));
                }
                (FieldKind::Object { fields: a }, FieldKind::Object { fields: b }) if a != b => {
                    modifications.push(format!("nested fields: {}", Self::describe_nested(a, b)));
                }
                (FieldKind::Union { variants: a, .. }, FieldKind::Union { variants: b, .. }) if a != b => {
                    modifications.push(format!(
                        "union members: {} → {}",
                        from.type_label(),
                        to.type_label()
                    ));
                }
                (
                    FieldKind::Record { keys: ka, values: va },
                    FieldKind::Record { keys: kb, values: vb },
                ) if ka != kb || va != vb => {
                    modifications.push(format!(
                        "record: {} → {} / {} → {}",
                        ka.type_label(),
                        kb.type_label(),
                        va.type_label(),
                        vb.type_label()
                    ));
                }
                _ => {}
            }
        }

        if from.optional != to.optional {
            modifications.push(if to.optional {
                "now optional".to_string()
            } else {
                "now required".to_string()
            });
        }

        if modifications.is_empty() {
            modifications.push("definition changed".to_string());
        }

        Some(modifications.join(", "))
    }

    fn describe_nested(old: &[SchemaField], new: &[SchemaField]) -> String {
        Self::diff_fields(old, new)
            .into_iter()
            .filter_map(|d| match d.status {
                DiffStatus::Added => Some(format!("+{}", d.name)),
                DiffStatus::Removed => Some(format!("-{}", d.name)),
                DiffStatus::Modified => Some(format!(
                    "~{} ({})",
                    d.name,
                    d.change_description.unwrap_or_default()
                )),
                DiffStatus::Unchanged => None,
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn diff_indexes(old: &[SchemaIndex], new: &[SchemaIndex]) -> Vec<IndexDiff> {
        let old_map: HashMap<&str, &SchemaIndex> = old.iter().map(|i| (i.name.as_str(), i)).collect();
        let new_map: HashMap<&str, &SchemaIndex> = new.iter().map(|i| (i.name.as_str(), i)).collect();

        let mut diffs = Vec::new();

        for index in new {
            let diff = match old_map.get(index.name.as_str()) {
                None => IndexDiff {
                    name: index.name.clone(),
                    status: DiffStatus::Added,
                    old_index: None,
                    new_index: Some(index.clone()),
                    change_description: None,
                },
                Some(previous) => {
                    let change_description = Self::compare_indexes(previous, index);
                    IndexDiff {
                        name: index.name.clone(),
                        status: if change_description.is_some() {
                            DiffStatus::Modified
                        } else {
                            DiffStatus::Unchanged
                        },
                        old_index: Some((*previous).clone()),
                        new_index: Some(index.clone()),
                        change_description,
                    }
                }
            };
            diffs.push(diff);
        }

        for index in old.iter().filter(|i| !new_map.contains_key(i.name.as_str())) {
            diffs.push(IndexDiff {
                name: index.name.clone(),
                status: DiffStatus::Removed,
                old_index: Some(index.clone()),
                new_index: None,
                change_description: None,
            });
        }

        diffs
    }

    fn compare_indexes(from: &SchemaIndex, to: &SchemaIndex) -> Option<String> {
        if from == to {
            return None;
        }

        let mut modifications = Vec::new();

        if from.index_type != to.index_type {
            modifications.push(format!("type: {} → {}", from.index_type, to.index_type));
        }
        if from.fields != to.fields {
            modifications.push(format!(
                "fields: [{}] → [{}]",
                from.fields.join(", "),
                to.fields.join(", ")
            ));
        }
        if from.staged != to.staged {
            modifications.push(if to.staged {
                "now staged".to_string()
            } else {
                "now live".to_string()
            });
        }
        if from.search_field != to.search_field {
            modifications.push(format!(
                "search field: {} → {}",
                from.search_field.as_deref().unwrap_or("none"),
                to.search_field.as_deref().unwrap_or("none")
            ));
        }
        if from.vector_field != to.vector_field {
            modifications.push(format!(
                "vector field: {} → {}",
                from.vector_field.as_deref().unwrap_or("none"),
                to.vector_field.as_deref().unwrap_or("none")
            ));
        }
        if from.dimensions != to.dimensions {
            modifications.push(format!(
                "dimensions: {} → {}",
                from.dimensions.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string()),
                to.dimensions.map(|d| d.to_string()).unwrap_or_else(|| "none".to_string())
            ));
        }
        if from.filter_fields != to.filter_fields {
            modifications.push(format!(
                "filter fields: [{}] → [{}]",
                from.filter_fields.join(", "),
                to.filter_fields.join(", ")
            ));
        }

        if modifications.is_empty() {
            modifications.push("definition changed".to_string());
        }

        Some(modifications.join(", "))
    }

    fn calculate_summary(table_diffs: &BTreeMap<String, TableDiff>) -> DiffSummary {
        let mut summary = DiffSummary::default();

        for table in table_diffs.values() {
            match table.status {
                DiffStatus::Added => summary.tables_added += 1,
                DiffStatus::Removed => summary.tables_removed += 1,
                DiffStatus::Modified => summary.tables_modified += 1,
                DiffStatus::Unchanged => {}
            }

            for field in &table.field_diffs {
                match field.status {
                    DiffStatus::Added => summary.fields_added += 1,
                    DiffStatus::Removed => summary.fields_removed += 1,
                    DiffStatus::Modified => summary.fields_modified += 1,
                    DiffStatus::Unchanged => {}
                }
            }

            for index in &table.index_diffs {
                match index.status {
                    DiffStatus::Added => summary.indexes_added += 1,
                    DiffStatus::Removed => summary.indexes_removed += 1,
                    DiffStatus::Modified => summary.indexes_modified += 1,
                    DiffStatus::Unchanged => {}
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::models::SchemaDescription;
    use crate::snapshot::SnapshotSource;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn snapshot(value: Value) -> SchemaSnapshot {
        let description: SchemaDescription = serde_json::from_value(value).unwrap();
        SchemaSnapshot::capture(description, SnapshotSource::Local, &AnalyzerConfig::default()).unwrap()
    }

    fn users_v1() -> Value {
        json!({"tables": [{
            "tableName": "users",
            "documentType": {"type": "object", "value": {
                "name": {"fieldType": {"type": "string"}, "optional": false},
                "age": {"fieldType": {"type": "number"}, "optional": false}
            }},
            "indexes": []
        }]})
    }

    #[test]
    fn test_identical_snapshots_are_unchanged() {
        let x = snapshot(users_v1());
        let diff = diff_schemas(&x, &x);

        assert_eq!(diff.summary, DiffSummary::default());
        assert!(!diff.has_changes());
        assert!(diff
            .table_diffs
            .values()
            .all(|t| t.status == DiffStatus::Unchanged));
    }

    #[test]
    fn test_index_added_and_field_made_optional() {
        let from = snapshot(users_v1());
        let to = snapshot(json!({"tables": [{
            "tableName": "users",
            "documentType": {"type": "object", "value": {
                "name": {"fieldType": {"type": "string"}, "optional": false},
                "age": {"fieldType": {"type": "number"}, "optional": true}
            }},
            "indexes": [{"indexDescriptor": "by_name", "fields": ["name"]}]
        }]}));

        let diff = diff_schemas(&from, &to);
        let users = &diff.table_diffs["users"];

        assert_eq!(users.status, DiffStatus::Modified);

        let index_changes: Vec<_> = users
            .index_diffs
            .iter()
            .map(|d| (d.name.as_str(), d.status))
            .collect();
        assert_eq!(index_changes, vec![("by_name", DiffStatus::Added)]);

        let age = users.field_diffs.iter().find(|d| d.name == "age").unwrap();
        assert_eq!(age.status, DiffStatus::Modified);
        assert_eq!(age.change_description.as_deref(), Some("now optional"));

        let name = users.field_diffs.iter().find(|d| d.name == "name").unwrap();
        assert_eq!(name.status, DiffStatus::Unchanged);

        assert_eq!(
            diff.summary,
            DiffSummary {
                tables_modified: 1,
                indexes_added: 1,
                fields_modified: 1,
                ..DiffSummary::default()
            }
        );
    }

    #[test]
    fn test_every_table_gets_one_entry() {
        let from = snapshot(json!({"tables": [
            {"tableName": "users"},
            {"tableName": "legacy"}
        ]}));
        let to = snapshot(json!({"tables": [
            {"tableName": "users"},
            {"tableName": "posts"}
        ]}));

        let diff = diff_schemas(&from, &to);
        let statuses: Vec<_> = diff
            .table_diffs
            .iter()
            .map(|(name, d)| (name.as_str(), d.status))
            .collect();

        assert_eq!(
            statuses,
            vec![
                ("legacy", DiffStatus::Removed),
                ("posts", DiffStatus::Added),
                ("users", DiffStatus::Unchanged),
            ]
        );
        assert!(diff.table_diffs["posts"].old_table.is_none());
        assert!(diff.table_diffs["legacy"].new_table.is_none());
        assert_eq!(diff.summary.tables_added, 1);
        assert_eq!(diff.summary.tables_removed, 1);
        assert_eq!(diff.summary.total_changes(), 2);
    }

    #[test]
    fn test_empty_and_disjoint_table_sets() {
        let empty = snapshot(json!({"tables": []}));
        let users = snapshot(json!({"tables": [{"tableName": "users"}]}));
        let posts = snapshot(json!({"tables": [{"tableName": "posts"}]}));

        assert!(diff_schemas(&empty, &empty).table_diffs.is_empty());
        assert_eq!(diff_schemas(&empty, &users).summary.tables_added, 1);
        assert_eq!(diff_schemas(&users, &empty).summary.tables_removed, 1);

        let swapped = diff_schemas(&users, &posts);
        assert_eq!(swapped.table_diffs.len(), 2);
        assert_eq!(swapped.table_diffs["users"].status, DiffStatus::Removed);
        assert_eq!(swapped.table_diffs["posts"].status, DiffStatus::Added);
    }

    #[test]
    fn test_reversed_diff_swaps_statuses() {
        let a = snapshot(json!({"tables": [{"tableName": "users"}]}));
        let b = snapshot(json!({"tables": [{"tableName": "users"}, {"tableName": "posts"}]}));

        assert_eq!(diff_schemas(&a, &b).table_diffs["posts"].status, DiffStatus::Added);
        assert_eq!(diff_schemas(&b, &a).table_diffs["posts"].status, DiffStatus::Removed);
    }

    #[test]
    fn test_field_change_descriptions() {
        let id = |table: &str| SchemaField::new("ref", false, FieldKind::Id { table: table.to_string() });

        assert_eq!(
            DiffEngine::compare_fields(&id("users"), &id("accounts")).as_deref(),
            Some("reference: users → accounts")
        );
        assert_eq!(
            DiffEngine::compare_fields(
                &SchemaField::new("age", false, FieldKind::Number),
                &SchemaField::new("age", true, FieldKind::String)
            )
            .as_deref(),
            Some("type: number → string, now optional")
        );
        assert_eq!(DiffEngine::compare_fields(&id("users"), &id("users")), None);
    }

    #[test]
    fn test_nested_object_change_description() {
        let object = |fields: Vec<SchemaField>| SchemaField::new("address", false, FieldKind::Object { fields });
        let old = object(vec![
            SchemaField::new("street", false, FieldKind::String),
            SchemaField::new("zip", false, FieldKind::Number),
        ]);
        let new = object(vec![
            SchemaField::new("street", false, FieldKind::String),
            SchemaField::new("zip", false, FieldKind::String),
            SchemaField::new("country", true, FieldKind::String),
        ]);

        assert_eq!(
            DiffEngine::compare_fields(&old, &new).as_deref(),
            Some("nested fields: ~zip (type: number → string); +country")
        );
    }

    #[test]
    fn test_index_change_description() {
        let old = SchemaIndex::db("by_a", vec!["a".to_string()], true);
        let new = SchemaIndex::db("by_a", vec!["a".to_string(), "b".to_string()], false);

        assert_eq!(
            DiffEngine::compare_indexes(&old, &new).as_deref(),
            Some("fields: [a] → [a, b], now live")
        );
    }

    #[test]
    fn test_removed_field_and_index_counted() {
        let from = snapshot(json!({"tables": [{
            "tableName": "posts",
            "documentType": {"type": "object", "value": {
                "title": {"fieldType": {"type": "string"}, "optional": false},
                "draft": {"fieldType": {"type": "boolean"}, "optional": false}
            }},
            "indexes": [{"indexDescriptor": "by_draft", "fields": ["draft"]}]
        }]}));
        let to = snapshot(json!({"tables": [{
            "tableName": "posts",
            "documentType": {"type": "object", "value": {
                "title": {"fieldType": {"type": "string"}, "optional": false}
            }}
        }]}));

        let diff = diff_schemas(&from, &to);

        assert_eq!(diff.summary.fields_removed, 1);
        assert_eq!(diff.summary.indexes_removed, 1);
        assert_eq!(diff.summary.tables_modified, 1);
        assert_eq!(diff.changed_tables().count(), 1);
    }
}
