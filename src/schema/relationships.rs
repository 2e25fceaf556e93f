//! Relationship Extractor
//!
//! Walks normalized tables and reports every `id`-typed reference to another
//! table of the same schema.

use crate::models::{Cardinality, FieldKind, SchemaField, SchemaRelationship, SchemaTable};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Extract all relationships from a set of tables.
///
/// References to tables outside `tables` are dropped. Cardinality is derived
/// from the field shape only: direct ids and unions are one-to-one, arrays of
/// ids are one-to-many.
pub fn extract_relationships(tables: &BTreeMap<String, SchemaTable>) -> Vec<SchemaRelationship> {
    let mut extractor = Extractor {
        tables,
        seen: HashSet::new(),
        relationships: Vec::new(),
    };

    for table in tables.values() {
        for field in &table.fields {
            extractor.visit_field(&table.name, field);
        }
    }

    debug!(
        "Extracted {} relationships from {} tables",
        extractor.relationships.len(),
        tables.len()
    );
    extractor.relationships
}

struct Extractor<'a> {
    tables: &'a BTreeMap<String, SchemaTable>,
    seen: HashSet<String>,
    relationships: Vec<SchemaRelationship>,
}

impl Extractor<'_> {
    fn visit_field(&mut self, from: &str, field: &SchemaField) {
        match &field.kind {
            FieldKind::Id { table } => {
                self.push(from, &field.name, table, Cardinality::OneToOne, field.optional, false);
            }
            FieldKind::Array { element } => {
                if let FieldKind::Id { table } = &element.kind {
                    self.push(from, &field.name, table, Cardinality::OneToMany, field.optional, true);
                }
            }
            FieldKind::Union {
                referenced_table: Some(table),
                ..
            } => {
                // Union references are always reported as optional
                self.push(from, &field.name, table, Cardinality::OneToOne, true, false);
            }
            FieldKind::Object { fields } => {
                self.visit_nested(from, &field.name, field.optional, fields);
            }
            _ => {}
        }
    }

    /// Inside objects only plain `id` leaves are reported
    fn visit_nested(&mut self, from: &str, prefix: &str, parent_optional: bool, fields: &[SchemaField]) {
        for nested in fields {
            let path = format!("{}.{}", prefix, nested.name);
            let optional = parent_optional || nested.optional;
            match &nested.kind {
                FieldKind::Id { table } => {
                    self.push(from, &path, table, Cardinality::OneToOne, optional, false);
                }
                FieldKind::Object { fields } => {
                    self.visit_nested(from, &path, optional, fields);
                }
                _ => {}
            }
        }
    }

    fn push(
        &mut self,
        from: &str,
        field: &str,
        to: &str,
        cardinality: Cardinality,
        optional: bool,
        is_array: bool,
    ) {
        if !self.tables.contains_key(to) {
            debug!("Dropping reference {}.{} to unknown table {}", from, field, to);
            return;
        }

        let id = SchemaRelationship::key(from, field, to);
        if !self.seen.insert(id.clone()) {
            return;
        }

        self.relationships.push(SchemaRelationship {
            id,
            from: from.to_string(),
            to: to.to_string(),
            field: field.to_string(),
            cardinality,
            optional,
            is_array,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldType, SchemaIndex};
    use crate::schema::normalizer::normalize;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn table(name: &str, fields: Vec<(&str, Value, bool)>) -> SchemaTable {
        SchemaTable {
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(field, raw, optional)| normalize(&raw, field, optional))
                .collect(),
            indexes: Vec::<SchemaIndex>::new(),
            is_system: name.starts_with('_'),
            module: "core".to_string(),
            truncated_fields: vec![],
        }
    }

    fn schema(tables: Vec<SchemaTable>) -> BTreeMap<String, SchemaTable> {
        tables.into_iter().map(|t| (t.name.clone(), t)).collect()
    }

    fn sample() -> BTreeMap<String, SchemaTable> {
        schema(vec![
            table("users", vec![("name", json!({"type": "string"}), false)]),
            table("teams", vec![("name", json!({"type": "string"}), false)]),
            table(
                "posts",
                vec![
                    ("authorId", json!({"type": "id", "tableName": "users"}), false),
                    (
                        "editorIds",
                        json!({"type": "array", "value": {"type": "id", "tableName": "users"}}),
                        false,
                    ),
                    (
                        "owner",
                        json!({"type": "union", "value": [
                            {"type": "id", "tableName": "teams"},
                            {"type": "id", "tableName": "users"}
                        ]}),
                        false,
                    ),
                    (
                        "meta",
                        json!({"type": "object", "value": {
                            "reviewer": {"fieldType": {"type": "id", "tableName": "users"}, "optional": false},
                            "tags": {"fieldType": {"type": "array", "value": {"type": "id", "tableName": "tags"}}, "optional": false},
                            "audit": {"fieldType": {"type": "object", "value": {
                                "by": {"fieldType": {"type": "id", "tableName": "users"}, "optional": false}
                            }}, "optional": true}
                        }}),
                        false,
                    ),
                    ("legacyId", json!({"type": "id", "tableName": "archived"}), false),
                ],
            ),
        ])
    }

    #[test]
    fn test_extracts_each_reference_shape() {
        let rels = extract_relationships(&sample());
        let ids: Vec<_> = rels.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(
            ids,
            vec![
                "posts-authorId->users",
                "posts-editorIds->users",
                "posts-owner->teams",
                "posts-meta.reviewer->users",
                "posts-meta.audit.by->users",
            ]
        );

        let editors = &rels[1];
        assert_eq!(editors.cardinality, Cardinality::OneToMany);
        assert!(editors.is_array);

        let owner = &rels[2];
        assert_eq!(owner.cardinality, Cardinality::OneToOne);
        assert!(owner.optional);

        assert!(!rels[3].optional);
        assert!(rels[4].optional, "optional parent object makes nested reference optional");
    }

    #[test]
    fn test_dangling_references_dropped() {
        let rels = extract_relationships(&sample());
        assert!(rels.iter().all(|r| r.to != "archived" && r.to != "tags"));
    }

    #[test]
    fn test_extraction_is_idempotent_and_order_independent() {
        let forward = sample();
        let mut reversed_input: Vec<SchemaTable> = forward.values().cloned().collect();
        reversed_input.reverse();
        let reversed = schema(reversed_input);

        let first: HashSet<_> = extract_relationships(&forward).into_iter().collect();
        let second: HashSet<_> = extract_relationships(&forward).into_iter().collect();
        let third: HashSet<_> = extract_relationships(&reversed).into_iter().collect();

        assert_eq!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_self_reference_is_kept() {
        let tables = schema(vec![table(
            "comments",
            vec![("parentId", json!({"type": "id", "tableName": "comments"}), true)],
        )]);

        let rels = extract_relationships(&tables);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].from, rels[0].to);
        assert!(rels[0].optional);
        assert_eq!(
            tables["comments"].fields[0].field_type(),
            FieldType::Id
        );
    }
}
