//! Validator Normalizer
//!
//! Turns raw validator trees into typed [`SchemaField`] trees and table
//! declarations into [`SchemaTable`]s. Normalization never fails: shapes it
//! cannot make sense of degrade to `any`.

use crate::models::{
    FieldKind, ObjectProperty, SchemaField, SchemaIndex, SchemaTable, TableDefinition, Validator,
    IndexType, SENTINEL_FIELD,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Default nesting limit for the free-standing [`normalize`] function
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Module assigned to tables that share no name prefix with another table
pub const DEFAULT_MODULE: &str = "core";

/// Module assigned to system tables
pub const SYSTEM_MODULE: &str = "system";

/// Leading acronym run (group 1) or leading word (group 2)
static LEADING_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^_*(?:([A-Z]{2,})|([A-Za-z][a-z0-9]*))").expect("token pattern is valid")
});

/// Normalize a single raw validator into a field.
///
/// Uses [`DEFAULT_MAX_DEPTH`]; subtrees beyond it become `any`.
pub fn normalize(raw: &Value, field_name: &str, optional: bool) -> SchemaField {
    let validator = Validator::from_json(raw);
    Normalizer::new(DEFAULT_MAX_DEPTH).normalize(&validator, field_name, optional)
}

/// Stateful normalizer for one table: carries the depth limit and collects
/// the paths where it was hit.
pub struct Normalizer {
    max_depth: usize,
    truncated: Vec<String>,
}

impl Normalizer {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            truncated: Vec::new(),
        }
    }

    /// Normalize a top-level field
    pub fn normalize(&mut self, validator: &Validator, name: &str, optional: bool) -> SchemaField {
        self.normalize_at(validator, name, optional, name, 0)
    }

    /// Paths cut off at the depth limit so far
    pub fn truncated(&self) -> &[String] {
        &self.truncated
    }

    pub fn into_truncated(self) -> Vec<String> {
        self.truncated
    }

    fn normalize_at(
        &mut self,
        validator: &Validator,
        name: &str,
        optional: bool,
        path: &str,
        depth: usize,
    ) -> SchemaField {
        if depth > self.max_depth {
            warn!("Validator at {} exceeds nesting depth {}, treating as any", path, self.max_depth);
            self.truncated.push(path.to_string());
            return SchemaField::new(name, optional, FieldKind::Any);
        }

        let kind = match validator {
            Validator::Null => FieldKind::Null,
            Validator::Number => FieldKind::Number,
            Validator::BigInt => FieldKind::Bigint,
            Validator::Boolean => FieldKind::Boolean,
            Validator::String => FieldKind::String,
            Validator::Bytes => FieldKind::Bytes,
            Validator::Any => FieldKind::Any,
            Validator::Literal(value) => FieldKind::Literal {
                value: value.clone(),
            },
            Validator::Id { table_name } => FieldKind::Id {
                table: table_name.clone(),
            },
            Validator::Array(element) => {
                let element_path = format!("{}[]", path);
                FieldKind::Array {
                    element: Box::new(self.normalize_at(element, name, false, &element_path, depth + 1)),
                }
            }
            Validator::Union(members) => {
                let variants: Vec<SchemaField> = members
                    .iter()
                    .map(|m| self.normalize_at(m, name, false, path, depth + 1))
                    .collect();
                // First id alternative wins when several are present
                let referenced_table = variants.iter().find_map(|v| match &v.kind {
                    FieldKind::Id { table } => Some(table.clone()),
                    _ => None,
                });
                FieldKind::Union {
                    variants,
                    referenced_table,
                }
            }
            Validator::Object(properties) => FieldKind::Object {
                fields: self.normalize_properties(properties, path, depth),
            },
            Validator::Record { keys, values } => {
                let keys_path = format!("{}{{keys}}", path);
                let values_path = format!("{}[*]", path);
                FieldKind::Record {
                    keys: Box::new(self.normalize_at(keys, name, false, &keys_path, depth + 1)),
                    values: Box::new(self.normalize_at(
                        &values.validator,
                        name,
                        values.optional,
                        &values_path,
                        depth + 1,
                    )),
                }
            }
            Validator::Unrecognized(reason) => {
                warn!("Unrecognized validator at {} ({}), treating as any", path, reason);
                FieldKind::Any
            }
        };

        SchemaField::new(name, optional, kind)
    }

    fn normalize_properties(
        &mut self,
        properties: &[ObjectProperty],
        path: &str,
        depth: usize,
    ) -> Vec<SchemaField> {
        properties
            .iter()
            .map(|p| {
                let child_path = format!("{}.{}", path, p.name);
                self.normalize_at(&p.validator, &p.name, p.optional, &child_path, depth + 1)
            })
            .collect()
    }
}

/// Normalize one table declaration
pub fn normalize_table(definition: &TableDefinition, module: &str, max_depth: usize) -> SchemaTable {
    let mut normalizer = Normalizer::new(max_depth);
    let fields = normalize_document(&mut normalizer, definition);
    let indexes = collect_indexes(definition);

    debug!(
        "Normalized table {}: {} fields, {} indexes",
        definition.table_name,
        fields.len(),
        indexes.len()
    );

    SchemaTable {
        name: definition.table_name.clone(),
        fields,
        indexes,
        is_system: definition.table_name.starts_with('_'),
        module: module.to_string(),
        truncated_fields: normalizer.into_truncated(),
    }
}

fn normalize_document(normalizer: &mut Normalizer, definition: &TableDefinition) -> Vec<SchemaField> {
    let sentinel = || vec![SchemaField::new(SENTINEL_FIELD, false, FieldKind::Any)];

    let Some(document_type) = &definition.document_type else {
        return sentinel();
    };

    match Validator::from_json(document_type) {
        Validator::Object(properties) => properties
            .iter()
            .map(|p| normalizer.normalize(&p.validator, &p.name, p.optional))
            .collect(),
        Validator::Any => sentinel(),
        Validator::Unrecognized(reason) => {
            warn!(
                "Unrecognized document type for table {} ({}), treating as untyped",
                definition.table_name, reason
            );
            sentinel()
        }
        other => vec![normalizer.normalize(&other, SENTINEL_FIELD, false)],
    }
}

fn collect_indexes(definition: &TableDefinition) -> Vec<SchemaIndex> {
    let mut indexes = Vec::new();

    let db = definition.indexes.iter().map(|i| (i, false));
    let staged_db = definition.staged_db_indexes.iter().map(|i| (i, true));
    for (index, staged) in db.chain(staged_db) {
        indexes.push(SchemaIndex::db(
            index.index_descriptor.clone(),
            index.fields.clone(),
            staged,
        ));
    }

    let search = definition.search_indexes.iter().map(|i| (i, false));
    let staged_search = definition.staged_search_indexes.iter().map(|i| (i, true));
    for (index, staged) in search.chain(staged_search) {
        indexes.push(SchemaIndex {
            name: index.index_descriptor.clone(),
            fields: vec![index.search_field.clone()],
            index_type: IndexType::Search,
            staged,
            search_field: Some(index.search_field.clone()),
            vector_field: None,
            dimensions: None,
            filter_fields: index.filter_fields.clone(),
        });
    }

    let vector = definition.vector_indexes.iter().map(|i| (i, false));
    let staged_vector = definition.staged_vector_indexes.iter().map(|i| (i, true));
    for (index, staged) in vector.chain(staged_vector) {
        indexes.push(SchemaIndex {
            name: index.index_descriptor.clone(),
            fields: vec![index.vector_field.clone()],
            index_type: IndexType::Vector,
            staged,
            search_field: None,
            vector_field: Some(index.vector_field.clone()),
            dimensions: Some(index.dimensions),
            filter_fields: index.filter_fields.clone(),
        });
    }

    indexes
}

/// Infer a grouping module for every table name.
///
/// Tables whose leading name token (`user` in `user_sessions` or
/// `userSessions`, `api` in `APIKeys`) is shared with another table are
/// grouped under it.
pub fn infer_modules<'a>(names: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
    let names: Vec<&str> = names.into_iter().collect();

    let mut token_counts: HashMap<String, usize> = HashMap::new();
    let tokens: Vec<Option<String>> = names
        .iter()
        .map(|name| {
            if name.starts_with('_') {
                return None;
            }
            let token = leading_token(name)?;
            *token_counts.entry(token.clone()).or_insert(0) += 1;
            Some(token)
        })
        .collect();

    names
        .iter()
        .zip(tokens)
        .map(|(name, token)| {
            let module = if name.starts_with('_') {
                SYSTEM_MODULE.to_string()
            } else {
                match token {
                    Some(t) if token_counts.get(&t).copied().unwrap_or(0) > 1 => t,
                    _ => DEFAULT_MODULE.to_string(),
                }
            };
            (name.to_string(), module)
        })
        .collect()
}

fn leading_token(name: &str) -> Option<String> {
    let caps = LEADING_TOKEN.captures(name)?;

    if let Some(run) = caps.get(1) {
        // In `APIKeys` the last capital starts the next word
        let run_str = run.as_str();
        let token = if name[run.end()..].starts_with(|c: char| c.is_ascii_lowercase()) {
            &run_str[..run_str.len() - 1]
        } else {
            run_str
        };
        return Some(token.to_lowercase());
    }

    caps.get(2).map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn table(json: Value) -> TableDefinition {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_every_tag_maps_to_matching_type() {
        let cases = [
            (json!({"type": "string"}), FieldType::String),
            (json!({"type": "number"}), FieldType::Number),
            (json!({"type": "boolean"}), FieldType::Boolean),
            (json!({"type": "null"}), FieldType::Null),
            (json!({"type": "bigint"}), FieldType::Bigint),
            (json!({"type": "bytes"}), FieldType::Bytes),
            (json!({"type": "any"}), FieldType::Any),
            (json!({"type": "literal", "value": "draft"}), FieldType::Literal),
            (json!({"type": "id", "tableName": "users"}), FieldType::Id),
            (json!({"type": "array", "value": {"type": "string"}}), FieldType::Array),
            (json!({"type": "object", "value": {}}), FieldType::Object),
            (
                json!({"type": "record", "keys": {"type": "string"}, "values": {"fieldType": {"type": "number"}, "optional": false}}),
                FieldType::Record,
            ),
            (json!({"type": "union", "value": [{"type": "string"}]}), FieldType::Union),
        ];

        for (raw, expected) in cases {
            let field = normalize(&raw, "f", false);
            assert_eq!(field.field_type(), expected, "for {}", raw);
        }
    }

    #[test]
    fn test_malformed_degrades_to_any() {
        let field = normalize(&json!({"type": "array"}), "tags", true);
        assert_eq!(field.kind, FieldKind::Any);
        assert!(field.optional);

        let field = normalize(&json!(["not", "a", "validator"]), "x", false);
        assert_eq!(field.kind, FieldKind::Any);
    }

    #[test]
    fn test_union_first_id_wins() {
        let raw = json!({"type": "union", "value": [
            {"type": "null"},
            {"type": "id", "tableName": "users"},
            {"type": "id", "tableName": "teams"}
        ]});
        let field = normalize(&raw, "owner", false);

        assert_eq!(field.referenced_table(), Some("users"));
        match &field.kind {
            FieldKind::Union { variants, .. } => {
                let types: Vec<_> = variants.iter().map(|v| v.field_type()).collect();
                assert_eq!(types, vec![FieldType::Null, FieldType::Id, FieldType::Id]);
            }
            other => panic!("expected union, got {:?}", other),
        }
    }

    #[test]
    fn test_object_keeps_order_and_optionality() {
        let raw = json!({"type": "object", "value": {
            "street": {"fieldType": {"type": "string"}, "optional": false},
            "unit": {"fieldType": {"type": "string"}, "optional": true},
            "city": {"fieldType": {"type": "string"}, "optional": false}
        }});
        let field = normalize(&raw, "address", false);

        match &field.kind {
            FieldKind::Object { fields } => {
                let summary: Vec<_> = fields.iter().map(|f| (f.name.as_str(), f.optional)).collect();
                assert_eq!(summary, vec![("street", false), ("unit", true), ("city", false)]);
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_limit_truncates_and_records_path() {
        let mut raw = json!({"type": "string"});
        for _ in 0..5 {
            raw = json!({"type": "object", "value": {"inner": {"fieldType": raw, "optional": false}}});
        }

        let mut normalizer = Normalizer::new(2);
        let field = normalizer.normalize(&Validator::from_json(&raw), "root", false);

        assert_eq!(normalizer.truncated(), &["root.inner.inner.inner".to_string()]);
        let mut node = &field;
        for _ in 0..3 {
            node = match &node.kind {
                FieldKind::Object { fields } => &fields[0],
                other => panic!("expected object, got {:?}", other),
            };
        }
        assert_eq!(node.kind, FieldKind::Any);
    }

    #[test]
    fn test_table_without_document_type_gets_sentinel() {
        let users = normalize_table(&table(json!({"tableName": "users", "documentType": null})), "core", 32);

        assert!(users.has_no_schema());
        assert!(!users.is_system);
    }

    #[test]
    fn test_table_fields_and_indexes() {
        let definition = table(json!({
            "tableName": "messages",
            "documentType": {"type": "object", "value": {
                "body": {"fieldType": {"type": "string"}, "optional": false},
                "channelId": {"fieldType": {"type": "id", "tableName": "channels"}, "optional": false}
            }},
            "indexes": [{"indexDescriptor": "by_channel", "fields": ["channelId"]}],
            "searchIndexes": [{"indexDescriptor": "search_body", "searchField": "body", "filterFields": ["channelId"]}],
            "stagedVectorIndexes": [{"indexDescriptor": "by_embedding", "vectorField": "embedding", "dimensions": 1536}]
        }));

        let messages = normalize_table(&definition, "core", 32);

        assert_eq!(messages.fields.len(), 2);
        assert_eq!(messages.field("channelId").and_then(|f| f.referenced_table()), Some("channels"));
        assert_eq!(messages.indexes.len(), 3);

        let search = messages.index("search_body").unwrap();
        assert_eq!(search.index_type, IndexType::Search);
        assert_eq!(search.fields, vec!["body".to_string()]);
        assert_eq!(search.filter_fields, vec!["channelId".to_string()]);

        let vector = messages.index("by_embedding").unwrap();
        assert!(vector.staged);
        assert_eq!(vector.dimensions, Some(1536));
    }

    #[test]
    fn test_infer_modules() {
        let modules = infer_modules(["user_profiles", "userSessions", "posts", "_scheduled_functions"]);

        assert_eq!(modules["user_profiles"], "user");
        assert_eq!(modules["userSessions"], "user");
        assert_eq!(modules["posts"], DEFAULT_MODULE);
        assert_eq!(modules["_scheduled_functions"], SYSTEM_MODULE);
    }

    #[test]
    fn test_infer_modules_with_leading_acronym() {
        let modules = infer_modules(["APIKeys", "APILogs", "apiTokens", "Users", "URL"]);

        assert_eq!(modules["APIKeys"], "api");
        assert_eq!(modules["APILogs"], "api");
        assert_eq!(modules["apiTokens"], "api");
        assert_eq!(modules["Users"], DEFAULT_MODULE);
        assert_eq!(modules["URL"], DEFAULT_MODULE);
        assert_eq!(leading_token("HTTPRequests").as_deref(), Some("http"));
    }
}
