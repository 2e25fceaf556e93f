//! Normalized schema model
//!
//! Typed field trees, indexes, tables and the relationships between them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Name of the placeholder field used when a table has no typed document shape
pub const SENTINEL_FIELD: &str = "*";

/// Field type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Null,
    Bigint,
    Bytes,
    Any,
    Literal,
    Id,
    Array,
    Object,
    Record,
    Union,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Null => "null",
            FieldType::Bigint => "bigint",
            FieldType::Bytes => "bytes",
            FieldType::Any => "any",
            FieldType::Literal => "literal",
            FieldType::Id => "id",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Record => "record",
            FieldType::Union => "union",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type-specific payload of a field; serialized as the `type` tag plus payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Null,
    Bigint,
    Bytes,
    Any,
    Literal {
        #[serde(rename = "literalValue")]
        value: Value,
    },
    Id {
        #[serde(rename = "referencedTable")]
        table: String,
    },
    Array {
        #[serde(rename = "arrayElementType")]
        element: Box<SchemaField>,
    },
    Object {
        #[serde(rename = "nestedFields")]
        fields: Vec<SchemaField>,
    },
    Record {
        #[serde(rename = "recordKeys")]
        keys: Box<SchemaField>,
        #[serde(rename = "recordValues")]
        values: Box<SchemaField>,
    },
    /// `referenced_table` is the table of the first `id` alternative, if any
    Union {
        #[serde(rename = "unionTypes")]
        variants: Vec<SchemaField>,
        #[serde(
            rename = "referencedTable",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        referenced_table: Option<String>,
    },
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::String => FieldType::String,
            FieldKind::Number => FieldType::Number,
            FieldKind::Boolean => FieldType::Boolean,
            FieldKind::Null => FieldType::Null,
            FieldKind::Bigint => FieldType::Bigint,
            FieldKind::Bytes => FieldType::Bytes,
            FieldKind::Any => FieldType::Any,
            FieldKind::Literal { .. } => FieldType::Literal,
            FieldKind::Id { .. } => FieldType::Id,
            FieldKind::Array { .. } => FieldType::Array,
            FieldKind::Object { .. } => FieldType::Object,
            FieldKind::Record { .. } => FieldType::Record,
            FieldKind::Union { .. } => FieldType::Union,
        }
    }
}

/// A node of the normalized field tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub optional: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, optional: bool, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            optional,
            kind,
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    /// Referenced table for `id` fields and for unions with an `id` alternative
    pub fn referenced_table(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Id { table } => Some(table),
            FieldKind::Union {
                referenced_table, ..
            } => referenced_table.as_deref(),
            _ => None,
        }
    }

    pub fn is_id(&self) -> bool {
        matches!(self.kind, FieldKind::Id { .. })
    }

    pub fn is_sentinel(&self) -> bool {
        self.name == SENTINEL_FIELD && matches!(self.kind, FieldKind::Any)
    }

    pub fn is_system(&self) -> bool {
        self.name.starts_with('_')
    }

    /// Short type rendering used in messages, e.g. `id<users>` or `array<string>`
    pub fn type_label(&self) -> String {
        match &self.kind {
            FieldKind::Id { table } => format!("id<{}>", table),
            FieldKind::Array { element } => format!("array<{}>", element.type_label()),
            FieldKind::Literal { value } => format!("literal<{}>", value),
            FieldKind::Union { variants, .. } => variants
                .iter()
                .map(SchemaField::type_label)
                .collect::<Vec<_>>()
                .join(" | "),
            other => other.field_type().to_string(),
        }
    }
}

/// Index kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    Db,
    Search,
    Vector,
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexType::Db => "db",
            IndexType::Search => "search",
            IndexType::Vector => "vector",
        };
        write!(f, "{}", s)
    }
}

/// Index representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaIndex {
    pub name: String,
    /// Indexed fields in order; `[searchField]` / `[vectorField]` for search and vector indexes
    pub fields: Vec<String>,
    #[serde(rename = "type")]
    pub index_type: IndexType,
    pub staged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_fields: Vec<String>,
}

impl SchemaIndex {
    pub fn db(name: impl Into<String>, fields: Vec<String>, staged: bool) -> Self {
        Self {
            name: name.into(),
            fields,
            index_type: IndexType::Db,
            staged,
            search_field: None,
            vector_field: None,
            dimensions: None,
            filter_fields: Vec::new(),
        }
    }

    pub fn covers(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn is_compound(&self) -> bool {
        self.fields.len() >= 2
    }
}

/// Table representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTable {
    pub name: String,
    pub fields: Vec<SchemaField>,
    pub indexes: Vec<SchemaIndex>,
    pub is_system: bool,
    pub module: String,
    /// Dotted paths where normalization stopped at the depth limit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub truncated_fields: Vec<String>,
}

impl SchemaTable {
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&SchemaIndex> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// True when the producer found no typed document shape
    pub fn has_no_schema(&self) -> bool {
        self.fields.len() == 1 && self.fields[0].is_sentinel()
    }

    pub fn db_indexes(&self) -> impl Iterator<Item = &SchemaIndex> {
        self.indexes.iter().filter(|i| i.index_type == IndexType::Db)
    }
}

/// Relationship cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToMany,
}

/// A directed reference from a field of one table to another table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRelationship {
    /// `{from}-{field}->{to}`
    pub id: String,
    pub from: String,
    pub to: String,
    /// Dotted path for fields nested inside objects
    pub field: String,
    pub cardinality: Cardinality,
    pub optional: bool,
    pub is_array: bool,
}

impl SchemaRelationship {
    pub fn key(from: &str, field: &str, to: &str) -> String {
        format!("{}-{}->{}", from, field, to)
    }
}
