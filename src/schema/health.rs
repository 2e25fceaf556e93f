//! Health Analyzer
//!
//! Runs independent diagnostic rules over normalized tables and their
//! relationships, and folds the findings into a 0-100 score.

use crate::config::{AnalyzerConfig, PenaltyWeights};
use crate::models::{SchemaRelationship, SchemaTable};
use crate::schema::cycles::find_cycles;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Warning severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Diagnostic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthWarningType {
    OrphanedTable,
    NoSchema,
    WideTable,
    MissingIndex,
    RedundantIndex,
    CompoundIndexSuggestion,
    CircularDependency,
    ExcessiveNesting,
}

impl HealthWarningType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthWarningType::OrphanedTable => "orphaned-table",
            HealthWarningType::NoSchema => "no-schema",
            HealthWarningType::WideTable => "wide-table",
            HealthWarningType::MissingIndex => "missing-index",
            HealthWarningType::RedundantIndex => "redundant-index",
            HealthWarningType::CompoundIndexSuggestion => "compound-index-suggestion",
            HealthWarningType::CircularDependency => "circular-dependency",
            HealthWarningType::ExcessiveNesting => "excessive-nesting",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            HealthWarningType::NoSchema
            | HealthWarningType::MissingIndex
            | HealthWarningType::ExcessiveNesting => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl PenaltyWeights {
    /// Score penalty for one warning of the given kind
    pub fn penalty(&self, kind: HealthWarningType) -> u32 {
        match kind {
            HealthWarningType::OrphanedTable => self.orphaned_table,
            HealthWarningType::NoSchema => self.no_schema,
            HealthWarningType::WideTable => self.wide_table,
            HealthWarningType::MissingIndex => self.missing_index,
            HealthWarningType::RedundantIndex => self.redundant_index,
            HealthWarningType::CompoundIndexSuggestion => self.compound_index_suggestion,
            HealthWarningType::CircularDependency => self.circular_dependency,
            HealthWarningType::ExcessiveNesting => self.excessive_nesting,
        }
    }
}

/// A describable remediation with a code snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAction {
    pub description: String,
    pub code: String,
    pub can_auto_apply: bool,
}

/// A single diagnostic finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthWarning {
    pub id: String,
    #[serde(rename = "type")]
    pub warning_type: HealthWarningType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    pub suggestion: String,
    pub impact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<HealthAction>,
}

impl HealthWarning {
    fn new(warning_type: HealthWarningType, message: String) -> Self {
        Self {
            id: String::new(),
            warning_type,
            severity: warning_type.severity(),
            table: None,
            field: None,
            message,
            suggestion: String::new(),
            impact: String::new(),
            action: None,
        }
    }

    fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }

    fn impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = impact.into();
        self
    }

    fn action(mut self, description: impl Into<String>, code: impl Into<String>, can_auto_apply: bool) -> Self {
        self.action = Some(HealthAction {
            description: description.into(),
            code: code.into(),
            can_auto_apply,
        });
        self
    }
}

/// Health report for one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaHealth {
    pub score: u32,
    pub warnings: Vec<HealthWarning>,
    pub table_count: usize,
    pub relationship_count: usize,
    pub index_count: usize,
}

impl SchemaHealth {
    pub fn warnings_of(&self, kind: HealthWarningType) -> impl Iterator<Item = &HealthWarning> {
        self.warnings.iter().filter(move |w| w.warning_type == kind)
    }
}

/// Collects warnings and hands out unique ids from a per-analysis counter
struct WarningLog {
    counter: usize,
    warnings: Vec<HealthWarning>,
}

impl WarningLog {
    fn new() -> Self {
        Self {
            counter: 0,
            warnings: Vec::new(),
        }
    }

    fn push(&mut self, mut warning: HealthWarning) {
        self.counter += 1;
        warning.id = format!(
            "{}-{}-{}-{}",
            warning.warning_type.as_str(),
            warning.table.as_deref().unwrap_or("schema"),
            warning.field.as_deref().unwrap_or("none"),
            self.counter
        );
        self.warnings.push(warning);
    }
}

/// Analyze with default settings
pub fn analyze_health(
    tables: &BTreeMap<String, SchemaTable>,
    relationships: &[SchemaRelationship],
) -> SchemaHealth {
    HealthAnalyzer::default().analyze(tables, relationships)
}

/// The health analyzer
#[derive(Debug, Clone, Default)]
pub struct HealthAnalyzer {
    config: AnalyzerConfig,
}

impl HealthAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Run every rule and compute the score
    pub fn analyze(
        &self,
        tables: &BTreeMap<String, SchemaTable>,
        relationships: &[SchemaRelationship],
    ) -> SchemaHealth {
        let mut log = WarningLog::new();

        let connected: HashSet<&str> = relationships
            .iter()
            .flat_map(|r| [r.from.as_str(), r.to.as_str()])
            .collect();

        for table in tables.values().filter(|t| !t.is_system) {
            if tables.len() > 1 {
                self.check_orphaned_table(table, &connected, &mut log);
            }
            self.check_no_schema(table, &mut log);
            self.check_wide_table(table, &mut log);
            self.check_missing_indexes(table, &mut log);
            self.check_redundant_indexes(table, &mut log);
            self.check_compound_index(table, &mut log);
            self.check_excessive_nesting(table, &mut log);
        }
        self.check_circular_dependencies(relationships, &mut log);

        let penalty: u32 = log
            .warnings
            .iter()
            .map(|w| self.config.weights.penalty(w.warning_type))
            .sum();
        let score = 100u32.saturating_sub(penalty);

        let index_count = tables.values().map(|t| t.indexes.len()).sum();

        info!(
            "Health analysis complete: score={}, warnings={}, tables={}",
            score,
            log.warnings.len(),
            tables.len()
        );

        SchemaHealth {
            score,
            warnings: log.warnings,
            table_count: tables.len(),
            relationship_count: relationships.len(),
            index_count,
        }
    }

    /// Rule: table neither references nor is referenced by another table
    fn check_orphaned_table(&self, table: &SchemaTable, connected: &HashSet<&str>, log: &mut WarningLog) {
        if connected.contains(table.name.as_str()) {
            return;
        }

        log.push(
            HealthWarning::new(
                HealthWarningType::OrphanedTable,
                format!("Table {} has no relationships with other tables", table.name),
            )
            .table(&table.name)
            .suggestion("Confirm the table is still in use, or link it with a v.id() reference")
            .impact("Isolated tables are often leftovers from removed features"),
        );
    }

    /// Rule: table has no typed document shape
    fn check_no_schema(&self, table: &SchemaTable, log: &mut WarningLog) {
        if !table.has_no_schema() {
            return;
        }

        log.push(
            HealthWarning::new(
                HealthWarningType::NoSchema,
                format!("Table {} has no document validator", table.name),
            )
            .table(&table.name)
            .suggestion("Declare the document shape with defineTable({ ... })")
            .impact("Documents are not validated and tooling cannot infer fields or relationships")
            .action(
                "Add a document validator",
                format!("{}: defineTable({{\n  // fields\n}}),", table.name),
                false,
            ),
        );
    }

    /// Rule: too many top-level fields
    fn check_wide_table(&self, table: &SchemaTable, log: &mut WarningLog) {
        let threshold = self.config.wide_table_threshold;
        if table.fields.len() <= threshold {
            return;
        }

        log.push(
            HealthWarning::new(
                HealthWarningType::WideTable,
                format!(
                    "Table {} has {} fields (more than {})",
                    table.name,
                    table.fields.len(),
                    threshold
                ),
            )
            .table(&table.name)
            .suggestion("Group related fields into nested objects or split them into a separate table")
            .impact("Wide documents are read and written whole, increasing bandwidth per query"),
        );
    }

    /// Rule: reference fields without an index
    fn check_missing_indexes(&self, table: &SchemaTable, log: &mut WarningLog) {
        for field in table.fields.iter().filter(|f| f.is_id()) {
            if table.indexes.iter().any(|i| i.covers(&field.name)) {
                continue;
            }

            let target = field.referenced_table().unwrap_or("another table");
            let index_name = format!("by_{}", field.name);
            log.push(
                HealthWarning::new(
                    HealthWarningType::MissingIndex,
                    format!(
                        "Field {}.{} references {} but is not indexed",
                        table.name, field.name, target
                    ),
                )
                .table(&table.name)
                .field(&field.name)
                .suggestion(format!("Add an index on {}", field.name))
                .impact(format!(
                    "Looking up {} rows by {} requires a full table scan",
                    table.name, field.name
                ))
                .action(
                    format!("Add index {} to {}", index_name, table.name),
                    format!(".index(\"{}\", [\"{}\"])", index_name, field.name),
                    true,
                ),
            );
        }
    }

    /// Rule: db index whose fields are a strict prefix of another db index
    fn check_redundant_indexes(&self, table: &SchemaTable, log: &mut WarningLog) {
        let db_indexes: Vec<_> = table.db_indexes().collect();

        for index in &db_indexes {
            let covering = db_indexes.iter().find(|other| {
                other.fields.len() > index.fields.len() && other.fields.starts_with(&index.fields)
            });
            let Some(covering) = covering else {
                continue;
            };

            log.push(
                HealthWarning::new(
                    HealthWarningType::RedundantIndex,
                    format!(
                        "Index {} on {} is a prefix of {} ({} ⊂ {})",
                        index.name,
                        table.name,
                        covering.name,
                        index.fields.join(", "),
                        covering.fields.join(", ")
                    ),
                )
                .table(&table.name)
                .suggestion(format!(
                    "Remove {} and query through {} instead",
                    index.name, covering.name
                ))
                .impact("Every redundant index adds write amplification and storage")
                .action(
                    format!("Remove index {}", index.name),
                    format!("// remove: .index(\"{}\", [{}])", index.name, quoted(&index.fields)),
                    false,
                ),
            );
        }
    }

    /// Heuristic: join-like table with several references and no compound index
    fn check_compound_index(&self, table: &SchemaTable, log: &mut WarningLog) {
        let id_fields: Vec<&str> = table
            .fields
            .iter()
            .filter(|f| f.is_id())
            .map(|f| f.name.as_str())
            .collect();
        if id_fields.len() < 2 {
            return;
        }

        let user_fields = table.fields.iter().filter(|f| !f.is_system()).count();
        if user_fields > self.config.join_table_max_fields {
            return;
        }

        let has_compound = table
            .indexes
            .iter()
            .any(|i| i.is_compound() && id_fields.iter().any(|f| i.covers(f)));
        if has_compound {
            return;
        }

        let pair = [id_fields[0].to_string(), id_fields[1].to_string()];
        let index_name = format!("by_{}_{}", pair[0], pair[1]);
        log.push(
            HealthWarning::new(
                HealthWarningType::CompoundIndexSuggestion,
                format!(
                    "Table {} looks like a join table between {} but has no compound index",
                    table.name,
                    id_fields.join(", ")
                ),
            )
            .table(&table.name)
            .suggestion(format!("Add a compound index on [{}]", pair.join(", ")))
            .impact("Membership checks on join tables need both references to be indexed together")
            .action(
                format!("Add index {}", index_name),
                format!(".index(\"{}\", [{}])", index_name, quoted(&pair)),
                true,
            ),
        );
    }

    /// Rule: validator nesting was cut at the depth limit
    fn check_excessive_nesting(&self, table: &SchemaTable, log: &mut WarningLog) {
        let Some(first) = table.truncated_fields.first() else {
            return;
        };

        log.push(
            HealthWarning::new(
                HealthWarningType::ExcessiveNesting,
                format!(
                    "Table {} nests validators deeper than {} levels at {}",
                    table.name,
                    self.config.max_depth,
                    table.truncated_fields.join(", ")
                ),
            )
            .table(&table.name)
            .field(first)
            .suggestion("Flatten the nested objects or move them into their own table")
            .impact("Fields beyond the nesting limit are treated as untyped"),
        );
    }

    /// Graph-wide rule: reference cycles between tables
    fn check_circular_dependencies(&self, relationships: &[SchemaRelationship], log: &mut WarningLog) {
        for cycle in find_cycles(relationships) {
            let path = cycle.join(" → ");
            log.push(
                HealthWarning::new(
                    HealthWarningType::CircularDependency,
                    format!("Circular dependency: {}", path),
                )
                .table(&cycle[0])
                .suggestion("Make one reference in the cycle optional so documents can be inserted in order")
                .impact("Cyclic references complicate inserts, deletes and data migrations"),
            );
        }
    }
}

fn quoted(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(", ")
}
