//! Static table descriptors: what each target table is loaded from, how its
//! cells are coerced, how records are completed, and in which order tables run.

pub mod branches;
pub mod tables;

pub use tables::TABLES;

use crate::decode::{ColumnRule, TypedRecord};
use std::collections::HashSet;
use thiserror::Error;

/// Where a table's records come from.
#[derive(Clone, Copy)]
pub enum Source {
    /// A CSV file relative to the source directory.
    Csv(&'static str),
    /// Small reference data compiled into the binary.
    Embedded(fn() -> Vec<TypedRecord>),
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Csv(file) => write!(f, "Csv({})", file),
            Source::Embedded(_) => f.write_str("Embedded"),
        }
    }
}

/// Whether a missing source file ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

/// What a rejected upsert means for the run. Missing relations are fatal
/// regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorPolicy {
    Fatal,
    /// Logged as a warning; the run continues.
    Warn,
}

/// A row in another, already-loaded table, found by natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub table: &'static str,
    pub key_column: &'static str,
    pub key: &'static str,
    pub id_column: &'static str,
}

/// Post-decode completion applied to every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Replace a null or empty cell with a fixed text value.
    FillEmpty {
        column: &'static str,
        value: &'static str,
    },
    /// Stamp the referenced row's identity into `column` when the record has
    /// no value of its own. A missing reference stamps null.
    StampReference {
        column: &'static str,
        reference: Reference,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TableDescriptor {
    pub name: &'static str,
    pub source: Source,
    pub policy: &'static [ColumnRule],
    pub derivations: &'static [Derivation],
    pub conflict_key: &'static str,
    pub requirement: Requirement,
    pub on_store_error: StoreErrorPolicy,
    /// Tables that must be loaded earlier in the sequence.
    pub depends_on: &'static [&'static str],
}

impl TableDescriptor {
    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }

    fn declares(&self, column: &str) -> bool {
        self.policy.iter().any(|r| r.name == column)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("table `{0}` is declared more than once")]
    DuplicateTable(String),
    #[error("table `{table}` declares column `{column}` more than once")]
    DuplicateColumn { table: String, column: String },
    #[error("table `{table}` uses conflict key `{key}` which is not a declared column")]
    UnknownConflictKey { table: String, key: String },
    #[error("table `{table}` depends on `{dependency}`, which is not loaded before it")]
    DependencyOrder { table: String, dependency: String },
    #[error("table `{table}` derives undeclared column `{column}`")]
    UnknownDerivedColumn { table: String, column: String },
}

/// Check a table sequence once, before anything is loaded.
pub fn validate(tables: &[TableDescriptor]) -> Result<(), CatalogError> {
    let mut loaded: HashSet<&str> = HashSet::new();

    for table in tables {
        if loaded.contains(table.name) {
            return Err(CatalogError::DuplicateTable(table.name.to_string()));
        }

        let mut columns = HashSet::new();
        for rule in table.policy {
            if !columns.insert(rule.name) {
                return Err(CatalogError::DuplicateColumn {
                    table: table.name.to_string(),
                    column: rule.name.to_string(),
                });
            }
        }

        if !table.declares(table.conflict_key) {
            return Err(CatalogError::UnknownConflictKey {
                table: table.name.to_string(),
                key: table.conflict_key.to_string(),
            });
        }

        for dep in table.depends_on {
            if !loaded.contains(dep) {
                return Err(CatalogError::DependencyOrder {
                    table: table.name.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }

        for derivation in table.derivations {
            let column = match derivation {
                Derivation::FillEmpty { column, .. } => column,
                Derivation::StampReference { column, reference } => {
                    if !loaded.contains(reference.table) {
                        return Err(CatalogError::DependencyOrder {
                            table: table.name.to_string(),
                            dependency: reference.table.to_string(),
                        });
                    }
                    column
                }
            };
            if !table.declares(column) {
                return Err(CatalogError::UnknownDerivedColumn {
                    table: table.name.to_string(),
                    column: column.to_string(),
                });
            }
        }

        loaded.insert(table.name);
    }

    Ok(())
}

/// CSV file names claimed by the catalog.
pub fn source_files(tables: &[TableDescriptor]) -> Vec<&'static str> {
    tables
        .iter()
        .filter_map(|t| match t.source {
            Source::Csv(file) => Some(file),
            Source::Embedded(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Coercion;

    const ID_ONLY: &[ColumnRule] = &[ColumnRule::new("id", Coercion::Integer)];

    fn table(name: &'static str, depends_on: &'static [&'static str]) -> TableDescriptor {
        TableDescriptor {
            name,
            source: Source::Csv("x.csv"),
            policy: ID_ONLY,
            derivations: &[],
            conflict_key: "id",
            requirement: Requirement::Required,
            on_store_error: StoreErrorPolicy::Fatal,
            depends_on,
        }
    }

    #[test]
    fn shipped_catalog_is_valid() {
        assert_eq!(validate(TABLES), Ok(()));
    }

    #[test]
    fn branches_load_before_orders() {
        let pos = |name: &str| TABLES.iter().position(|t| t.name == name).unwrap();
        assert!(pos("branches") < pos("orders"));
        assert!(pos("orders") < pos("products"));
    }

    #[test]
    fn rejects_duplicate_tables() {
        let tables = [table("a", &[]), table("a", &[])];
        assert_eq!(
            validate(&tables),
            Err(CatalogError::DuplicateTable("a".into()))
        );
    }

    #[test]
    fn rejects_dependency_loaded_later() {
        let tables = [table("orders", &["branches"]), table("branches", &[])];
        assert_eq!(
            validate(&tables),
            Err(CatalogError::DependencyOrder {
                table: "orders".into(),
                dependency: "branches".into()
            })
        );
    }

    #[test]
    fn rejects_undeclared_conflict_key() {
        let mut t = table("a", &[]);
        t.conflict_key = "slug";
        assert!(matches!(
            validate(&[t]),
            Err(CatalogError::UnknownConflictKey { .. })
        ));
    }

    #[test]
    fn rejects_reference_to_unloaded_table() {
        let mut t = table("orders", &[]);
        t.derivations = &[Derivation::StampReference {
            column: "id",
            reference: Reference {
                table: "branches",
                key_column: "slug",
                key: "x",
                id_column: "id",
            },
        }];
        assert!(matches!(
            validate(&[t]),
            Err(CatalogError::DependencyOrder { .. })
        ));
    }

    #[test]
    fn lists_csv_sources_only() {
        let files = source_files(TABLES);
        assert!(files.contains(&"orders.csv"));
        assert_eq!(files.len(), TABLES.len() - 1);
    }
}
