use std::{collections::BTreeMap, fs::File, io::{BufReader, Read}, path::Path};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("no workload for table {0}")]
    MissingWorkload(String),
    #[error("malformed workload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only statements timed as one batch per measurement. Statements are opaque text here,
/// the engine decides what it accepts (see [`crate::engine::MemoryEngine`] for the bundled dialect).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Workload {
    /// One sequence run for every table.
    Shared(Vec<String>),
    PerTable(BTreeMap<String, Vec<String>>),
}

impl Workload {
    pub fn from_reader<R: Read>(reader: R) -> Result<Workload, WorkloadError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load(path: &Path) -> Result<Workload, WorkloadError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn statements_for(&self, table: &str) -> Result<&[String], WorkloadError> {
        match self {
            Workload::Shared(statements) => Ok(statements),
            Workload::PerTable(tables) => tables.get(table)
                .map(Vec::as_slice)
                .ok_or_else(|| WorkloadError::MissingWorkload(table.to_string())),
        }
    }

    /// Splits a shared sequence by table. Each statement goes to the first of `tables` that
    /// appears in it as a whitespace separated token. Statements naming no table are dropped.
    pub fn classify<S: AsRef<str>>(statements: &[String], tables: &[S]) -> Workload {
        let names: Vec<&str> = tables.iter().map(AsRef::<str>::as_ref).collect();
        let mut classes: BTreeMap<String, Vec<String>> = names.iter()
            .map(|table| (table.to_string(), Vec::new()))
            .collect();
        for statement in statements {
            let owner = names.iter()
                .copied()
                .find(|table| statement.split_whitespace().any(|token| token == *table));
            if let Some(owner) = owner {
                if let Some(class) = classes.get_mut(owner) {
                    class.push(statement.clone());
                }
            }
        }
        Workload::PerTable(classes)
    }

    /// A shared workload split by `tables`. Per-table workloads are returned unchanged.
    pub fn classified<S: AsRef<str>>(self, tables: &[S]) -> Workload {
        match self {
            Workload::Shared(statements) => Workload::classify(&statements, tables),
            per_table => per_table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_shared_and_per_table() {
        let shared = Workload::from_reader(r#"["SELECT * FROM orders", "SELECT * FROM users"]"#.as_bytes()).unwrap();
        assert_eq!(shared.statements_for("anything").unwrap().len(), 2);

        let per_table = Workload::from_reader(r#"{"orders": ["SELECT COUNT(*) FROM orders"]}"#.as_bytes()).unwrap();
        assert_eq!(per_table.statements_for("orders").unwrap(), &["SELECT COUNT(*) FROM orders".to_string()]);
        assert!(matches!(per_table.statements_for("users"), Err(WorkloadError::MissingWorkload(_))));

        assert!(matches!(Workload::from_reader("42".as_bytes()), Err(WorkloadError::Json(_))));
    }

    #[test]
    fn test_classify() {
        let statements = vec![
            "SELECT * FROM orders WHERE user_id = 1".to_string(),
            "SELECT COUNT(*) FROM users".to_string(),
            "SELECT * FROM orders_archive".to_string(),
            "SELECT o.user_id FROM orders o JOIN users u ON o.user_id = u.user_id".to_string(),
            "SELECT 1".to_string(),
        ];
        let classified = Workload::classify(&statements, &["users", "orders"]);
        assert_eq!(classified.statements_for("users").unwrap(), &[statements[1].clone(), statements[3].clone()]);
        assert_eq!(classified.statements_for("orders").unwrap(), &[statements[0].clone()]);

        let unchanged = classified.clone().classified(&["products"]);
        assert_eq!(unchanged, classified);
    }
}
