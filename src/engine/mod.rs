/*
    The storage/query engine the advisor drives. The advisor only ever holds one session and
    talks to it in statement text, the same way it would talk to a HiveServer2 cursor: DDL to
    rebuild tables, bulk INSERT ... SELECT to move rows between layouts and plain queries for
    the workload and the cardinality probes.

    MemoryEngine is the bundled implementation. It keeps every table in process memory and
    buckets rows by their partition key, so partition pruning and the dynamic partition cap
    behave like the real thing on a small scale.
 */

pub mod memory;
mod executor;

#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::{parser::SyntaxError, types::{Tuple, TupleValueConversionError}};

pub use self::memory::MemoryEngine;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("table {0} not found")]
    TableNotFound(String),
    #[error("table {0} already exists")]
    TableAlreadyExists(String),
    #[error("column {column} not found in table {table}")]
    ColumnNotFound { table: String, column: String },
    #[error("duplicate column {column} in table {table}")]
    DuplicateColumn { table: String, column: String },
    #[error("expected {expected} values per row but got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },
    #[error("partition specification {actual:?} does not match the partition columns {expected:?} of table {table}")]
    PartitionSpecMismatch { table: String, expected: Vec<String>, actual: Vec<String> },
    #[error("number of dynamic partitions created is {created}, which is more than {max}")]
    TooManyDynamicPartitions { created: usize, max: usize },
    #[error("invalid value in {location}: {source}")]
    InvalidValue { location: String, source: TupleValueConversionError },
    #[error("invalid value '{value}' for setting {key}")]
    InvalidSetting { key: String, value: String },
    #[error("unsupported statement: {0}")]
    Unsupported(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rows returned by a statement. DDL and DML return an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Tuple>,
}

impl QueryResult {
    pub fn empty() -> QueryResult {
        QueryResult::default()
    }

    pub fn first_value(&self) -> Option<&crate::types::TupleValue> {
        self.rows.first()
            .and_then(|row| row.values.first())
            .and_then(|value| value.as_ref())
    }
}

/// One exclusive session against a storage engine.
#[cfg_attr(test, automock)]
pub trait Engine {
    fn execute(&mut self, statement: &str) -> Result<QueryResult, EngineError>;
}
