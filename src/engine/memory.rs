use std::fs;

use ahash::{AHashMap, AHashSet};
use tracing::trace;

use crate::{parser::{parse_statement, ColumnDefinition, CreateTableStatement, InsertOverwriteStatement, LoadDataStatement, Statement}, types::{Tuple, TupleValue, TupleValueType}};

use super::{executor, Engine, EngineError, QueryResult};

const MAX_DYNAMIC_PARTITIONS: &str = "hive.exec.max.dynamic.partitions";
const MAX_DYNAMIC_PARTITIONS_PER_NODE: &str = "hive.exec.max.dynamic.partitions.pernode";
const DYNAMIC_PARTITION: &str = "hive.exec.dynamic.partition";
const DYNAMIC_PARTITION_MODE: &str = "hive.exec.dynamic.partition.mode";

// Hive ships with ^A as field separator when no row format is given
const DEFAULT_FIELD_DELIMITER: char = '\u{1}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ColumnDef {
    pub(super) name: String,
    pub(super) column_type: TupleValueType,
}

impl ColumnDef {
    pub(super) fn new(name: &str, column_type: TupleValueType) -> ColumnDef {
        ColumnDef { name: name.to_string(), column_type }
    }
}

/// All rows sharing one value combination of the partition columns.
#[derive(Debug)]
pub(super) struct Partition {
    pub(super) key: Vec<Option<TupleValue>>,
    pub(super) rows: Vec<Tuple>,
}

/// Rows only store the regular columns, the partition columns live in the bucket key.
/// Unpartitioned tables keep a single bucket with an empty key.
#[derive(Debug)]
pub(super) struct StoredTable {
    pub(super) name: String,
    pub(super) columns: Vec<ColumnDef>,
    pub(super) partition_columns: Vec<ColumnDef>,
    pub(super) field_delimiter: char,
    pub(super) partitions: Vec<Partition>,
    index: AHashMap<Vec<Option<TupleValue>>, usize>,
}

impl StoredTable {
    pub(super) fn new(name: String, columns: Vec<ColumnDef>, partition_columns: Vec<ColumnDef>, field_delimiter: char) -> StoredTable {
        StoredTable { name, columns, partition_columns, field_delimiter, partitions: Vec::new(), index: AHashMap::new() }
    }

    pub(super) fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter()
            .chain(self.partition_columns.iter())
            .map(|column| column.name.as_str())
    }

    pub(super) fn column_position(&self, name: &str) -> Option<usize> {
        self.column_names().position(|column| column.eq_ignore_ascii_case(name))
    }

    pub(super) fn column_type(&self, position: usize) -> Option<TupleValueType> {
        self.columns.iter()
            .chain(self.partition_columns.iter())
            .nth(position)
            .map(|column| column.column_type)
    }

    pub(super) fn width(&self) -> usize {
        self.columns.len() + self.partition_columns.len()
    }

    /// Takes a full logical row (regular columns followed by partition columns).
    pub(super) fn insert_row(&mut self, mut values: Vec<Option<TupleValue>>) {
        let key = values.split_off(self.columns.len());
        let position = match self.index.get(&key) {
            Some(position) => *position,
            None => {
                self.partitions.push(Partition { key: key.clone(), rows: Vec::new() });
                self.index.insert(key, self.partitions.len() - 1);
                self.partitions.len() - 1
            }
        };
        self.partitions[position].rows.push(Tuple::new(values));
    }

    fn clear(&mut self) {
        self.partitions.clear();
        self.index.clear();
    }

    pub(super) fn row_count(&self) -> usize {
        self.partitions.iter().map(|partition| partition.rows.len()).sum()
    }
}

fn column_defs(columns: &[ColumnDefinition]) -> Vec<ColumnDef> {
    columns.iter()
        .map(|column| ColumnDef::new(column.name, column.column_type))
        .collect()
}

/// Single-session engine holding every table in memory.
///
/// Queries are limited to single-table `SELECT`s with `COUNT(*)`, `COUNT(DISTINCT ..)`,
/// `WHERE`, `GROUP BY` and `LIMIT`. Joins, `ORDER BY`, `SUM` and `AVG` fail with a syntax
/// error, so workloads using them need an engine implementation talking to a real warehouse.
#[derive(Debug)]
pub struct MemoryEngine {
    tables: AHashMap<String, StoredTable>,
    settings: AHashMap<String, String>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> MemoryEngine {
        let settings = [
            (DYNAMIC_PARTITION, "true"),
            (DYNAMIC_PARTITION_MODE, "strict"),
            (MAX_DYNAMIC_PARTITIONS, "1000"),
            (MAX_DYNAMIC_PARTITIONS_PER_NODE, "100"),
        ].into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        MemoryEngine { tables: AHashMap::new(), settings }
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_ascii_lowercase())
    }

    /// Number of partitions currently holding rows in `table`.
    pub fn partition_count(&self, table: &str) -> Option<usize> {
        self.tables.get(&table.to_ascii_lowercase())
            .map(|table| table.partitions.iter().filter(|partition| !partition.rows.is_empty()).count())
    }

    fn table(&self, name: &str) -> Result<&StoredTable, EngineError> {
        self.tables.get(&name.to_ascii_lowercase()).ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut StoredTable, EngineError> {
        self.tables.get_mut(&name.to_ascii_lowercase()).ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    fn numeric_setting(&self, key: &str) -> usize {
        // Values are validated on SET, the defaults are always present
        self.setting(key).and_then(|value| value.parse().ok()).unwrap_or(usize::MAX)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), EngineError> {
        let key = key.to_ascii_lowercase();
        let valid = match key.as_str() {
            MAX_DYNAMIC_PARTITIONS | MAX_DYNAMIC_PARTITIONS_PER_NODE => value.parse::<usize>().map_or(false, |v| v > 0),
            DYNAMIC_PARTITION => value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false"),
            DYNAMIC_PARTITION_MODE => value.eq_ignore_ascii_case("strict") || value.eq_ignore_ascii_case("nonstrict"),
            _ => true,
        };
        if !valid {
            return Err(EngineError::InvalidSetting { key, value: value.to_string() });
        }
        self.settings.insert(key, value.to_ascii_lowercase());
        Ok(())
    }

    fn create_table(&mut self, statement: &CreateTableStatement) -> Result<(), EngineError> {
        if self.has_table(statement.name) {
            return Err(EngineError::TableAlreadyExists(statement.name.to_string()));
        }
        let table = StoredTable::new(
            statement.name.to_string(),
            column_defs(&statement.columns),
            column_defs(&statement.partitioned_by),
            statement.field_delimiter.unwrap_or(DEFAULT_FIELD_DELIMITER),
        );
        let names: Vec<&str> = table.column_names().collect();
        for (i, name) in names.iter().enumerate() {
            if names[..i].iter().any(|other| other.eq_ignore_ascii_case(name)) {
                return Err(EngineError::DuplicateColumn { table: statement.name.to_string(), column: name.to_string() });
            }
        }
        self.tables.insert(statement.name.to_ascii_lowercase(), table);
        Ok(())
    }

    fn drop_table(&mut self, name: &str, if_exists: bool) -> Result<(), EngineError> {
        match self.tables.remove(&name.to_ascii_lowercase()) {
            Some(_) => Ok(()),
            None if if_exists => Ok(()),
            None => Err(EngineError::TableNotFound(name.to_string())),
        }
    }

    fn rename_table(&mut self, from: &str, to: &str) -> Result<(), EngineError> {
        if self.has_table(to) {
            return Err(EngineError::TableAlreadyExists(to.to_string()));
        }
        let mut table = self.tables.remove(&from.to_ascii_lowercase())
            .ok_or_else(|| EngineError::TableNotFound(from.to_string()))?;
        table.name = to.to_string();
        self.tables.insert(to.to_ascii_lowercase(), table);
        Ok(())
    }

    fn load_data(&mut self, statement: &LoadDataStatement) -> Result<(), EngineError> {
        let path = statement.path.strip_prefix("file://").unwrap_or(statement.path);
        let table = self.table_mut(statement.table)?;
        if !table.partition_columns.is_empty() {
            return Err(EngineError::Unsupported(format!("LOAD DATA into partitioned table {} needs a static partition", table.name)));
        }
        let content = fs::read_to_string(path)?;
        let mut rows = Vec::new();
        for (line_number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(table.field_delimiter).collect();
            if fields.len() != table.columns.len() {
                return Err(EngineError::ColumnCountMismatch { expected: table.columns.len(), actual: fields.len() });
            }
            let values = fields.iter()
                .zip(table.columns.iter())
                .map(|(field, column)| column.column_type.parse_field(field)
                    .map_err(|source| EngineError::InvalidValue { location: format!("{}:{}", path, line_number + 1), source }))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(values);
        }
        if statement.overwrite {
            table.clear();
        }
        trace!(table = %table.name, rows = rows.len(), "loaded rows from {}", path);
        for values in rows {
            table.insert_row(values);
        }
        Ok(())
    }

    fn insert_overwrite(&mut self, statement: &InsertOverwriteStatement) -> Result<(), EngineError> {
        let target = self.table(statement.table)?;
        let expected: Vec<String> = target.partition_columns.iter().map(|column| column.name.clone()).collect();
        let spec_matches = expected.len() == statement.partition_columns.len()
            && expected.iter().zip(statement.partition_columns.iter()).all(|(a, b)| a.eq_ignore_ascii_case(b));
        if !spec_matches {
            return Err(EngineError::PartitionSpecMismatch {
                table: target.name.clone(),
                expected,
                actual: statement.partition_columns.iter().map(|c| c.to_string()).collect(),
            });
        }
        if !statement.partition_columns.is_empty() {
            if self.setting(DYNAMIC_PARTITION) != Some("true") {
                return Err(EngineError::Unsupported("dynamic partitions are disabled".to_string()));
            }
            if self.setting(DYNAMIC_PARTITION_MODE) != Some("nonstrict") {
                return Err(EngineError::Unsupported("dynamic partition strict mode requires at least one static partition column".to_string()));
            }
        }
        let width = target.width();

        let source = self.table(statement.select.from_table.name)?;
        let rows = executor::execute_copy(source, &statement.select)?;
        if let Some(row) = rows.iter().find(|row| row.values.len() != width) {
            return Err(EngineError::ColumnCountMismatch { expected: width, actual: row.values.len() });
        }

        let key_start = width - statement.partition_columns.len();
        let created = rows.iter()
            .map(|row| &row.values[key_start..])
            .collect::<AHashSet<&[Option<TupleValue>]>>()
            .len();
        let max = self.numeric_setting(MAX_DYNAMIC_PARTITIONS).min(self.numeric_setting(MAX_DYNAMIC_PARTITIONS_PER_NODE));
        if created > max {
            return Err(EngineError::TooManyDynamicPartitions { created, max });
        }

        let target = self.table_mut(statement.table)?;
        target.clear();
        for row in rows {
            target.insert_row(row.values);
        }
        trace!(table = %target.name, partitions = target.partitions.len(), rows = target.row_count(), "overwrote table");
        Ok(())
    }
}

impl Engine for MemoryEngine {
    fn execute(&mut self, statement: &str) -> Result<QueryResult, EngineError> {
        trace!("executing: {}", statement);
        match parse_statement(statement)? {
            Statement::Set { key, value } => self.set(key, value)?,
            Statement::CreateTable(create) => self.create_table(&create)?,
            Statement::DropTable { name, if_exists } => self.drop_table(name, if_exists)?,
            Statement::RenameTable { from, to } => self.rename_table(from, to)?,
            Statement::LoadData(load) => self.load_data(&load)?,
            Statement::InsertOverwrite(insert) => self.insert_overwrite(&insert)?,
            Statement::Select(select) => {
                let table = self.table(select.from_table.name)?;
                return executor::execute_select(table, &select);
            },
        }
        Ok(QueryResult::empty())
    }
}
