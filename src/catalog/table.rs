use std::collections::BTreeMap;

use tracing::debug;

use crate::{engine::Engine, types::TupleValueType};

use super::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDesc {
    pub name: String,
    pub data_type: TupleValueType,
}

impl ColumnDesc {
    pub fn new(name: &str, data_type: TupleValueType) -> ColumnDesc {
        ColumnDesc { name: name.to_string(), data_type }
    }
}

/// Physical column order of a table: regular columns first, then the partition key,
/// which is how partitioned DDL and the bulk copy expect them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub regular: Vec<ColumnDesc>,
    pub partition: Vec<ColumnDesc>,
}

impl Layout {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.regular.iter().chain(self.partition.iter()).map(|column| column.name.as_str())
    }

    pub fn create_statement(&self, table: &str) -> String {
        let definitions = |columns: &[ColumnDesc]| columns.iter()
            .map(|column| format!("{} {}", column.name, column.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        let mut statement = format!("CREATE TABLE {} ({})", table, definitions(&self.regular));
        if !self.partition.is_empty() {
            statement.push_str(&format!(" PARTITIONED BY ({})", definitions(&self.partition)));
        }
        statement.push_str(" ROW FORMAT DELIMITED FIELDS TERMINATED BY ','");
        statement
    }

    /// `INSERT OVERWRITE` copying every row of `source` into `target`. The projection follows
    /// this layout's column order exactly, otherwise values land in the wrong columns.
    pub fn copy_statement(&self, target: &str, source: &str) -> String {
        let mut statement = format!("INSERT OVERWRITE TABLE {}", target);
        if !self.partition.is_empty() {
            let keys: Vec<&str> = self.partition.iter().map(|column| column.name.as_str()).collect();
            statement.push_str(&format!(" PARTITION ({})", keys.join(", ")));
        }
        let projection: Vec<&str> = self.column_names().collect();
        statement.push_str(&format!(" SELECT {} FROM {}", projection.join(", "), source));
        statement
    }
}

/*
    A table as the advisor sees it. The declared columns never change. The partition key is
    kept as an ordered list of names over those columns, so a column is either regular or
    part of the key and never both. Regular columns are always listed in declared order.

    Cardinalities are per column and survive repartitioning (same values, other layout).
    They are only recomputed after a load.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDesc {
    pub name: String,
    columns: Vec<ColumnDesc>,
    partition_columns: Vec<String>,
    cardinalities: BTreeMap<String, u64>,
}

impl TableDesc {
    pub fn new(name: &str, columns: Vec<ColumnDesc>) -> Result<TableDesc, CatalogError> {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|other| other.name == column.name) {
                return Err(CatalogError::DuplicateColumn { table: name.to_string(), column: column.name.clone() });
            }
        }
        Ok(TableDesc { name: name.to_string(), columns, partition_columns: Vec::new(), cardinalities: BTreeMap::new() })
    }

    /// All columns in declared order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDesc> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn partition_column_names(&self) -> &[String] {
        &self.partition_columns
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partition_columns.is_empty()
    }

    pub fn cardinality(&self, column: &str) -> Option<u64> {
        self.cardinalities.get(column).copied()
    }

    pub fn cardinalities(&self) -> &BTreeMap<String, u64> {
        &self.cardinalities
    }

    pub fn set_cardinality(&mut self, column: &str, cardinality: u64) -> Result<(), CatalogError> {
        if !self.has_column(column) {
            return Err(CatalogError::ColumnNotFound { table: self.name.clone(), column: column.to_string() });
        }
        self.cardinalities.insert(column.to_string(), cardinality);
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        let regular = self.columns.iter()
            .filter(|column| !self.partition_columns.contains(&column.name))
            .cloned()
            .collect();
        let partition = self.partition_columns.iter()
            .filter_map(|name| self.column(name))
            .cloned()
            .collect();
        Layout { regular, partition }
    }

    /// The layout this table gets when `candidate` becomes its partition key.
    pub fn layout_for(&self, candidate: &[String]) -> Result<Layout, CatalogError> {
        let mut partition = Vec::with_capacity(candidate.len());
        for (i, name) in candidate.iter().enumerate() {
            let column = self.column(name)
                .ok_or_else(|| CatalogError::ColumnNotFound { table: self.name.clone(), column: name.clone() })?;
            if candidate[..i].contains(name) {
                return Err(CatalogError::DuplicateColumn { table: self.name.clone(), column: name.clone() });
            }
            partition.push(column.clone());
        }
        let regular = self.columns.iter()
            .filter(|column| !candidate.contains(&column.name))
            .cloned()
            .collect();
        Ok(Layout { regular, partition })
    }

    pub fn set_partition_columns(&mut self, candidate: &[String]) -> Result<(), CatalogError> {
        self.layout_for(candidate)?;
        self.partition_columns = candidate.to_vec();
        Ok(())
    }

    /// Probes `COUNT(DISTINCT c)` for every column. A probe returning no row counts as zero.
    pub fn compute_cardinalities<E: Engine + ?Sized>(&mut self, engine: &mut E) -> Result<(), CatalogError> {
        let names: Vec<String> = self.column_names().map(str::to_string).collect();
        for column in names {
            let query = format!("SELECT COUNT(DISTINCT {}) AS cardinality FROM {}", column, self.name);
            let result = engine.execute(&query)?;
            let cardinality = result.first_value()
                .and_then(|value| value.as_big_int())
                .map_or(0, |count| count.max(0) as u64);
            debug!(table = %self.name, column = %column, cardinality, "computed cardinality");
            self.cardinalities.insert(column, cardinality);
        }
        Ok(())
    }
}
