use std::{collections::BTreeMap, fs::File, io::{BufReader, Read}, path::Path};

use serde::Deserialize;

use super::{table::TableDesc, CatalogError};

/// How often each column shows up in the filter, join and group clauses of a table's workload.
/// Only biases the order in which candidates are generated.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ColumnFrequencies {
    tables: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ColumnFrequencies {
    pub fn from_reader<R: Read>(reader: R) -> Result<ColumnFrequencies, CatalogError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load(path: &Path) -> Result<ColumnFrequencies, CatalogError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn insert(&mut self, table: &str, column: &str, weight: f64) {
        self.tables.entry(table.to_string()).or_default().insert(column.to_string(), weight);
    }

    /// Fails when the table has no entry or an entry names a column the table does not have.
    pub fn validate(&self, table: &TableDesc) -> Result<&BTreeMap<String, f64>, CatalogError> {
        let weights = self.tables.get(&table.name)
            .ok_or_else(|| CatalogError::MissingFrequencies(table.name.clone()))?;
        if let Some(column) = weights.keys().find(|column| !table.has_column(column)) {
            return Err(CatalogError::UnknownColumn { table: table.name.clone(), column: column.clone() });
        }
        Ok(weights)
    }

    /// Columns with a recorded weight, heaviest first. Equal weights keep declared column order.
    pub fn ranked_columns(&self, table: &TableDesc) -> Result<Vec<String>, CatalogError> {
        let weights = self.validate(table)?;
        let mut ranked: Vec<(&str, f64)> = table.column_names()
            .filter_map(|column| weights.get(column).map(|weight| (column, *weight)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked.into_iter().map(|(column, _)| column.to_string()).collect())
    }

    /// Columns with a recorded weight in declared column order.
    pub fn recorded_columns(&self, table: &TableDesc) -> Result<Vec<String>, CatalogError> {
        let weights = self.validate(table)?;
        Ok(table.column_names()
            .filter(|column| weights.contains_key(*column))
            .map(str::to_string)
            .collect())
    }
}
