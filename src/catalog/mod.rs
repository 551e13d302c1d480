mod table;
mod frequency;

use std::{collections::BTreeMap, fs::File, io::{BufReader, Read}, path::Path};

use thiserror::Error;
use tracing::info;

use crate::{engine::{Engine, EngineError}, parser::parse_sql_type};

pub use self::{frequency::ColumnFrequencies, table::{ColumnDesc, Layout, TableDesc}};

/*
    Schema/cardinality registry. Tables are created from a schema file that lists every
    table's columns with their HiveQL types:

        { "orders": [["order_id", "INT"], ["order_date", "TIMESTAMP"], ...], ... }

    All columns start out regular. Installing a table into an engine drops whatever is there,
    recreates it, bulk loads `<data dir>/<table>.csv` and probes the cardinality of every
    column. Tables are kept (and processed) in name order.
 */

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown table {0}")]
    UnknownTable(String),
    #[error("table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },
    #[error("column {column} not found in table {table}")]
    ColumnNotFound { table: String, column: String },
    #[error("column {column} appears more than once in table {table}")]
    DuplicateColumn { table: String, column: String },
    #[error("no column frequencies recorded for table {0}")]
    MissingFrequencies(String),
    #[error("invalid type '{data_type}' for column {column} of table {table}")]
    InvalidType { table: String, column: String, data_type: String },
    #[error("malformed input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: BTreeMap<String, TableDesc>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    pub fn from_schema_reader<R: Read>(reader: R) -> Result<Catalog, CatalogError> {
        let schema: BTreeMap<String, Vec<(String, String)>> = serde_json::from_reader(reader)?;
        let mut catalog = Catalog::new();
        for (table, columns) in schema {
            let columns = columns.iter()
                .map(|(column, data_type)| {
                    let parsed = match parse_sql_type(data_type.trim()) {
                        Ok((rest, parsed)) if rest.trim().is_empty() => Some(parsed),
                        _ => None,
                    };
                    parsed.map(|parsed| ColumnDesc::new(column, parsed))
                        .ok_or_else(|| CatalogError::InvalidType { table: table.clone(), column: column.clone(), data_type: data_type.clone() })
                })
                .collect::<Result<Vec<_>, _>>()?;
            catalog.add_table(TableDesc::new(&table, columns)?);
        }
        Ok(catalog)
    }

    pub fn load_schema(path: &Path) -> Result<Catalog, CatalogError> {
        Self::from_schema_reader(BufReader::new(File::open(path)?))
    }

    pub fn add_table(&mut self, table: TableDesc) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Result<&TableDesc, CatalogError> {
        self.tables.get(name).ok_or_else(|| CatalogError::UnknownTable(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut TableDesc, CatalogError> {
        self.tables.get_mut(name).ok_or_else(|| CatalogError::UnknownTable(name.to_string()))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// (Re)creates `table` in the engine from its csv file and records its cardinalities.
    pub fn install_table<E: Engine + ?Sized>(&mut self, engine: &mut E, table: &str, data_dir: &Path) -> Result<(), CatalogError> {
        let desc = self.table_mut(table)?;
        desc.set_partition_columns(&[])?;
        let data_file = data_dir.join(format!("{}.csv", desc.name));
        engine.execute(&format!("DROP TABLE IF EXISTS {}", desc.name))?;
        engine.execute(&desc.layout().create_statement(&desc.name))?;
        engine.execute(&format!("LOAD DATA LOCAL INPATH '{}' OVERWRITE INTO TABLE {}", data_file.display(), desc.name))?;
        desc.compute_cardinalities(engine)?;
        info!(table = %desc.name, cardinalities = ?desc.cardinalities(), "installed table");
        Ok(())
    }
}
