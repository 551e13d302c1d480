use std::{fs::{self, File}, io::{BufWriter, Write}, path::PathBuf, time::Duration};

use serde::{ser::SerializeMap, Serialize, Serializer};
use thiserror::Error;

use crate::advisor::Ledger;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub data_size_mib: Option<f64>,
    pub total_time_secs: f64,
    pub algorithm: String,
    pub num_tables_processed: usize,
    pub total_tables_available: usize,
    pub timestamp: String,
}

impl RunMetadata {
    pub fn new(data_size_mib: Option<f64>, total_time: Duration, algorithm: &str, num_tables_processed: usize, total_tables_available: usize) -> RunMetadata {
        RunMetadata {
            data_size_mib,
            total_time_secs: total_time.as_secs_f64(),
            algorithm: algorithm.to_string(),
            num_tables_processed,
            total_tables_available,
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Ledgers of every table the run finished, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub ledgers: Vec<Ledger>,
}

pub trait ReportConsumer {
    fn consume(&mut self, report: &RunReport) -> Result<(), ReportError>;
}

#[derive(Serialize)]
struct ReportRow<'a> {
    partition_columns: &'a [String],
    execution_time_secs: Option<f64>,
    cardinality_product: u64,
    time_difference_percent: Option<f64>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a RunMetadata,
    tables: LedgerTables<'a>,
}

/// Ledgers keyed by table name, in processing order.
struct LedgerTables<'a>(&'a [Ledger]);

impl Serialize for LedgerTables<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for ledger in self.0 {
            map.serialize_entry(ledger.table(), &rows(ledger))?;
        }
        map.end()
    }
}

fn rows(ledger: &Ledger) -> Vec<ReportRow<'_>> {
    ledger.evaluations().iter()
        .map(|evaluation| ReportRow {
            partition_columns: &evaluation.columns,
            execution_time_secs: evaluation.execution_time().map(|time| time.as_secs_f64()),
            cardinality_product: evaluation.cardinality_product,
            time_difference_percent: ledger.time_difference_percent(evaluation),
        })
        .collect()
}

/// Writes `{ "metadata": ..., "tables": { "<table>": [rows] } }`.
pub struct JsonReportWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonReportWriter<W> {
    pub fn new(writer: W) -> JsonReportWriter<W> {
        JsonReportWriter { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonReportWriter<BufWriter<File>> {
    pub fn create(path: &std::path::Path) -> Result<Self, ReportError> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ReportConsumer for JsonReportWriter<W> {
    fn consume(&mut self, report: &RunReport) -> Result<(), ReportError> {
        let report_json = JsonReport { metadata: &report.metadata, tables: LedgerTables(&report.ledgers) };
        serde_json::to_writer_pretty(&mut self.writer, &report_json)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// One plain text table per ledger under `<directory>/<algorithm>/<table>_report.txt`.
pub struct TextReportWriter {
    directory: PathBuf,
}

impl TextReportWriter {
    pub fn new(directory: PathBuf) -> TextReportWriter {
        TextReportWriter { directory }
    }

    fn render(ledger: &Ledger, algorithm: &str) -> String {
        let mut text = format!("{} results for table {} (sorted by execution time):\n", algorithm, ledger.table());
        text.push_str(&format!("{:<30} {:<20} {:<25} {}\n", "Partition Columns", "Execution Time (s)", "Cardinality Product", "Time Difference (%)"));
        text.push_str(&format!("{}\n", "-".repeat(80)));
        for row in rows(ledger) {
            let columns = format!("[{}]", row.partition_columns.join(", "));
            let time = row.execution_time_secs.map_or("inf".to_string(), |secs| format!("{:.4}", secs));
            let difference = row.time_difference_percent.map_or("-".to_string(), |percent| format!("{:.2}", percent));
            text.push_str(&format!("{:<30} {:<20} {:<25} {}\n", columns, time, row.cardinality_product, difference));
        }
        text
    }
}

impl ReportConsumer for TextReportWriter {
    fn consume(&mut self, report: &RunReport) -> Result<(), ReportError> {
        let directory = self.directory.join(&report.metadata.algorithm);
        fs::create_dir_all(&directory)?;
        for ledger in &report.ledgers {
            let path = directory.join(format!("{}_report.txt", ledger.table()));
            fs::write(path, Self::render(ledger, &report.metadata.algorithm))?;
        }
        Ok(())
    }
}
