use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{advisor::{Algorithm, PartitionAdvisor}, catalog::{Catalog, ColumnFrequencies}, config::AdvisorConfig, engine::MemoryEngine, report::{JsonReportWriter, ReportConsumer, TextReportWriter}, workload::Workload};

mod types;
mod parser;
mod engine;
mod catalog;
mod workload;
mod advisor;
mod report;
mod config;

/// Picks partition columns for tables by measuring a workload under candidate layouts.
#[derive(Debug, Parser)]
#[command(name = "partition_advisor", version)]
struct Cli {
    /// Schema file: {"<table>": [["<column>", "<TYPE>"], ...]}
    #[arg(long)]
    schema: PathBuf,

    /// Column frequency file: {"<table>": {"<column>": <weight>}}
    #[arg(long)]
    frequencies: PathBuf,

    /// Workload file: a list of statements or {"<table>": [statements]}
    #[arg(long)]
    workload: PathBuf,

    /// Directory holding one <table>.csv per table
    #[arg(long)]
    data_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = Algorithm::Exhaustive)]
    algorithm: Algorithm,

    /// Only advise these tables (comma separated). Defaults to every table in the schema.
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,

    /// Largest admitted cardinality product. Overrides PARTITION_ADVISOR_MAX_PARTITION_PRODUCT.
    #[arg(long)]
    budget: Option<u64>,

    /// Size of the loaded data set in MiB, recorded in the report
    #[arg(long)]
    data_size: Option<f64>,

    /// Split a shared workload list by the table each statement names
    #[arg(long)]
    classify: bool,

    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write one text report per table below this directory
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides the default
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("partition_advisor=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = AdvisorConfig::new().with_budget(cli.budget);
    let catalog = Catalog::load_schema(&cli.schema)
        .with_context(|| format!("failed to load schema {}", cli.schema.display()))?;
    let frequencies = ColumnFrequencies::load(&cli.frequencies)
        .with_context(|| format!("failed to load column frequencies {}", cli.frequencies.display()))?;
    let mut workload = Workload::load(&cli.workload)
        .with_context(|| format!("failed to load workload {}", cli.workload.display()))?;
    if cli.classify {
        let tables: Vec<&str> = catalog.table_names().collect();
        workload = workload.classified(&tables[..]);
    }

    info!(
        budget = config.max_partition_product,
        max_dynamic_partitions = config.max_dynamic_partitions(),
        algorithm = cli.algorithm.identifier(),
        "starting partition advisor"
    );
    let mut advisor = PartitionAdvisor::new(MemoryEngine::new(), catalog, frequencies, workload, config);
    let report = advisor.run(&cli.tables, cli.algorithm, Some(&cli.data_dir), cli.data_size)
        .map_err(|e| {
            if e.is_precondition_violation() {
                error!("invalid input, nothing was measured for the failing table: {}", e);
            } else {
                error!("engine failure, aborting the run: {}", e);
            }
            e
        })?;
    for ledger in &report.ledgers {
        if let Some(best) = ledger.best() {
            info!(table = ledger.table(), partition_columns = ?best.columns, "best layout");
        }
    }

    match &cli.output {
        Some(path) => JsonReportWriter::create(path)
            .and_then(|mut writer| writer.consume(&report))
            .with_context(|| format!("failed to write report {}", path.display()))?,
        None => JsonReportWriter::new(std::io::stdout().lock()).consume(&report)?,
    }
    if let Some(directory) = cli.report_dir {
        TextReportWriter::new(directory).consume(&report)?;
    }
    info!(seconds = report.metadata.total_time_secs, tables = report.metadata.num_tables_processed, "done");
    Ok(())
}
