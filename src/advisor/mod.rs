mod budget;
mod cost;
mod ledger;
mod repartition;
mod strategy;

use std::{path::Path, time::Instant};

use clap::ValueEnum;
use thiserror::Error;
use tracing::{info, info_span};

use crate::{catalog::{Catalog, CatalogError, ColumnFrequencies}, config::AdvisorConfig, engine::{Engine, EngineError}, report::{RunMetadata, RunReport}, workload::{Workload, WorkloadError}};

pub use self::{budget::BudgetGate, cost::WorkloadCost, ledger::{Cost, Evaluation, Ledger}, repartition::Repartitioner, strategy::{ExhaustiveTopK, GreedyForward, SearchContext, Strategy}};

/*
    The advisor drives one engine session through a run:

        prepare the session (dynamic partition settings sized to the budget)
        install every table of the schema and record their cardinalities
        validate schema, frequencies, cardinalities and workload of every requested table
        search each table with the chosen strategy, one measurement at a time

    Every measurement rebuilds the table that the next measurement reads, so nothing here
    runs concurrently. A failure aborts the run and the ledger of the table being searched
    is dropped.
 */

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("column {column} of table {table} has no recorded cardinality")]
    UnknownColumn { table: String, column: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Workload(#[from] WorkloadError),
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),
}

impl AdvisorError {
    /// Caller or input mistakes, as opposed to failures reported by the engine.
    pub fn is_precondition_violation(&self) -> bool {
        !matches!(self,
            AdvisorError::Engine(_)
            | AdvisorError::Catalog(CatalogError::Engine(_) | CatalogError::Io(_))
            | AdvisorError::Workload(WorkloadError::Io(_)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// Exhaustive search over the top 3 most frequent columns
    #[value(alias = "1")]
    Exhaustive,
    /// Greedy forward selection
    #[value(alias = "2")]
    Greedy,
}

impl Algorithm {
    pub fn identifier(&self) -> &'static str {
        match self {
            Algorithm::Exhaustive => "algorithm_1",
            Algorithm::Greedy => "algorithm_2",
        }
    }

    pub fn strategy(&self) -> Box<dyn Strategy> {
        match self {
            Algorithm::Exhaustive => Box::new(ExhaustiveTopK),
            Algorithm::Greedy => Box::new(GreedyForward),
        }
    }
}

pub struct PartitionAdvisor<E: Engine> {
    engine: E,
    catalog: Catalog,
    frequencies: ColumnFrequencies,
    workload: Workload,
    config: AdvisorConfig,
    repartitioner: Repartitioner,
}

impl<E: Engine> PartitionAdvisor<E> {
    pub fn new(engine: E, catalog: Catalog, frequencies: ColumnFrequencies, workload: Workload, config: AdvisorConfig) -> PartitionAdvisor<E> {
        PartitionAdvisor { engine, catalog, frequencies, workload, config, repartitioner: Repartitioner::new() }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Lets the engine create as many dynamic partitions as the budget admits plus some slack.
    pub fn prepare_session(&mut self) -> Result<(), AdvisorError> {
        let cap = self.config.max_dynamic_partitions();
        let settings = [
            ("hive.exec.dynamic.partition", "true".to_string()),
            ("hive.exec.dynamic.partition.mode", "nonstrict".to_string()),
            ("hive.exec.max.dynamic.partitions", cap.to_string()),
            ("hive.exec.max.dynamic.partitions.pernode", cap.to_string()),
        ];
        for (key, value) in settings {
            self.engine.execute(&format!("SET {}={}", key, value))?;
        }
        Ok(())
    }

    pub fn install(&mut self, tables: &[String], data_dir: &Path) -> Result<(), AdvisorError> {
        for table in tables {
            self.catalog.install_table(&mut self.engine, table, data_dir)?;
        }
        Ok(())
    }

    /// Checks every input a search of `tables` needs before anything is measured.
    pub fn validate(&self, tables: &[String]) -> Result<(), AdvisorError> {
        for table in tables {
            let desc = self.catalog.table(table)?;
            for column in self.frequencies.recorded_columns(desc)? {
                if desc.cardinality(&column).is_none() {
                    return Err(AdvisorError::UnknownColumn { table: table.clone(), column });
                }
            }
            self.workload.statements_for(table)?;
        }
        Ok(())
    }

    pub fn advise_table(&mut self, table: &str, strategy: &dyn Strategy) -> Result<Ledger, AdvisorError> {
        let desc = self.catalog.table_mut(table)?;
        let statements = self.workload.statements_for(table)?;
        let gate = self.config.gate();
        let mut cost = WorkloadCost::new(&mut self.engine, statements, &mut self.repartitioner);
        let ledger = strategy.search(desc, &self.frequencies, SearchContext::new(&gate, &mut cost))?;
        if let Some(best) = ledger.best() {
            info!(
                table,
                partition_columns = ?best.columns,
                seconds = best.execution_time().map(|time| time.as_secs_f64()),
                "recommended partitioning"
            );
        }
        Ok(ledger)
    }

    /// Runs `algorithm` over `tables` (all tables when empty). Every table of the schema is
    /// installed from `data_dir` first when one is given, a shared workload may read any of them.
    pub fn run(&mut self, tables: &[String], algorithm: Algorithm, data_dir: Option<&Path>, data_size_mib: Option<f64>) -> Result<RunReport, AdvisorError> {
        let start = Instant::now();
        let tables: Vec<String> = if tables.is_empty() {
            self.catalog.table_names().map(str::to_string).collect()
        } else {
            tables.to_vec()
        };
        for table in &tables {
            self.catalog.table(table)?;
        }

        self.prepare_session()?;
        if let Some(data_dir) = data_dir {
            let all_tables: Vec<String> = self.catalog.table_names().map(str::to_string).collect();
            self.install(&all_tables, data_dir)?;
        }
        self.validate(&tables)?;

        let strategy = algorithm.strategy();
        let mut ledgers = Vec::with_capacity(tables.len());
        for table in &tables {
            let _span = info_span!("advise", table = %table, algorithm = algorithm.identifier()).entered();
            info!(strategy = strategy.name(), "searching partition columns");
            ledgers.push(self.advise_table(table, strategy.as_ref())?);
        }

        let metadata = RunMetadata::new(data_size_mib, start.elapsed(), algorithm.identifier(), ledgers.len(), self.catalog.len());
        Ok(RunReport { metadata, ledgers })
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Write};

    use super::*;
    use crate::engine::{MemoryEngine, MockEngine, QueryResult};

    const SCHEMA: &str = r#"{
        "orders": [["order_id", "INT"], ["user_id", "INT"], ["order_date", "DATE"], ["total_amount", "DECIMAL(10,2)"], ["status", "STRING"]],
        "users": [["user_id", "INT"], ["city", "STRING"]]
    }"#;

    const FREQUENCIES: &str = r#"{
        "orders": {"order_date": 4, "user_id": 3, "status": 2, "total_amount": 1},
        "users": {"city": 1}
    }"#;

    const WORKLOAD: &str = r#"[
        "SELECT COUNT(*) FROM orders WHERE status = 'shipped'",
        "SELECT user_id, COUNT(*) FROM orders WHERE order_date = '2024-01-02' GROUP BY user_id",
        "SELECT COUNT(DISTINCT user_id) FROM orders WHERE total_amount > 20",
        "SELECT city, COUNT(*) FROM users GROUP BY city"
    ]"#;

    fn write_data() -> tempfile::TempDir {
        let data_dir = tempfile::tempdir().unwrap();
        let mut orders = fs::File::create(data_dir.path().join("orders.csv")).unwrap();
        let statuses = ["shipped", "pending", "cancelled"];
        for order_id in 0..60 {
            writeln!(orders, "{},{},2024-01-0{},{}.50,{}", order_id, order_id % 7, order_id % 5 + 1, order_id, statuses[order_id % 3]).unwrap();
        }
        let mut users = fs::File::create(data_dir.path().join("users.csv")).unwrap();
        for user_id in 0..7 {
            writeln!(users, "{},{}", user_id, if user_id % 2 == 0 { "Berlin" } else { "Munich" }).unwrap();
        }
        data_dir
    }

    fn advisor<E: Engine>(engine: E, config: AdvisorConfig) -> PartitionAdvisor<E> {
        let catalog = Catalog::from_schema_reader(SCHEMA.as_bytes()).unwrap();
        let frequencies = ColumnFrequencies::from_reader(FREQUENCIES.as_bytes()).unwrap();
        let workload = Workload::from_reader(WORKLOAD.as_bytes()).unwrap();
        let tables: Vec<&str> = catalog.table_names().collect();
        let workload = workload.classified(&tables[..]);
        PartitionAdvisor::new(engine, catalog, frequencies, workload, config)
    }

    fn record_cardinalities<E: Engine>(advisor: &mut PartitionAdvisor<E>, table: &str, cardinalities: &[(&str, u64)]) {
        let desc = advisor.catalog.table_mut(table).unwrap();
        for (column, cardinality) in cardinalities {
            desc.set_cardinality(column, *cardinality).unwrap();
        }
    }

    #[test]
    fn test_prepare_session() {
        let mut engine = MockEngine::new();
        for statement in [
            "SET hive.exec.dynamic.partition=true",
            "SET hive.exec.dynamic.partition.mode=nonstrict",
            "SET hive.exec.max.dynamic.partitions=205",
            "SET hive.exec.max.dynamic.partitions.pernode=205",
        ] {
            engine.expect_execute()
                .withf(move |s| s == statement)
                .times(1)
                .returning(|_| Ok(QueryResult::empty()));
        }
        let config = AdvisorConfig::default().with_budget(Some(200));
        advisor(engine, config).prepare_session().unwrap();
    }

    #[test]
    fn test_exhaustive_run_on_memory_engine() {
        let data_dir = write_data();
        let mut advisor = advisor(MemoryEngine::new(), AdvisorConfig::default().with_budget(Some(50)));
        let report = advisor.run(&["orders".to_string()], Algorithm::Exhaustive, Some(data_dir.path()), Some(2.0)).unwrap();

        assert_eq!(report.metadata.algorithm, "algorithm_1");
        assert_eq!(report.metadata.num_tables_processed, 1);
        assert_eq!(report.metadata.total_tables_available, 2);
        let ledger = &report.ledgers[0];
        assert_eq!(ledger.table(), "orders");
        // top 3: order_date (5 values), user_id (7), status (3)
        assert_eq!(ledger.len(), 8);
        for evaluation in ledger.evaluations() {
            assert_eq!(evaluation.cost.is_rejected(), evaluation.cardinality_product > 50, "{:?}", evaluation);
        }
        // every pair fits into the budget, only the triple (105) does not
        assert_eq!(ledger.measured_count(), 7);
        assert_eq!(ledger.baseline().unwrap().cardinality_product, 1);

        let orders = advisor.catalog().table("orders").unwrap();
        assert_eq!(orders.cardinality("order_date"), Some(5));
        assert_eq!(orders.cardinality("user_id"), Some(7));
        assert_eq!(orders.cardinality("status"), Some(3));
        // the table still holds every row under whatever layout was measured last
        let mut engine_rows = advisor.engine.execute("SELECT COUNT(*) FROM orders").unwrap();
        assert_eq!(engine_rows.rows.pop().unwrap().values[0], Some(crate::types::TupleValue::BigInt(60)));
    }

    #[test]
    fn test_greedy_run_covers_all_tables() {
        let data_dir = write_data();
        let mut advisor = advisor(MemoryEngine::new(), AdvisorConfig::default());
        let report = advisor.run(&[], Algorithm::Greedy, Some(data_dir.path()), None).unwrap();

        assert_eq!(report.metadata.algorithm, "algorithm_2");
        let tables: Vec<&str> = report.ledgers.iter().map(|ledger| ledger.table()).collect();
        assert_eq!(tables, vec!["orders", "users"]);
        for ledger in &report.ledgers {
            assert_eq!(ledger.evaluations().iter().filter(|e| e.is_baseline()).count(), 1);
            assert!(ledger.best().is_some());
        }
        // users only has one frequent column: baseline plus one candidate
        assert_eq!(report.ledgers[1].len(), 2);
    }

    #[test]
    fn test_validation_happens_before_measuring() {
        let data_dir = write_data();
        let catalog = Catalog::from_schema_reader(SCHEMA.as_bytes()).unwrap();
        let frequencies = ColumnFrequencies::from_reader(r#"{"orders": {"user_id": 1}}"#.as_bytes()).unwrap();
        let workload = Workload::from_reader(WORKLOAD.as_bytes()).unwrap();
        let mut advisor = PartitionAdvisor::new(MemoryEngine::new(), catalog, frequencies, workload, AdvisorConfig::default());

        let result = advisor.run(&["orders".to_string(), "users".to_string()], Algorithm::Exhaustive, Some(data_dir.path()), None);
        let error = result.unwrap_err();
        assert!(matches!(error, AdvisorError::Catalog(CatalogError::MissingFrequencies(_))));
        assert!(error.is_precondition_violation());
        // nothing was repartitioned
        assert_eq!(advisor.engine().partition_count("orders"), Some(1));

        let result = advisor.run(&["products".to_string()], Algorithm::Exhaustive, None, None);
        assert!(matches!(result, Err(AdvisorError::Catalog(CatalogError::UnknownTable(_)))));
    }

    #[test]
    fn test_shared_workload_with_table_subset() {
        let data_dir = write_data();
        let catalog = Catalog::from_schema_reader(SCHEMA.as_bytes()).unwrap();
        let frequencies = ColumnFrequencies::from_reader(FREQUENCIES.as_bytes()).unwrap();
        let workload = Workload::from_reader(r#"["SELECT COUNT(*) FROM orders", "SELECT COUNT(*) FROM users"]"#.as_bytes()).unwrap();
        let mut advisor = PartitionAdvisor::new(MemoryEngine::new(), catalog, frequencies, workload, AdvisorConfig::default());

        let report = advisor.run(&["orders".to_string()], Algorithm::Exhaustive, Some(data_dir.path()), None).unwrap();
        assert_eq!(report.ledgers.len(), 1);
        assert_eq!(report.ledgers[0].table(), "orders");
        assert_eq!(report.metadata.total_tables_available, 2);
        // users is loaded for the workload but never repartitioned
        assert_eq!(advisor.engine().partition_count("users"), Some(1));
        assert_eq!(advisor.catalog().table("users").unwrap().cardinality("city"), Some(2));
    }

    #[test]
    fn test_missing_cardinality_fails_before_measuring() {
        let mut engine = MockEngine::new();
        engine.expect_execute()
            .withf(|s| s.starts_with("SET "))
            .times(4)
            .returning(|_| Ok(QueryResult::empty()));
        // no data directory, so no cardinality was ever recorded
        let mut advisor = advisor(engine, AdvisorConfig::default());
        let error = advisor.run(&["orders".to_string()], Algorithm::Exhaustive, None::<&Path>, None).unwrap_err();
        assert!(matches!(error, AdvisorError::UnknownColumn { ref table, .. } if table == "orders"));
        assert!(error.is_precondition_violation());
    }

    #[test]
    fn test_missing_workload() {
        let catalog = Catalog::from_schema_reader(SCHEMA.as_bytes()).unwrap();
        let frequencies = ColumnFrequencies::from_reader(FREQUENCIES.as_bytes()).unwrap();
        let workload = Workload::classify(&[], &["orders"]);
        let mut advisor = PartitionAdvisor::new(MemoryEngine::new(), catalog, frequencies, workload, AdvisorConfig::default());
        record_cardinalities(&mut advisor, "users", &[("city", 2)]);
        let error = advisor.validate(&["users".to_string()]).unwrap_err();
        assert!(matches!(error, AdvisorError::Workload(WorkloadError::MissingWorkload(_))));
        assert!(error.is_precondition_violation());
    }

    #[test]
    fn test_engine_failure_aborts_run() {
        let mut engine = MockEngine::new();
        engine.expect_execute()
            .returning(|s| if s.starts_with("SELECT COUNT(*)") {
                Err(EngineError::TableNotFound("orders".to_string()))
            } else {
                Ok(QueryResult::empty())
            });
        let mut advisor = advisor(engine, AdvisorConfig::default());
        record_cardinalities(&mut advisor, "orders", &[("order_date", 5), ("user_id", 7), ("status", 3), ("total_amount", 60)]);
        let result = advisor.run(&["orders".to_string()], Algorithm::Greedy, None::<&Path>, None);
        let error = result.unwrap_err();
        assert!(matches!(error, AdvisorError::Engine(_)));
        assert!(!error.is_precondition_violation());
    }
}
