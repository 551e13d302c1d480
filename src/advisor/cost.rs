use std::time::{Duration, Instant};

#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::{catalog::TableDesc, engine::Engine};

use super::{repartition::Repartitioner, AdvisorError};

/// Wall clock cost of a table's workload under a partition layout. Measuring rebuilds the table,
/// so a call is destructive and must only be made for candidates the budget gate admitted.
#[cfg_attr(test, automock)]
pub trait CostFunction {
    /// Workload time without partition columns.
    fn baseline(&mut self, table: &mut TableDesc) -> Result<Duration, AdvisorError>;

    fn measure(&mut self, table: &mut TableDesc, columns: &[String]) -> Result<Duration, AdvisorError>;
}

pub struct WorkloadCost<'a, E: Engine + ?Sized> {
    engine: &'a mut E,
    statements: &'a [String],
    repartitioner: &'a mut Repartitioner,
}

impl<'a, E: Engine + ?Sized> WorkloadCost<'a, E> {
    pub fn new(engine: &'a mut E, statements: &'a [String], repartitioner: &'a mut Repartitioner) -> WorkloadCost<'a, E> {
        WorkloadCost { engine, statements, repartitioner }
    }

    fn run_workload(&mut self, table: &TableDesc) -> Result<Duration, AdvisorError> {
        let start = Instant::now();
        for statement in self.statements {
            self.engine.execute(statement)?;
        }
        let elapsed = start.elapsed();
        info!(
            table = %table.name,
            partition_columns = ?table.partition_column_names(),
            statements = self.statements.len(),
            seconds = elapsed.as_secs_f64(),
            "measured workload"
        );
        Ok(elapsed)
    }
}

impl<E: Engine + ?Sized> CostFunction for WorkloadCost<'_, E> {
    fn baseline(&mut self, table: &mut TableDesc) -> Result<Duration, AdvisorError> {
        if table.is_partitioned() {
            self.repartitioner.repartition(self.engine, table, &[])?;
        }
        self.run_workload(table)
    }

    fn measure(&mut self, table: &mut TableDesc, columns: &[String]) -> Result<Duration, AdvisorError> {
        self.repartitioner.repartition(self.engine, table, columns)?;
        self.run_workload(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::{ColumnDesc, TableDesc}, engine::{EngineError, MockEngine, QueryResult}, types::TupleValueType};

    fn orders() -> TableDesc {
        TableDesc::new("orders", vec![
            ColumnDesc::new("order_id", TupleValueType::Int),
            ColumnDesc::new("user_id", TupleValueType::Int),
        ]).unwrap()
    }

    fn workload() -> Vec<String> {
        vec!["SELECT COUNT(*) FROM orders".to_string(), "SELECT * FROM orders WHERE user_id = 1".to_string()]
    }

    #[test]
    fn test_baseline_of_unpartitioned_table_only_runs_workload() {
        let mut engine = MockEngine::new();
        engine.expect_execute()
            .withf(|s| s.starts_with("SELECT"))
            .times(2)
            .returning(|_| Ok(QueryResult::empty()));
        let statements = workload();
        let mut repartitioner = Repartitioner::new();
        let mut cost = WorkloadCost::new(&mut engine, &statements, &mut repartitioner);
        cost.baseline(&mut orders()).unwrap();
    }

    #[test]
    fn test_baseline_of_partitioned_table_rebuilds_it_first() {
        let mut table = orders();
        table.set_partition_columns(&["user_id".to_string()]).unwrap();
        let mut engine = MockEngine::new();
        engine.expect_execute()
            .withf(|s| s.starts_with("INSERT"))
            .times(1)
            .returning(|s| {
                assert!(!s.contains("PARTITION ("));
                Ok(QueryResult::empty())
            });
        engine.expect_execute()
            .withf(|s| !s.starts_with("INSERT"))
            .times(6)
            .returning(|_| Ok(QueryResult::empty()));
        let statements = workload();
        let mut repartitioner = Repartitioner::new();
        let mut cost = WorkloadCost::new(&mut engine, &statements, &mut repartitioner);
        cost.baseline(&mut table).unwrap();
        assert!(!table.is_partitioned());
    }

    #[test]
    fn test_measure_repartitions_then_runs_workload() {
        let mut table = orders();
        let mut engine = MockEngine::new();
        // 5 rebuild statements then the two workload queries
        engine.expect_execute().times(7).returning(|_| Ok(QueryResult::empty()));
        let statements = workload();
        let mut repartitioner = Repartitioner::new();
        let mut cost = WorkloadCost::new(&mut engine, &statements, &mut repartitioner);
        cost.measure(&mut table, &["user_id".to_string()]).unwrap();
        assert_eq!(table.partition_column_names(), &["user_id".to_string()]);
    }

    #[test]
    fn test_workload_failure_is_propagated() {
        let mut engine = MockEngine::new();
        engine.expect_execute().returning(|_| Err(EngineError::TableNotFound("orders".to_string())));
        let statements = workload();
        let mut repartitioner = Repartitioner::new();
        let mut cost = WorkloadCost::new(&mut engine, &statements, &mut repartitioner);
        assert!(matches!(cost.baseline(&mut orders()), Err(AdvisorError::Engine(_))));
    }
}
