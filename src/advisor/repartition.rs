use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::{catalog::TableDesc, engine::Engine};

use super::AdvisorError;

/*
    Rebuilds a table under a new partition key:

        1. validate the candidate against the table's columns
        2. derive the new layout (regular columns, then the candidate as partition key)
        3. create a uniquely named temporary table with that layout
        4. bulk copy every row into it, routed by the partition columns
        5. drop the old table and rename the temporary one
        6. record the new layout on the table descriptor

    There is no rollback. Once step 3 ran, a failure leaves the temporary table behind.
    The descriptor is borrowed mutably for the whole rebuild, so nobody can read its
    cardinalities or layout while the engine side is in flux.
 */
#[derive(Debug, Default)]
pub struct Repartitioner {
    sequence: u64,
}

impl Repartitioner {
    pub fn new() -> Repartitioner {
        Repartitioner::default()
    }

    fn temp_name(&mut self, table: &str) -> String {
        let seconds = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs());
        self.sequence += 1;
        format!("{}_temp_{}_{}", table, seconds, self.sequence)
    }

    pub fn repartition<E: Engine + ?Sized>(&mut self, engine: &mut E, table: &mut TableDesc, candidate: &[String]) -> Result<(), AdvisorError> {
        let layout = table.layout_for(candidate)?;
        let temp = self.temp_name(&table.name);
        info!(table = %table.name, partition_columns = ?candidate, "repartitioning");

        engine.execute(&format!("DROP TABLE IF EXISTS {}", temp))?;
        let rebuild = [
            layout.create_statement(&temp),
            layout.copy_statement(&temp, &table.name),
            format!("DROP TABLE {}", table.name),
            format!("ALTER TABLE {} RENAME TO {}", temp, table.name),
        ];
        for (step, statement) in rebuild.iter().enumerate() {
            debug!("{}", statement);
            if let Err(e) = engine.execute(statement) {
                if step > 0 {
                    warn!(table = %table.name, temporary_table = %temp, "repartition failed midway, temporary table {} is left behind", temp);
                }
                return Err(e.into());
            }
        }

        table.set_partition_columns(candidate)?;
        Ok(())
    }
}
