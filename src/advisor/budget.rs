use crate::catalog::TableDesc;

use super::AdvisorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub product: u64,
}

/// Turns down candidates whose cardinality product, a proxy for the number of partitions
/// they would create, is above the budget. Never touches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetGate {
    max_product: u64,
}

impl BudgetGate {
    pub fn new(max_product: u64) -> BudgetGate {
        BudgetGate { max_product }
    }

    pub fn max_product(&self) -> u64 {
        self.max_product
    }

    /// Product of the recorded cardinalities, 1 for no columns. Saturates instead of overflowing.
    pub fn cardinality_product(table: &TableDesc, columns: &[String]) -> Result<u64, AdvisorError> {
        columns.iter().try_fold(1u64, |product, column| {
            let cardinality = table.cardinality(column)
                .ok_or_else(|| AdvisorError::UnknownColumn { table: table.name.clone(), column: column.clone() })?;
            Ok(product.checked_mul(cardinality).unwrap_or(u64::MAX))
        })
    }

    pub fn admits(&self, table: &TableDesc, columns: &[String]) -> Result<Admission, AdvisorError> {
        let product = Self::cardinality_product(table, columns)?;
        Ok(Admission { allowed: product <= self.max_product, product })
    }
}
