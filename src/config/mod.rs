use crate::advisor::BudgetGate;

pub const DEFAULT_MAX_PARTITION_PRODUCT: u64 = 1000;
pub const DEFAULT_PARTITION_SLACK: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvisorConfig {
    /// Budget: the largest cardinality product a candidate may have.
    pub max_partition_product: u64,
    /// Headroom on top of the budget for the engine's dynamic partition cap.
    pub partition_slack: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        AdvisorConfig { max_partition_product: DEFAULT_MAX_PARTITION_PRODUCT, partition_slack: DEFAULT_PARTITION_SLACK }
    }
}

impl AdvisorConfig {
    pub fn new() -> AdvisorConfig {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Read 'PARTITION_ADVISOR_MAX_PARTITION_PRODUCT' and 'PARTITION_ADVISOR_PARTITION_SLACK'
    // Unset or unparseable values fall back to the defaults
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AdvisorConfig {
        let read = |key: &str, default: u64| match lookup(key) {
            Some(val) => val.trim().parse::<u64>().unwrap_or(default),
            None => default,
        };
        AdvisorConfig {
            max_partition_product: read("PARTITION_ADVISOR_MAX_PARTITION_PRODUCT", DEFAULT_MAX_PARTITION_PRODUCT),
            partition_slack: read("PARTITION_ADVISOR_PARTITION_SLACK", DEFAULT_PARTITION_SLACK),
        }
    }

    pub fn with_budget(mut self, budget: Option<u64>) -> AdvisorConfig {
        if let Some(budget) = budget {
            self.max_partition_product = budget;
        }
        self
    }

    pub fn gate(&self) -> BudgetGate {
        BudgetGate::new(self.max_partition_product)
    }

    /// Cap for `hive.exec.max.dynamic.partitions`, never below the budget.
    pub fn max_dynamic_partitions(&self) -> u64 {
        self.max_partition_product.saturating_add(self.partition_slack)
    }
}
