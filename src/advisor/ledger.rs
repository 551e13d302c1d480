use std::{cmp::Ordering, time::Duration};

/// Outcome of one candidate. A rejected candidate was never measured and only carries the
/// cardinality product that made the budget gate turn it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cost {
    Measured(Duration),
    Rejected(u64),
}

impl Cost {
    pub fn measured(&self) -> Option<Duration> {
        match self {
            Cost::Measured(duration) => Some(*duration),
            Cost::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Cost::Rejected(_))
    }

    // Measured costs ascending, every rejected cost after them and equal to each other
    fn rank(&self, other: &Cost) -> Ordering {
        match (self, other) {
            (Cost::Measured(a), Cost::Measured(b)) => a.cmp(b),
            (Cost::Measured(_), Cost::Rejected(_)) => Ordering::Less,
            (Cost::Rejected(_), Cost::Measured(_)) => Ordering::Greater,
            (Cost::Rejected(_), Cost::Rejected(_)) => Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub columns: Vec<String>,
    pub cost: Cost,
    pub cardinality_product: u64,
}

impl Evaluation {
    pub fn is_baseline(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn execution_time(&self) -> Option<Duration> {
        self.cost.measured()
    }
}

/// All evaluations of one table from one strategy run, cheapest first.
/// The sort is stable, so equal costs keep the order in which they were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    table: String,
    evaluations: Vec<Evaluation>,
}

impl Ledger {
    pub fn new(table: &str, mut evaluations: Vec<Evaluation>) -> Ledger {
        evaluations.sort_by(|a, b| a.cost.rank(&b.cost));
        Ledger { table: table.to_string(), evaluations }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    pub fn len(&self) -> usize {
        self.evaluations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluations.is_empty()
    }

    pub fn baseline(&self) -> Option<&Evaluation> {
        self.evaluations.iter().find(|evaluation| evaluation.is_baseline())
    }

    pub fn baseline_time(&self) -> Option<Duration> {
        self.baseline().and_then(Evaluation::execution_time)
    }

    /// The cheapest measured evaluation. May be the baseline itself.
    pub fn best(&self) -> Option<&Evaluation> {
        self.evaluations.first().filter(|evaluation| !evaluation.cost.is_rejected())
    }

    pub fn measured_count(&self) -> usize {
        self.evaluations.iter().filter(|evaluation| !evaluation.cost.is_rejected()).count()
    }

    /// Change against the baseline in percent, negative when faster.
    pub fn time_difference_percent(&self, evaluation: &Evaluation) -> Option<f64> {
        let baseline = self.baseline_time()?.as_secs_f64();
        let time = evaluation.execution_time()?.as_secs_f64();
        if baseline == 0.0 {
            return None;
        }
        Some((time - baseline) / baseline * 100.0)
    }
}
