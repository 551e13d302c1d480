use std::time::Duration;

use itertools::Itertools;
use tracing::info;

use crate::catalog::{ColumnFrequencies, TableDesc};

use super::{budget::BudgetGate, cost::CostFunction, ledger::{Cost, Evaluation, Ledger}, AdvisorError};

/// Number of most frequent columns the exhaustive search combines.
pub const TOP_K: usize = 3;

/// Runs candidates through the budget gate and the cost function and collects every outcome.
/// Rejected candidates are recorded with their product and never reach the cost function.
pub struct SearchContext<'a> {
    gate: &'a BudgetGate,
    cost: &'a mut dyn CostFunction,
    evaluations: Vec<Evaluation>,
}

impl<'a> SearchContext<'a> {
    pub fn new(gate: &'a BudgetGate, cost: &'a mut dyn CostFunction) -> SearchContext<'a> {
        SearchContext { gate, cost, evaluations: Vec::new() }
    }

    /// The empty candidate has product 1 and is always measured.
    pub fn baseline(&mut self, table: &mut TableDesc) -> Result<Duration, AdvisorError> {
        let time = self.cost.baseline(table)?;
        self.evaluations.push(Evaluation { columns: Vec::new(), cost: Cost::Measured(time), cardinality_product: 1 });
        Ok(time)
    }

    pub fn evaluate(&mut self, table: &mut TableDesc, columns: Vec<String>) -> Result<Cost, AdvisorError> {
        let admission = self.gate.admits(table, &columns)?;
        let cost = if admission.allowed {
            Cost::Measured(self.cost.measure(table, &columns)?)
        } else {
            info!(
                table = %table.name,
                partition_columns = ?columns,
                product = admission.product,
                budget = self.gate.max_product(),
                "candidate exceeds the partition budget"
            );
            Cost::Rejected(admission.product)
        };
        self.evaluations.push(Evaluation { columns, cost, cardinality_product: admission.product });
        Ok(cost)
    }

    pub fn into_ledger(self, table: &str) -> Ledger {
        Ledger::new(table, self.evaluations)
    }
}

pub trait Strategy {
    fn name(&self) -> &'static str;

    fn search(&self, table: &mut TableDesc, frequencies: &ColumnFrequencies, context: SearchContext<'_>) -> Result<Ledger, AdvisorError>;
}

/// Algorithm 1: the baseline, then every non-empty subset of the `TOP_K` most frequent columns.
pub struct ExhaustiveTopK;

impl Strategy for ExhaustiveTopK {
    fn name(&self) -> &'static str {
        "exhaustive top-k"
    }

    fn search(&self, table: &mut TableDesc, frequencies: &ColumnFrequencies, mut context: SearchContext<'_>) -> Result<Ledger, AdvisorError> {
        let top: Vec<String> = frequencies.ranked_columns(table)?.into_iter().take(TOP_K).collect();
        context.baseline(table)?;
        for size in 1..=top.len() {
            for candidate in top.iter().cloned().combinations(size) {
                context.evaluate(table, candidate)?;
            }
        }
        Ok(context.into_ledger(&table.name))
    }
}

/// Algorithm 2: grows the partition key one column at a time as long as the best extension
/// of a round is strictly faster than the current best.
pub struct GreedyForward;

#[derive(Debug, Clone, PartialEq, Eq)]
struct GreedyOutcome {
    chosen: Vec<String>,
    // current best after the baseline and after every accepted round
    trajectory: Vec<Duration>,
}

impl GreedyForward {
    fn run(&self, table: &mut TableDesc, frequencies: &ColumnFrequencies, context: &mut SearchContext<'_>) -> Result<GreedyOutcome, AdvisorError> {
        let mut remaining = frequencies.recorded_columns(table)?;
        let mut best = context.baseline(table)?;
        let mut chosen: Vec<String> = Vec::new();
        let mut trajectory = vec![best];

        while !remaining.is_empty() {
            let mut round_best: Option<(usize, Duration)> = None;
            for (i, column) in remaining.iter().enumerate() {
                let mut candidate = chosen.clone();
                candidate.push(column.clone());
                if let Cost::Measured(time) = context.evaluate(table, candidate)? {
                    if round_best.map_or(true, |(_, fastest)| time < fastest) {
                        round_best = Some((i, time));
                    }
                }
            }
            match round_best {
                Some((i, time)) if time < best => {
                    chosen.push(remaining.remove(i));
                    best = time;
                    trajectory.push(time);
                },
                _ => break,
            }
        }
        Ok(GreedyOutcome { chosen, trajectory })
    }
}

impl Strategy for GreedyForward {
    fn name(&self) -> &'static str {
        "greedy forward selection"
    }

    fn search(&self, table: &mut TableDesc, frequencies: &ColumnFrequencies, mut context: SearchContext<'_>) -> Result<Ledger, AdvisorError> {
        let outcome = self.run(table, frequencies, &mut context)?;
        info!(table = %table.name, chosen = ?outcome.chosen, rounds = outcome.trajectory.len() - 1, "greedy search finished");
        Ok(context.into_ledger(&table.name))
    }
}
