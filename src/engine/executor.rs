use ahash::{AHashMap, AHashSet};

use crate::{parser::{BoundParseAttribute, ParseWhereClause, ParseWhereClauseItem, SelectExpression, SelectStatement}, types::{Tuple, TupleValue}};

use super::{memory::StoredTable, EngineError, QueryResult};

// Column positions index the logical row: regular columns first, then partition columns.
enum Operand {
    Column(usize),
    Literal(TupleValue)
}

#[derive(Clone, Copy)]
enum Comparison {
    Eq,
    NotEq,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
}

enum BooleanExpression {
    And(Box<BooleanExpression>, Box<BooleanExpression>),
    Or(Box<BooleanExpression>, Box<BooleanExpression>),
    Compare(Comparison, Operand, Operand),
}

enum Output {
    Column(usize),
    CountStar,
    CountDistinct(usize),
}

enum Accumulator {
    Count(i64),
    Distinct(AHashSet<TupleValue>),
}

struct RowView<'a> {
    regular: &'a [Option<TupleValue>],
    key: &'a [Option<TupleValue>],
}

impl RowView<'_> {
    fn get(&self, column: usize) -> &Option<TupleValue> {
        if column < self.regular.len() {
            &self.regular[column]
        } else {
            &self.key[column - self.regular.len()]
        }
    }

    fn to_tuple(&self) -> Tuple {
        Tuple::new(self.regular.iter().chain(self.key.iter()).cloned().collect())
    }
}

impl Comparison {
    // NULL never satisfies a comparison
    fn apply(&self, left: &Option<TupleValue>, right: &Option<TupleValue>) -> bool {
        let (Some(left), Some(right)) = (left, right) else {
            return false;
        };
        match self {
            Comparison::Eq => left == right,
            Comparison::NotEq => left.partial_cmp(right).map_or(false, |o| o.is_ne()),
            Comparison::LessThan => left < right,
            Comparison::LessThanOrEq => left <= right,
            Comparison::GreaterThan => left > right,
            Comparison::GreaterThanOrEq => left >= right,
        }
    }
}

impl BooleanExpression {
    fn evaluate(&self, row: &RowView) -> bool {
        match self {
            BooleanExpression::And(left, right) => left.evaluate(row) && right.evaluate(row),
            BooleanExpression::Or(left, right) => left.evaluate(row) || right.evaluate(row),
            BooleanExpression::Compare(comparison, left, right) => {
                comparison.apply(&Self::operand_value(left, row), &Self::operand_value(right, row))
            },
        }
    }

    fn operand_value(operand: &Operand, row: &RowView) -> Option<TupleValue> {
        match operand {
            Operand::Column(column) => row.get(*column).clone(),
            Operand::Literal(value) => Some(value.clone()),
        }
    }

    /// Evaluates the predicate using only the partition key of a bucket.
    /// `None` means the outcome depends on regular columns and the bucket has to be scanned.
    fn evaluate_on_key(&self, key: &[Option<TupleValue>], regular_len: usize) -> Option<bool> {
        match self {
            BooleanExpression::And(left, right) => {
                match (left.evaluate_on_key(key, regular_len), right.evaluate_on_key(key, regular_len)) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }
            },
            BooleanExpression::Or(left, right) => {
                match (left.evaluate_on_key(key, regular_len), right.evaluate_on_key(key, regular_len)) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }
            },
            BooleanExpression::Compare(comparison, left, right) => {
                let left = Self::key_operand_value(left, key, regular_len)?;
                let right = Self::key_operand_value(right, key, regular_len)?;
                Some(comparison.apply(&left, &right))
            },
        }
    }

    fn key_operand_value(operand: &Operand, key: &[Option<TupleValue>], regular_len: usize) -> Option<Option<TupleValue>> {
        match operand {
            Operand::Column(column) if *column >= regular_len => Some(key[column - regular_len].clone()),
            Operand::Column(_) => None,
            Operand::Literal(value) => Some(Some(value.clone())),
        }
    }
}

struct Binder<'a> {
    table: &'a StoredTable,
    binding: Option<&'a str>,
}

impl Binder<'_> {
    fn resolve(&self, attribute: &BoundParseAttribute) -> Result<usize, EngineError> {
        let not_found = || EngineError::ColumnNotFound { table: self.table.name.clone(), column: attribute.to_string() };
        if let Some(binding) = attribute.binding {
            let matches_binding = self.binding == Some(binding) || self.table.name.eq_ignore_ascii_case(binding);
            if !matches_binding {
                return Err(not_found());
            }
        }
        self.table.column_position(attribute.name).ok_or_else(not_found)
    }

    fn bind_operand(&self, item: &ParseWhereClauseItem) -> Result<Operand, EngineError> {
        match item {
            ParseWhereClauseItem::Name(attribute) => Ok(Operand::Column(self.resolve(attribute)?)),
            ParseWhereClauseItem::Value(value) => Ok(Operand::Literal(value.clone())),
        }
    }

    fn bind_comparison(&self, comparison: Comparison, left: &ParseWhereClauseItem, right: &ParseWhereClauseItem)
        -> Result<BooleanExpression, EngineError> {
        let (left, right) = (self.bind_operand(left)?, self.bind_operand(right)?);
        let comparable = match (&left, &right) {
            (Operand::Column(a), Operand::Column(b)) => match (self.table.column_type(*a), self.table.column_type(*b)) {
                (Some(a), Some(b)) => a.is_comparable_to(&b),
                _ => true,
            },
            (Operand::Column(column), Operand::Literal(value)) | (Operand::Literal(value), Operand::Column(column)) => {
                self.table.column_type(*column).map_or(true, |column_type| column_type.is_comparable_to_value(value))
            },
            (Operand::Literal(a), Operand::Literal(b)) => a.is_numeric() == b.is_numeric(),
        };
        if !comparable {
            return Err(EngineError::Unsupported(format!("incomparable operands in predicate on {}", self.table.name)));
        }
        Ok(BooleanExpression::Compare(comparison, left, right))
    }

    fn bind_predicate(&self, clause: &ParseWhereClause) -> Result<BooleanExpression, EngineError> {
        match clause {
            ParseWhereClause::Equals(left, right) => self.bind_comparison(Comparison::Eq, left, right),
            ParseWhereClause::NotEquals(left, right) => self.bind_comparison(Comparison::NotEq, left, right),
            ParseWhereClause::LessThan(left, right) => self.bind_comparison(Comparison::LessThan, left, right),
            ParseWhereClause::LessOrEqualThan(left, right) => self.bind_comparison(Comparison::LessThanOrEq, left, right),
            ParseWhereClause::GreaterThan(left, right) => self.bind_comparison(Comparison::GreaterThan, left, right),
            ParseWhereClause::GreaterOrEqualThan(left, right) => self.bind_comparison(Comparison::GreaterThanOrEq, left, right),
            ParseWhereClause::And(left, right) => Ok(BooleanExpression::And(
                Box::new(self.bind_predicate(left)?),
                Box::new(self.bind_predicate(right)?)
            )),
            ParseWhereClause::Or(left, right) => Ok(BooleanExpression::Or(
                Box::new(self.bind_predicate(left)?),
                Box::new(self.bind_predicate(right)?)
            )),
        }
    }
}

/// Runs a single-table select. Buckets whose partition key already rules out the predicate
/// are skipped without touching their rows.
pub(super) fn execute_select(table: &StoredTable, select: &SelectStatement) -> Result<QueryResult, EngineError> {
    let binder = Binder { table, binding: select.from_table.binding };
    let predicate = select.where_clause.as_ref()
        .map(|clause| binder.bind_predicate(clause))
        .transpose()?;

    let mut outputs = Vec::new();
    let mut columns = Vec::new();
    for item in &select.items {
        match &item.expression {
            SelectExpression::Star => {
                for (position, name) in table.column_names().enumerate() {
                    outputs.push(Output::Column(position));
                    columns.push(name.to_string());
                }
                continue;
            },
            SelectExpression::Column(attribute) => outputs.push(Output::Column(binder.resolve(attribute)?)),
            SelectExpression::CountStar => outputs.push(Output::CountStar),
            SelectExpression::CountDistinct(attribute) => outputs.push(Output::CountDistinct(binder.resolve(attribute)?)),
        }
        let name = match (&item.expression, item.alias) {
            (_, Some(alias)) => alias.to_string(),
            (SelectExpression::Column(attribute), None) => attribute.name.to_string(),
            _ => format!("_c{}", columns.len()),
        };
        columns.push(name);
    }
    let group_by = select.group_by.iter()
        .map(|attribute| binder.resolve(attribute))
        .collect::<Result<Vec<_>, _>>()?;

    let regular_len = table.columns.len();
    let matching_rows = table.partitions.iter()
        .filter(|partition| predicate.as_ref()
            .and_then(|p| p.evaluate_on_key(&partition.key, regular_len))
            .unwrap_or(true))
        .flat_map(|partition| partition.rows.iter().map(move |row| RowView { regular: &row.values, key: &partition.key }))
        .filter(|row| predicate.as_ref().map_or(true, |p| p.evaluate(row)));

    let is_aggregate = !group_by.is_empty() || outputs.iter().any(|o| !matches!(o, Output::Column(_)));
    let mut rows = if is_aggregate {
        aggregate(table, &outputs, &group_by, matching_rows)?
    } else {
        matching_rows
            .map(|row| Tuple::new(outputs.iter().map(|o| match o {
                Output::Column(column) => row.get(*column).clone(),
                _ => None,
            }).collect()))
            .collect()
    };
    if let Some(limit) = select.limit {
        rows.truncate(limit as usize);
    }
    Ok(QueryResult { columns, rows })
}

fn aggregate<'a>(table: &StoredTable, outputs: &[Output], group_by: &[usize], rows: impl Iterator<Item = RowView<'a>>)
    -> Result<Vec<Tuple>, EngineError> {
    for output in outputs {
        if let Output::Column(column) = output {
            if !group_by.contains(column) {
                let name = table.column_names().nth(*column).unwrap_or_default();
                return Err(EngineError::Unsupported(format!("column {} must appear in GROUP BY", name)));
            }
        }
    }
    let new_accumulators = || outputs.iter().map(|o| match o {
        Output::CountDistinct(_) => Accumulator::Distinct(AHashSet::new()),
        _ => Accumulator::Count(0),
    }).collect::<Vec<_>>();

    // Groups keep the order in which they were first seen
    let mut group_index: AHashMap<Vec<Option<TupleValue>>, usize> = AHashMap::new();
    let mut groups: Vec<(Vec<Option<TupleValue>>, Vec<Accumulator>)> = Vec::new();
    if group_by.is_empty() {
        group_index.insert(Vec::new(), 0);
        groups.push((Vec::new(), new_accumulators()));
    }
    for row in rows {
        let key: Vec<Option<TupleValue>> = group_by.iter().map(|column| row.get(*column).clone()).collect();
        let index = match group_index.get(&key) {
            Some(index) => *index,
            None => {
                groups.push((key.clone(), new_accumulators()));
                group_index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        for (output, accumulator) in outputs.iter().zip(groups[index].1.iter_mut()) {
            match (output, accumulator) {
                (Output::CountStar, Accumulator::Count(count)) => *count += 1,
                (Output::CountDistinct(column), Accumulator::Distinct(seen)) => {
                    if let Some(value) = row.get(*column) {
                        seen.insert(value.clone());
                    }
                },
                _ => {}
            }
        }
    }

    Ok(groups.into_iter().map(|(key, accumulators)| {
        let values = outputs.iter().zip(accumulators).map(|(output, accumulator)| match (output, accumulator) {
            (Output::Column(column), _) => group_by.iter()
                .position(|c| c == column)
                .and_then(|position| key[position].clone()),
            (_, Accumulator::Count(count)) => Some(TupleValue::BigInt(count)),
            (_, Accumulator::Distinct(seen)) => Some(TupleValue::BigInt(seen.len() as i64)),
        }).collect();
        Tuple::new(values)
    }).collect())
}

/// Projects plain columns for an `INSERT ... SELECT`. Aggregates are not allowed there.
pub(super) fn execute_copy(table: &StoredTable, select: &SelectStatement) -> Result<Vec<Tuple>, EngineError> {
    let is_plain = select.group_by.is_empty() && select.items.iter()
        .all(|item| matches!(item.expression, SelectExpression::Star | SelectExpression::Column(_)));
    if !is_plain {
        return Err(EngineError::Unsupported("INSERT ... SELECT only supports plain column projections".to_string()));
    }
    Ok(execute_select(table, select)?.rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::memory::{ColumnDef, StoredTable}, parser::{parse_statement, Statement}, types::TupleValueType};

    fn orders() -> StoredTable {
        let mut table = StoredTable::new(
            "orders".to_string(),
            vec![ColumnDef::new("order_id", TupleValueType::Int), ColumnDef::new("total_amount", TupleValueType::Int)],
            vec![ColumnDef::new("user_id", TupleValueType::Int)],
            ',',
        );
        for (order_id, total_amount, user_id) in [(1, 10, 1), (2, 20, 1), (3, 30, 2), (4, 40, 3), (5, 50, 3)] {
            table.insert_row(vec![
                Some(TupleValue::Int(order_id)),
                Some(TupleValue::Int(total_amount)),
                Some(TupleValue::Int(user_id)),
            ]);
        }
        table
    }

    fn run(table: &StoredTable, query: &str) -> QueryResult {
        match parse_statement(query).unwrap() {
            Statement::Select(select) => execute_select(table, &select).unwrap(),
            other => panic!("Expected select, got {:?}", other),
        }
    }

    #[test]
    fn test_select_star_with_predicate() {
        let result = run(&orders(), "SELECT * FROM orders WHERE total_amount >= 30 AND user_id = 3");
        assert_eq!(result.columns, vec!["order_id", "total_amount", "user_id"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].values[0], Some(TupleValue::Int(4)));
    }

    #[test]
    fn test_count_distinct_and_group_by() {
        let table = orders();
        let result = run(&table, "SELECT COUNT(DISTINCT user_id) AS cardinality FROM orders");
        assert_eq!(result.columns, vec!["cardinality"]);
        assert_eq!(result.first_value(), Some(&TupleValue::BigInt(3)));

        let result = run(&table, "SELECT user_id, COUNT(*) FROM orders o GROUP BY o.user_id");
        assert_eq!(result.rows, vec![
            Tuple::new(vec![Some(TupleValue::Int(1)), Some(TupleValue::BigInt(2))]),
            Tuple::new(vec![Some(TupleValue::Int(2)), Some(TupleValue::BigInt(1))]),
            Tuple::new(vec![Some(TupleValue::Int(3)), Some(TupleValue::BigInt(2))]),
        ]);
    }

    #[test]
    fn test_count_on_empty_result() {
        let result = run(&orders(), "SELECT COUNT(*) FROM orders WHERE user_id = 42");
        assert_eq!(result.rows, vec![Tuple::new(vec![Some(TupleValue::BigInt(0))])]);
    }

    #[test]
    fn test_partition_key_pruning() {
        let table = orders();
        let predicate = match parse_statement("SELECT * FROM orders WHERE user_id = 1 AND total_amount > 5").unwrap() {
            Statement::Select(select) => Binder { table: &table, binding: None }.bind_predicate(select.where_clause.as_ref().unwrap()).unwrap(),
            _ => unreachable!(),
        };
        let regular_len = table.columns.len();
        assert_eq!(predicate.evaluate_on_key(&[Some(TupleValue::Int(2))], regular_len), Some(false));
        assert_eq!(predicate.evaluate_on_key(&[Some(TupleValue::Int(1))], regular_len), None);
    }

    #[test]
    fn test_unknown_column_and_ungrouped_column() {
        let table = orders();
        let select = "SELECT missing FROM orders";
        match parse_statement(select).unwrap() {
            Statement::Select(select) => assert!(matches!(execute_select(&table, &select), Err(EngineError::ColumnNotFound { .. }))),
            _ => unreachable!(),
        }
        match parse_statement("SELECT order_id, COUNT(*) FROM orders GROUP BY user_id").unwrap() {
            Statement::Select(select) => assert!(matches!(execute_select(&table, &select), Err(EngineError::Unsupported(_)))),
            _ => unreachable!(),
        }
        match parse_statement("SELECT * FROM orders WHERE user_id = 'three'").unwrap() {
            Statement::Select(select) => assert!(matches!(execute_select(&table, &select), Err(EngineError::Unsupported(_)))),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_limit() {
        let result = run(&orders(), "SELECT order_id FROM orders LIMIT 2");
        assert_eq!(result.rows.len(), 2);
    }
}
