/*
    Parser for the HiveQL subset the advisor speaks to its storage engine. It covers the
    statements needed to build, fill, rebuild and probe partitioned tables plus the simple
    single-table queries the bundled engine can execute as a workload:

        SET key=value
        CREATE TABLE t (c type, ...) [PARTITIONED BY (c type, ...)]
            [ROW FORMAT DELIMITED FIELDS TERMINATED BY ',']
        DROP TABLE [IF EXISTS] t
        ALTER TABLE a RENAME TO b
        LOAD DATA [LOCAL] INPATH 'path' [OVERWRITE] INTO TABLE t
        INSERT OVERWRITE TABLE t [PARTITION (c, ...)] SELECT ...
        SELECT items FROM t [alias] [WHERE ...] [GROUP BY ...] [LIMIT n]

    Joins, ORDER BY and arbitrary expressions are not understood. A real engine behind the
    Engine trait gets the raw statement text and never goes through this module.
 */

use std::fmt::Display;

use nom::IResult;
use nom::bytes::complete::{tag_no_case, tag, is_not, take_while1};
use nom::character::complete::{multispace0, multispace1, char, digit1, anychar, satisfy};
use nom::combinator::{opt, map_res, map, recognize, not, value};
use nom::sequence::{delimited, tuple, preceded, pair, terminated};
use nom::branch::alt;
use nom::character::is_alphanumeric;
use nom::multi::separated_list1;
use thiserror::Error;

use crate::types::{parse_decimal, TupleValue, TupleValueType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("could not parse statement: {0}")]
    Invalid(String),
    #[error("statement was not parsed fully, trailing suffix: '{0}'")]
    TrailingInput(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Statement<'a> {
    Set { key: &'a str, value: &'a str },
    CreateTable(CreateTableStatement<'a>),
    DropTable { name: &'a str, if_exists: bool },
    RenameTable { from: &'a str, to: &'a str },
    LoadData(LoadDataStatement<'a>),
    InsertOverwrite(InsertOverwriteStatement<'a>),
    Select(SelectStatement<'a>),
}

#[derive(Debug, PartialEq, Eq)]
pub struct BoundParseAttribute<'a> {
    pub name: &'a str,
    pub binding: Option<&'a str>
}

impl<'a> BoundParseAttribute<'a> {
    pub fn new_bound(binding: &'a str, name: &'a str) -> BoundParseAttribute<'a> {
        BoundParseAttribute { name, binding: Some(binding) }
    }

    pub fn new_unbound(name: &'a str) -> BoundParseAttribute<'a> {
        BoundParseAttribute { name, binding: None }
    }
}

impl Display for BoundParseAttribute<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(binding) = self.binding {
            write!(f, "{}.{}", binding, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct BoundParseTable<'a> {
    pub name: &'a str,
    pub binding: Option<&'a str>
}

impl<'a> BoundParseTable<'a> {
    pub fn new_bound(name: &'a str, binding: &'a str) -> BoundParseTable<'a> {
        BoundParseTable { name, binding: Some(binding) }
    }

    pub fn new_unbound(name: &'a str) -> BoundParseTable<'a> {
        BoundParseTable { name, binding: None }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SelectExpression<'a> {
    Star,
    Column(BoundParseAttribute<'a>),
    CountStar,
    CountDistinct(BoundParseAttribute<'a>),
}

#[derive(Debug, PartialEq, Eq)]
pub struct SelectItem<'a> {
    pub expression: SelectExpression<'a>,
    pub alias: Option<&'a str>
}

#[derive(Debug, PartialEq, Eq)]
pub struct SelectStatement<'a> {
    pub items: Vec<SelectItem<'a>>,
    pub from_table: BoundParseTable<'a>,
    pub where_clause: Option<ParseWhereClause<'a>>,
    pub group_by: Vec<BoundParseAttribute<'a>>,
    pub limit: Option<u64>
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseWhereClause<'a> {
    Equals(ParseWhereClauseItem<'a>, ParseWhereClauseItem<'a>),
    NotEquals(ParseWhereClauseItem<'a>, ParseWhereClauseItem<'a>),
    LessThan(ParseWhereClauseItem<'a>, ParseWhereClauseItem<'a>),
    GreaterThan(ParseWhereClauseItem<'a>, ParseWhereClauseItem<'a>),
    LessOrEqualThan(ParseWhereClauseItem<'a>, ParseWhereClauseItem<'a>),
    GreaterOrEqualThan(ParseWhereClauseItem<'a>, ParseWhereClauseItem<'a>),
    And(Box<ParseWhereClause<'a>>, Box<ParseWhereClause<'a>>),
    Or(Box<ParseWhereClause<'a>>, Box<ParseWhereClause<'a>>)
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseWhereClauseItem<'a> {
    Name(BoundParseAttribute<'a>),
    Value(TupleValue)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition<'a> {
    pub name: &'a str,
    pub column_type: TupleValueType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableStatement<'a> {
    pub name: &'a str,
    pub columns: Vec<ColumnDefinition<'a>>,
    pub partitioned_by: Vec<ColumnDefinition<'a>>,
    pub field_delimiter: Option<char>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDataStatement<'a> {
    pub path: &'a str,
    pub local: bool,
    pub overwrite: bool,
    pub table: &'a str
}

#[derive(Debug, PartialEq, Eq)]
pub struct InsertOverwriteStatement<'a> {
    pub table: &'a str,
    pub partition_columns: Vec<&'a str>,
    pub select: SelectStatement<'a>
}

const RESERVED_WORDS: [&str; 8] = ["where", "group", "limit", "order", "join", "on", "from", "as"];

/// Parses a complete statement. A single trailing semicolon is accepted.
pub fn parse_statement(statement: &str) -> Result<Statement, SyntaxError> {
    let trimmed = statement.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
    match parse_query(trimmed) {
        Ok((rest, parsed)) if rest.trim().is_empty() => Ok(parsed),
        Ok((rest, _)) => Err(SyntaxError::TrailingInput(rest.trim().to_string())),
        Err(e) => Err(SyntaxError::Invalid(e.to_string())),
    }
}

pub fn parse_query(query: &str) -> IResult<&str, Statement> {
    alt((
        map(parse_select, Statement::Select),
        parse_insert_overwrite,
        parse_create_table,
        parse_drop_table,
        parse_rename_table,
        parse_load_data,
        parse_set,
    ))(query)
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
    where F: FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

// Keyword that is not just the prefix of a longer identifier
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(word), not(satisfy(is_sql_identifier_char)))
}

fn is_sql_identifier_char(char: char) -> bool {
    char.is_ascii() && (is_alphanumeric(char as u8) || char == '_')
}

fn parse_identifier(rest_query: &str) -> IResult<&str, &str> {
    take_while1(is_sql_identifier_char)(rest_query)
}

fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.iter().any(|r| r.eq_ignore_ascii_case(word))
}

fn parse_set(rest_query: &str) -> IResult<&str, Statement> {
    let (rest_query, _) = keyword("SET")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, key) = take_while1(|c: char| c != '=' && !c.is_whitespace())(rest_query)?;
    let (rest_query, _) = ws(char('='))(rest_query)?;
    let (rest_query, value) = is_not(";")(rest_query)?;
    Ok((rest_query, Statement::Set { key, value: value.trim() }))
}

fn parse_select(rest_query: &str) -> IResult<&str, SelectStatement> {
    let (rest_query, _) = keyword("SELECT")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, items) = separated_list1(parse_sql_list_separator, parse_select_item)(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, _) = keyword("FROM")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, from_table) = parse_sql_bound_table(rest_query)?;
    let (rest_query, where_clause) = opt(parse_where_and_where_clause)(rest_query)?;
    let (rest_query, group_by) = opt(parse_group_by)(rest_query)?;
    let (rest_query, limit) = opt(parse_limit)(rest_query)?;
    Ok((rest_query, SelectStatement {
        items,
        from_table,
        where_clause,
        group_by: group_by.unwrap_or_default(),
        limit
    }))
}

fn parse_select_item(rest_query: &str) -> IResult<&str, SelectItem> {
    let (rest_query, expression) = alt((
        map(char('*'), |_| SelectExpression::Star),
        parse_count_star,
        parse_count_distinct,
        map(parse_sql_bound_attribute, SelectExpression::Column),
    ))(rest_query)?;
    let (rest_query, alias) = opt(preceded(
        tuple((multispace0, keyword("AS"), multispace1)),
        parse_identifier
    ))(rest_query)?;
    Ok((rest_query, SelectItem { expression, alias }))
}

fn parse_count_star(rest_query: &str) -> IResult<&str, SelectExpression> {
    let (rest_query, _) = tag_no_case("COUNT")(rest_query)?;
    let (rest_query, _) = ws(char('('))(rest_query)?;
    let (rest_query, _) = char('*')(rest_query)?;
    let (rest_query, _) = preceded(multispace0, char(')'))(rest_query)?;
    Ok((rest_query, SelectExpression::CountStar))
}

fn parse_count_distinct(rest_query: &str) -> IResult<&str, SelectExpression> {
    let (rest_query, _) = tag_no_case("COUNT")(rest_query)?;
    let (rest_query, _) = ws(char('('))(rest_query)?;
    let (rest_query, _) = keyword("DISTINCT")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, attribute) = parse_sql_bound_attribute(rest_query)?;
    let (rest_query, _) = preceded(multispace0, char(')'))(rest_query)?;
    Ok((rest_query, SelectExpression::CountDistinct(attribute)))
}

fn parse_sql_bound_attribute(rest_query: &str) -> IResult<&str, BoundParseAttribute> {
    let (rest_query, elem1) = parse_identifier(rest_query)?;
    let (rest_query, elem2) = opt(preceded(tag("."), parse_identifier))(rest_query)?;
    if let Some(name) = elem2 {
        Ok((rest_query, BoundParseAttribute { name, binding: Some(elem1) }))
    } else {
        Ok((rest_query, BoundParseAttribute { name: elem1, binding: None }))
    }
}

fn parse_sql_bound_table(rest_query: &str) -> IResult<&str, BoundParseTable> {
    let (rest_query, name) = parse_identifier(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    let (binding_rest_query, binding) = opt(parse_identifier)(rest_query)?;
    let (rest_query, binding) = if binding.map(is_reserved) != Some(true) {
        (binding_rest_query, binding)
    } else {
        (rest_query, None)
    };
    Ok((rest_query, BoundParseTable { name, binding }))
}

fn parse_sql_list_separator(rest_query: &str) -> IResult<&str, char> {
    ws(char(','))(rest_query)
}

fn parse_group_by(rest_query: &str) -> IResult<&str, Vec<BoundParseAttribute>> {
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, _) = keyword("GROUP")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("BY")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    separated_list1(parse_sql_list_separator, parse_sql_bound_attribute)(rest_query)
}

fn parse_limit(rest_query: &str) -> IResult<&str, u64> {
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, _) = keyword("LIMIT")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    map_res(digit1, str::parse::<u64>)(rest_query)
}

fn parse_where_and_where_clause(rest_query: &str) -> IResult<&str, ParseWhereClause> {
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, _) = keyword("WHERE")(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    parse_where_clause(rest_query)
}

fn parse_where_clause(rest_query: &str) -> IResult<&str, ParseWhereClause> {
    let (rest_query, left) = parse_where_term(rest_query)?;
    parse_or_and_right(rest_query, left)
}

fn parse_where_term(rest_query: &str) -> IResult<&str, ParseWhereClause> {
    let (rest_query, left) = parse_atomic_where_clause(rest_query)?;
    parse_and_and_right(rest_query, left)
}

fn parse_and_and_right<'a>(rest_query: &'a str, left_side: ParseWhereClause<'a>)
    -> IResult<&'a str, ParseWhereClause<'a>> {
    let (operator_rest_query, operator_option) = opt(preceded(multispace0, keyword("AND")))(rest_query)?;
    if operator_option.is_none() {
        return Ok((rest_query, left_side))
    };
    let (rest_query, _) = multispace0(operator_rest_query)?;
    let (rest_query, right_side) = parse_atomic_where_clause(rest_query)?;
    let where_clause = ParseWhereClause::And(Box::from(left_side), Box::from(right_side));
    parse_and_and_right(rest_query, where_clause)
}

fn parse_or_and_right<'a>(rest_query: &'a str, left_side: ParseWhereClause<'a>)
    -> IResult<&'a str, ParseWhereClause<'a>> {
    let (operator_rest_query, operator_option) = opt(preceded(multispace0, keyword("OR")))(rest_query)?;
    if operator_option.is_none() {
        return Ok((rest_query, left_side));
    }
    let (rest_query, _) = multispace0(operator_rest_query)?;
    let (rest_query, right_side) = parse_where_term(rest_query)?;
    let where_clause = ParseWhereClause::Or(Box::from(left_side), Box::from(right_side));
    parse_or_and_right(rest_query, where_clause)
}

fn parse_atomic_where_clause(rest_query: &str) -> IResult<&str, ParseWhereClause> {
    alt((parse_bracketed_where_clause, parse_comparison_where_clause))(rest_query)
}

fn parse_bracketed_where_clause(rest_query: &str) -> IResult<&str, ParseWhereClause> {
    delimited(char('('), ws(parse_where_clause), char(')'))(rest_query)
}

fn parse_comparison_where_clause(rest_query: &str) -> IResult<&str, ParseWhereClause> {
    let (rest_query, left_side) = parse_where_clause_item(rest_query)?;
    let (rest_query, operator) = ws(parse_comp_operator)(rest_query)?;
    let (rest_query, right_side) = parse_where_clause_item(rest_query)?;
    let clause = match operator {
        "=" => ParseWhereClause::Equals(left_side, right_side),
        "<" => ParseWhereClause::LessThan(left_side, right_side),
        "<=" => ParseWhereClause::LessOrEqualThan(left_side, right_side),
        ">" => ParseWhereClause::GreaterThan(left_side, right_side),
        ">=" => ParseWhereClause::GreaterOrEqualThan(left_side, right_side),
        _ => ParseWhereClause::NotEquals(left_side, right_side),
    };
    Ok((rest_query, clause))
}

fn parse_comp_operator(rest_query: &str) -> IResult<&str, &str> {
    alt((tag("<="), tag(">="), tag("<>"), tag("!="), tag("="), tag("<"), tag(">")))(rest_query)
}

fn parse_where_clause_item(rest_query: &str) -> IResult<&str, ParseWhereClauseItem> {
    alt((
        map(parse_string_value, ParseWhereClauseItem::Value),
        map(parse_numeric_value, ParseWhereClauseItem::Value),
        map(parse_sql_bound_attribute, ParseWhereClauseItem::Name),
    ))(rest_query)
}

fn parse_string_literal(rest_query: &str) -> IResult<&str, &str> {
    let (rest_query, string) = delimited(char('\''), opt(is_not("'")), char('\''))(rest_query)?;
    Ok((rest_query, string.unwrap_or("")))
}

fn parse_string_value(rest_query: &str) -> IResult<&str, TupleValue> {
    map(parse_string_literal, |s| TupleValue::String(String::from(s)))(rest_query)
}

fn parse_numeric_value(rest_query: &str) -> IResult<&str, TupleValue> {
    map_res(
        terminated(
            recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1))))),
            not(satisfy(is_sql_identifier_char))
        ),
        |literal: &str| if literal.contains('.') {
            parse_decimal(literal)
                .map(|(unscaled, scale)| TupleValue::Decimal(unscaled, scale))
                .ok_or("invalid decimal literal")
        } else {
            literal.parse::<i64>().map(TupleValue::BigInt).map_err(|_| "integer literal out of range")
        }
    )(rest_query)
}

fn parse_insert_overwrite(rest_query: &str) -> IResult<&str, Statement> {
    let (rest_query, _) = keyword("INSERT")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("OVERWRITE")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("TABLE")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, table) = parse_identifier(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, partition_columns) = opt(terminated(preceded(
        terminated(keyword("PARTITION"), multispace0),
        delimited(
            char('('),
            separated_list1(parse_sql_list_separator, ws(parse_identifier)),
            char(')')
        )
    ), multispace0))(rest_query)?;
    let (rest_query, select) = parse_select(rest_query)?;
    Ok((rest_query, Statement::InsertOverwrite(InsertOverwriteStatement {
        table,
        partition_columns: partition_columns.unwrap_or_default(),
        select
    })))
}

fn parse_create_table(rest_query: &str) -> IResult<&str, Statement> {
    let (rest_query, _) = keyword("CREATE")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("TABLE")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, name) = parse_identifier(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, columns) = delimited(char('('), parse_table_definition, char(')'))(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, partitioned_by) = opt(parse_partitioned_by)(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, field_delimiter) = opt(parse_row_format)(rest_query)?;
    Ok((rest_query, Statement::CreateTable(CreateTableStatement {
        name,
        columns,
        partitioned_by: partitioned_by.unwrap_or_default(),
        field_delimiter
    })))
}

fn parse_partitioned_by(rest_query: &str) -> IResult<&str, Vec<ColumnDefinition>> {
    let (rest_query, _) = keyword("PARTITIONED")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("BY")(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    delimited(char('('), parse_table_definition, char(')'))(rest_query)
}

fn parse_row_format(rest_query: &str) -> IResult<&str, char> {
    let (rest_query, _) = tuple((
        keyword("ROW"), multispace1,
        keyword("FORMAT"), multispace1,
        keyword("DELIMITED"), multispace1,
        keyword("FIELDS"), multispace1,
        keyword("TERMINATED"), multispace1,
        keyword("BY"), multispace0
    ))(rest_query)?;
    delimited(char('\''), anychar, char('\''))(rest_query)
}

fn parse_table_definition(rest_query: &str) -> IResult<&str, Vec<ColumnDefinition>> {
    separated_list1(char(','), ws(parse_column_definition))(rest_query)
}

fn parse_column_definition(rest_query: &str) -> IResult<&str, ColumnDefinition> {
    let (rest_query, name) = parse_identifier(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, column_type) = parse_sql_type(rest_query)?;
    Ok((rest_query, ColumnDefinition { name, column_type }))
}

pub fn parse_sql_type(rest_query: &str) -> IResult<&str, TupleValueType> {
    alt((
        value(TupleValueType::BigInt, keyword("BIGINT")),
        value(TupleValueType::SmallInt, alt((keyword("SMALLINT"), keyword("TINYINT")))),
        value(TupleValueType::Int, alt((keyword("INTEGER"), keyword("INT")))),
        value(TupleValueType::String, keyword("STRING")),
        value(TupleValueType::Timestamp, keyword("TIMESTAMP")),
        value(TupleValueType::Date, keyword("DATE")),
        map(preceded(
            terminated(keyword("VARCHAR"), multispace0),
            delimited(char('('), ws(map_res(digit1, |s: &str| s.parse::<u16>())), char(')'))
        ), TupleValueType::VarChar),
        parse_decimal_type,
    ))(rest_query)
}

fn parse_decimal_type(rest_query: &str) -> IResult<&str, TupleValueType> {
    let (rest_query, _) = keyword("DECIMAL")(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, arguments) = opt(delimited(
        char('('),
        pair(
            ws(map_res(digit1, |s: &str| s.parse::<u8>())),
            opt(preceded(char(','), ws(map_res(digit1, |s: &str| s.parse::<u8>()))))
        ),
        char(')')
    ))(rest_query)?;
    // Hive defaults to DECIMAL(10,0)
    let (precision, scale) = match arguments {
        Some((precision, scale)) => (precision, scale.unwrap_or(0)),
        None => (10, 0),
    };
    Ok((rest_query, TupleValueType::Decimal { precision, scale }))
}

fn parse_drop_table(rest_query: &str) -> IResult<&str, Statement> {
    let (rest_query, _) = keyword("DROP")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("TABLE")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, if_exists) = opt(tuple((keyword("IF"), multispace1, keyword("EXISTS"), multispace1)))(rest_query)?;
    let (rest_query, name) = parse_identifier(rest_query)?;
    Ok((rest_query, Statement::DropTable { name, if_exists: if_exists.is_some() }))
}

fn parse_rename_table(rest_query: &str) -> IResult<&str, Statement> {
    let (rest_query, _) = keyword("ALTER")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("TABLE")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, from) = parse_identifier(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("RENAME")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("TO")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, to) = parse_identifier(rest_query)?;
    Ok((rest_query, Statement::RenameTable { from, to }))
}

fn parse_load_data(rest_query: &str) -> IResult<&str, Statement> {
    let (rest_query, _) = keyword("LOAD")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("DATA")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, local) = opt(terminated(keyword("LOCAL"), multispace1))(rest_query)?;
    let (rest_query, _) = keyword("INPATH")(rest_query)?;
    let (rest_query, _) = multispace0(rest_query)?;
    let (rest_query, path) = parse_string_literal(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, overwrite) = opt(terminated(keyword("OVERWRITE"), multispace1))(rest_query)?;
    let (rest_query, _) = keyword("INTO")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, _) = keyword("TABLE")(rest_query)?;
    let (rest_query, _) = multispace1(rest_query)?;
    let (rest_query, table) = parse_identifier(rest_query)?;
    Ok((rest_query, Statement::LoadData(LoadDataStatement {
        path,
        local: local.is_some(),
        overwrite: overwrite.is_some(),
        table
    })))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_simple_select() {
        let query = "SELECT a, b FROM test";

        test_parse(query, Statement::Select(SelectStatement {
            items: vec![column_item("a"), column_item("b")],
            from_table: BoundParseTable::new_unbound("test"),
            where_clause: None,
            group_by: vec![],
            limit: None
        }));
    }

    #[test]
    fn test_simple_select_star() {
        let query = "SELECT * FROM test";

        test_parse(query, Statement::Select(SelectStatement {
            items: vec![SelectItem { expression: SelectExpression::Star, alias: None }],
            from_table: BoundParseTable::new_unbound("test"),
            where_clause: None,
            group_by: vec![],
            limit: None
        }));
    }

    #[test]
    fn test_simple_select_with_where() {
        let query = "SELECT a, b FROM test t where t.c = 5";

        test_parse(query, Statement::Select(SelectStatement {
            items: vec![column_item("a"), column_item("b")],
            from_table: BoundParseTable::new_bound("test", "t"),
            where_clause: Some(
                ParseWhereClause::Equals(
                    ParseWhereClauseItem::Name(BoundParseAttribute::new_bound("t", "c")),
                    ParseWhereClauseItem::Value(TupleValue::BigInt(5))
                )
            ),
            group_by: vec![],
            limit: None
        }));
    }

    #[test]
    fn test_select_with_where_and_or() {
        let query = "SELECT a FROM test where c < 5 and a = 'abc' or b >= 2.50";

        test_parse(query, Statement::Select(SelectStatement {
            items: vec![column_item("a")],
            from_table: BoundParseTable::new_unbound("test"),
            where_clause: Some(
                ParseWhereClause::Or(
                    Box::new(ParseWhereClause::And(
                        Box::new(ParseWhereClause::LessThan(
                            ParseWhereClauseItem::Name(BoundParseAttribute::new_unbound("c")),
                            ParseWhereClauseItem::Value(TupleValue::BigInt(5))
                        )),
                        Box::new(ParseWhereClause::Equals(
                            ParseWhereClauseItem::Name(BoundParseAttribute::new_unbound("a")),
                            ParseWhereClauseItem::Value(TupleValue::String(String::from("abc")))
                        ))
                    )),
                    Box::new(ParseWhereClause::GreaterOrEqualThan(
                        ParseWhereClauseItem::Name(BoundParseAttribute::new_unbound("b")),
                        ParseWhereClauseItem::Value(TupleValue::Decimal(250, 2))
                    ))
                )
            ),
            group_by: vec![],
            limit: None
        }));
    }

    #[test]
    fn test_select_aggregates_group_by_limit() {
        let query = "SELECT user_id, COUNT(*) AS order_count, count(DISTINCT order_date) FROM orders GROUP BY user_id LIMIT 10";

        test_parse(query, Statement::Select(SelectStatement {
            items: vec![
                column_item("user_id"),
                SelectItem { expression: SelectExpression::CountStar, alias: Some("order_count") },
                SelectItem { expression: SelectExpression::CountDistinct(BoundParseAttribute::new_unbound("order_date")), alias: None },
            ],
            from_table: BoundParseTable::new_unbound("orders"),
            where_clause: None,
            group_by: vec![BoundParseAttribute::new_unbound("user_id")],
            limit: Some(10)
        }));
    }

    #[test]
    fn test_select_with_where_mixed_case_and_semicolon() {
        let query = "SEleCT a frOm test wHere (c = 5 OR c = 6);";

        let parsed = parse_statement(query).unwrap();
        match parsed {
            Statement::Select(select) => assert!(matches!(select.where_clause, Some(ParseWhereClause::Or(_, _)))),
            other => panic!("Expected select, got {:?}", other),
        }
    }

    #[test]
    fn test_create_partitioned_table() {
        let query = "CREATE TABLE orders_temp_1 (\n    order_id INT,\n    total_amount DECIMAL(10,2)\n)\nPARTITIONED BY (\n    order_date TIMESTAMP\n)\nROW FORMAT DELIMITED\nFIELDS TERMINATED BY ','";

        test_parse(query, Statement::CreateTable(CreateTableStatement {
            name: "orders_temp_1",
            columns: vec![
                ColumnDefinition { name: "order_id", column_type: TupleValueType::Int },
                ColumnDefinition { name: "total_amount", column_type: TupleValueType::Decimal { precision: 10, scale: 2 } },
            ],
            partitioned_by: vec![ColumnDefinition { name: "order_date", column_type: TupleValueType::Timestamp }],
            field_delimiter: Some(',')
        }));
    }

    #[test]
    fn test_create_plain_table() {
        let query = "CREATE TABLE student(name STRING, age INT, nickname VARCHAR(20))";

        test_parse(query, Statement::CreateTable(CreateTableStatement {
            name: "student",
            columns: vec![
                ColumnDefinition { name: "name", column_type: TupleValueType::String },
                ColumnDefinition { name: "age", column_type: TupleValueType::Int },
                ColumnDefinition { name: "nickname", column_type: TupleValueType::VarChar(20) },
            ],
            partitioned_by: vec![],
            field_delimiter: None
        }));
    }

    #[test]
    fn test_insert_overwrite_with_partition() {
        let query = "INSERT OVERWRITE TABLE orders_temp\n        PARTITION (user_id, order_date)\n        SELECT order_id, total_amount, user_id, order_date FROM orders";

        test_parse(query, Statement::InsertOverwrite(InsertOverwriteStatement {
            table: "orders_temp",
            partition_columns: vec!["user_id", "order_date"],
            select: SelectStatement {
                items: vec![column_item("order_id"), column_item("total_amount"), column_item("user_id"), column_item("order_date")],
                from_table: BoundParseTable::new_unbound("orders"),
                where_clause: None,
                group_by: vec![],
                limit: None
            }
        }));
    }

    #[test]
    fn test_ddl_helpers() {
        test_parse("DROP TABLE IF EXISTS users", Statement::DropTable { name: "users", if_exists: true });
        test_parse("DROP TABLE users", Statement::DropTable { name: "users", if_exists: false });
        test_parse("ALTER TABLE users_temp_3 RENAME TO users", Statement::RenameTable { from: "users_temp_3", to: "users" });
        test_parse("SET hive.exec.max.dynamic.partitions=1005", Statement::Set { key: "hive.exec.max.dynamic.partitions", value: "1005" });
        test_parse(
            "LOAD DATA LOCAL INPATH 'file:///data/users.csv' OVERWRITE INTO TABLE users",
            Statement::LoadData(LoadDataStatement { path: "file:///data/users.csv", local: true, overwrite: true, table: "users" })
        );
    }

    #[test]
    fn test_gibberish_error() {
        assert!(matches!(parse_statement("SELFROMWHERE a TO XYZ MAKES NO SENSE!;"), Err(SyntaxError::Invalid(_))));
        assert!(matches!(parse_statement("SELECT a FROM t ORDER BY a"), Err(SyntaxError::TrailingInput(_))));
    }

    fn column_item(name: &str) -> SelectItem {
        SelectItem { expression: SelectExpression::Column(BoundParseAttribute::new_unbound(name)), alias: None }
    }

    fn test_parse(query: &str, expected: Statement) {
        match parse_statement(query) {
            Ok(parse_tree) => assert_eq!(expected, parse_tree),
            Err(e) => panic!("Parse error where successful parse was expected: {}", e),
        }
    }
}
