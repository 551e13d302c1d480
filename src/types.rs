use std::{cmp::Ordering, fmt::Display, hash::{Hash, Hasher}};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TupleValueType {
    BigInt,
    Int,
    SmallInt,
    String,
    VarChar(u16),
    Decimal { precision: u8, scale: u8 },
    Timestamp,
    Date,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TupleValueConversionError {
    #[error("'{value}' is not a valid {target}")]
    InvalidLiteral { value: String, target: TupleValueType },
    #[error("'{value}' does not fit into {target}")]
    OutOfRange { value: String, target: TupleValueType },
}

impl TupleValueType {
    pub fn is_numeric(&self) -> bool {
        matches!(self,
            TupleValueType::BigInt
            | TupleValueType::Int
            | TupleValueType::SmallInt
            | TupleValueType::Decimal { .. })
    }

    pub fn is_comparable_to(&self, other: &TupleValueType) -> bool {
        // Timestamps and dates are kept in their textual ISO form, so they compare like strings
        self.is_numeric() == other.is_numeric()
    }

    pub fn is_comparable_to_value(&self, value: &TupleValue) -> bool {
        self.is_numeric() == value.is_numeric()
    }

    /// Parses one field of a delimited text file. Empty fields are NULL.
    pub fn parse_field(&self, raw: &str) -> Result<Option<TupleValue>, TupleValueConversionError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("\\N") {
            return Ok(None);
        }
        let invalid = || TupleValueConversionError::InvalidLiteral { value: raw.to_string(), target: *self };
        let out_of_range = || TupleValueConversionError::OutOfRange { value: raw.to_string(), target: *self };
        let value = match self {
            TupleValueType::BigInt => TupleValue::BigInt(raw.parse().map_err(|_| invalid())?),
            TupleValueType::Int => TupleValue::Int(raw.parse().map_err(|_| invalid())?),
            TupleValueType::SmallInt => TupleValue::SmallInt(raw.parse().map_err(|_| invalid())?),
            TupleValueType::String | TupleValueType::Timestamp | TupleValueType::Date => TupleValue::String(raw.to_string()),
            TupleValueType::VarChar(length) => {
                if raw.chars().count() > *length as usize {
                    return Err(out_of_range());
                }
                TupleValue::String(raw.to_string())
            },
            TupleValueType::Decimal { precision, scale } => {
                let (unscaled, parsed_scale) = parse_decimal(raw).ok_or_else(invalid)?;
                let unscaled = rescale(unscaled, parsed_scale, *scale).ok_or_else(out_of_range)?;
                if 10u128.checked_pow(*precision as u32).map_or(false, |limit| unscaled.unsigned_abs() >= limit) {
                    return Err(out_of_range());
                }
                TupleValue::Decimal(unscaled, *scale)
            },
        };
        Ok(Some(value))
    }
}

impl Display for TupleValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TupleValueType::BigInt => write!(f, "BIGINT"),
            TupleValueType::Int => write!(f, "INT"),
            TupleValueType::SmallInt => write!(f, "SMALLINT"),
            TupleValueType::String => write!(f, "STRING"),
            TupleValueType::VarChar(size) => write!(f, "VARCHAR({})", size),
            TupleValueType::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
            TupleValueType::Timestamp => write!(f, "TIMESTAMP"),
            TupleValueType::Date => write!(f, "DATE"),
        }
    }
}

/// Splits a decimal literal like `-12.50` into its unscaled value and scale.
pub fn parse_decimal(raw: &str) -> Option<(i128, u8)> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (integral, fractional) = digits.split_once('.').unwrap_or((digits, ""));
    if integral.is_empty() && fractional.is_empty() {
        return None;
    }
    if !integral.chars().chain(fractional.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let scale = u8::try_from(fractional.len()).ok()?;
    let unscaled: i128 = format!("{}{}", integral, fractional).parse().ok()?;
    Some((if negative { -unscaled } else { unscaled }, scale))
}

fn rescale(unscaled: i128, from: u8, to: u8) -> Option<i128> {
    match from.cmp(&to) {
        Ordering::Equal => Some(unscaled),
        Ordering::Less => unscaled.checked_mul(10i128.checked_pow((to - from) as u32)?),
        // Hive truncates surplus fractional digits on load
        Ordering::Greater => Some(unscaled / 10i128.checked_pow((from - to) as u32)?),
    }
}

#[derive(Debug, Clone)]
pub enum TupleValue {
    BigInt(i64),
    Int(i32),
    SmallInt(i16),
    Decimal(i128, u8),
    String(String),
}

impl TupleValue {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, TupleValue::String(_))
    }

    pub fn as_big_int(&self) -> Option<i64> {
        match self {
            TupleValue::BigInt(value) => Some(*value),
            TupleValue::Int(value) => Some(*value as i64),
            TupleValue::SmallInt(value) => Some(*value as i64),
            TupleValue::Decimal(unscaled, 0) => i64::try_from(*unscaled).ok(),
            _ => None,
        }
    }

    // Numeric values widened to a common decimal representation
    fn as_scaled(&self, scale: u8) -> Option<i128> {
        match self {
            TupleValue::BigInt(v) => rescale(*v as i128, 0, scale),
            TupleValue::Int(v) => rescale(*v as i128, 0, scale),
            TupleValue::SmallInt(v) => rescale(*v as i128, 0, scale),
            TupleValue::Decimal(v, s) => rescale(*v, *s, scale),
            TupleValue::String(_) => None,
        }
    }

    fn scale(&self) -> u8 {
        match self {
            TupleValue::Decimal(_, scale) => *scale,
            _ => 0,
        }
    }
}

impl PartialEq for TupleValue {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl Eq for TupleValue {}

// Equal numeric values of different types must hash alike
impl Hash for TupleValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            TupleValue::String(s) => s.hash(state),
            numeric => {
                let (mut unscaled, mut scale) = (numeric.as_scaled(numeric.scale()).unwrap_or_default(), numeric.scale());
                while scale > 0 && unscaled % 10 == 0 {
                    unscaled /= 10;
                    scale -= 1;
                }
                (unscaled, scale).hash(state);
            }
        }
    }
}

impl PartialOrd for TupleValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // For numeric types also allow comparisons between different types (like bigint with decimal)
        match (self, other) {
            (TupleValue::String(a), TupleValue::String(b)) => a.partial_cmp(b),
            (TupleValue::String(_), _) | (_, TupleValue::String(_)) => None,
            (a, b) => {
                let scale = a.scale().max(b.scale());
                a.as_scaled(scale)?.partial_cmp(&b.as_scaled(scale)?)
            }
        }
    }
}

impl Display for TupleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TupleValue::BigInt(i) => write!(f, "{}", i),
            TupleValue::Int(i) => write!(f, "{}", i),
            TupleValue::SmallInt(i) => write!(f, "{}", i),
            TupleValue::Decimal(unscaled, 0) => write!(f, "{}", unscaled),
            TupleValue::Decimal(unscaled, scale) => {
                let divisor = 10i128.pow(*scale as u32);
                let sign = if *unscaled < 0 { "-" } else { "" };
                let abs = unscaled.unsigned_abs();
                write!(f, "{}{}.{:0width$}", sign, abs / divisor as u128, abs % divisor as u128, width = *scale as usize)
            },
            TupleValue::String(s) => write!(f, "\"{}\"", s.escape_debug()),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Tuple {
    pub values: Vec<Option<TupleValue>>
}

impl Tuple {
    #[inline]
    pub fn new(values: Vec<Option<TupleValue>>) -> Tuple {
        Tuple { values }
    }
}
