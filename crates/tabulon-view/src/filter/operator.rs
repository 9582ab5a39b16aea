//! Filter operators and their evaluation against a single cell

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tabulon_core::{CellValue, EngineError, parse_number};

/// Comparison applied by a filter rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    // Equality operators
    #[default]
    Equals,
    NotEquals,

    // String operators
    Contains,
    NotContains,
    StartsWith,
    EndsWith,

    // Numeric comparison operators
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,

    // Empty operators
    IsEmpty,
    IsNotEmpty,

    // Range operator
    Between,
}

impl FilterOperator {
    /// Get the display label for the operator
    pub fn label(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::Contains => "contains",
            Self::NotContains => "does not contain",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::IsEmpty => "is empty",
            Self::IsNotEmpty => "is not empty",
            Self::Between => "is between",
        }
    }

    /// Canonical name, as accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::GreaterThan => "greaterThan",
            Self::LessThan => "lessThan",
            Self::GreaterOrEqual => "greaterOrEqual",
            Self::LessOrEqual => "lessOrEqual",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
            Self::Between => "between",
        }
    }

    /// Returns true if this operator requires a value input
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }

    /// Returns true if this operator requires two values
    pub fn requires_two_values(&self) -> bool {
        matches!(self, Self::Between)
    }

    /// Returns true if both operands are coerced to numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::GreaterThan
                | Self::LessThan
                | Self::GreaterOrEqual
                | Self::LessOrEqual
                | Self::Between
        )
    }

    /// Get all available operators in display order
    pub fn all() -> &'static [FilterOperator] {
        &[
            Self::Equals,
            Self::NotEquals,
            Self::Contains,
            Self::NotContains,
            Self::StartsWith,
            Self::EndsWith,
            Self::GreaterThan,
            Self::LessThan,
            Self::GreaterOrEqual,
            Self::LessOrEqual,
            Self::IsEmpty,
            Self::IsNotEmpty,
            Self::Between,
        ]
    }

    /// Evaluate the operator against a cell.
    ///
    /// Numeric operators parse both the cell and the operand; if either side
    /// is not a number the result is a non-match.
    pub fn evaluate(&self, cell: &CellValue, value: &str, value2: Option<&str>) -> bool {
        match self {
            Self::Equals => values_equal(cell, value),
            Self::NotEquals => !values_equal(cell, value),

            Self::Contains => lower(cell).contains(&value.to_lowercase()),
            Self::NotContains => !lower(cell).contains(&value.to_lowercase()),
            Self::StartsWith => lower(cell).starts_with(&value.to_lowercase()),
            Self::EndsWith => lower(cell).ends_with(&value.to_lowercase()),

            Self::GreaterThan => numeric(cell, value).is_some_and(|(x, v)| x > v),
            Self::LessThan => numeric(cell, value).is_some_and(|(x, v)| x < v),
            Self::GreaterOrEqual => numeric(cell, value).is_some_and(|(x, v)| x >= v),
            Self::LessOrEqual => numeric(cell, value).is_some_and(|(x, v)| x <= v),

            Self::IsEmpty => cell.is_empty(),
            Self::IsNotEmpty => !cell.is_empty(),

            Self::Between => {
                let Some(high) = value2.and_then(parse_number) else {
                    return false;
                };
                numeric(cell, value).is_some_and(|(x, low)| low <= x && x <= high)
            }
        }
    }
}

impl FromStr for FilterOperator {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        let operator = match normalized.as_str() {
            "equals" | "eq" | "=" | "==" => Self::Equals,
            "notequals" | "ne" | "!=" | "<>" => Self::NotEquals,
            "contains" => Self::Contains,
            "notcontains" | "doesnotcontain" => Self::NotContains,
            "startswith" | "beginswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "greaterthan" | "gt" | ">" => Self::GreaterThan,
            "lessthan" | "lt" | "<" => Self::LessThan,
            "greaterorequal" | "gte" | ">=" => Self::GreaterOrEqual,
            "lessorequal" | "lte" | "<=" => Self::LessOrEqual,
            "isempty" => Self::IsEmpty,
            "isnotempty" => Self::IsNotEmpty,
            "between" => Self::Between,
            _ => return Err(EngineError::UnknownOperator(s.to_string())),
        };
        Ok(operator)
    }
}

fn lower(cell: &CellValue) -> String {
    cell.to_string().to_lowercase()
}

fn numeric(cell: &CellValue, value: &str) -> Option<(f64, f64)> {
    Some((cell.as_f64()?, parse_number(value)?))
}

/// Numeric equality when both sides are numbers, otherwise case-insensitive text
fn values_equal(cell: &CellValue, value: &str) -> bool {
    if let Some((x, v)) = numeric(cell, value) {
        return x == v;
    }
    cell.to_string().to_lowercase() == value.trim().to_lowercase()
}
