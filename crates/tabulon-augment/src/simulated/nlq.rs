//! A toy query interpreter
//!
//! Understands three shapes, matched against column ids or labels:
//!
//! - `top 5 by sales` / `bottom 3 by margin`
//! - `sales > 100`, `region = west` (any operator `FilterOperator` parses)
//! - anything else is a case-insensitive text search over rendered cells

use std::str::FromStr;

use async_trait::async_trait;
use tabulon_core::{CellValue, ColumnDescriptor};
use tabulon_view::FilterOperator;
use tabulon_view::sorting::compare_cells;

use crate::error::{JobError, JobResult};
use crate::handlers::NaturalLanguageQuery;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedQuery;

#[async_trait]
impl<T: Clone + Send + Sync + 'static> NaturalLanguageQuery<T> for SimulatedQuery {
    async fn query(
        &self,
        query: &str,
        records: &[T],
        columns: &[ColumnDescriptor<T>],
    ) -> JobResult<Vec<T>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(JobError::failed("Query is empty"));
        }

        let tokens: Vec<&str> = query.split_whitespace().collect();

        if let Some(result) = ranked(&tokens, records, columns)? {
            return Ok(result);
        }
        if let Some(result) = comparison(&tokens, records, columns) {
            return Ok(result);
        }

        let needle = query.to_lowercase();
        Ok(records
            .iter()
            .filter(|record| {
                columns
                    .iter()
                    .any(|c| c.render(record).to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }
}

fn resolve<'a, T>(columns: &'a [ColumnDescriptor<T>], name: &str) -> Option<&'a ColumnDescriptor<T>> {
    columns
        .iter()
        .find(|c| c.id.eq_ignore_ascii_case(name) || c.label.eq_ignore_ascii_case(name))
}

/// `top|bottom N by <column>`
fn ranked<T: Clone>(
    tokens: &[&str],
    records: &[T],
    columns: &[ColumnDescriptor<T>],
) -> JobResult<Option<Vec<T>>> {
    let [direction, count, by, rest @ ..] = tokens else {
        return Ok(None);
    };
    let descending = match direction.to_lowercase().as_str() {
        "top" => true,
        "bottom" => false,
        _ => return Ok(None),
    };
    if !by.eq_ignore_ascii_case("by") || rest.is_empty() {
        return Ok(None);
    }
    let count: usize = count
        .parse()
        .map_err(|_| JobError::failed(format!("Not a row count: {count}")))?;
    let name = rest.join(" ");
    let column =
        resolve(columns, &name).ok_or_else(|| JobError::failed(format!("Unknown column: {name}")))?;

    let mut rows: Vec<(&T, CellValue)> =
        records.iter().map(|row| (row, column.value(row))).collect();
    // Nulls stay at the bottom whichever end is asked for.
    rows.sort_by(|(_, a), (_, b)| {
        let ordering = compare_cells(a, b);
        match (a.is_null() || b.is_null(), descending) {
            (false, true) => ordering.reverse(),
            _ => ordering,
        }
    });
    Ok(Some(
        rows.into_iter()
            .take(count)
            .map(|(row, _)| row.clone())
            .collect(),
    ))
}

/// `<column> <operator> <value>`
fn comparison<T: Clone>(
    tokens: &[&str],
    records: &[T],
    columns: &[ColumnDescriptor<T>],
) -> Option<Vec<T>> {
    let [name, operator, value @ ..] = tokens else {
        return None;
    };
    if value.is_empty() {
        return None;
    }
    let column = resolve(columns, name)?;
    let operator = FilterOperator::from_str(operator).ok()?;
    let value = value.join(" ");

    Some(
        records
            .iter()
            .filter(|record| operator.evaluate(&column.value(record), &value, None))
            .cloned()
            .collect(),
    )
}
