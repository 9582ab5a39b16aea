//! Stable single-column sorting
//!
//! Sorting works on index sequences so the record snapshot is never moved.
//! Every element is tagged with its input position and ties fall back to
//! that position, so stability does not depend on the sort algorithm.
//! Descending is the reversal of the ascending comparison, which keeps
//! `sort(desc) == reverse(sort(asc))` whenever keys are distinct.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tabulon_core::{CellValue, ColumnDescriptor, EngineError, Result, find_column, parse_number};
use unicase::UniCase;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

impl SortDirection {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(EngineError::Config(format!("unknown sort direction: {s}"))),
        }
    }
}

/// The single active sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortState {
    pub column_id: String,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(column_id: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column_id: column_id.into(),
            direction,
        }
    }

    pub fn asc(column_id: impl Into<String>) -> Self {
        Self::new(column_id, SortDirection::Asc)
    }

    pub fn desc(column_id: impl Into<String>) -> Self {
        Self::new(column_id, SortDirection::Desc)
    }

    /// Header-click cycle for a column: none -> asc -> desc -> none.
    /// Clicking a different column starts over at ascending.
    pub fn cycle(current: Option<&SortState>, column_id: &str) -> Option<SortState> {
        match current {
            Some(state) if state.column_id == column_id => match state.direction {
                SortDirection::Asc => Some(Self::desc(column_id)),
                SortDirection::Desc => None,
            },
            _ => Some(Self::asc(column_id)),
        }
    }
}

/// Look up the sort column, rejecting unknown and non-sortable columns
pub fn resolve_column<'a, T>(
    columns: &'a [ColumnDescriptor<T>],
    state: &SortState,
) -> Result<&'a ColumnDescriptor<T>> {
    let column = find_column(columns, &state.column_id)
        .ok_or_else(|| EngineError::UnknownColumn(state.column_id.clone()))?;
    if !column.is_sortable {
        return Err(EngineError::ColumnNotSortable(state.column_id.clone()));
    }
    Ok(column)
}

/// Reorder `indices` (positions into `records`) by one column
pub fn sort_indices<T>(
    records: &[T],
    indices: &[usize],
    column: &ColumnDescriptor<T>,
    direction: SortDirection,
) -> Vec<usize> {
    let mut tagged: Vec<(usize, usize, CellValue)> = indices
        .iter()
        .enumerate()
        .map(|(position, &idx)| (position, idx, column.value(&records[idx])))
        .collect();

    tagged.sort_unstable_by(|a, b| {
        direction
            .apply(compare_cells(&a.2, &b.2))
            .then(a.0.cmp(&b.0))
    });

    tagged.into_iter().map(|(_, idx, _)| idx).collect()
}

/// Sort a whole record set, returning references in sorted order
pub fn sort_records<'a, T>(
    records: &'a [T],
    columns: &[ColumnDescriptor<T>],
    state: Option<&SortState>,
) -> Result<Vec<&'a T>> {
    let all: Vec<usize> = (0..records.len()).collect();
    let order = match state {
        Some(state) => {
            let column = resolve_column(columns, state)?;
            sort_indices(records, &all, column, state.direction)
        }
        None => all,
    };
    Ok(order.into_iter().map(|idx| &records[idx]).collect())
}

/// Ascending comparison of two cells.
///
/// Cells are ranked first: numbers (including numeric text), then other
/// text and booleans, then nulls. Values only compare within a rank, which
/// keeps the ordering total for columns that mix codes like "9", "10" and
/// "1a". Numbers use `f64::total_cmp`; text compares case-insensitively
/// with the raw text as a tie-breaker.
pub fn compare_cells(a: &CellValue, b: &CellValue) -> Ordering {
    let (a_rank, b_rank) = (SortRank::of(a), SortRank::of(b));
    match (a_rank, b_rank) {
        (SortRank::Number(x), SortRank::Number(y)) => x.total_cmp(&y),
        (SortRank::Text, SortRank::Text) => {
            let a_text = a.to_string();
            let b_text = b.to_string();
            UniCase::new(a_text.as_str())
                .cmp(&UniCase::new(b_text.as_str()))
                .then_with(|| a_text.cmp(&b_text))
        }
        _ => a_rank.order().cmp(&b_rank.order()),
    }
}

#[derive(Debug, Clone, Copy)]
enum SortRank {
    Number(f64),
    Text,
    Null,
}

impl SortRank {
    fn of(value: &CellValue) -> Self {
        match value {
            CellValue::Null => Self::Null,
            CellValue::Int(v) => Self::Number(*v as f64),
            CellValue::Float(v) => Self::Number(*v),
            CellValue::Text(s) => parse_number(s).map_or(Self::Text, Self::Number),
            CellValue::Bool(_) => Self::Text,
        }
    }

    fn order(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text => 1,
            Self::Null => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u32,
        name: &'static str,
        score: Option<i64>,
    }

    fn row(id: u32, name: &'static str, score: Option<i64>) -> Row {
        Row { id, name, score }
    }

    fn columns() -> Vec<ColumnDescriptor<Row>> {
        vec![
            ColumnDescriptor::new("id", "ID", |r: &Row| r.id.into()).numeric(),
            ColumnDescriptor::new("name", "Name", |r: &Row| r.name.into()),
            ColumnDescriptor::new("score", "Score", |r: &Row| r.score.into()).numeric(),
            ColumnDescriptor::new("notes", "Notes", |_: &Row| CellValue::Null).sortable(false),
        ]
    }

    fn ids(rows: &[&Row]) -> Vec<u32> {
        rows.iter().map(|r| r.id).collect()
    }

    fn rows() -> Vec<Row> {
        vec![
            row(1, "beta", Some(20)),
            row(2, "Alpha", Some(10)),
            row(3, "alpha", Some(20)),
            row(4, "gamma", None),
            row(5, "Delta", Some(5)),
        ]
    }

    #[test]
    fn test_numeric_sort_with_nulls_last() {
        let rows = rows();
        let sorted = sort_records(&rows, &columns(), Some(&SortState::asc("score"))).unwrap();
        assert_eq!(ids(&sorted), vec![5, 2, 1, 3, 4]);
    }

    #[test]
    fn test_stable_for_equal_keys() {
        let rows = rows();
        // ids 1 and 3 share score 20 and keep input order in both directions
        let asc = sort_records(&rows, &columns(), Some(&SortState::asc("score"))).unwrap();
        let desc = sort_records(&rows, &columns(), Some(&SortState::desc("score"))).unwrap();
        assert_eq!(ids(&asc), vec![5, 2, 1, 3, 4]);
        assert_eq!(ids(&desc), vec![4, 1, 3, 2, 5]);
    }

    #[test]
    fn test_case_insensitive_text_sort() {
        let rows = rows();
        let sorted = sort_records(&rows, &columns(), Some(&SortState::asc("name"))).unwrap();
        // "Alpha" and "alpha" fold together; raw text breaks the tie
        assert_eq!(ids(&sorted), vec![2, 3, 1, 5, 4]);
    }

    #[test]
    fn test_desc_is_reverse_of_asc_for_distinct_keys() {
        let rows = rows();
        let asc = sort_records(&rows, &columns(), Some(&SortState::asc("id"))).unwrap();
        let mut desc = sort_records(&rows, &columns(), Some(&SortState::desc("id"))).unwrap();
        desc.reverse();
        assert_eq!(asc, desc);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let rows = rows();
        let state = SortState::asc("score");
        let once: Vec<Row> = sort_records(&rows, &columns(), Some(&state))
            .unwrap()
            .into_iter()
            .cloned()
            .collect();
        let twice = sort_records(&once, &columns(), Some(&state)).unwrap();
        assert_eq!(ids(&twice), once.iter().map(|r| r.id).collect::<Vec<_>>());
    }

    #[test]
    fn test_sort_subset_of_indices() {
        let rows = rows();
        let cols = columns();
        let sorted = sort_indices(&rows, &[0, 2, 4], &cols[0], SortDirection::Desc);
        assert_eq!(sorted, vec![4, 2, 0]);
    }

    #[test]
    fn test_rejects_unknown_and_unsortable_columns() {
        let rows = rows();
        assert_eq!(
            sort_records(&rows, &columns(), Some(&SortState::asc("nope"))).unwrap_err(),
            EngineError::UnknownColumn("nope".to_string())
        );
        assert_eq!(
            sort_records(&rows, &columns(), Some(&SortState::asc("notes"))).unwrap_err(),
            EngineError::ColumnNotSortable("notes".to_string())
        );
    }

    #[test]
    fn test_numeric_text_compares_by_value() {
        assert_eq!(
            compare_cells(&CellValue::text("9"), &CellValue::text("10")),
            Ordering::Less
        );
        assert_eq!(
            compare_cells(&CellValue::Int(3), &CellValue::Float(2.5)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_mixed_codes_sort_without_cycles() {
        assert_eq!(
            compare_cells(&CellValue::text("10"), &CellValue::text("1a")),
            Ordering::Less
        );
        assert_eq!(
            compare_cells(&CellValue::text("1a"), &CellValue::text("9")),
            Ordering::Greater
        );
        assert_eq!(
            compare_cells(&CellValue::Bool(true), &CellValue::Int(1)),
            Ordering::Greater
        );

        #[derive(Debug)]
        struct Code(String);
        let column = ColumnDescriptor::new("code", "Code", |c: &Code| c.0.clone().into());
        let records: Vec<Code> = (0..200)
            .map(|i| match i % 4 {
                0 => Code(format!("{}", (i * 37) % 101)),
                1 => Code(format!("{}a", (i * 13) % 17)),
                2 => Code(format!("SKU-{}", (i * 7) % 23)),
                _ => Code(format!("{}.5", (i * 11) % 19)),
            })
            .collect();
        let all: Vec<usize> = (0..records.len()).collect();

        let asc = sort_indices(&records, &all, &column, SortDirection::Asc);
        let values: Vec<CellValue> = asc.iter().map(|&i| column.value(&records[i])).collect();
        assert!(
            values
                .windows(2)
                .all(|pair| compare_cells(&pair[0], &pair[1]) != Ordering::Greater)
        );
        let first_text = values.iter().position(|v| parse_number(&v.to_string()).is_none());
        assert!(
            values[first_text.unwrap()..]
                .iter()
                .all(|v| parse_number(&v.to_string()).is_none())
        );

        let desc = sort_indices(&records, &all, &column, SortDirection::Desc);
        assert_eq!(desc.len(), records.len());
    }

    #[test]
    fn test_cycle() {
        let asc = SortState::cycle(None, "name");
        assert_eq!(asc, Some(SortState::asc("name")));
        let desc = SortState::cycle(asc.as_ref(), "name");
        assert_eq!(desc, Some(SortState::desc("name")));
        assert_eq!(SortState::cycle(desc.as_ref(), "name"), None);
        assert_eq!(
            SortState::cycle(desc.as_ref(), "id"),
            Some(SortState::asc("id"))
        );
    }
}
