//! Applying search text and rules to a record set

use tabulon_core::{ColumnDescriptor, find_column};

use super::{FilterRule, FilterState};

/// Indices of the records that pass both the search text and the rules, in
/// original record order.
pub fn apply<T>(
    records: &[T],
    columns: &[ColumnDescriptor<T>],
    search_text: &str,
    searchable_column_ids: &[String],
    filter_state: &FilterState,
) -> Vec<usize> {
    let search = search_text.trim().to_lowercase();
    let searchable: Vec<&ColumnDescriptor<T>> = searchable_column_ids
        .iter()
        .filter_map(|id| find_column(columns, id))
        .collect();

    let rules: Vec<(&FilterRule, Option<&ColumnDescriptor<T>>)> = filter_state
        .active_rules()
        .map(|rule| (rule, find_column(columns, &rule.column_id)))
        .collect();

    let has_search = !search.is_empty();
    let has_rules = !rules.is_empty();

    if !has_search && !has_rules {
        return (0..records.len()).collect();
    }

    records
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            if has_search && !matches_search(*record, &searchable, &search) {
                return false;
            }
            if has_rules && !matches_rules(*record, &rules, filter_state) {
                return false;
            }
            true
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Convenience over [`apply`] returning the records themselves
pub fn filter_records<'a, T>(
    records: &'a [T],
    columns: &[ColumnDescriptor<T>],
    search_text: &str,
    searchable_column_ids: &[String],
    filter_state: &FilterState,
) -> Vec<&'a T> {
    apply(records, columns, search_text, searchable_column_ids, filter_state)
        .into_iter()
        .map(|idx| &records[idx])
        .collect()
}

/// A record passes if any searchable column contains the lowercased query
fn matches_search<T>(record: &T, searchable: &[&ColumnDescriptor<T>], query: &str) -> bool {
    searchable
        .iter()
        .any(|column| column.value(record).to_string().to_lowercase().contains(query))
}

/// Left-to-right fold over the active rules.
///
/// The combinator on rule `i` joins the running result with rule `i + 1`;
/// a rule without its own combinator uses the global one.
fn matches_rules<T>(
    record: &T,
    rules: &[(&FilterRule, Option<&ColumnDescriptor<T>>)],
    filter_state: &FilterState,
) -> bool {
    let Some((first, rest)) = rules.split_first() else {
        return true;
    };

    let mut result = evaluate_rule(record, first);
    let mut previous = first.0;
    for current in rest {
        let combinator = previous.combinator.unwrap_or(filter_state.global_combinator);
        result = combinator.combine(result, evaluate_rule(record, current));
        previous = current.0;
    }
    result
}

fn evaluate_rule<T>(record: &T, (rule, column): &(&FilterRule, Option<&ColumnDescriptor<T>>)) -> bool {
    // A rule over a column missing from the schema can never match
    let Some(column) = column else {
        return false;
    };
    rule.operator
        .evaluate(&column.value(record), &rule.value, rule.value2.as_deref())
}
