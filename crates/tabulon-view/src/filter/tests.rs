//! Tests for the filter module

use super::*;
use pretty_assertions::assert_eq;
use tabulon_core::{CellValue, ColumnDescriptor, EngineError};

#[derive(Debug, Clone, PartialEq)]
struct Sale {
    id: u32,
    region: &'static str,
    sales: f64,
    note: Option<&'static str>,
}

fn sale(id: u32, region: &'static str, sales: f64) -> Sale {
    Sale {
        id,
        region,
        sales,
        note: None,
    }
}

fn columns() -> Vec<ColumnDescriptor<Sale>> {
    vec![
        ColumnDescriptor::new("id", "ID", |s: &Sale| s.id.into()).numeric(),
        ColumnDescriptor::new("region", "Region", |s: &Sale| s.region.into()),
        ColumnDescriptor::new("sales", "Sales", |s: &Sale| s.sales.into()).numeric(),
        ColumnDescriptor::new("note", "Note", |s: &Sale| s.note.into()),
        ColumnDescriptor::new("secret", "Secret", |_: &Sale| CellValue::Null).filterable(false),
    ]
}

fn records() -> Vec<Sale> {
    vec![
        sale(1, "North", 50.0),
        sale(2, "South", 150.0),
        sale(3, "North East", 75.0),
    ]
}

fn ids(records: &[Sale], indices: &[usize]) -> Vec<u32> {
    indices.iter().map(|&i| records[i].id).collect()
}

mod operator_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_numeric_operators() {
        let cell = CellValue::Float(75.0);
        assert!(FilterOperator::GreaterThan.evaluate(&cell, "60", None));
        assert!(!FilterOperator::LessThan.evaluate(&cell, "60", None));
        assert!(FilterOperator::GreaterOrEqual.evaluate(&cell, "75", None));
        assert!(FilterOperator::LessOrEqual.evaluate(&cell, "75.0", None));
    }

    #[test]
    fn test_unparseable_numeric_comparison_is_non_match() {
        let cell = CellValue::text("n/a");
        assert!(!FilterOperator::GreaterThan.evaluate(&cell, "10", None));
        assert!(!FilterOperator::LessThan.evaluate(&CellValue::Int(5), "ten", None));
        assert!(!FilterOperator::Between.evaluate(&CellValue::Int(5), "1", Some("x")));
    }

    #[test]
    fn test_between_is_inclusive() {
        let op = FilterOperator::Between;
        assert!(op.evaluate(&CellValue::Int(10), "10", Some("20")));
        assert!(op.evaluate(&CellValue::Int(20), "10", Some("20")));
        assert!(!op.evaluate(&CellValue::Int(21), "10", Some("20")));
        assert!(!op.evaluate(&CellValue::Int(15), "10", None));
    }

    #[test]
    fn test_string_operators_case_insensitive() {
        let cell = CellValue::text("North East");
        assert!(FilterOperator::Contains.evaluate(&cell, "EAST", None));
        assert!(FilterOperator::NotContains.evaluate(&cell, "south", None));
        assert!(FilterOperator::StartsWith.evaluate(&cell, "north", None));
        assert!(FilterOperator::EndsWith.evaluate(&cell, "East", None));
    }

    #[test]
    fn test_equals_numeric_and_text() {
        assert!(FilterOperator::Equals.evaluate(&CellValue::Int(50), "50.0", None));
        assert!(FilterOperator::Equals.evaluate(&CellValue::text("North"), "north", None));
        assert!(FilterOperator::NotEquals.evaluate(&CellValue::text("North"), "South", None));
    }

    #[test]
    fn test_empty_operators() {
        assert!(FilterOperator::IsEmpty.evaluate(&CellValue::Null, "", None));
        assert!(FilterOperator::IsEmpty.evaluate(&CellValue::text("  "), "", None));
        assert!(FilterOperator::IsNotEmpty.evaluate(&CellValue::Int(0), "", None));
    }

    #[test]
    fn test_parse_operator_names() {
        assert_eq!("greaterOrEqual".parse::<FilterOperator>(), Ok(FilterOperator::GreaterOrEqual));
        assert_eq!("not_equals".parse::<FilterOperator>(), Ok(FilterOperator::NotEquals));
        assert_eq!(">".parse::<FilterOperator>(), Ok(FilterOperator::GreaterThan));
        assert_eq!(
            "like".parse::<FilterOperator>(),
            Err(EngineError::UnknownOperator("like".to_string()))
        );
        for op in FilterOperator::all() {
            assert_eq!(op.name().parse::<FilterOperator>(), Ok(*op));
        }
    }
}

mod rule_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_rejects_incomplete_between() {
        let err = FilterRule::parse(1, "sales", "between", "10", None).unwrap_err();
        assert_eq!(err, EngineError::MissingSecondValue("between".to_string()));

        let rule = FilterRule::parse(1, "sales", "between", "10", Some("20".to_string())).unwrap();
        assert_eq!(rule.operator, FilterOperator::Between);
    }

    #[test]
    fn test_state_validation_against_schema() {
        let cols = columns();
        let unknown = FilterState::default().with_rule(FilterRule::new(
            1,
            "missing",
            FilterOperator::Equals,
            "x",
        ));
        assert_eq!(
            unknown.validate(&cols),
            Err(EngineError::UnknownColumn("missing".to_string()))
        );

        let not_filterable = FilterState::default().with_rule(FilterRule::new(
            1,
            "secret",
            FilterOperator::IsEmpty,
            "",
        ));
        assert_eq!(
            not_filterable.validate(&cols),
            Err(EngineError::ColumnNotFilterable("secret".to_string()))
        );
    }

    #[test]
    fn test_remove_and_next_id() {
        let mut state = FilterState::default()
            .with_rule(FilterRule::new(0, "region", FilterOperator::Equals, "North"))
            .with_rule(FilterRule::new(4, "sales", FilterOperator::GreaterThan, "1"));
        assert_eq!(state.next_id(), 5);
        assert!(state.remove_rule(0));
        assert!(!state.remove_rule(0));
        assert_eq!(state.rules.len(), 1);
    }
}

mod apply_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_greater_than_scenario() {
        let records = records();
        let state = FilterState::default().with_rule(FilterRule::new(
            1,
            "sales",
            FilterOperator::GreaterThan,
            "60",
        ));
        let result = apply(&records, &columns(), "", &[], &state);
        assert_eq!(ids(&records, &result), vec![2, 3]);
    }

    #[test]
    fn test_search_matches_any_searchable_column() {
        let records = records();
        let searchable = vec!["region".to_string()];
        let result = apply(&records, &columns(), "  NORTH ", &searchable, &FilterState::default());
        assert_eq!(ids(&records, &result), vec![1, 3]);

        // Sales is not searchable, so "150" finds nothing
        let result = apply(&records, &columns(), "150", &searchable, &FilterState::default());
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_filter_keeps_order() {
        let records = records();
        let result = apply(&records, &columns(), "", &[], &FilterState::default());
        assert_eq!(result, vec![0, 1, 2]);
    }

    #[test]
    fn test_mixed_combinators_fold_left_to_right() {
        let records = records();
        // id = 1 OR id = 2 AND sales > 100 folds as ((id=1 OR id=2) AND sales>100),
        // not as id=1 OR (id=2 AND sales>100)
        let state = FilterState::default()
            .with_rule(
                FilterRule::new(1, "id", FilterOperator::Equals, "1")
                    .with_combinator(Combinator::Or),
            )
            .with_rule(
                FilterRule::new(2, "id", FilterOperator::Equals, "2")
                    .with_combinator(Combinator::And),
            )
            .with_rule(FilterRule::new(3, "sales", FilterOperator::GreaterThan, "100"));

        let result = apply(&records, &columns(), "", &[], &state);
        assert_eq!(ids(&records, &result), vec![2]);
    }

    #[test]
    fn test_global_combinator_used_without_explicit_edge() {
        let records = records();
        let state = FilterState::new(
            vec![
                FilterRule::new(1, "id", FilterOperator::Equals, "1"),
                FilterRule::new(2, "id", FilterOperator::Equals, "2"),
            ],
            Combinator::Or,
        );
        let result = apply(&records, &columns(), "", &[], &state);
        assert_eq!(ids(&records, &result), vec![1, 2]);
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let records = records();
        let state = FilterState::default()
            .with_rule(FilterRule::new(1, "id", FilterOperator::Equals, "1").disabled())
            .with_rule(FilterRule::new(2, "sales", FilterOperator::LessThan, "100"));
        let result = apply(&records, &columns(), "", &[], &state);
        assert_eq!(ids(&records, &result), vec![1, 3]);
    }

    #[test]
    fn test_search_and_rules_combine() {
        let records = records();
        let state = FilterState::default().with_rule(FilterRule::new(
            1,
            "sales",
            FilterOperator::GreaterThan,
            "60",
        ));
        let searchable = vec!["region".to_string()];
        let result = filter_records(&records, &columns(), "north", &searchable, &state);
        assert_eq!(result, vec![&records[2]]);
    }

    #[test]
    fn test_is_empty_on_optional_column() {
        let mut records = records();
        records[1].note = Some("follow up");
        let state = FilterState::default().with_rule(FilterRule::new(
            1,
            "note",
            FilterOperator::IsNotEmpty,
            "",
        ));
        let result = apply(&records, &columns(), "", &[], &state);
        assert_eq!(ids(&records, &result), vec![2]);
    }
}
