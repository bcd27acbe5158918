use biql::ast::{
    AggregateFunc, CompOp, Expr, Operand, OutputFormat, QueryValue, SelectKind, SortDirection,
};
use biql::{parse_query, Query};

fn parse(text: &str) -> Query {
    parse_query(text).unwrap_or_else(|e| panic!("query {:?} failed to parse: {}", text, e))
}

#[test]
fn test_bare_predicate_becomes_where_clause() {
    let query = parse("sub=01");
    assert!(query.select.is_none());
    assert!(query.where_clause.is_some());
}

#[test]
fn test_empty_query_parses() {
    let query = parse("");
    assert!(query.select.is_none());
    assert!(query.where_clause.is_none());
    assert!(query.group_by.is_none());
}

#[test]
fn test_select_fields() {
    let query = parse("SELECT sub, task, filepath WHERE datatype=func");
    let select = query.select.unwrap();
    assert!(!select.distinct);
    assert_eq!(select.items.len(), 3);
    assert_eq!(
        select.items[0].kind,
        SelectKind::Field(vec!["sub".to_string()])
    );
    assert!(query.where_clause.is_some());
}

#[test]
fn test_select_distinct() {
    let query = parse("SELECT DISTINCT sub, task");
    let select = query.select.unwrap();
    assert!(select.distinct);
    assert_eq!(select.items.len(), 2);
}

#[test]
fn test_select_star() {
    let query = parse("SELECT *");
    let select = query.select.unwrap();
    assert_eq!(select.items.len(), 1);
    assert_eq!(select.items[0].kind, SelectKind::Star);
}

#[test]
fn test_comparison_operators() {
    for (text, op) in [
        ("run=1", CompOp::Eq),
        ("run==1", CompOp::Eq),
        ("run!=1", CompOp::NotEq),
        ("run<1", CompOp::Lt),
        ("run<=1", CompOp::LtEq),
        ("run>1", CompOp::Gt),
        ("run>=1", CompOp::GtEq),
    ] {
        let query = parse(text);
        match query.where_clause.unwrap() {
            Expr::Comparison { op: parsed, .. } => assert_eq!(parsed, op, "for {}", text),
            other => panic!("expected comparison for {}, got {:?}", text, other),
        }
    }
}

#[test]
fn test_number_literal_keeps_padding() {
    let query = parse("sub=01");
    match query.where_clause.unwrap() {
        Expr::Comparison { value, .. } => {
            assert_eq!(value, QueryValue::Number("01".to_string()));
        }
        other => panic!("expected comparison, got {:?}", other),
    }
}

#[test]
fn test_operator_precedence_or_under_and() {
    // a=1 OR b=2 AND c=3  parses as  a=1 OR (b=2 AND c=3)
    let query = parse("a=1 OR b=2 AND c=3");
    match query.where_clause.unwrap() {
        Expr::Or(left, right) => {
            assert!(matches!(*left, Expr::Comparison { .. }));
            assert!(matches!(*right, Expr::And(_, _)));
        }
        other => panic!("expected OR at the top, got {:?}", other),
    }
}

#[test]
fn test_implicit_and_on_adjacency() {
    let query = parse("sub=01 task=nback");
    assert!(matches!(query.where_clause.unwrap(), Expr::And(_, _)));
}

#[test]
fn test_not_operator() {
    let query = parse("NOT datatype=func");
    assert!(matches!(query.where_clause.unwrap(), Expr::Not(_)));
}

#[test]
fn test_parenthesized_groups() {
    let query = parse("(sub=01 OR sub=02) AND task=nback");
    match query.where_clause.unwrap() {
        Expr::And(left, _) => assert!(matches!(*left, Expr::Or(_, _))),
        other => panic!("expected AND at the top, got {:?}", other),
    }
}

#[test]
fn test_existence_probe() {
    let query = parse("WHERE run");
    match query.where_clause.unwrap() {
        Expr::Exists(Operand::Field(path)) => assert_eq!(path, vec!["run".to_string()]),
        other => panic!("expected existence probe, got {:?}", other),
    }
}

#[test]
fn test_in_list() {
    let query = parse("sub IN [01, 02, 03]");
    match query.where_clause.unwrap() {
        Expr::In { values, .. } => {
            assert_eq!(values.len(), 3);
            assert_eq!(values[0], QueryValue::Number("01".to_string()));
        }
        other => panic!("expected IN, got {:?}", other),
    }
}

#[test]
fn test_like_pattern() {
    let query = parse("task LIKE %back%");
    match query.where_clause.unwrap() {
        Expr::Like { pattern, .. } => assert_eq!(pattern, "%back%"),
        other => panic!("expected LIKE, got {:?}", other),
    }
}

#[test]
fn test_range_value() {
    let query = parse("run=[1:3]");
    match query.where_clause.unwrap() {
        Expr::Comparison { value, .. } => assert_eq!(value, QueryValue::Range(1.0, 3.0)),
        other => panic!("expected range comparison, got {:?}", other),
    }
}

#[test]
fn test_null_value() {
    let query = parse("ses=NULL");
    match query.where_clause.unwrap() {
        Expr::Comparison { value, .. } => assert_eq!(value, QueryValue::Null),
        other => panic!("expected NULL comparison, got {:?}", other),
    }
}

#[test]
fn test_regex_match_operator() {
    let query = parse(r#"sub~="0[1-3]""#);
    match query.where_clause.unwrap() {
        Expr::Comparison { op, value, .. } => {
            assert_eq!(op, CompOp::Match);
            assert_eq!(value, QueryValue::Str("0[1-3]".to_string()));
        }
        other => panic!("expected match comparison, got {:?}", other),
    }
}

#[test]
fn test_group_by_fields() {
    let query = parse("SELECT COUNT(*) GROUP BY sub, ses, datatype");
    let group_by = query.group_by.unwrap();
    assert_eq!(group_by.len(), 3);
    assert_eq!(group_by[0], vec!["sub".to_string()]);
}

#[test]
fn test_having_clause() {
    let query = parse("SELECT sub, COUNT(*) GROUP BY sub HAVING COUNT(*) > 2");
    match query.having.unwrap() {
        Expr::Comparison {
            operand: Operand::Aggregate(call),
            op,
            value,
        } => {
            assert_eq!(call.func, AggregateFunc::Count);
            assert!(call.field.is_none());
            assert_eq!(op, CompOp::Gt);
            assert_eq!(value, QueryValue::Number("2".to_string()));
        }
        other => panic!("expected aggregate comparison, got {:?}", other),
    }
}

#[test]
fn test_order_by_defaults_to_asc() {
    let query = parse("sub=01 ORDER BY run");
    let order_by = query.order_by.unwrap();
    assert_eq!(order_by.len(), 1);
    assert_eq!(order_by[0].1, SortDirection::Asc);
}

#[test]
fn test_order_by_multiple_keys() {
    let query = parse("sub=01 ORDER BY sub ASC, ses DESC, run ASC");
    let order_by = query.order_by.unwrap();
    assert_eq!(order_by.len(), 3);
    assert_eq!(
        order_by[1],
        (vec!["ses".to_string()], SortDirection::Desc)
    );
}

#[test]
fn test_format_clause() {
    assert_eq!(parse("sub=01 FORMAT table").format, Some(OutputFormat::Table));
    assert_eq!(parse("SELECT * FORMAT csv").format, Some(OutputFormat::Csv));
    assert_eq!(
        parse("datatype=anat FORMAT paths").format,
        Some(OutputFormat::Paths)
    );
}

#[test]
fn test_unknown_format_is_rejected() {
    assert!(parse_query("sub=01 FORMAT xml").is_err());
}

#[test]
fn test_all_clauses_together() {
    let query = parse(
        "SELECT sub, COUNT(*) WHERE datatype=func GROUP BY sub \
         HAVING COUNT(*) > 1 ORDER BY sub DESC FORMAT json",
    );
    assert!(query.select.is_some());
    assert!(query.where_clause.is_some());
    assert!(query.group_by.is_some());
    assert!(query.having.is_some());
    assert!(query.order_by.is_some());
    assert_eq!(query.format, Some(OutputFormat::Json));
}

#[test]
fn test_count_star() {
    let query = parse("SELECT COUNT(*)");
    let select = query.select.unwrap();
    match &select.items[0].kind {
        SelectKind::Aggregate(call) => {
            assert_eq!(call.func, AggregateFunc::Count);
            assert!(call.field.is_none());
            assert!(!call.distinct);
        }
        other => panic!("expected aggregate, got {:?}", other),
    }
}

#[test]
fn test_count_distinct_field() {
    let query = parse("SELECT COUNT(DISTINCT sub) AS unique_subjects");
    let select = query.select.unwrap();
    match &select.items[0].kind {
        SelectKind::Aggregate(call) => {
            assert!(call.distinct);
            assert_eq!(call.field, Some(vec!["sub".to_string()]));
        }
        other => panic!("expected aggregate, got {:?}", other),
    }
    assert_eq!(select.items[0].alias.as_deref(), Some("unique_subjects"));
}

#[test]
fn test_count_distinct_star_is_rejected() {
    assert!(parse_query("SELECT COUNT(DISTINCT *)").is_err());
}

#[test]
fn test_aggregate_star_requires_count() {
    assert!(parse_query("SELECT AVG(*)").is_err());
}

#[test]
fn test_aggregate_functions_parse() {
    let query = parse("SELECT datatype, COUNT(*), AVG(run), MAX(run), MIN(run), SUM(run) GROUP BY datatype");
    let select = query.select.unwrap();
    assert_eq!(select.items.len(), 6);
}

#[test]
fn test_aggregate_aliases() {
    let query = parse("SELECT COUNT(*) AS total_files, sub");
    let select = query.select.unwrap();
    assert_eq!(select.items[0].alias.as_deref(), Some("total_files"));
    assert!(select.items[1].alias.is_none());
}

#[test]
fn test_array_agg() {
    let query = parse("SELECT ARRAY_AGG(filename)");
    let select = query.select.unwrap();
    match &select.items[0].kind {
        SelectKind::Aggregate(call) => {
            assert_eq!(call.func, AggregateFunc::ArrayAgg);
            assert_eq!(call.field, Some(vec!["filename".to_string()]));
            assert!(call.filter.is_none());
        }
        other => panic!("expected aggregate, got {:?}", other),
    }
}

#[test]
fn test_array_agg_with_filter() {
    let query = parse("SELECT ARRAY_AGG(filename WHERE part='mag') AS mag_files");
    let select = query.select.unwrap();
    match &select.items[0].kind {
        SelectKind::Aggregate(call) => {
            assert!(call.filter.is_some());
        }
        other => panic!("expected aggregate, got {:?}", other),
    }
    assert_eq!(select.items[0].alias.as_deref(), Some("mag_files"));
}

#[test]
fn test_array_agg_distinct() {
    let query = parse("SELECT sub, ARRAY_AGG(DISTINCT task) AS tasks GROUP BY sub");
    let select = query.select.unwrap();
    match &select.items[1].kind {
        SelectKind::Aggregate(call) => {
            assert_eq!(call.func, AggregateFunc::ArrayAgg);
            assert!(call.distinct);
        }
        other => panic!("expected aggregate, got {:?}", other),
    }
}

#[test]
fn test_array_agg_complex_filter() {
    let query = parse(
        "SELECT ARRAY_AGG(filename WHERE (part='phase' AND extension='.nii') \
         OR (part='mag' AND extension='.json')) AS mixed GROUP BY sub",
    );
    assert!(query.select.is_some());
}

#[test]
fn test_qualified_fields_in_projection() {
    let query = parse("SELECT sub, metadata.RepetitionTime, participants.age");
    let select = query.select.unwrap();
    assert_eq!(
        select.items[1].kind,
        SelectKind::Field(vec!["metadata".to_string(), "RepetitionTime".to_string()])
    );
}

#[test]
fn test_invalid_syntax_is_rejected() {
    assert!(parse_query("SELECT FROM WHERE").is_err());
    assert!(parse_query("sub=").is_err());
    assert!(parse_query("(sub=01").is_err());
    assert!(parse_query("GROUP sub").is_err());
}

#[test]
fn test_error_carries_position() {
    let err = parse_query("sub=01 AND AND task=rest").unwrap_err();
    assert!(err.position() > 0);
    let rendered = err.to_string();
    assert!(rendered.contains("position"), "message: {}", rendered);
}

#[test]
fn test_trailing_garbage_is_rejected() {
    assert!(parse_query("sub=01 )").is_err());
}
