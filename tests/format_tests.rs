use biql::ast::OutputFormat;
use biql::output::{format_rows, to_json, to_json_pretty, to_paths, to_table};
use biql::{Row, Value};
use std::collections::HashMap;

fn row(pairs: Vec<(&str, Value)>) -> Row {
    let mut row = Row::new();
    for (key, value) in pairs {
        row.insert(key.to_string(), value);
    }
    row
}

#[test]
fn test_json_preserves_key_order() {
    let rows = vec![row(vec![
        ("task", Value::Str("nback".into())),
        ("count", Value::Int(4)),
        ("sub", Value::Str("01".into())),
    ])];
    assert_eq!(to_json(&rows), r#"[{"task":"nback","count":4,"sub":"01"}]"#);
}

#[test]
fn test_json_native_scalars() {
    let rows = vec![row(vec![
        ("int", Value::Int(2)),
        ("float", Value::Float(2.5)),
        ("whole_float", Value::Float(2.0)),
        ("bool", Value::Bool(true)),
        ("null", Value::Null),
        ("list", Value::List(vec![Value::Int(1), Value::Int(2)])),
    ])];
    assert_eq!(
        to_json(&rows),
        r#"[{"int":2,"float":2.5,"whole_float":2.0,"bool":true,"null":null,"list":[1,2]}]"#
    );
}

#[test]
fn test_json_escapes_strings() {
    let rows = vec![row(vec![("text", Value::Str("a\"b\nc".into()))])];
    assert_eq!(to_json(&rows), "[{\"text\":\"a\\\"b\\nc\"}]");
}

#[test]
fn test_json_nested_map_keys_sorted() {
    let mut map = HashMap::new();
    map.insert("RepetitionTime".to_string(), Value::Float(2.0));
    map.insert("EchoTime".to_string(), Value::Float(0.03));
    let rows = vec![row(vec![("metadata", Value::Map(map))])];
    assert_eq!(
        to_json(&rows),
        r#"[{"metadata":{"EchoTime":0.03,"RepetitionTime":2.0}}]"#
    );
}

#[test]
fn test_json_empty() {
    assert_eq!(to_json(&[]), "[]");
    assert_eq!(to_json_pretty(&[]), "[]");
}

#[test]
fn test_pretty_json_shape() {
    let rows = vec![row(vec![("sub", Value::Str("01".into()))])];
    assert_eq!(to_json_pretty(&rows), "[\n  {\n    \"sub\": \"01\"\n  }\n]");
}

#[test]
fn test_table_layout() {
    let rows = vec![
        row(vec![
            ("sub", Value::Str("01".into())),
            ("task", Value::Str("nback".into())),
        ]),
        row(vec![
            ("sub", Value::Str("02".into())),
            ("task", Value::Str("rest".into())),
        ]),
    ];
    let table = to_table(&rows);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("sub"));
    assert!(lines[0].contains("task"));
    assert!(lines[0].contains('|'));
    assert!(lines[1].chars().all(|c| c == '-' || c == '|'));
    assert!(lines[2].contains("01"));
    assert!(lines[3].contains("rest"));
}

#[test]
fn test_table_empty() {
    assert_eq!(to_table(&[]), "No results found");
}

#[test]
fn test_table_wide_list_collapses_to_count() {
    let files: Vec<Value> = (0..8)
        .map(|i| Value::Str(format!("sub-01_run-{:02}_bold.nii.gz", i)))
        .collect();
    let rows = vec![row(vec![("files", Value::List(files))])];
    let table = to_table(&rows);
    assert!(table.contains("[...8 items...]"));
}

#[test]
fn test_table_null_renders_empty() {
    let rows = vec![row(vec![
        ("sub", Value::Str("01".into())),
        ("run", Value::Null),
    ])];
    let table = to_table(&rows);
    assert!(!table.contains("null"));
}

#[test]
fn test_csv_header_and_rows() {
    let rows = vec![
        row(vec![
            ("sub", Value::Str("01".into())),
            ("age", Value::Int(25)),
        ]),
        row(vec![
            ("sub", Value::Str("02".into())),
            ("age", Value::Int(31)),
        ]),
    ];
    let csv = format_rows(&rows, OutputFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["sub,age", "01,25", "02,31"]);
}

#[test]
fn test_csv_quotes_separator_and_quote_chars() {
    let rows = vec![row(vec![
        ("a", Value::Str("x,y".into())),
        ("b", Value::Str("say \"hi\"".into())),
    ])];
    let csv = format_rows(&rows, OutputFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[1], "\"x,y\",\"say \"\"hi\"\"\"");
}

#[test]
fn test_csv_array_cells_are_json_strings() {
    let rows = vec![row(vec![(
        "files",
        Value::List(vec![Value::Str("a.nii".into()), Value::Str("b.nii".into())]),
    )])];
    let csv = format_rows(&rows, OutputFormat::Csv).unwrap();
    let mut reader = csv::ReaderBuilder::new().from_reader(csv.as_bytes());
    let record = reader.records().next().unwrap().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&record[0]).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);
}

#[test]
fn test_tsv_uses_tabs() {
    let rows = vec![row(vec![
        ("sub", Value::Str("01".into())),
        ("task", Value::Str("nback".into())),
    ])];
    let tsv = format_rows(&rows, OutputFormat::Tsv).unwrap();
    assert_eq!(tsv.lines().next().unwrap(), "sub\ttask");
    assert_eq!(tsv.lines().nth(1).unwrap(), "01\tnback");
}

#[test]
fn test_delimited_empty_is_empty() {
    assert_eq!(format_rows(&[], OutputFormat::Csv).unwrap(), "");
}

#[test]
fn test_ragged_rows_share_the_column_union() {
    let rows = vec![
        row(vec![("sub", Value::Str("01".into()))]),
        row(vec![
            ("sub", Value::Str("02".into())),
            ("task", Value::Str("nback".into())),
        ]),
    ];
    let csv = format_rows(&rows, OutputFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["sub,task", "01,", "02,nback"]);
}

#[test]
fn test_paths_prefers_filepath_and_falls_back() {
    let rows = vec![
        row(vec![(
            "relative_path",
            Value::Str("sub-01/func/sub-01_task-nback_bold.nii".into()),
        )]),
        row(vec![
            ("filepath", Value::Str("/abs/file.nii".into())),
            ("relative_path", Value::Str("sub-02/func/file.nii".into())),
        ]),
    ];
    assert_eq!(
        to_paths(&rows),
        "sub-01/func/sub-01_task-nback_bold.nii\n/abs/file.nii"
    );
}

#[test]
fn test_paths_skips_rows_without_path_keys() {
    let rows = vec![row(vec![("sub", Value::Str("01".into()))])];
    assert_eq!(to_paths(&rows), "");
}
