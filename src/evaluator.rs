use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use regex::Regex;

use crate::{
    ast::{
        AggregateCall, AggregateFunc, CompOp, Expr, FieldPath, Operand, Query, QueryValue,
        SelectClause, SelectItem, SelectKind, SortDirection,
    },
    dataset::{BidsDataset, FileRecord},
    value::Value,
};

/// One result row: projected keys in insertion order.
pub type Row = IndexMap<String, Value>;

/// A non-fatal problem hit while evaluating a comparison. The comparison
/// evaluates to false and the query continues.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationWarning {
    pub message: String,
}

impl std::fmt::Display for EvaluationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Executes parsed queries against an indexed dataset.
///
/// The dataset is borrowed read-only; evaluation never mutates records, so
/// any number of evaluators can run against the same catalog. Warnings
/// accumulate on the evaluator and can be drained after a run.
pub struct Evaluator<'a> {
    dataset: &'a BidsDataset,
    warnings: Vec<EvaluationWarning>,
    /// Compiled regex cache. `None` marks a pattern that failed to compile;
    /// it was warned about once and matches nothing.
    regexes: HashMap<String, Option<Regex>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(dataset: &'a BidsDataset) -> Self {
        Evaluator {
            dataset,
            warnings: Vec::new(),
            regexes: HashMap::new(),
        }
    }

    /// Run a query and return its result rows.
    pub fn evaluate(&mut self, query: &Query) -> Vec<Row> {
        let filtered = self.filter_records(query);

        let mut rows = if query.is_grouped() {
            self.evaluate_grouped(query, &filtered)
        } else {
            filtered
                .iter()
                .map(|record| self.project_record(record, query.select.as_ref()))
                .collect()
        };

        if let Some(select) = &query.select {
            if select.distinct {
                rows = dedupe_rows(rows);
            }
        }

        if let Some(order_by) = &query.order_by {
            sort_rows(&mut rows, order_by);
        }

        rows
    }

    /// Records matching the WHERE clause, in catalog order. This is the
    /// pre-grouping set the `paths` format renders.
    pub fn filter_records(&mut self, query: &Query) -> Vec<&'a FileRecord> {
        let dataset = self.dataset;
        match &query.where_clause {
            Some(expr) => dataset
                .files()
                .iter()
                .filter(|record| self.eval_expr(expr, record))
                .collect(),
            None => dataset.files().iter().collect(),
        }
    }

    /// Warnings collected so far, draining the buffer.
    pub fn take_warnings(&mut self) -> Vec<EvaluationWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(EvaluationWarning { message });
    }

    // ========================================
    // Field resolution
    // ========================================

    /// Resolve a field path against one record. The first segment selects
    /// the namespace; bare names never reach into metadata or participants.
    fn resolve(&self, record: &FileRecord, path: &FieldPath) -> Value {
        match path.first().map(String::as_str) {
            Some("metadata") => {
                if path.len() == 1 {
                    return Value::Map(record.metadata.clone());
                }
                let mut current = match record.metadata.get(&path[1]) {
                    Some(v) => v,
                    None => return Value::Null,
                };
                for segment in &path[2..] {
                    current = match current {
                        Value::Map(map) => match map.get(segment) {
                            Some(v) => v,
                            None => return Value::Null,
                        },
                        _ => return Value::Null,
                    };
                }
                current.clone()
            }
            Some("participants") => {
                if path.len() == 1 {
                    return Value::Map(record.participants.clone());
                }
                if path.len() != 2 {
                    return Value::Null;
                }
                record
                    .participants
                    .get(&path[1])
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            Some(name) if path.len() == 1 => record.field(name),
            _ => Value::Null,
        }
    }

    // ========================================
    // Predicate evaluation
    // ========================================

    /// Evaluate a predicate against one record. Three-valued logic is
    /// collapsed: a null operand makes the comparison false.
    fn eval_expr(&mut self, expr: &Expr, record: &FileRecord) -> bool {
        match expr {
            Expr::And(left, right) => {
                self.eval_expr(left, record) && self.eval_expr(right, record)
            }
            Expr::Or(left, right) => {
                self.eval_expr(left, record) || self.eval_expr(right, record)
            }
            Expr::Not(inner) => !self.eval_expr(inner, record),
            Expr::Comparison { operand, op, value } => {
                let left = self.operand_on_record(operand, record);
                self.compare(&left, *op, value)
            }
            Expr::In { operand, values } => {
                let left = self.operand_on_record(operand, record);
                values
                    .iter()
                    .any(|value| self.compare(&left, CompOp::Eq, value))
            }
            Expr::Like { operand, pattern } => {
                let left = self.operand_on_record(operand, record);
                if left.is_null() {
                    return false;
                }
                glob_match(&left.to_display_string(), pattern, '%', '_')
            }
            Expr::Exists(operand) => self.operand_on_record(operand, record).exists(),
        }
    }

    fn operand_on_record(&mut self, operand: &Operand, record: &FileRecord) -> Value {
        match operand {
            Operand::Field(path) => self.resolve(record, path),
            Operand::Aggregate(call) => {
                self.warn(format!(
                    "aggregate {:?} is only valid in SELECT or HAVING",
                    call.func
                ));
                Value::Null
            }
        }
    }

    /// The comparison ladder: the right-hand form decides the semantics.
    fn compare(&mut self, left: &Value, op: CompOp, rhs: &QueryValue) -> bool {
        // NULL tests are the only comparisons a null operand can pass
        if let QueryValue::Null = rhs {
            return match op {
                CompOp::Eq => left.is_null(),
                CompOp::NotEq => !left.is_null(),
                _ => {
                    self.warn("NULL only supports = and !=".to_string());
                    false
                }
            };
        }
        if left.is_null() {
            return false;
        }

        match rhs {
            QueryValue::Null => unreachable!(),
            QueryValue::Range(low, high) => match left.as_f64() {
                Some(v) => match op {
                    CompOp::Eq => *low <= v && v <= *high,
                    CompOp::NotEq => v < *low || *high < v,
                    _ => {
                        self.warn("ranges only support = and !=".to_string());
                        false
                    }
                },
                None => false,
            },
            QueryValue::List(values) => match op {
                CompOp::Eq => values
                    .iter()
                    .any(|value| self.compare(left, CompOp::Eq, value)),
                CompOp::NotEq => !values
                    .iter()
                    .any(|value| self.compare(left, CompOp::Eq, value)),
                _ => {
                    self.warn("lists only support = and !=".to_string());
                    false
                }
            },
            QueryValue::Regex(source) => {
                self.regex_match(&left.to_display_string(), source, op)
            }
            QueryValue::Pattern(pattern) => {
                if op == CompOp::Match {
                    // `~=` treats the raw text as a regex even when it
                    // contains glob characters
                    return self.regex_match(&left.to_display_string(), pattern, CompOp::Match);
                }
                let matched = glob_match(&left.to_display_string(), pattern, '*', '?');
                match op {
                    CompOp::Eq => matched,
                    CompOp::NotEq => !matched,
                    _ => {
                        self.warn("patterns only support = and !=".to_string());
                        false
                    }
                }
            }
            QueryValue::Number(raw) | QueryValue::Str(raw) => {
                if op == CompOp::Match {
                    return self.regex_match(&left.to_display_string(), raw, op);
                }
                // Numeric compare when both sides convert; this is what
                // makes `sub=1` match `sub-01`.
                if let (Some(l), Some(r)) = (left.as_f64(), raw.trim().parse::<f64>().ok()) {
                    return numeric_op(l, r, op);
                }
                string_op(&left.to_display_string(), raw, op)
            }
        }
    }

    /// Anchored regex match (`~=` is a full match). Compilation failures
    /// warn once per pattern and never match.
    fn regex_match(&mut self, text: &str, source: &str, op: CompOp) -> bool {
        if !matches!(op, CompOp::Match | CompOp::Eq | CompOp::NotEq) {
            self.warn("regex values only support ~=, =, and !=".to_string());
            return false;
        }
        if !self.regexes.contains_key(source) {
            let compiled = match Regex::new(&format!("^(?:{})$", source)) {
                Ok(re) => Some(re),
                Err(e) => {
                    self.warn(format!("invalid regex '{}': {}", source, e));
                    None
                }
            };
            self.regexes.insert(source.to_string(), compiled);
        }
        let matched = match &self.regexes[source] {
            Some(re) => re.is_match(text),
            None => false,
        };
        if op == CompOp::NotEq {
            !matched
        } else {
            matched
        }
    }

    // ========================================
    // Projection (one row per record)
    // ========================================

    fn project_record(&mut self, record: &FileRecord, select: Option<&SelectClause>) -> Row {
        let select = match select {
            Some(select) => select,
            None => return full_row(record),
        };

        let mut row = Row::new();
        for item in &select.items {
            match &item.kind {
                SelectKind::Star => {
                    for (key, value) in full_row(record) {
                        row.entry(key).or_insert(value);
                    }
                }
                SelectKind::Field(path) => {
                    let key = item.alias.clone().unwrap_or_else(|| path.join("."));
                    let value = self.resolve(record, path);
                    row.insert(key, value);
                }
                // Any aggregate routes the whole query through the grouped
                // pipeline, so this arm is unreachable in practice.
                SelectKind::Aggregate(call) => {
                    let key = item
                        .alias
                        .clone()
                        .unwrap_or_else(|| call.func.default_alias().to_string());
                    row.insert(key, Value::Null);
                }
            }
        }
        row
    }

    // ========================================
    // Grouping and aggregation
    // ========================================

    fn evaluate_grouped(&mut self, query: &Query, filtered: &[&FileRecord]) -> Vec<Row> {
        let group_fields: Vec<FieldPath> = query.group_by.clone().unwrap_or_default();

        // Partition by the tuple of key values; a null key value forms its
        // own bucket. With no GROUP BY the whole set is one partition.
        let mut partitions: IndexMap<Vec<Option<String>>, Vec<&FileRecord>> = IndexMap::new();
        for &record in filtered {
            let key: Vec<Option<String>> = group_fields
                .iter()
                .map(|field| self.resolve(record, field).group_key())
                .collect();
            partitions.entry(key).or_default().push(record);
        }
        if partitions.is_empty() && group_fields.is_empty() {
            partitions.insert(Vec::new(), Vec::new());
        }

        let mut rows = Vec::new();
        for records in partitions.values() {
            let row = self.project_partition(records, &group_fields, query.select.as_ref());
            if let Some(having) = &query.having {
                if !self.eval_having(having, records, &row) {
                    continue;
                }
            }
            rows.push(row);
        }
        rows
    }

    fn project_partition(
        &mut self,
        records: &[&FileRecord],
        group_fields: &[FieldPath],
        select: Option<&SelectClause>,
    ) -> Row {
        let grouped_keys: HashSet<String> =
            group_fields.iter().map(|path| path.join(".")).collect();

        let star_items = [SelectItem {
            kind: SelectKind::Star,
            alias: None,
        }];
        let items: &[SelectItem] = match select {
            Some(select) => &select.items,
            None => &star_items,
        };

        let mut row = Row::new();
        for item in items {
            match &item.kind {
                SelectKind::Star => {
                    // Union of record fields in first-seen order, each either
                    // the partition key value or auto-aggregated.
                    let mut keys: Vec<String> = Vec::new();
                    let mut seen = HashSet::new();
                    for record in records {
                        for key in full_row(record).keys() {
                            if seen.insert(key.clone()) {
                                keys.push(key.clone());
                            }
                        }
                    }
                    for key in keys {
                        if row.contains_key(&key) {
                            continue;
                        }
                        let path = vec![key.clone()];
                        let value = if grouped_keys.contains(&key) {
                            self.partition_key_value(records, &path)
                        } else {
                            self.auto_aggregate(records, &path)
                        };
                        row.insert(key, value);
                    }
                }
                SelectKind::Field(path) => {
                    let key = item.alias.clone().unwrap_or_else(|| path.join("."));
                    let value = if grouped_keys.contains(&path.join(".")) {
                        self.partition_key_value(records, path)
                    } else {
                        self.auto_aggregate(records, path)
                    };
                    row.insert(key, value);
                }
                SelectKind::Aggregate(call) => {
                    let key = item
                        .alias
                        .clone()
                        .unwrap_or_else(|| call.func.default_alias().to_string());
                    let value = self.aggregate(call, records);
                    row.insert(key, value);
                }
            }
        }
        row
    }

    /// The (constant) key value of a partition for a grouped field.
    fn partition_key_value(&self, records: &[&FileRecord], path: &FieldPath) -> Value {
        records
            .first()
            .map(|record| self.resolve(record, path))
            .unwrap_or(Value::Null)
    }

    /// Auto-aggregation of a non-grouped field over a partition: one
    /// distinct non-null value collapses to a scalar, several become a
    /// first-seen-ordered list, none at all is null.
    fn auto_aggregate(&self, records: &[&FileRecord], path: &FieldPath) -> Value {
        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        for record in records {
            let value = self.resolve(record, path);
            if value.is_null() {
                continue;
            }
            if let Some(key) = value.group_key() {
                if seen.insert(key) {
                    distinct.push(value);
                }
            }
        }
        match distinct.len() {
            0 => Value::Null,
            1 => distinct.pop().unwrap(),
            _ => Value::List(distinct),
        }
    }

    fn aggregate(&mut self, call: &AggregateCall, records: &[&FileRecord]) -> Value {
        let records: Vec<&FileRecord> = match &call.filter {
            Some(cond) => records
                .iter()
                .copied()
                .filter(|record| self.eval_expr(cond, record))
                .collect(),
            None => records.to_vec(),
        };

        match call.func {
            AggregateFunc::Count => match &call.field {
                None => Value::Int(records.len() as i64),
                Some(path) => {
                    let values = self.non_null_values(&records, path);
                    let count = if call.distinct {
                        values
                            .iter()
                            .filter_map(|v| v.group_key())
                            .collect::<HashSet<_>>()
                            .len()
                    } else {
                        values.len()
                    };
                    Value::Int(count as i64)
                }
            },
            AggregateFunc::Avg => {
                let numbers = self.numeric_values(&records, call);
                if numbers.is_empty() {
                    Value::Null
                } else {
                    Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            AggregateFunc::Sum => {
                let path = match &call.field {
                    Some(path) => path,
                    None => return Value::Null,
                };
                let values = self.distinct_or_all(&records, path, call.distinct);
                let mut ints = Vec::new();
                let mut floats = Vec::new();
                for value in &values {
                    if let Some(f) = value.as_f64() {
                        floats.push(f);
                        match value {
                            Value::Int(n) => ints.push(*n),
                            Value::Str(s) => match s.trim().parse::<i64>() {
                                Ok(n) => ints.push(n),
                                Err(_) => ints.clear(),
                            },
                            _ => ints.clear(),
                        }
                    }
                }
                if floats.is_empty() {
                    Value::Null
                } else if ints.len() == floats.len() {
                    Value::Int(ints.iter().sum())
                } else {
                    Value::Float(floats.iter().sum())
                }
            }
            AggregateFunc::Max | AggregateFunc::Min => {
                let path = match &call.field {
                    Some(path) => path,
                    None => return Value::Null,
                };
                let values = self.distinct_or_all(&records, path, call.distinct);
                if values.is_empty() {
                    return Value::Null;
                }
                let want_max = call.func == AggregateFunc::Max;
                if values.iter().all(|v| v.as_f64().is_some()) {
                    let mut best = values[0].as_f64().unwrap();
                    for value in &values[1..] {
                        let v = value.as_f64().unwrap();
                        if (want_max && v > best) || (!want_max && v < best) {
                            best = v;
                        }
                    }
                    if best.fract() == 0.0 && best.abs() < i64::MAX as f64 {
                        Value::Int(best as i64)
                    } else {
                        Value::Float(best)
                    }
                } else {
                    let mut best = values[0].to_display_string();
                    for value in &values[1..] {
                        let s = value.to_display_string();
                        if (want_max && s > best) || (!want_max && s < best) {
                            best = s;
                        }
                    }
                    Value::Str(best)
                }
            }
            AggregateFunc::ArrayAgg => {
                let path = match &call.field {
                    Some(path) => path,
                    None => return Value::List(Vec::new()),
                };
                let mut items = Vec::new();
                if call.distinct {
                    // DISTINCT keeps first occurrences and drops nulls
                    let mut seen = HashSet::new();
                    for record in &records {
                        let value = self.resolve(record, path);
                        if value.is_null() {
                            continue;
                        }
                        if let Some(key) = value.group_key() {
                            if seen.insert(key) {
                                items.push(value);
                            }
                        }
                    }
                } else {
                    for record in &records {
                        items.push(self.resolve(record, path));
                    }
                }
                Value::List(items)
            }
        }
    }

    fn non_null_values(&self, records: &[&FileRecord], path: &FieldPath) -> Vec<Value> {
        records
            .iter()
            .map(|record| self.resolve(record, path))
            .filter(|v| !v.is_null())
            .collect()
    }

    fn distinct_or_all(
        &self,
        records: &[&FileRecord],
        path: &FieldPath,
        distinct: bool,
    ) -> Vec<Value> {
        let values = self.non_null_values(records, path);
        if !distinct {
            return values;
        }
        let mut seen = HashSet::new();
        values
            .into_iter()
            .filter(|v| match v.group_key() {
                Some(key) => seen.insert(key),
                None => false,
            })
            .collect()
    }

    fn numeric_values(&self, records: &[&FileRecord], call: &AggregateCall) -> Vec<f64> {
        let path = match &call.field {
            Some(path) => path,
            None => return Vec::new(),
        };
        self.distinct_or_all(records, path, call.distinct)
            .iter()
            .filter_map(|v| v.as_f64())
            .collect()
    }

    // ========================================
    // HAVING
    // ========================================

    /// HAVING uses WHERE semantics, but operands evaluate over the
    /// partition: aggregates recompute, fields read the projected row and
    /// fall back to auto-aggregation.
    fn eval_having(&mut self, expr: &Expr, records: &[&FileRecord], row: &Row) -> bool {
        match expr {
            Expr::And(left, right) => {
                self.eval_having(left, records, row) && self.eval_having(right, records, row)
            }
            Expr::Or(left, right) => {
                self.eval_having(left, records, row) || self.eval_having(right, records, row)
            }
            Expr::Not(inner) => !self.eval_having(inner, records, row),
            Expr::Comparison { operand, op, value } => {
                let left = self.operand_on_partition(operand, records, row);
                self.compare(&left, *op, value)
            }
            Expr::In { operand, values } => {
                let left = self.operand_on_partition(operand, records, row);
                values
                    .iter()
                    .any(|value| self.compare(&left, CompOp::Eq, value))
            }
            Expr::Like { operand, pattern } => {
                let left = self.operand_on_partition(operand, records, row);
                if left.is_null() {
                    return false;
                }
                glob_match(&left.to_display_string(), pattern, '%', '_')
            }
            Expr::Exists(operand) => self.operand_on_partition(operand, records, row).exists(),
        }
    }

    fn operand_on_partition(
        &mut self,
        operand: &Operand,
        records: &[&FileRecord],
        row: &Row,
    ) -> Value {
        match operand {
            Operand::Aggregate(call) => self.aggregate(call, records),
            Operand::Field(path) => {
                let name = path.join(".");
                if let Some(value) = row.get(&name) {
                    return value.clone();
                }
                self.auto_aggregate(records, path)
            }
        }
    }
}

// ========================================
// Row-level helpers
// ========================================

/// The full projection of one record: entities in filename order, computed
/// fields, then the metadata and participants maps.
fn full_row(record: &FileRecord) -> Row {
    let mut row = Row::new();
    for (key, value) in &record.entities {
        row.insert(key.clone(), Value::Str(value.clone()));
    }
    row.insert("suffix".to_string(), record.field("suffix"));
    row.insert("datatype".to_string(), record.field("datatype"));
    row.insert("filename".to_string(), record.field("filename"));
    row.insert("extension".to_string(), record.field("extension"));
    row.insert("filepath".to_string(), record.field("filepath"));
    row.insert(
        "relative_path".to_string(),
        record.field("relative_path"),
    );
    row.insert(
        "metadata".to_string(),
        Value::Map(record.metadata.clone()),
    );
    row.insert(
        "participants".to_string(),
        Value::Map(record.participants.clone()),
    );
    row
}

/// Deduplicate rows by the full projected tuple, keeping first occurrences.
fn dedupe_rows(rows: Vec<Row>) -> Vec<Row> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for row in rows {
        let key: Vec<(String, Option<String>)> = row
            .iter()
            .map(|(k, v)| (k.clone(), v.group_key()))
            .collect();
        if seen.insert(key) {
            result.push(row);
        }
    }
    result
}

/// Stable multi-key sort. Nulls sort last on ASC and first on DESC. Keys
/// reference projected columns (by alias or dotted name); a key absent from
/// a row sorts as null.
fn sort_rows(rows: &mut [Row], order_by: &[(FieldPath, SortDirection)]) {
    rows.sort_by(|a, b| {
        for (path, direction) in order_by {
            let name = path.join(".");
            let left = a.get(&name).cloned().unwrap_or(Value::Null);
            let right = b.get(&name).cloned().unwrap_or(Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => match direction {
                    SortDirection::Asc => Ordering::Greater,
                    SortDirection::Desc => Ordering::Less,
                },
                (false, true) => match direction {
                    SortDirection::Asc => Ordering::Less,
                    SortDirection::Desc => Ordering::Greater,
                },
                (false, false) => {
                    let base = compare_for_order(&left, &right);
                    match direction {
                        SortDirection::Asc => base,
                        SortDirection::Desc => base.reverse(),
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Numeric ordering when both sides convert, lexicographic otherwise.
fn compare_for_order(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    a.to_display_string().cmp(&b.to_display_string())
}

fn numeric_op(l: f64, r: f64, op: CompOp) -> bool {
    match op {
        CompOp::Eq => l == r,
        CompOp::NotEq => l != r,
        CompOp::Lt => l < r,
        CompOp::LtEq => l <= r,
        CompOp::Gt => l > r,
        CompOp::GtEq => l >= r,
        CompOp::Match => false,
    }
}

fn string_op(l: &str, r: &str, op: CompOp) -> bool {
    match op {
        CompOp::Eq => l == r,
        CompOp::NotEq => l != r,
        CompOp::Lt => l < r,
        CompOp::LtEq => l <= r,
        CompOp::Gt => l > r,
        CompOp::GtEq => l >= r,
        CompOp::Match => false,
    }
}

/// Glob matching with configurable wildcards: `*`/`?` for bare patterns,
/// `%`/`_` for LIKE. Iterative with backtracking over the last star.
fn glob_match(text: &str, pattern: &str, any: char, one: char) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let mut t = 0;
    let mut p = 0;
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == one || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == any {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            // Extend the last star by one character and retry
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == any {
        p += 1;
    }
    p == pattern.len()
}
