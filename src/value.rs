use std::collections::HashMap;

/// A polymorphic attribute value used throughout BIQL.
///
/// File records carry values from three sources — filename entities (always
/// strings), inherited JSON sidecar metadata (any JSON shape), and the
/// participants table (strings) — and query results mix all of them with
/// computed aggregates. This type covers every shape with a distinction
/// between integers and floats.
///
/// # Examples
///
/// ```
/// use biql::Value;
/// use std::collections::HashMap;
///
/// // Scalar values
/// let null = Value::Null;
/// let boolean = Value::Bool(true);
/// let integer = Value::Int(42);
/// let float = Value::Float(2.5);
/// let string = Value::Str("nback".to_string());
///
/// // Collections
/// let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
///
/// let mut map = HashMap::new();
/// map.insert("RepetitionTime".to_string(), Value::Float(2.0));
/// let object = Value::Map(map);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing or JSON null
    Null,

    /// Boolean (true/false)
    Bool(bool),

    /// Integer number (preserved separately from floats)
    Int(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    Str(String),

    /// Ordered list of values
    List(Vec<Value>),

    /// Object with string keys
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Existence-probe semantics: non-null and non-empty.
    pub fn exists(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            _ => true,
        }
    }

    /// Numeric coercion used by the comparison ladder. Numeric strings
    /// (including zero-padded entity values like `"01"`) convert too.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// String form used for pattern matching and lexicographic comparison.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_display_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(_) => "{...}".to_string(),
        }
    }

    /// Canonical key used for GROUP BY partitioning and DISTINCT dedup.
    ///
    /// Returns `None` for null so callers can give nulls their own bucket.
    /// The tag keeps `Str("1")` and `Int(1)` distinct: entity values group
    /// by their literal string form, not their numeric interpretation.
    pub fn group_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(format!("b:{}", b)),
            Value::Int(n) => Some(format!("i:{}", n)),
            Value::Float(n) => Some(format!("f:{}", n)),
            Value::Str(s) => Some(format!("s:{}", s)),
            Value::List(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| v.group_key().unwrap_or_default())
                    .collect();
                Some(format!("l:[{}]", parts.join(",")))
            }
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let parts: Vec<String> = keys
                    .iter()
                    .map(|k| format!("{}={}", k, map[*k].group_key().unwrap_or_default()))
                    .collect();
                Some(format!("m:{{{}}}", parts.join(",")))
            }
        }
    }

    /// Convert a parsed JSON document into a `Value` tree.
    pub fn from_json(v: serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(arr) => {
                Value::List(arr.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Human-readable type name, used in warnings.
pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Int(_) => "integer",
        Value::Float(_) => "float",
        Value::Str(_) => "string",
        Value::List(_) => "list",
        Value::Map(_) => "map",
    }
}

#[test]
fn test_numeric_coercion() {
    assert_eq!(Value::Str("01".into()).as_f64(), Some(1.0));
    assert_eq!(Value::Str("2.5".into()).as_f64(), Some(2.5));
    assert_eq!(Value::Str("nback".into()).as_f64(), None);
    assert_eq!(Value::Int(3).as_f64(), Some(3.0));
}

#[test]
fn test_group_key_distinguishes_types() {
    assert_ne!(
        Value::Str("1".into()).group_key(),
        Value::Int(1).group_key()
    );
    assert_eq!(Value::Null.group_key(), None);
}
