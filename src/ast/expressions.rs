/// A dotted field reference, already split into segments.
///
/// The first segment selects the namespace: `metadata`, `participants`, or
/// (for single-segment paths) an entity / computed field.
pub type FieldPath = Vec<String>;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompOp {
    /// Equal (`=` or `==`)
    Eq,
    /// Not equal (`!=`)
    NotEq,
    /// Less than (`<`)
    Lt,
    /// Less than or equal (`<=`)
    LtEq,
    /// Greater than (`>`)
    Gt,
    /// Greater than or equal (`>=`)
    GtEq,
    /// Regex full match (`~=`)
    Match,
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateFunc {
    Count,
    Avg,
    Max,
    Min,
    Sum,
    ArrayAgg,
}

impl AggregateFunc {
    /// Case-insensitive lookup of a function name.
    pub fn from_name(name: &str) -> Option<AggregateFunc> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregateFunc::Count),
            "AVG" => Some(AggregateFunc::Avg),
            "MAX" => Some(AggregateFunc::Max),
            "MIN" => Some(AggregateFunc::Min),
            "SUM" => Some(AggregateFunc::Sum),
            "ARRAY_AGG" => Some(AggregateFunc::ArrayAgg),
            _ => None,
        }
    }

    /// Default output column name when no alias is given.
    pub fn default_alias(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Max => "max",
            AggregateFunc::Min => "min",
            AggregateFunc::Sum => "sum",
            AggregateFunc::ArrayAgg => "array_agg",
        }
    }
}

/// An aggregate call: `COUNT(*)`, `COUNT(DISTINCT sub)`,
/// `ARRAY_AGG(filename WHERE part=mag)`, ...
///
/// Any function accepts the inner `WHERE` filter; it runs per record before
/// the aggregate consumes the partition. `COUNT(DISTINCT *)` is rejected by
/// the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub func: AggregateFunc,
    pub distinct: bool,
    /// `None` means `*` (COUNT only)
    pub field: Option<FieldPath>,
    pub filter: Option<Box<Expr>>,
}

/// Left-hand side of a comparison.
///
/// Aggregates are only meaningful in HAVING, where they evaluate over the
/// partition; elsewhere they resolve to null.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(FieldPath),
    Aggregate(AggregateCall),
}

/// Right-hand side value forms of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Numeric literal with the raw lexeme preserved (`01` vs `1`)
    Number(String),
    /// Quoted string or bare word
    Str(String),
    /// Glob pattern with `*` and `?` wildcards
    Pattern(String),
    /// Regex source (from a string after `~=` or a `/.../` literal)
    Regex(String),
    /// Inclusive numeric range `[low:high]`
    Range(f64, f64),
    /// List of values for `IN`
    List(Vec<QueryValue>),
    /// The NULL literal
    Null,
}

/// Predicate expression tree.
///
/// Operator precedence is `OR < AND < NOT < comparison`; adjacency of two
/// comparisons composes with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical conjunction
    And(Box<Expr>, Box<Expr>),

    /// Logical disjunction
    Or(Box<Expr>, Box<Expr>),

    /// Negation
    Not(Box<Expr>),

    /// `operand op value`
    ///
    /// # Examples
    /// ```text
    /// sub=01
    /// metadata.RepetitionTime >= 2.0
    /// task ~= ".*back.*"
    /// ```
    Comparison {
        operand: Operand,
        op: CompOp,
        value: QueryValue,
    },

    /// `field IN [a, b, c]`
    In {
        operand: Operand,
        values: Vec<QueryValue>,
    },

    /// `field LIKE pattern` with SQL wildcards `%` and `_`
    Like { operand: Operand, pattern: String },

    /// Bare field used as a predicate: true iff non-null and non-empty
    ///
    /// # Examples
    /// ```text
    /// WHERE run
    /// WHERE metadata.EchoTime
    /// ```
    Exists(Operand),
}
