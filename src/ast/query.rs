use crate::ast::{AggregateCall, Expr, FieldPath};

/// Output format selected by a `FORMAT` clause or the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Tsv,
    Paths,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<OutputFormat> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "table" => Some(OutputFormat::Table),
            "csv" => Some(OutputFormat::Csv),
            "tsv" => Some(OutputFormat::Tsv),
            "paths" => Some(OutputFormat::Paths),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Table => "table",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Paths => "paths",
        }
    }
}

/// Sort direction in ORDER BY, ASC when unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One projection item.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectKind {
    /// `*` - every record field
    Star,
    /// A plain field reference
    Field(FieldPath),
    /// An aggregate call
    Aggregate(AggregateCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub kind: SelectKind,
    /// `AS name`
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
}

/// A complete parsed query. Every clause is optional; an entirely empty
/// query selects every record.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub select: Option<SelectClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Option<Vec<FieldPath>>,
    pub having: Option<Expr>,
    pub order_by: Option<Vec<(FieldPath, SortDirection)>>,
    pub format: Option<OutputFormat>,
}

impl Query {
    /// True when evaluation must run the grouping pipeline: an explicit
    /// GROUP BY, a HAVING clause, or any aggregate in the projection (the
    /// whole filtered set then forms a single partition).
    pub fn is_grouped(&self) -> bool {
        if self.group_by.is_some() || self.having.is_some() {
            return true;
        }
        self.select
            .as_ref()
            .map(|s| {
                s.items
                    .iter()
                    .any(|item| matches!(item.kind, SelectKind::Aggregate(_)))
            })
            .unwrap_or(false)
    }
}
