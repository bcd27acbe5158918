//! Engine facade: one entry point tying the indexer, parser, evaluator,
//! and formatters together.

use std::collections::BTreeMap;
use std::path::Path;

use crate::{
    ast::{OutputFormat, Query},
    dataset::{BidsDataset, DatasetError, DatasetStats, IndexOptions, IndexWarning},
    evaluator::{EvaluationWarning, Evaluator, Row},
    output::{self, OutputError},
    parser::{parse_query, ParseError},
};

/// Rows produced by one evaluation, with the warnings it raised.
#[derive(Debug)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub warnings: Vec<EvaluationWarning>,
}

/// Failure running a query end to end.
#[derive(Debug)]
pub enum QueryError {
    Parse(ParseError),
    Output(OutputError),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Parse(e) => write!(f, "syntax error: {}", e),
            QueryError::Output(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Parse(e) => Some(e),
            QueryError::Output(e) => Some(e),
        }
    }
}

impl From<ParseError> for QueryError {
    fn from(e: ParseError) -> Self {
        QueryError::Parse(e)
    }
}

impl From<OutputError> for QueryError {
    fn from(e: OutputError) -> Self {
        QueryError::Output(e)
    }
}

/// A built engine owns the immutable catalog; queries borrow it read-only,
/// so independent evaluations may run in parallel.
#[derive(Debug)]
pub struct Engine {
    dataset: BidsDataset,
}

/// Build an engine for the dataset at `root`.
pub fn build_engine(root: impl AsRef<Path>) -> Result<Engine, DatasetError> {
    Engine::build(root)
}

impl Engine {
    pub fn build(root: impl AsRef<Path>) -> Result<Engine, DatasetError> {
        Ok(Engine {
            dataset: BidsDataset::index(root)?,
        })
    }

    pub fn build_with(
        root: impl AsRef<Path>,
        options: &IndexOptions,
    ) -> Result<Engine, DatasetError> {
        Ok(Engine {
            dataset: BidsDataset::index_with(root, options)?,
        })
    }

    pub fn dataset(&self) -> &BidsDataset {
        &self.dataset
    }

    pub fn dataset_stats(&self) -> DatasetStats {
        self.dataset.stats()
    }

    /// Non-fatal problems from indexing (bad sidecars, bad participants
    /// rows). Only surfaced on request.
    pub fn index_warnings(&self) -> &[IndexWarning] {
        self.dataset.warnings()
    }

    /// Every entity with its sorted distinct values.
    pub fn entity_values(&self) -> BTreeMap<String, Vec<String>> {
        self.dataset.entity_values()
    }

    /// Parse query text into an AST.
    pub fn parse(&self, text: &str) -> Result<Query, ParseError> {
        parse_query(text)
    }

    /// Parse-only check.
    pub fn validate(&self, text: &str) -> Result<(), ParseError> {
        parse_query(text).map(|_| ())
    }

    /// Execute a parsed query.
    pub fn evaluate(&self, query: &Query) -> RowSet {
        let mut evaluator = Evaluator::new(&self.dataset);
        let rows = evaluator.evaluate(query);
        RowSet {
            rows,
            warnings: evaluator.take_warnings(),
        }
    }

    /// Parse, evaluate, and render in one call.
    ///
    /// A `FORMAT` clause inside the query wins over `default_format`. The
    /// `paths` format renders the matching records before any grouping and
    /// ignores the SELECT list.
    pub fn run_query(
        &self,
        text: &str,
        default_format: OutputFormat,
    ) -> Result<String, QueryError> {
        let query = self.parse(text)?;
        let format = query.format.unwrap_or(default_format);

        if format == OutputFormat::Paths {
            return Ok(self.matching_paths(&query).join("\n"));
        }

        let result = self.evaluate(&query);
        Ok(output::format_rows(&result.rows, format)?)
    }

    /// File paths of the records matching the query's WHERE clause, in
    /// catalog order. This is what the `paths` format prints.
    pub fn matching_paths(&self, query: &Query) -> Vec<String> {
        let mut evaluator = Evaluator::new(&self.dataset);
        evaluator
            .filter_records(query)
            .iter()
            .map(|record| record.filepath.to_string_lossy().into_owned())
            .collect()
    }
}
