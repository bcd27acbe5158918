pub mod ast;
pub mod dataset;
pub mod engine;
pub mod evaluator;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod value;

pub use ast::{Expr, OutputFormat, Query, Token};
pub use dataset::{
    BidsDataset, CancellationToken, DatasetError, DatasetStats, FileRecord, IndexOptions,
    IndexWarning,
};
pub use engine::{build_engine, Engine, QueryError, RowSet};
pub use evaluator::{EvaluationWarning, Evaluator, Row};
pub use lexer::{LexError, Lexer};
pub use parser::{parse_query, ParseError, Parser};
pub use value::Value;
