//! # BIQL - Abstract Syntax Tree
//!
//! This module defines the token set and the Abstract Syntax Tree for BIQL,
//! a SQL-flavoured query language over indexed BIDS datasets.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Predicate expressions, comparison operands, values
//! - **[query]** - Complete query structure with all optional clauses
//!
//! ## Query Structure
//!
//! Every clause is optional and the order is fixed:
//!
//! ```text
//! [SELECT [DISTINCT] items] [WHERE expr] [GROUP BY fields]
//! [HAVING expr] [ORDER BY fields] [FORMAT name]
//! ```
//!
//! A query consisting only of a predicate is shorthand for
//! `SELECT * WHERE predicate`:
//!
//! ```text
//! sub=01 AND datatype=func
//! ```
//!
//! ## Core Concepts
//!
//! ### Namespaces
//!
//! A field reference selects its namespace with the first segment:
//! `metadata.RepetitionTime` reads inherited sidecar metadata,
//! `participants.age` reads the participants table, and any other name is
//! an entity (`sub`, `task`, `run`, ...) or a computed field (`filename`,
//! `filepath`, `relative_path`, `extension`, `suffix`, `datatype`).
//!
//! ### Value Forms
//!
//! The right-hand side of a comparison may be a number, a quoted string, a
//! bare word, a glob pattern (`*`/`?`), an SQL LIKE pattern (`%`/`_`), a
//! regex (with `~=`), a numeric range `[1:3]`, a list `[a, b, c]`, or
//! `NULL`.
//!
//! ## Examples
//!
//! ### Filtering
//!
//! ```text
//! task=nback AND run=[1:2]
//! ```
//!
//! ### Grouped aggregation
//!
//! ```text
//! SELECT sub, COUNT(*) GROUP BY sub HAVING COUNT(*) > 10
//! ```
//!
//! ### Conditional array aggregation
//!
//! ```text
//! SELECT sub, ARRAY_AGG(filename WHERE part=mag) AS mag_files GROUP BY sub
//! ```
pub mod expressions;
pub mod query;
pub mod tokens;

pub use expressions::{AggregateCall, AggregateFunc, CompOp, Expr, FieldPath, Operand, QueryValue};
pub use query::{OutputFormat, Query, SelectClause, SelectItem, SelectKind, SortDirection};
pub use tokens::Token;
