//! # terse-core
//!
//! Parser, applier, and query engine for **terse**, a compact shorthand
//! notation for authoring and querying structured data trees (the same
//! data model as JSON/CBOR, plus byte strings, timestamps, and maps with
//! non-string keys).
//!
//! Parsing a shorthand expression produces an ordered list of
//! path-addressed operations rather than a tree; applying those operations
//! to an optional existing document materializes whatever containers the
//! paths require. A companion query language extracts sub-trees.
//!
//! ## Quick start
//!
//! ```rust
//! use terse_core::{get_path, parse_and_apply, GetOptions, ParseOptions, Value};
//!
//! // Build a document from shorthand.
//! let doc = parse_and_apply("{foo.bar: hello, tags: [a, b]}", None, ParseOptions::default())?;
//!
//! // Query it back.
//! let (value, found) = get_path("foo.bar", &doc, GetOptions::default())?;
//! assert!(found);
//! assert_eq!(value, Value::String("hello".into()));
//! # Ok::<(), terse_core::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`parse`] — shorthand expression → ordered [`Operation`]s
//! - [`apply`] — operations + existing tree → new tree
//! - [`get`] — query language over a [`Value`] tree
//! - [`expr`] — the predicate language used inside `[...]` filters
//! - [`marshal`] — [`Value`] → canonical shorthand text
//! - [`value`] — the [`Value`] tree and [`MapKey`] map keys
//! - [`coerce`] — raw-token classification
//! - [`error`] — offset-carrying [`Error`] with caret rendering

pub mod apply;
pub mod coerce;
pub mod error;
pub mod expr;
pub mod get;
pub mod marshal;
pub mod parse;
pub mod path;
pub mod value;

mod scanner;

pub use apply::{apply, parse_and_apply};
pub use error::{Error, Result};
pub use get::{get_path, GetOptions};
pub use marshal::marshal;
pub use parse::{parse, DebugLogger, Document, Operation, ParseOptions};
pub use value::{MapKey, Value};
