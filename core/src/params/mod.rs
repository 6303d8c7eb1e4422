//! Parameter declaration and validation for task inputs.
//!
//! A [`ParamSchema`] describes the flat key/value inputs a task accepts. The
//! executor validates the raw run parameters against each task's schema before
//! any task runs; tasks without a schema receive the raw parameters unchanged.

mod schema;

pub use schema::{ParamSchema, ParamSpec, ParamType};

use std::collections::BTreeMap;

/// Flat parameter mapping handed to a run and to each task.
pub type Params = BTreeMap<String, serde_json::Value>;
