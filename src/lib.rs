//! sqlgraph - SQL access to property graphs
//!
//! This crate lets relational tooling talk to a Cypher graph database:
//! - A virtual relational schema sampled from the graph (node tables,
//!   relationship-join tables and Cypher-backed views)
//! - SQL to Cypher statement translation with join resolution
//! - Relational metadata listings over the virtual schema
//! - A client facade that executes translated statements through a
//!   pluggable graph executor

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph_catalog;
pub mod metadata;
pub mod sql_translator;

pub use client::{GraphSqlClient, RowSet};
pub use error::SqlGraphError;
