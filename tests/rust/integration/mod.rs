//! Integration tests - the client facade against an in-memory graph
//!
//! The graph answers the sampling queries with a small movie schema and
//! records every statement it is asked to run.

mod client_tests;
mod fixtures;
mod metadata_tests;
