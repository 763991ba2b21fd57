//! Unit tests - public API without a graph behind it
//!
//! Translation runs against hand-built schema snapshots; nothing here needs
//! an executor.

mod config_tests;
mod translation_tests;
mod type_mapping_tests;
