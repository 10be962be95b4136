//! Unit test infrastructure for panladder
//!
//! Tests are organized by component:
//! - `args` - command-line parsing and config mapping
//! - `graph` - similarity graph construction and filters
//! - `hierarchy` - the partition tree
//! - `pipeline` - end-to-end runs with in-process and scripted backends

pub mod args;
pub mod diagnostics;
pub mod graph;
pub mod hierarchy;
pub mod pipeline;
