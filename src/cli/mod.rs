//! Command-line front end.

pub mod args;
pub mod run;

pub use args::RunArgs;
pub use run::run;
