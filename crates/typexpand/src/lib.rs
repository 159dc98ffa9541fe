//! typexpand command line library.
//!
//! Exposes the pieces of the `typexpand` binary that are worth testing on
//! their own: turning command-line options into an engine and build
//! configuration, and rendering scan reports.

pub mod report;
pub mod toolchain;

pub use report::ScanReport;
pub use toolchain::{BuildRequest, CliError, Toolchain};
