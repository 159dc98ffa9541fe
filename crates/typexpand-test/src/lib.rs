//! Test harnesses for typexpand.
//!
//! Provides the `typexpand-stubc` compiler driver, which implements the
//! driver protocol over a line-oriented toy language, and `Project`, a
//! scratch directory for writing sources next to a built output.

pub mod project;
pub mod stub;

pub use project::Project;
pub use stub::{StubArtifact, StubError};
