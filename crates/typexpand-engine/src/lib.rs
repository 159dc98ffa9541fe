//! Expansion engine for typexpand.
//!
//! Compiles user sources through an external compiler service, discovers
//! expandable types and expander functions in the compiled module, runs every
//! applicable pairing, and assembles the output into one generated-code
//! document. Builds are cached per configuration.

pub mod assembler;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod matcher;
pub mod module;
pub mod process;
pub mod scanner;
pub mod source;

pub use assembler::{assemble, FRAGMENT_SEPARATOR};
pub use cache::{BuildCache, BuildResult, CacheStats};
pub use config::{BuildConfiguration, FileKinds, OutputMode};
pub use dispatch::dispatch;
pub use engine::Engine;
pub use error::{format_diagnostics, ExpandError};
pub use gateway::{
    CompileOutput, CompileRequest, CompileTarget, CompilerGateway, CompilerService, Diagnostic,
    Severity,
};
pub use matcher::{expand, is_applicable};
pub use module::{
    Attribute, Catalog, CatalogVisitor, Fault, FunctionInfo, Invoke, Module, ModuleBuilder, Param,
    Scope, TemplateRequest, TypeInfo, TypeRef, Value,
};
pub use process::{DriverConfig, DriverReport, ProcessCompiler};
pub use scanner::{scan, ExpandableType, ExpanderFn, ExpanderFunction, Scan};
pub use source::{ProjectManifest, SourceForm, SourceSpec};
