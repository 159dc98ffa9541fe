//! A stub compiler driver for end-to-end tests.
//!
//! Implements the driver protocol `ProcessCompiler` speaks, over a
//! line-oriented source format:
//!
//! ```text
//! type model.Person Show Eq!        # expandable type; `!` marks an explicit request
//! expander gen.show Show = body     # generator; body may use {type} and {name}
//! expander! gen.eq Eq = body        # explicit-use generator
//! malformed gen.bad Show            # expander attribute on a two-parameter function
//! fail gen.show model.Person        # gen.show faults for model.Person
//! error some message                # error diagnostic at this line
//! warning some message              # warning diagnostic at this line
//! ```
//!
//! Any other line is ignored, so generated code fed back in compiles cleanly.
//! The artifact is JSON holding the catalog, expander bodies, injected
//! failures, and the text of every compiled source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use typexpand_engine::{
    Attribute, Catalog, Diagnostic, DriverReport, FunctionInfo, Param, Severity, TemplateRequest,
    TypeInfo, TypeRef,
};

/// Flag that turns warnings into errors.
pub const WERROR_FLAG: &str = "werror";

const DEFAULT_BODY: &str = "// {name} for {type}";

/// Stub driver errors. These are protocol misuse, not compile errors.
#[derive(Debug, Error)]
pub enum StubError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function} failed for {type_name}")]
    Injected { function: String, type_name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parsed `compile` arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileArgs {
    pub out: PathBuf,
    pub references: Vec<PathBuf>,
    pub flags: Vec<String>,
    pub sources: Vec<PathBuf>,
}

/// Parsed `invoke` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeArgs {
    pub artifact: PathBuf,
    pub function: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Compile(CompileArgs),
    Invoke(InvokeArgs),
}

/// What the stub writes as its artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StubArtifact {
    pub catalog: Catalog,
    /// Expander body templates by function name.
    pub bodies: BTreeMap<String, String>,
    /// `(function, type)` pairs that fault when invoked.
    pub failures: Vec<(String, String)>,
    /// Text of every compiled source, in order.
    pub sources: Vec<String>,
}

impl StubArtifact {
    pub fn load(path: &Path) -> Result<Self, StubError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Parse the driver's command line (without the program name).
pub fn parse_args(args: &[String]) -> Result<Invocation, StubError> {
    let (command, rest) = args
        .split_first()
        .ok_or_else(|| StubError::Usage("expected 'compile' or 'invoke'".into()))?;

    match command.as_str() {
        "compile" => {
            let mut parsed = CompileArgs::default();
            let mut out = None;
            let mut iter = rest.iter();
            for arg in iter.by_ref() {
                if arg == "--" {
                    break;
                }
                if let Some(v) = arg.strip_prefix("--out=") {
                    out = Some(PathBuf::from(v));
                } else if let Some(v) = arg.strip_prefix("--reference=") {
                    parsed.references.push(PathBuf::from(v));
                } else if let Some(v) = arg.strip_prefix("--flag=") {
                    parsed.flags.push(v.to_string());
                } else {
                    return Err(StubError::Usage(format!("unexpected argument '{}'", arg)));
                }
            }
            parsed.sources = iter.map(PathBuf::from).collect();
            parsed.out = out.ok_or_else(|| StubError::Usage("compile needs --out".into()))?;
            Ok(Invocation::Compile(parsed))
        }
        "invoke" => {
            let value = |prefix: &str| {
                rest.iter()
                    .find_map(|a| a.strip_prefix(prefix))
                    .map(str::to_string)
                    .ok_or_else(|| StubError::Usage(format!("invoke needs {}", prefix)))
            };
            Ok(Invocation::Invoke(InvokeArgs {
                artifact: PathBuf::from(value("--artifact=")?),
                function: value("--function=")?,
                type_name: value("--type=")?,
            }))
        }
        other => Err(StubError::Usage(format!("unknown command '{}'", other))),
    }
}

/// Compile sources, writing the artifact when there are no errors.
pub fn compile(args: &CompileArgs) -> Result<DriverReport, StubError> {
    let werror = args.flags.iter().any(|f| f == WERROR_FLAG);
    let mut artifact = StubArtifact::default();
    let mut diagnostics = Vec::new();

    for reference in &args.references {
        if !reference.exists() {
            diagnostics.push(Diagnostic::error_without_location(format!(
                "reference not found: {}",
                reference.display()
            )));
        }
    }

    for source in &args.sources {
        let text = match std::fs::read_to_string(source) {
            Ok(text) => text,
            Err(e) => {
                diagnostics.push(Diagnostic::error_without_location(format!(
                    "cannot read {}: {}",
                    source.display(),
                    e
                )));
                continue;
            }
        };
        parse_source(source, &text, werror, &mut artifact, &mut diagnostics);
        artifact.sources.push(text);
    }

    if diagnostics.iter().any(Diagnostic::is_error) {
        return Ok(DriverReport {
            diagnostics,
            catalog: None,
        });
    }

    std::fs::write(&args.out, serde_json::to_vec_pretty(&artifact)?)?;
    Ok(DriverReport {
        diagnostics,
        catalog: Some(artifact.catalog),
    })
}

fn parse_source(
    source: &Path,
    text: &str,
    werror: bool,
    artifact: &mut StubArtifact,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (idx, line) in text.lines().enumerate() {
        let (head, body) = match line.split_once(" = ") {
            Some((head, body)) => (head, Some(body)),
            None => (line, None),
        };
        let words: Vec<&str> = head.split_whitespace().collect();
        let diagnostic = |severity, message: &[&str]| Diagnostic {
            severity,
            file: source.display().to_string(),
            start_line: idx as u32 + 1,
            start_column: 1,
            end_line: idx as u32 + 1,
            end_column: line.len() as u32,
            message: message.join(" "),
        };

        match words.as_slice() {
            ["type", name, templates @ ..] => {
                let templates = templates
                    .iter()
                    .map(|t| match t.strip_suffix('!') {
                        Some(t) => TemplateRequest::explicit(t),
                        None => TemplateRequest::new(*t),
                    })
                    .collect();
                artifact.catalog.types.push(
                    TypeInfo::new(*name).with_attribute(Attribute::Expandable { templates }),
                );
            }
            [keyword @ ("expander" | "expander!"), name, template] => {
                artifact.catalog.functions.push(
                    FunctionInfo::generator(*name).with_attribute(Attribute::Expander {
                        template: template.to_string(),
                        explicit_use: *keyword == "expander!",
                    }),
                );
                artifact.bodies.insert(
                    name.to_string(),
                    body.unwrap_or(DEFAULT_BODY).to_string(),
                );
            }
            ["malformed", name, template] => {
                let mut function = FunctionInfo::generator(*name).with_attribute(
                    Attribute::Expander {
                        template: template.to_string(),
                        explicit_use: false,
                    },
                );
                function.params.push(Param {
                    name: "extra".to_string(),
                    ty: TypeRef::String,
                });
                artifact.catalog.functions.push(function);
            }
            ["fail", function, ty] => artifact
                .failures
                .push((function.to_string(), ty.to_string())),
            ["error", message @ ..] => diagnostics.push(diagnostic(Severity::Error, message)),
            ["warning", message @ ..] => diagnostics.push(diagnostic(
                if werror {
                    Severity::Error
                } else {
                    Severity::Warning
                },
                message,
            )),
            _ => {}
        }
    }
}

/// Run one expander from an artifact for one type.
pub fn invoke(args: &InvokeArgs) -> Result<String, StubError> {
    let artifact = StubArtifact::load(&args.artifact)?;

    let body = artifact
        .bodies
        .get(&args.function)
        .ok_or_else(|| StubError::UnknownFunction(args.function.clone()))?;

    if artifact
        .failures
        .iter()
        .any(|(f, t)| *f == args.function && *t == args.type_name)
    {
        return Err(StubError::Injected {
            function: args.function.clone(),
            type_name: args.type_name.clone(),
        });
    }

    let short = TypeInfo::new(args.type_name.as_str()).short_name().to_string();
    let function_short = FunctionInfo::generator(args.function.as_str())
        .short_name()
        .to_string();
    Ok(body
        .replace("{type}", &short)
        .replace("{full_type}", &args.type_name)
        .replace("{name}", &function_short))
}
