//! Compiler service backed by an external driver program.
//!
//! The driver speaks a small command-line protocol:
//!
//! - `<program> <args..> compile --out=<artifact> [--reference=<r>].. [--flag=<f>].. -- <sources..>`
//!   writes the artifact and prints a JSON [`DriverReport`] on stdout.
//! - `<program> <args..> invoke --artifact=<artifact> --function=<name> --type=<full type name>`
//!   prints the generated text on stdout; a non-zero exit is a runtime fault.
//!
//! Compile scratch directories are removed before `compile` returns. A
//! loaded module keeps its image in memory and writes it to a temporary
//! file for the duration of each invoke.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::ExpandError;
use crate::gateway::{CompileOutput, CompileRequest, CompileTarget, CompilerService, Diagnostic};
use crate::module::{Catalog, Fault, Invoke, Module, Value};

/// How to run the compiler driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Driver executable.
    pub program: PathBuf,
    /// Arguments placed before the protocol subcommand.
    pub args: Vec<String>,
}

impl DriverConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    fn run(&self, command: &mut Command) -> Result<Output, ExpandError> {
        command.output().map_err(|e| {
            ExpandError::Driver(format!(
                "failed to run {}: {}",
                self.program.display(),
                e
            ))
        })
    }
}

/// What the driver prints after a compile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverReport {
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    /// Present when compilation succeeded.
    #[serde(default)]
    pub catalog: Option<Catalog>,
}

/// [`CompilerService`] that shells out to a driver program.
pub struct ProcessCompiler {
    driver: Arc<DriverConfig>,
    artifact_extension: String,
}

impl ProcessCompiler {
    pub fn new(driver: DriverConfig) -> Self {
        Self {
            driver: Arc::new(driver),
            artifact_extension: "lib".to_string(),
        }
    }

    /// Extension used for artifacts of in-memory compiles.
    pub fn with_artifact_extension(mut self, extension: impl Into<String>) -> Self {
        self.artifact_extension = extension.into();
        self
    }

    pub fn driver(&self) -> &DriverConfig {
        &self.driver
    }
}

impl CompilerService for ProcessCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, ExpandError> {
        let (artifact, _scratch) = match &request.target {
            CompileTarget::ArtifactAt(path) => (path.clone(), None),
            CompileTarget::DynamicModule => {
                let dir = tempfile::Builder::new().prefix("typexpand-module-").tempdir()?;
                let artifact = dir.path().join(format!("module.{}", self.artifact_extension));
                (artifact, Some(dir))
            }
        };

        let mut command = self.driver.command();
        command.arg("compile").arg(format!("--out={}", artifact.display()));
        for reference in &request.references {
            command.arg(format!("--reference={}", reference.display()));
        }
        for flag in &request.flags {
            command.arg(format!("--flag={}", flag));
        }
        command.arg("--").args(&request.sources);

        let output = self.driver.run(&mut command)?;
        let report = interpret_compile(&output)?;

        let Some(catalog) = report.catalog else {
            return Ok(CompileOutput {
                diagnostics: report.diagnostics,
                module: None,
            });
        };
        if report.diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(CompileOutput {
                diagnostics: report.diagnostics,
                module: None,
            });
        }

        let image = std::fs::read(&artifact).map_err(|e| {
            ExpandError::Driver(format!(
                "driver reported success but artifact {} is unreadable: {}",
                artifact.display(),
                e
            ))
        })?;

        let module = load_module(&self.driver, &artifact, catalog, image, &self.artifact_extension);
        let module = match request.target {
            CompileTarget::ArtifactAt(_) => module.with_location(&artifact),
            CompileTarget::DynamicModule => module,
        };

        Ok(CompileOutput {
            diagnostics: report.diagnostics,
            module: Some(module),
        })
    }
}

/// Turn driver output into a report, synthesizing an error for silent failures.
fn interpret_compile(output: &Output) -> Result<DriverReport, ExpandError> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let parsed: Option<DriverReport> = if stdout.trim().is_empty() {
        None
    } else {
        match serde_json::from_str(&stdout) {
            Ok(report) => Some(report),
            Err(e) if output.status.success() => {
                return Err(ExpandError::Driver(format!("invalid compile report: {}", e)));
            }
            Err(_) => None,
        }
    };

    if output.status.success() {
        return parsed.ok_or_else(|| ExpandError::Driver("driver printed no compile report".into()));
    }

    let mut report = parsed.unwrap_or_default();
    report.catalog = None;
    if !report.diagnostics.iter().any(Diagnostic::is_error) {
        let detail = stderr.trim();
        report.diagnostics.push(Diagnostic::error_without_location(if detail.is_empty() {
            format!("compiler driver exited with {}", output.status)
        } else {
            detail.to_string()
        }));
    }
    Ok(report)
}

fn load_module(
    driver: &Arc<DriverConfig>,
    artifact: &Path,
    catalog: Catalog,
    image: Vec<u8>,
    extension: &str,
) -> Module {
    let name = artifact
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module")
        .to_string();

    let shared = Arc::new(image);
    let suffix = format!(".{}", extension);

    let mut builder = Module::builder(name).shared_image(Arc::clone(&shared));
    for ty in catalog.types {
        builder = builder.ty(ty);
    }
    for function in catalog.functions {
        let entry = DriverEntry {
            driver: Arc::clone(driver),
            image: Arc::clone(&shared),
            suffix: suffix.clone(),
            function: function.full_name.clone(),
        };
        builder = builder.function(function, entry);
    }
    builder.build()
}

/// Invocation entry point for one function of a driver-compiled module.
struct DriverEntry {
    driver: Arc<DriverConfig>,
    image: Arc<Vec<u8>>,
    /// Artifact suffix, including the dot.
    suffix: String,
    function: String,
}

impl DriverEntry {
    fn materialize(&self) -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("typexpand-invoke-")
            .suffix(&self.suffix)
            .tempfile()?;
        file.write_all(&self.image)?;
        file.flush()?;
        Ok(file)
    }
}

impl Invoke for DriverEntry {
    fn invoke(&self, args: &[Value]) -> Result<Value, Fault> {
        let ty = match args {
            [Value::TypeDescriptor(ty)] => ty,
            _ => {
                return Err(Fault::new(format!(
                    "{}: driver functions take exactly one type descriptor",
                    self.function
                )))
            }
        };

        let artifact = self
            .materialize()
            .map_err(|e| Fault::new(format!("cannot stage artifact: {}", e)))?;

        let mut command = self.driver.command();
        command
            .arg("invoke")
            .arg(format!("--artifact={}", artifact.path().display()))
            .arg(format!("--function={}", self.function))
            .arg(format!("--type={}", ty.full_name));

        let output = self
            .driver
            .run(&mut command)
            .map_err(|e| Fault::new(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            return Err(Fault::new(if detail.is_empty() {
                format!("exited with {}", output.status)
            } else {
                detail.to_string()
            }));
        }

        String::from_utf8(output.stdout)
            .map(Value::String)
            .map_err(|_| Fault::new("output is not valid UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Severity;
    use crate::module::TypeInfo;

    #[cfg(unix)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(unix)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: exit_status(code),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn successful_report_is_parsed() {
        let report = interpret_compile(&output(
            0,
            r#"{"diagnostics": [], "catalog": {"types": [], "functions": []}}"#,
            "",
        ))
        .unwrap();
        assert!(report.catalog.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn silent_failure_becomes_error_diagnostic() {
        let report = interpret_compile(&output(1, "", "driver crashed\n")).unwrap();
        assert!(report.catalog.is_none());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Error);
        assert_eq!(report.diagnostics[0].message, "driver crashed");
    }

    #[cfg(unix)]
    #[test]
    fn failure_with_diagnostics_keeps_them() {
        let stdout = r#"{"diagnostics": [{"severity": "error", "file": "a.src",
            "start_line": 2, "start_column": 1, "end_line": 2, "end_column": 9,
            "message": "unexpected token"}]}"#;
        let report = interpret_compile(&output(1, stdout, "ignored")).unwrap();
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].message, "unexpected token");
    }

    #[cfg(unix)]
    #[test]
    fn garbage_on_success_is_driver_error() {
        let result = interpret_compile(&output(0, "not json", ""));
        assert!(matches!(result, Err(ExpandError::Driver(_))));
    }

    #[test]
    fn missing_program_is_driver_error() {
        let compiler = ProcessCompiler::new(DriverConfig::new("/nonexistent/typexpand-driver"));
        let request = CompileRequest {
            sources: vec![PathBuf::from("a.src")],
            references: vec![],
            flags: vec![],
            target: CompileTarget::DynamicModule,
        };
        let result = compiler.compile(&request);
        assert!(matches!(result, Err(ExpandError::Driver(m)) if m.contains("typexpand-driver")));
    }

    #[cfg(unix)]
    const SCRIPT: &str = r#"
case "$1" in
compile)
  for a in "$@"; do case "$a" in --out=*) out="${a#--out=}";; esac; done
  printf 'image' > "$out"
  printf '%s' '{"catalog":{"types":[{"full_name":"m.T","attributes":[{"kind":"expandable","templates":[{"name":"A"}]}]}],"functions":[{"full_name":"g.a","params":[{"name":"t","ty":{"kind":"type_descriptor"}}],"returns":{"kind":"string"},"attributes":[{"kind":"expander","template":"A"}]}]}}'
  ;;
invoke)
  for a in "$@"; do case "$a" in --type=*) t="${a#--type=}";; esac; done
  if [ "$t" = "m.Broken" ]; then echo "cannot expand" >&2; exit 3; fi
  printf 'generated for %s' "$t"
  ;;
esac
"#;

    #[cfg(unix)]
    fn script_compiler() -> ProcessCompiler {
        ProcessCompiler::new(DriverConfig::new("sh").with_args(["-c", SCRIPT, "driver"]))
    }

    #[cfg(unix)]
    #[test]
    fn shell_driver_round_trip() {
        let compiler = script_compiler();
        let request = CompileRequest {
            sources: vec![PathBuf::from("a.src")],
            references: vec![PathBuf::from("core.lib")],
            flags: vec!["-O".to_string()],
            target: CompileTarget::DynamicModule,
        };

        let output = compiler.compile(&request).unwrap();
        let module = output.module.expect("module");
        assert_eq!(module.image(), b"image");
        assert_eq!(module.catalog().types[0].full_name, "m.T");

        let scan = crate::scanner::scan(&module);
        assert_eq!(scan.expanders.len(), 1);
        let text = scan.expanders[0].invoke(&TypeInfo::new("m.T")).unwrap();
        assert_eq!(text, "generated for m.T");

        let fault = scan.expanders[0]
            .invoke(&TypeInfo::new("m.Broken"))
            .unwrap_err();
        assert_eq!(fault.message, "cannot expand");
    }

    #[cfg(unix)]
    const LOGGING_SCRIPT: &str = r#"
case "$1" in
compile)
  for a in "$@"; do case "$a" in --out=*) out="${a#--out=}";; esac; done
  echo "$out" >> "@LOG@"
  printf 'image' > "$out"
  printf '%s' '{"catalog":{"types":[{"full_name":"m.T","attributes":[{"kind":"expandable","templates":[{"name":"A"}]}]}],"functions":[{"full_name":"g.a","params":[{"name":"t","ty":{"kind":"type_descriptor"}}],"returns":{"kind":"string"},"attributes":[{"kind":"expander","template":"A"}]}]}}'
  ;;
invoke)
  for a in "$@"; do case "$a" in --artifact=*) art="${a#--artifact=}";; --type=*) t="${a#--type=}";; esac; done
  echo "$art" >> "@LOG@"
  printf '// %s from %s' "$t" "$(cat "$art")"
  ;;
esac
"#;

    #[cfg(unix)]
    #[test]
    fn build_leaves_no_driver_files_behind() {
        use crate::config::{BuildConfiguration, FileKinds, OutputMode};
        use crate::engine::Engine;
        use crate::source::SourceSpec;

        let temp = tempfile::TempDir::new().unwrap();
        let log = temp.path().join("driver.log");
        let source = temp.path().join("a.src");
        std::fs::write(&source, "").unwrap();

        let script = LOGGING_SCRIPT.replace("@LOG@", &log.display().to_string());
        let engine = Engine::with_service(ProcessCompiler::new(
            DriverConfig::new("sh").with_args(["-c".to_string(), script, "driver".to_string()]),
        ));
        let config = BuildConfiguration::new(
            SourceSpec::from_paths([source]),
            OutputMode::EmbedInHost,
            temp.path().join("x"),
            &FileKinds::default(),
        )
        .unwrap();

        let result = engine.build(&config).unwrap();
        // The invoke saw the staged image.
        assert_eq!(result.generated, "// m.T from image");
        assert!(result.final_module.is_some());

        let logged = std::fs::read_to_string(&log).unwrap();
        let paths: Vec<PathBuf> = logged.lines().map(PathBuf::from).collect();
        // Scratch compile, one invoke, merged compile.
        assert_eq!(paths.len(), 3);

        let mut module_dirs = 0;
        for path in &paths {
            assert!(!path.exists(), "{} outlived the build", path.display());
            let parent = path.parent().unwrap();
            let in_module_dir = parent
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("typexpand-module-"));
            if in_module_dir {
                module_dirs += 1;
                assert!(!parent.exists(), "{} outlived the build", parent.display());
            }
        }
        assert_eq!(module_dirs, 2);

        // Cached modules can still be invoked after their compile dirs are gone.
        let scan = crate::scanner::scan(&result.scratch_module);
        assert_eq!(
            scan.expanders[0].invoke(&TypeInfo::new("m.U")).unwrap(),
            "// m.U from image"
        );
    }

    #[cfg(unix)]
    #[test]
    fn shell_driver_writes_artifact_at_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let artifact = temp.path().join("out.lib");
        let compiler = script_compiler();
        let request = CompileRequest {
            sources: vec![PathBuf::from("a.src")],
            references: vec![],
            flags: vec![],
            target: CompileTarget::ArtifactAt(artifact.clone()),
        };

        let module = compiler.compile(&request).unwrap().module.expect("module");
        assert_eq!(module.location(), Some(artifact.as_path()));
        assert_eq!(std::fs::read(&artifact).unwrap(), b"image");
    }
}
