//! CLI regression tests for the `typexpand` binary.
//!
//! These tests run the binary as a subprocess against the `typexpand-stubc`
//! driver to catch regressions in flag names, exit codes, and output
//! formats that the engine's API tests can't see.
//!
//! Run with: `cargo test -p typexpand-test`
//! Requires the `typexpand` binary to be built first (`cargo build -p typexpand`).

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use typexpand_test::{Project, StubArtifact};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const STUBC: &str = env!("CARGO_BIN_EXE_typexpand-stubc");

const MODEL: &str = "\
type model.Person Show Eq!
type model.Address Show Eq
expander gen.show Show = impl Show for {type} {}
expander! gen.eq Eq = impl Eq for {type} {}
";

/// Returns an assert_cmd Command wrapping the `typexpand` binary with the
/// typexpand environment scrubbed.
fn bare_typexpand() -> Command {
    // cargo_bin is deprecated for custom build-dir setups; fine for standard workspace use.
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("typexpand")
        .expect("typexpand binary not found, run `cargo build -p typexpand` first");
    cmd.env_remove("TYPEXPAND_COMPILER")
        .env_remove("TYPEXPAND_BASELINE_REFS")
        .env_remove("RUST_LOG");
    cmd
}

/// `typexpand` with the stub driver configured.
fn typexpand() -> Command {
    let mut cmd = bare_typexpand();
    cmd.args(["--compiler", STUBC]);
    cmd
}

fn project_with_model() -> Project {
    let project = Project::new().unwrap();
    project.write("model.src", MODEL).unwrap();
    project
}

// ---------------------------------------------------------------------------
// typexpand generate
// ---------------------------------------------------------------------------

#[test]
fn generate_prints_fragments_in_discovery_order() {
    let project = project_with_model();

    typexpand()
        .args(["generate", "--sources"])
        .arg(project.path("model.src"))
        .assert()
        .success()
        .stdout(
            "impl Eq for Person {}\n\nimpl Show for Address {}\n\nimpl Show for Person {}\n",
        );
}

#[test]
fn generate_with_no_matches_prints_nothing() {
    let project = Project::new().unwrap();
    project.write("plain.src", "type m.T Show\n").unwrap();

    typexpand()
        .args(["generate", "--sources"])
        .arg(project.path("plain.src"))
        .assert()
        .success()
        .stdout("");
}

#[test]
fn generate_accepts_comma_separated_list() {
    let project = Project::new().unwrap();
    let types = project.write("types.src", "type m.T Show\n").unwrap();
    let gens = project
        .write("gens.src", "expander gen.show Show = show {type}\n")
        .unwrap();

    typexpand()
        .args(["generate", "--sources"])
        .arg(format!("{},{}", types.display(), gens.display()))
        .assert()
        .success()
        .stdout("show T\n");
}

#[test]
fn generate_from_manifest_skips_excluded_output() {
    let project = project_with_model();
    // If the generated file were compiled, its 'type' line would add m.Extra.
    project
        .write("Generated.src", "type m.Extra Show\n")
        .unwrap();
    project
        .write(
            "project.yaml",
            "sources:\n  - model.src\n  - Generated.src\n",
        )
        .unwrap();

    typexpand()
        .args(["generate", "--sources"])
        .arg(project.path("project.yaml"))
        .arg("--exclude")
        .arg(project.path("Generated.src"))
        .assert()
        .success()
        .stdout(contains("Extra").not());
}

// ---------------------------------------------------------------------------
// typexpand build
// ---------------------------------------------------------------------------

#[test]
fn build_external_source_writes_generated_file() {
    let project = project_with_model();
    let output = project.path("out/Generated.src");

    typexpand()
        .args(["build", "--mode", "source", "--sources"])
        .arg(project.path("model.src"))
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(contains("built 1 source(s)"));

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "impl Eq for Person {}\n\nimpl Show for Address {}\n\nimpl Show for Person {}"
    );
}

#[test]
fn build_external_artifact_compiles_generated_code_in() {
    let project = project_with_model();
    let output = project.path("Model.lib");

    typexpand()
        .args(["build", "--mode", "external-artifact", "--sources"])
        .arg(project.path("model.src"))
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let artifact = StubArtifact::load(&output).unwrap();
    assert_eq!(artifact.sources.len(), 2);
    assert_eq!(artifact.sources[0], MODEL);
    assert!(artifact.sources[1].contains("impl Eq for Person {}"));
}

#[test]
fn build_embed_reports_module_size() {
    let project = project_with_model();

    typexpand()
        .args(["build", "--sources"])
        .arg(project.path("model.src"))
        .assert()
        .success()
        .stderr(contains("module image"));
}

#[test]
fn build_missing_source_exits_one_and_names_it() {
    let project = project_with_model();
    let missing = project.path("b.src");

    typexpand()
        .args(["build", "--mode", "source", "--sources"])
        .arg(format!("{},{}", project.path("model.src").display(), missing.display()))
        .arg("--output")
        .arg(project.path("G.src"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2002"))
        .stderr(contains("b.src"))
        .stderr(contains("model.src").not());

    assert!(!project.path("G.src").exists());
}

#[test]
fn build_artifact_with_text_suffix_exits_one() {
    let project = project_with_model();

    typexpand()
        .args(["build", "--mode", "artifact", "--sources"])
        .arg(project.path("model.src"))
        .arg("--output")
        .arg(project.path("out.txt"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2020"));
}

#[test]
fn build_unknown_mode_exits_one() {
    let project = project_with_model();

    typexpand()
        .args(["build", "--mode", "inline", "--sources"])
        .arg(project.path("model.src"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2021"));
}

#[test]
fn build_compile_errors_list_diagnostics() {
    let project = Project::new().unwrap();
    let source = project
        .write("bad.src", "type m.T Show\nerror unexpected token\n")
        .unwrap();

    typexpand()
        .args(["build", "--sources"])
        .arg(&source)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2010"))
        .stderr(contains(format!(
            "{} (2,1)-(2,22) unexpected token",
            source.display()
        )));
}

#[test]
fn build_expander_fault_exits_one() {
    let project = Project::new().unwrap();
    project
        .write(
            "model.src",
            "type m.Bad Show\nexpander gen.show Show\nfail gen.show m.Bad\n",
        )
        .unwrap();

    typexpand()
        .args(["build", "--sources"])
        .arg(project.path("model.src"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2030"))
        .stderr(contains("gen.show failed for m.Bad"));
}

#[test]
fn warnings_do_not_fail_unless_promoted() {
    let project = project_with_model();
    project.write("warn.src", "warning unused import\n").unwrap();
    let sources = format!(
        "{},{}",
        project.path("model.src").display(),
        project.path("warn.src").display()
    );

    typexpand()
        .args(["generate", "--sources", &sources])
        .assert()
        .success();

    typexpand()
        .args(["generate", "--sources", &sources, "--flag", "werror"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("unused import"));
}

// ---------------------------------------------------------------------------
// typexpand scan
// ---------------------------------------------------------------------------

#[test]
fn scan_text_lists_types_and_expanders() {
    let project = project_with_model();

    typexpand()
        .args(["scan", "--sources"])
        .arg(project.path("model.src"))
        .assert()
        .success()
        .stdout(contains("model.Person [Eq!, Show]"))
        .stdout(contains("gen.eq -> Eq!"));
}

#[test]
fn scan_json_skips_malformed_expanders() {
    let project = project_with_model();
    project
        .write("extra.src", "malformed gen.broken Show\n")
        .unwrap();
    let sources = format!(
        "{},{}",
        project.path("model.src").display(),
        project.path("extra.src").display()
    );

    let output = typexpand()
        .args(["scan", "--format", "json", "--sources", &sources])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = json["expanders"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["gen.eq", "gen.show"]);
    assert_eq!(json["types"].as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Global options
// ---------------------------------------------------------------------------

#[test]
fn missing_compiler_exits_one() {
    let project = project_with_model();

    bare_typexpand()
        .args(["generate", "--sources"])
        .arg(project.path("model.src"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("no compiler driver configured"));
}

#[test]
fn baseline_references_from_env_reach_the_driver() {
    let project = project_with_model();
    let absent = project.path("core.lib");

    typexpand()
        .env("TYPEXPAND_BASELINE_REFS", &absent)
        .args(["generate", "--sources"])
        .arg(project.path("model.src"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("reference not found"))
        .stderr(contains("core.lib"));

    project.write("core.lib", "").unwrap();
    typexpand()
        .env("TYPEXPAND_BASELINE_REFS", &absent)
        .args(["generate", "--sources"])
        .arg(project.path("model.src"))
        .assert()
        .success();
}

#[test]
fn custom_source_extension() {
    let project = Project::new().unwrap();
    project
        .write("model.tx", "type m.T Show\nexpander gen.show Show = show {type}\n")
        .unwrap();

    typexpand()
        .args(["--source-ext", "tx", "generate", "--sources"])
        .arg(project.path("model.tx"))
        .assert()
        .success()
        .stdout("show T\n");

    typexpand()
        .args(["generate", "--sources"])
        .arg(project.path("model.tx"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2001"));
}

#[test]
fn invalid_log_format_exits_one() {
    let project = project_with_model();

    typexpand()
        .args(["--log-format", "xml", "generate", "--sources"])
        .arg(project.path("model.src"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("invalid log format"));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    typexpand().arg("explode").assert().failure().code(2);
}
