//! typexpand command line.
//!
//! Compiles user sources through a compiler driver, runs every applicable
//! expander, and prints, writes, or compiles in the generated code.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use typexpand_engine::OutputMode;
use typexpand_lib::{BuildRequest, CliError, ScanReport, Toolchain};
use typexpand_telemetry::{LogFormat, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(
    name = "typexpand",
    about = "Generate code from expandable types",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    toolchain: Toolchain,

    /// Log level (RUST_LOG overrides).
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Log format (json or pretty).
    #[arg(long, default_value = "pretty", global = true)]
    log_format: String,
}

/// Options naming what to compile.
#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// A source file, a comma-separated list of files, or a project manifest.
    #[arg(short, long)]
    sources: String,

    /// File to leave out of list and manifest sources.
    #[arg(long)]
    exclude: Option<PathBuf>,

    /// Additional reference (repeatable).
    #[arg(short, long = "reference")]
    references: Vec<PathBuf>,

    /// Additional compiler flag (repeatable).
    #[arg(short, long = "flag", allow_hyphen_values = true)]
    flags: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the generated code without writing or compiling anything.
    Generate {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Run a full build and deliver the output.
    Build {
        #[command(flatten)]
        source: SourceArgs,

        /// Output mode: embed-in-host, external-artifact, or external-source.
        #[arg(short, long, default_value = "embed-in-host")]
        mode: String,

        /// Output path (artifact or source file, depending on mode).
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// List discovered expandable types and expanders.
    Scan {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format (text or json).
        #[arg(long, default_value = "text")]
        format: String,
    },
}

impl SourceArgs {
    fn request(self, mode: OutputMode, output: PathBuf) -> BuildRequest {
        BuildRequest {
            sources: self.sources,
            exclude: self.exclude,
            references: self.references,
            flags: self.flags,
            mode,
            output,
        }
    }
}

fn run_generate(toolchain: &Toolchain, source: SourceArgs) -> Result<(), CliError> {
    let engine = toolchain.engine()?;
    let config = source
        .request(OutputMode::EmbedInHost, PathBuf::from("."))
        .configuration(engine.gateway().kinds())?;

    let generated = engine.generate(&config)?;
    if !generated.is_empty() {
        println!("{}", generated);
    }
    Ok(())
}

fn run_build(
    toolchain: &Toolchain,
    source: SourceArgs,
    mode: &str,
    output: PathBuf,
) -> Result<(), CliError> {
    let mode: OutputMode = mode.parse()?;
    let engine = toolchain.engine()?;
    let config = source
        .request(mode, output)
        .configuration(engine.gateway().kinds())?;

    let result = engine.build(&config)?;
    match mode {
        OutputMode::EmbedInHost => {
            let size = engine.generated_module_bytes().map_or(0, |b| b.len());
            eprintln!(
                "built {} source(s): {} byte(s) generated, module image {} byte(s)",
                config.sources().paths().len(),
                result.generated.len(),
                size
            );
        }
        OutputMode::ExternalArtifact | OutputMode::ExternalSource => {
            eprintln!(
                "built {} source(s) to {}",
                config.sources().paths().len(),
                config.output_path().display()
            );
        }
    }
    Ok(())
}

fn run_scan(toolchain: &Toolchain, source: SourceArgs, format: &str) -> Result<(), CliError> {
    let engine = toolchain.engine()?;
    let config = source
        .request(OutputMode::EmbedInHost, PathBuf::from("."))
        .configuration(engine.gateway().kinds())?;

    let report = ScanReport::from(&engine.scan(&config)?);
    if format == "json" {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

fn init_telemetry(level: &str, format: &str) -> Result<tracing::Span, CliError> {
    let log_format =
        LogFormat::parse(format).ok_or_else(|| CliError::LogFormat(format.to_string()))?;
    let config = TelemetryConfig::new()
        .with_log_level(level)
        .with_log_format(log_format);
    if let Err(e) = typexpand_telemetry::init(&config) {
        eprintln!("warning: {}", e);
    }
    Ok(typexpand_telemetry::root_span(&config))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let root = match init_telemetry(&cli.log_level, &cli.log_format) {
        Ok(span) => span,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };
    let _root = root.entered();

    let result = match cli.command {
        Commands::Generate { source } => run_generate(&cli.toolchain, source),
        Commands::Build {
            source,
            mode,
            output,
        } => run_build(&cli.toolchain, source, &mode, output),
        Commands::Scan { source, format } => run_scan(&cli.toolchain, source, &format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}
