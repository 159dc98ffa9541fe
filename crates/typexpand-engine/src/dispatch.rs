//! Output dispatch: turn generated text into the result the output mode asks for.

use std::path::Path;

use typexpand_telemetry::events;

use crate::cache::BuildResult;
use crate::config::{BuildConfiguration, OutputMode};
use crate::error::ExpandError;
use crate::gateway::{CompileTarget, CompilerGateway, CompilerService};
use crate::module::Module;

/// Persist or compile `generated` according to the configuration's output mode.
///
/// `scratch` is the pre-expansion module; every branch hands it back as the
/// placeholder half of the result.
pub fn dispatch<C: CompilerService>(
    gateway: &CompilerGateway<C>,
    config: &BuildConfiguration,
    generated: String,
    scratch: Module,
) -> Result<BuildResult, ExpandError> {
    let sources = config.sources().paths();

    let final_module = match config.output_mode() {
        OutputMode::EmbedInHost => Some(gateway.compile_with_generated(
            sources,
            &generated,
            config.references(),
            config.flags(),
            CompileTarget::DynamicModule,
        )?),
        OutputMode::ExternalArtifact => {
            let scratch_dir = tempfile::Builder::new().prefix("typexpand-").tempdir()?;
            let stem = config
                .output_path()
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("generated");
            let artifact = scratch_dir
                .path()
                .join(format!("{}.{}", stem, gateway.kinds().artifact_extension));

            gateway.compile_with_generated(
                sources,
                &generated,
                config.references(),
                config.flags(),
                CompileTarget::ArtifactAt(artifact.clone()),
            )?;

            ensure_parent(config.output_path())?;
            std::fs::copy(&artifact, config.output_path())?;
            tracing::info!(
                event = events::OUTPUT_WRITTEN,
                path = %config.output_path().display(),
                "copied artifact"
            );
            None
        }
        OutputMode::ExternalSource => {
            ensure_parent(config.output_path())?;
            std::fs::write(config.output_path(), generated.as_bytes())?;
            tracing::info!(
                event = events::OUTPUT_WRITTEN,
                path = %config.output_path().display(),
                bytes = generated.len(),
                "wrote generated source"
            );
            None
        }
    };

    Ok(BuildResult {
        final_module,
        scratch_module: scratch,
        generated,
    })
}

fn ensure_parent(path: &Path) -> Result<(), ExpandError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
