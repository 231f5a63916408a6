//! Runs the active pandoc for one conversion request.

use crate::config::ProbeConfig;
use crate::conversion::engines::{default_engine, engines_for_format, EngineLocator, PdfEngine};
use crate::conversion::types::{build_arguments, ConversionOutcome, ConversionRequest};
use crate::error::{DocconvError, Result};
use crate::models::ToolInfo;
use crate::platform::{CommandError, CommandRunner, CommandSpec};
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runs pandoc conversions.
pub struct Converter {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    engine_search_path: Option<OsString>,
}

impl Converter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: ProbeConfig::CONVERSION_TIMEOUT,
            engine_search_path: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Look up PDF engines in `path` (PATH syntax) instead of the process PATH.
    pub fn with_engine_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.engine_search_path = Some(path.into());
        self
    }

    fn locator(&self) -> EngineLocator<'_> {
        EngineLocator {
            runner: self.runner.as_ref(),
            search_path: self.engine_search_path.as_ref(),
        }
    }

    /// PDF engines usable for `format`, in preference order.
    pub async fn available_engines(&self, format: &str, managed_typst: Option<&Path>) -> Vec<PdfEngine> {
        self.locator().available(format, managed_typst).await
    }

    /// Pick the engine for a PDF conversion.
    ///
    /// A requested engine must be available. Without a request the format's
    /// default engine wins if present, then the first available one.
    pub fn resolve_engine(
        requested: Option<&str>,
        format: &str,
        available: &[PdfEngine],
    ) -> Result<PdfEngine> {
        if let Some(name) = requested.map(str::trim).filter(|n| !n.is_empty()) {
            return available
                .iter()
                .find(|e| e.name == name)
                .cloned()
                .ok_or_else(|| DocconvError::PdfEngineUnavailable {
                    engine: name.to_string(),
                });
        }

        let preferred = default_engine(format);
        available
            .iter()
            .find(|e| e.name == preferred)
            .or_else(|| available.first())
            .cloned()
            .ok_or_else(|| DocconvError::PdfEngineUnavailable {
                engine: engines_for_format(format).join(", "),
            })
    }

    /// Convert `request.input` with the pandoc described by `pandoc`.
    ///
    /// Pandoc runs in the input file's directory so relative resources
    /// (images, bibliographies) resolve the way the user expects.
    pub async fn convert(
        &self,
        pandoc: &ToolInfo,
        request: &ConversionRequest,
        managed_typst: Option<&Path>,
    ) -> Result<ConversionOutcome> {
        if request.output_format.trim().is_empty() {
            return Err(DocconvError::Validation {
                field: "output_format".into(),
                message: "must not be empty".into(),
            });
        }
        if !request.input.is_file() {
            return Err(DocconvError::Validation {
                field: "input".into(),
                message: format!("{} is not a file", request.input.display()),
            });
        }
        if !pandoc.supports_output(&request.output_format) {
            return Err(DocconvError::UnsupportedFormat {
                format: request.output_format.clone(),
            });
        }

        let engine = if request.is_pdf() {
            let available = self
                .available_engines(&request.output_format, managed_typst)
                .await;
            Some(Self::resolve_engine(
                request.pdf_engine.as_deref(),
                &request.output_format,
                &available,
            )?)
        } else {
            None
        };

        let engine_arg = engine.as_ref().map(PdfEngine::argument);
        let working_dir = request
            .input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let spec = CommandSpec::new(&pandoc.path, self.timeout)
            .args(build_arguments(request, engine_arg.as_ref()))
            .current_dir(working_dir);

        info!(
            "Converting {} to {} ({})",
            request.input.display(),
            request.output.display(),
            request.output_format
        );
        let output = self.runner.run(spec).await.map_err(|e| match e {
            CommandError::TimedOut(after) => DocconvError::ConversionFailed {
                message: format!("pandoc did not finish within {}s", after.as_secs()),
            },
            CommandError::Spawn(err) => DocconvError::ConversionFailed {
                message: format!("failed to run pandoc at {}: {}", pandoc.path.display(), err),
            },
        })?;

        if !output.success {
            let stderr = output.stderr.trim();
            warn!("pandoc exited with {:?}: {}", output.code, stderr);
            let message = if request.is_pdf() && stderr.contains("not found") {
                format!(
                    "a required PDF engine was not found. Install one of: {}. \
                     Alternatively convert to HTML and print it to PDF. ({})",
                    engines_for_format(&request.output_format).join(", "),
                    stderr
                )
            } else if stderr.is_empty() {
                format!("pandoc exited with status {:?}", output.code)
            } else {
                stderr.to_string()
            };
            return Err(DocconvError::ConversionFailed { message });
        }

        Ok(ConversionOutcome {
            output: request.output.clone(),
            pdf_engine: engine.map(|e| e.name),
        })
    }
}
