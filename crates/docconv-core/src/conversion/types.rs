//! Conversion requests and the pandoc argument list built from them.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;

/// A single pandoc invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Source format; `None`, empty or `auto` lets pandoc detect it.
    #[serde(default)]
    pub input_format: Option<String>,
    pub output_format: String,
    /// Preferred PDF engine by name; only used for `pdf` output.
    #[serde(default)]
    pub pdf_engine: Option<String>,
}

impl ConversionRequest {
    pub fn is_pdf(&self) -> bool {
        self.output_format == "pdf"
    }

    fn explicit_input_format(&self) -> Option<&str> {
        self.input_format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty() && *f != "auto")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub output: PathBuf,
    /// Engine name used for PDF output.
    pub pdf_engine: Option<String>,
}

/// Pandoc arguments for `request`, with `pdf_engine` as the `--pdf-engine` value.
pub fn build_arguments(request: &ConversionRequest, pdf_engine: Option<&OsString>) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if let Some(format) = request.explicit_input_format() {
        args.push("-f".into());
        args.push(format.into());
    }
    args.push("-t".into());
    args.push(request.output_format.clone().into());
    if request.is_pdf() {
        if let Some(engine) = pdf_engine {
            args.push("--pdf-engine".into());
            args.push(engine.clone());
        }
    }
    args.push(request.input.clone().into_os_string());
    args.push("-o".into());
    args.push(request.output.clone().into_os_string());
    args
}
