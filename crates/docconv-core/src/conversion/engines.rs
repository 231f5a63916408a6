//! PDF engine tables and availability checks.

use crate::config::ProbeConfig;
use crate::platform::{CommandRunner, CommandSpec};
use futures::future::join_all;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Engines pandoc can use for `format`, in preference order.
pub fn engines_for_format(format: &str) -> &'static [&'static str] {
    match format {
        "latex" => &["pdflatex", "xelatex", "lualatex", "tectonic", "latexmk"],
        "context" => &["context"],
        "html" => &["wkhtmltopdf", "weasyprint", "prince", "pagedjs-cli"],
        "ms" => &["pdfroff"],
        "typst" => &["typst"],
        _ => &["pdflatex", "xelatex", "lualatex", "wkhtmltopdf", "weasyprint", "typst"],
    }
}

/// Engine pandoc itself would pick for `format`.
pub fn default_engine(format: &str) -> &'static str {
    match format {
        "latex" => "pdflatex",
        "context" => "context",
        "html" => "wkhtmltopdf",
        "ms" => "pdfroff",
        "typst" => "typst",
        _ => "pdflatex",
    }
}

/// An engine that answered its version query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfEngine {
    pub name: String,
    /// Value handed to `--pdf-engine`.
    pub program: PathBuf,
    /// True for the application's managed typst.
    pub managed: bool,
}

impl PdfEngine {
    pub fn argument(&self) -> OsString {
        self.program.clone().into_os_string()
    }
}

/// Locates engine executables and checks that they run.
pub(crate) struct EngineLocator<'a> {
    pub runner: &'a dyn CommandRunner,
    /// Replaces PATH for lookups when set.
    pub search_path: Option<&'a OsString>,
}

impl EngineLocator<'_> {
    fn lookup(&self, name: &str) -> Option<PathBuf> {
        match self.search_path {
            Some(paths) => which::which_in(name, Some(paths), std::env::temp_dir()).ok(),
            None => which::which(name).ok(),
        }
    }

    async fn responds(&self, program: &Path) -> bool {
        let spec = CommandSpec::new(program, ProbeConfig::ENGINE_PROBE_TIMEOUT).args(["--version"]);
        matches!(self.runner.run(spec).await, Ok(out) if out.success)
    }

    /// Engines for `format` that are installed and respond, in preference order.
    ///
    /// `typst` resolves to `managed_typst` when one is given.
    pub async fn available(&self, format: &str, managed_typst: Option<&Path>) -> Vec<PdfEngine> {
        let checks = engines_for_format(format).iter().map(|&name| async move {
            if name == "typst" {
                if let Some(path) = managed_typst {
                    return Some(PdfEngine {
                        name: name.to_string(),
                        program: path.to_path_buf(),
                        managed: true,
                    });
                }
            }
            let path = self.lookup(name)?;
            if !self.responds(&path).await {
                debug!("PDF engine {} at {} did not respond", name, path.display());
                return None;
            }
            Some(PdfEngine {
                name: name.to_string(),
                program: path,
                managed: false,
            })
        });
        join_all(checks).await.into_iter().flatten().collect()
    }
}
