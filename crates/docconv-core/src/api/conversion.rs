//! Document conversion methods on ToolchainApi.

use std::path::PathBuf;

use crate::config::ToolKind;
use crate::conversion::{ConversionOutcome, ConversionRequest, PdfEngine};
use crate::error::Result;
use crate::models::ToolSource;
use crate::ToolchainApi;

impl ToolchainApi {
    /// Convert a document with the active pandoc.
    ///
    /// # Errors
    ///
    /// - [`DocconvError::ToolNotFound`](crate::DocconvError::ToolNotFound) when no pandoc works
    /// - [`DocconvError::UnsupportedFormat`](crate::DocconvError::UnsupportedFormat)
    /// - [`DocconvError::PdfEngineUnavailable`](crate::DocconvError::PdfEngineUnavailable)
    /// - [`DocconvError::ConversionFailed`](crate::DocconvError::ConversionFailed)
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionOutcome> {
        let pandoc = self.get_tool_info(ToolKind::Pandoc, None).await?;
        let typst = self.managed_typst().await;
        self.converter
            .convert(&pandoc, request, typst.as_deref())
            .await
    }

    /// PDF engines usable for `format` on this machine.
    pub async fn available_pdf_engines(&self, format: &str) -> Vec<PdfEngine> {
        let typst = self.managed_typst().await;
        self.converter
            .available_engines(format, typst.as_deref())
            .await
    }

    async fn managed_typst(&self) -> Option<PathBuf> {
        let current = self.current_manager(ToolKind::Typst).await?;
        (current.source() == &ToolSource::Managed && current.is_available())
            .then(|| current.path().to_path_buf())
    }
}
