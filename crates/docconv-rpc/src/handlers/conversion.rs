//! Document conversion handlers.

use super::{get_str_param, require_path_param, require_str_param};
use crate::server::AppState;
use docconv_core::{ConversionRequest, Result};
use serde_json::Value;

pub async fn convert(state: &AppState, params: &Value) -> Result<Value> {
    let request = ConversionRequest {
        input: require_path_param(params, "input", "input")?,
        output: require_path_param(params, "output", "output")?,
        input_format: get_str_param(params, "input_format", "inputFormat").map(String::from),
        output_format: require_str_param(params, "output_format", "outputFormat")?,
        pdf_engine: get_str_param(params, "pdf_engine", "pdfEngine")
            .filter(|e| !e.trim().is_empty())
            .map(String::from),
    };
    let outcome = state.api.convert(&request).await?;
    Ok(serde_json::to_value(outcome)?)
}

pub async fn get_available_pdf_engines(state: &AppState, params: &Value) -> Result<Value> {
    let format = get_str_param(params, "format", "format").unwrap_or("pdf");
    let engines = state.api.available_pdf_engines(format).await;
    Ok(serde_json::to_value(engines)?)
}
