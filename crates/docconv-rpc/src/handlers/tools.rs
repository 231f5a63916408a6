//! Tool discovery and source selection handlers.

use super::{get_str_param, require_path_param, tool_param};
use crate::server::AppState;
use docconv_core::{DocconvError, Result, ToolKind};
use serde_json::{json, Value};
use std::path::PathBuf;

pub async fn initialize(state: &AppState, _params: &Value) -> Result<Value> {
    let selected = state.api.initialize().await;
    Ok(serde_json::to_value(selected)?)
}

pub async fn refresh_tool(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let manager = state.api.refresh_tool(tool).await;
    Ok(serde_json::to_value(manager)?)
}

pub async fn discover_sources(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let sources = state.api.discover_sources(tool).await;
    Ok(serde_json::to_value(sources)?)
}

pub async fn get_best_manager(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let manager = state.api.get_best_manager(tool).await;
    Ok(serde_json::to_value(manager)?)
}

pub async fn get_current_manager(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let manager = state.api.current_manager(tool).await;
    Ok(serde_json::to_value(manager)?)
}

pub async fn get_tool_info(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let custom_path = get_str_param(params, "custom_path", "customPath")
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let info = state.api.get_tool_info(tool, custom_path.as_deref()).await?;
    Ok(serde_json::to_value(info)?)
}

pub async fn validate_path(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let path = require_path_param(params, "path", "path")?;
    Ok(json!(state.api.validate_path(tool, &path).await))
}

pub async fn create_and_validate_custom(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let path = require_path_param(params, "path", "path")?;
    let manager = state.api.create_and_validate_custom(tool, &path).await?;
    Ok(serde_json::to_value(manager)?)
}

pub async fn use_custom_path(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let path = require_path_param(params, "path", "path")?;
    let manager = state.api.use_custom_path(tool, &path).await?;
    Ok(serde_json::to_value(manager)?)
}

pub async fn clear_custom_path(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let manager = state.api.clear_custom_path(tool).await?;
    Ok(serde_json::to_value(manager)?)
}

/// Make the discovered source at `path` active.
pub async fn switch_source(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let path = require_path_param(params, "path", "path")?;

    let sources = match state.api.discovered_sources(tool).await {
        Some(sources) => sources,
        None => state.api.discover_sources(tool).await,
    };
    let manager = sources
        .into_iter()
        .find(|m| m.path() == path.as_path())
        .ok_or_else(|| not_discovered(tool, &path))?;

    state.api.switch_source(tool, manager.clone()).await?;
    Ok(json!({
        "success": true,
        "manager": manager
    }))
}

fn not_discovered(tool: ToolKind, path: &std::path::Path) -> DocconvError {
    DocconvError::Validation {
        field: "path".to_string(),
        message: format!("{} was not found among the discovered {} sources", path.display(), tool),
    }
}
