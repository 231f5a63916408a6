//! Release lookup, download and install handlers.

use super::{get_bool_param, get_str_param, get_u32_param, tool_param};
use crate::server::AppState;
use docconv_core::config::NetworkConfig;
use docconv_core::Result;
use serde_json::{json, Value};

pub async fn check_update(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let check = state.api.check_update(tool).await?;
    Ok(serde_json::to_value(check)?)
}

pub async fn get_latest_release(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let force_refresh = get_bool_param(params, "force_refresh", "forceRefresh").unwrap_or(false);
    let release = state.api.latest_release(tool, force_refresh).await?;
    Ok(serde_json::to_value(release)?)
}

pub async fn list_releases(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let page = get_u32_param(params, "page", "page").unwrap_or(1);
    let per_page = get_u32_param(params, "per_page", "perPage")
        .unwrap_or(NetworkConfig::RELEASES_PER_PAGE);
    let force_refresh = get_bool_param(params, "force_refresh", "forceRefresh").unwrap_or(false);
    let releases = state
        .api
        .list_releases(tool, page, per_page, force_refresh)
        .await?;
    Ok(serde_json::to_value(releases)?)
}

/// Download and install `version` (default: the latest release).
///
/// Runs in the background unless `wait` is set; progress and the final
/// outcome are then polled through `get_download_progress` and
/// `get_download_status`.
pub async fn download_and_install(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let version = get_str_param(params, "version", "version");
    let wait = get_bool_param(params, "wait", "wait").unwrap_or(false);

    if wait {
        let info = state.api.download_and_install(tool, version, None).await?;
        return Ok(json!({
            "success": true,
            "started": true,
            "info": info
        }));
    }

    // Detached; the outcome is recorded in the download status.
    drop(state.api.start_download(tool, version.map(String::from)).await);

    Ok(json!({
        "success": true,
        "started": true
    }))
}

pub async fn cancel_download(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    state.api.cancel_download(tool);
    Ok(json!(true))
}

pub async fn get_download_progress(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let progress = state.api.download_progress(tool).await;
    Ok(serde_json::to_value(progress)?)
}

pub async fn get_download_status(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let status = state.api.download_status(tool).await;
    Ok(serde_json::to_value(status)?)
}

pub async fn get_install_record(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let record = state.api.install_record(tool)?;
    Ok(serde_json::to_value(record)?)
}

pub async fn uninstall_managed(state: &AppState, params: &Value) -> Result<Value> {
    let tool = tool_param(params)?;
    let manager = state.api.uninstall_managed(tool).await?;
    Ok(serde_json::to_value(manager)?)
}
