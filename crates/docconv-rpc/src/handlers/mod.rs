//! JSON-RPC request handlers, split by domain.

mod conversion;
mod settings;
mod shared;
mod tools;
mod updates;

pub(crate) use shared::{
    get_bool_param, get_str_param, get_u32_param, require_path_param, require_str_param,
    tool_param,
};

use crate::server::AppState;
use crate::wrapper::wrap_response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use docconv_core::DocconvError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC code for an unknown method.
const METHOD_NOT_FOUND: i32 = -32601;

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data,
            }),
            id,
        }
    }
}

/// Error payload carrying the classification and retry hint for the shell.
fn error_data(err: &DocconvError) -> Value {
    json!({
        "kind": err.kind(),
        "transient": err.is_transient()
    })
}

// ============================================================================
// HTTP endpoints
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    let result = match dispatch_method(&state, method, &params).await {
        Some(result) => result,
        None => {
            warn!("Method not found: {}", method);
            return (
                StatusCode::OK,
                Json(JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                    None,
                )),
            );
        }
    };

    match result {
        Ok(value) => {
            let wrapped = wrap_response(method, value);
            (StatusCode::OK, Json(JsonRpcResponse::success(id, wrapped)))
        }
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(
                    id,
                    e.to_rpc_error_code(),
                    e.to_string(),
                    Some(error_data(&e)),
                )),
            )
        }
    }
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to the appropriate domain handler.
///
/// Returns `None` for an unknown method.
async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &Value,
) -> Option<docconv_core::Result<Value>> {
    let result = match method {
        // Discovery & source selection
        "initialize" => tools::initialize(state, params).await,
        "refresh_tool" => tools::refresh_tool(state, params).await,
        "discover_sources" => tools::discover_sources(state, params).await,
        "get_best_manager" => tools::get_best_manager(state, params).await,
        "get_current_manager" => tools::get_current_manager(state, params).await,
        "get_tool_info" => tools::get_tool_info(state, params).await,
        "validate_path" => tools::validate_path(state, params).await,
        "create_and_validate_custom" => tools::create_and_validate_custom(state, params).await,
        "use_custom_path" => tools::use_custom_path(state, params).await,
        "clear_custom_path" => tools::clear_custom_path(state, params).await,
        "switch_source" => tools::switch_source(state, params).await,

        // Releases & updates
        "check_update" => updates::check_update(state, params).await,
        "get_latest_release" => updates::get_latest_release(state, params).await,
        "list_releases" => updates::list_releases(state, params).await,
        "download_and_install" => updates::download_and_install(state, params).await,
        "cancel_download" => updates::cancel_download(state, params).await,
        "get_download_progress" => updates::get_download_progress(state, params).await,
        "get_download_status" => updates::get_download_status(state, params).await,
        "get_install_record" => updates::get_install_record(state, params).await,
        "uninstall_managed" => updates::uninstall_managed(state, params).await,

        // Conversion
        "convert" => conversion::convert(state, params).await,
        "get_available_pdf_engines" => conversion::get_available_pdf_engines(state, params).await,

        // Settings
        "get_settings" => settings::get_settings(state, params).await,
        "set_theme" => settings::set_theme(state, params).await,
        "set_use_mirrors" => settings::set_use_mirrors(state, params).await,

        _ => return None,
    };
    Some(result)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rpc_response_success() {
        let response = JsonRpcResponse::success(Some(json!(1)), json!({"data": "test"}));
        assert!(response.error.is_none());
        assert!(response.result.is_some());
    }

    #[test]
    fn test_json_rpc_response_error() {
        let response = JsonRpcResponse::error(Some(json!(1)), -32600, "Test error".into(), None);
        assert!(response.error.is_some());
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[test]
    fn test_error_data_carries_kind() {
        let err = DocconvError::RegistryUnreachable {
            message: "timeout".into(),
        };
        let data = error_data(&err);
        assert_eq!(data["kind"], "network");
        assert_eq!(data["transient"], true);
    }

    #[test]
    fn test_request_without_params() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "get_settings", "id": 7}))
                .unwrap();
        assert!(request.params.is_none());
        assert_eq!(request.id, Some(json!(7)));
    }
}
