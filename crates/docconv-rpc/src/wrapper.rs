//! Response wrapping for the desktop shell.
//!
//! The shell expects `{success: bool, <key>: data}` objects. Handlers return
//! raw core values and this module puts each one under its key.

use serde_json::{json, Value};

fn keyed(key: &str, result: Value, empty: Value) -> Value {
    json!({
        "success": true,
        key: if result.is_null() { empty } else { result }
    })
}

/// Wrap a handler result into the shape the shell expects for `method`.
pub fn wrap_response(method: &str, result: Value) -> Value {
    match method {
        // List wrappers
        "discover_sources" => keyed("sources", result, json!([])),
        "list_releases" => keyed("releases", result, json!([])),
        "get_available_pdf_engines" => keyed("engines", result, json!([])),

        // Dict wrappers
        "initialize" => keyed("tools", result, json!({})),
        "get_tool_info" => keyed("info", result, json!({})),
        "check_update" => keyed("update", result, json!({})),
        "get_latest_release" => keyed("release", result, json!({})),
        "convert" => keyed("outcome", result, json!({})),
        "get_settings" | "set_theme" | "set_use_mirrors" => keyed("settings", result, json!({})),

        // Optional dict methods (null when there is nothing to report)
        "refresh_tool"
        | "get_best_manager"
        | "get_current_manager"
        | "create_and_validate_custom"
        | "use_custom_path"
        | "clear_custom_path"
        | "uninstall_managed" => json!({"success": true, "manager": result}),
        "get_download_progress" => json!({"success": true, "progress": result}),
        "get_download_status" => json!({"success": true, "status": result}),
        "get_install_record" => json!({"success": true, "record": result}),

        // Bool methods
        "validate_path" => json!({
            "success": true,
            "valid": result.as_bool().unwrap_or(false)
        }),
        "cancel_download" => json!({
            "success": result.as_bool().unwrap_or(false)
        }),

        // Structured response methods (handler returns {success, ...} directly)
        "download_and_install" | "switch_source" => result,

        _ => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_wrapping_defaults_to_empty() {
        let wrapped = wrap_response("discover_sources", Value::Null);
        assert_eq!(wrapped["success"], true);
        assert_eq!(wrapped["sources"], json!([]));
    }

    #[test]
    fn test_optional_manager_stays_null() {
        let wrapped = wrap_response("get_current_manager", Value::Null);
        assert_eq!(wrapped["success"], true);
        assert!(wrapped["manager"].is_null());
    }

    #[test]
    fn test_download_status_wrapping() {
        let failed = json!({"state": "failed", "kind": "network", "message": "offline"});
        let wrapped = wrap_response("get_download_status", failed.clone());
        assert_eq!(wrapped, json!({"success": true, "status": failed}));
    }

    #[test]
    fn test_validate_path_wrapping() {
        assert_eq!(
            wrap_response("validate_path", json!(false)),
            json!({"success": true, "valid": false})
        );
    }

    #[test]
    fn test_structured_methods_pass_through() {
        let raw = json!({"success": true, "started": true});
        assert_eq!(wrap_response("download_and_install", raw.clone()), raw);
    }
}
