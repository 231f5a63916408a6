//! Shared handler utilities used across RPC domains.

use docconv_core::{DocconvError, Result, ToolKind};
use serde_json::Value;
use std::path::PathBuf;

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(params: &Value, snake: &str, camel: &str) -> Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| DocconvError::Validation {
            field: snake.to_string(),
            message: "missing required parameter".to_string(),
        })
}

/// Extract an optional bool parameter, supporting both snake_case and camelCase.
pub(crate) fn get_bool_param(params: &Value, snake: &str, camel: &str) -> Option<bool> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_bool())
}

/// Extract an optional u32 parameter, supporting both snake_case and camelCase.
pub(crate) fn get_u32_param(params: &Value, snake: &str, camel: &str) -> Option<u32> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
}

/// A required, non-empty path parameter.
pub(crate) fn require_path_param(params: &Value, snake: &str, camel: &str) -> Result<PathBuf> {
    let raw = require_str_param(params, snake, camel)?;
    if raw.trim().is_empty() {
        return Err(DocconvError::Validation {
            field: snake.to_string(),
            message: "path must not be empty".to_string(),
        });
    }
    Ok(PathBuf::from(raw))
}

/// The `tool` parameter. Pandoc when omitted.
pub(crate) fn tool_param(params: &Value) -> Result<ToolKind> {
    match get_str_param(params, "tool", "tool") {
        None => Ok(ToolKind::Pandoc),
        Some(raw) => ToolKind::from_str(raw).ok_or_else(|| DocconvError::Validation {
            field: "tool".to_string(),
            message: format!("unknown tool '{}'", raw),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_str_param_accepts_camel_case() {
        let params = json!({"customPath": "/opt/pandoc"});
        assert_eq!(
            get_str_param(&params, "custom_path", "customPath"),
            Some("/opt/pandoc")
        );
        assert!(require_str_param(&params, "path", "path").is_err());
    }

    #[test]
    fn test_tool_param() {
        assert_eq!(tool_param(&json!({})).unwrap(), ToolKind::Pandoc);
        assert_eq!(tool_param(&json!({"tool": "typst"})).unwrap(), ToolKind::Typst);
        assert!(matches!(
            tool_param(&json!({"tool": "latex"})),
            Err(DocconvError::Validation { .. })
        ));
    }

    #[test]
    fn test_path_param_rejects_blank() {
        assert!(require_path_param(&json!({"path": "  "}), "path", "path").is_err());
        assert_eq!(
            require_path_param(&json!({"path": "/usr/bin/pandoc"}), "path", "path").unwrap(),
            PathBuf::from("/usr/bin/pandoc")
        );
    }

    #[test]
    fn test_u32_param_rejects_out_of_range() {
        assert_eq!(get_u32_param(&json!({"page": 2}), "page", "page"), Some(2));
        assert_eq!(get_u32_param(&json!({"page": -1}), "page", "page"), None);
        assert_eq!(
            get_u32_param(&json!({"perPage": 5_000_000_000u64}), "per_page", "perPage"),
            None
        );
    }
}
