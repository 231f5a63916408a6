//! Settings handlers.

use super::{get_bool_param, require_str_param};
use crate::server::AppState;
use docconv_core::{DocconvError, Result, Theme};
use serde_json::Value;

pub async fn get_settings(state: &AppState, _params: &Value) -> Result<Value> {
    Ok(serde_json::to_value(state.api.get_settings().await)?)
}

pub async fn set_theme(state: &AppState, params: &Value) -> Result<Value> {
    let raw = require_str_param(params, "theme", "theme")?;
    let theme: Theme =
        serde_json::from_value(Value::String(raw.clone())).map_err(|_| DocconvError::Validation {
            field: "theme".to_string(),
            message: format!("unknown theme '{}'", raw),
        })?;
    Ok(serde_json::to_value(state.api.set_theme(theme).await?)?)
}

pub async fn set_use_mirrors(state: &AppState, params: &Value) -> Result<Value> {
    let use_mirrors =
        get_bool_param(params, "use_mirrors", "useMirrors").ok_or_else(|| DocconvError::Validation {
            field: "use_mirrors".to_string(),
            message: "missing required parameter".to_string(),
        })?;
    Ok(serde_json::to_value(state.api.set_use_mirrors(use_mirrors).await?)?)
}
