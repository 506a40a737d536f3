use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use super::AdminState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub access_logs: usize,
    pub default_disabled: bool,
}

#[derive(Serialize)]
pub struct AccessLogStatus {
    pub output: String,
    pub format: String,
    pub disabled: bool,
}

#[derive(Serialize)]
pub struct VariableListing {
    pub variables: Vec<String>,
    pub indexed: usize,
    pub prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub output: String,
    pub disabled: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        access_logs: state.manager.access_logs().len(),
        default_disabled: state.manager.is_default_disabled(),
    })
}

pub async fn get_access_logs(State(state): State<AdminState>) -> Json<Vec<AccessLogStatus>> {
    let statuses = state
        .manager
        .access_logs()
        .iter()
        .map(|log| AccessLogStatus {
            output: log.output().to_string(),
            format: log.format().to_string(),
            disabled: log.is_disabled(),
        })
        .collect();
    Json(statuses)
}

pub async fn toggle_access_log(
    State(state): State<AdminState>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    if state.manager.toggle_logger(&req.output, req.disabled) {
        tracing::info!(
            output = %req.output,
            disabled = req.disabled,
            "Access log toggled via admin API"
        );
        Ok(Json(serde_json::json!({
            "output": req.output,
            "disabled": req.disabled,
        })))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("no access log for output {}", req.output),
            })),
        ))
    }
}

pub async fn disable_all_access_logs(State(state): State<AdminState>) -> Json<serde_json::Value> {
    state.manager.disable_all();
    Json(serde_json::json!({
        "disabled": state.manager.access_logs().len(),
        "default_disabled": true,
    }))
}

pub async fn get_variables(State(state): State<AdminState>) -> Json<VariableListing> {
    let registry = state.manager.registry();
    Json(VariableListing {
        variables: registry.variable_names(),
        indexed: registry.indexed_count(),
        prefixes: registry.prefixes(),
    })
}
