//! Configuration endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AdminUser;
use crate::config::Settings;
use crate::database::ConfigSetting;
use crate::error::{AppError, AppResult};
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub settings: Vec<ConfigSetting>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConfig {
    pub value: String,
}

/// GET /api/config - Get all configuration settings
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<ConfigResponse>> {
    Ok(Json(ConfigResponse {
        settings: state.db.get_all_config()?,
    }))
}

/// PUT /api/config/:key - Update one setting after checking it parses
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(key): Path<String>,
    Json(body): Json<UpdateConfig>,
) -> AppResult<Json<ConfigSetting>> {
    let mut settings = Settings::default();
    settings.apply(&key, &body.value)?;

    let value = body.value.trim();
    if !state.db.set_config(&key, value)? {
        return Err(AppError::not_found("Setting", &key));
    }
    tracing::info!(%key, %value, user_id = admin.0.sub, "Setting updated");

    let setting = state
        .db
        .get_all_config()?
        .into_iter()
        .find(|s| s.key == key)
        .ok_or_else(|| AppError::not_found("Setting", &key))?;
    state.broadcast("config_updated", &setting);
    Ok(Json(setting))
}
