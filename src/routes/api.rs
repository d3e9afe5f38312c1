use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::AppError;
use crate::ledger::Ledger;
use crate::routes::RecordView;
use crate::state::AppState;

fn ledger(state: &AppState) -> Result<Arc<Ledger>, AppError> {
    state
        .ledger
        .clone()
        .ok_or_else(|| AppError::NotFound("The certificate ledger is disabled".to_string()))
}

/// GET /api/certificates
pub async fn list_records(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RecordView>>, AppError> {
    let ledger = ledger(&state)?;
    let records = tokio::task::spawn_blocking(move || ledger.load_all())
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    Ok(Json(records.iter().map(RecordView::from).collect()))
}

/// GET /api/certificates/:certificate_id
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(certificate_id): Path<String>,
) -> Result<Json<RecordView>, AppError> {
    let ledger = ledger(&state)?;
    let lookup = certificate_id.clone();
    let record = tokio::task::spawn_blocking(move || ledger.find(&lookup))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    record
        .as_ref()
        .map(|r| Json(RecordView::from(r)))
        .ok_or_else(|| AppError::NotFound(format!("Certificate {certificate_id} not found")))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let fonts: Vec<&str> = state.fonts.available().iter().map(|f| f.name()).collect();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "ledger_enabled": state.ledger.is_some(),
        "fonts": fonts,
    }))
}
