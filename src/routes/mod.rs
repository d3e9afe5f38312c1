mod api;
mod pages;

pub use api::*;
pub use pages::*;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::layout::display_date;
use crate::ledger::{CertificateRecord, DATE_FORMAT};
use crate::state::AppState;

/// A ledger row as shown to browsers and API clients.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub id: String,
    pub recipient: String,
    pub course: String,
    /// `DD-MM-YYYY`, as stored.
    pub date: String,
    pub display_date: String,
}

impl From<&CertificateRecord> for RecordView {
    fn from(r: &CertificateRecord) -> Self {
        Self {
            id: r.id.clone(),
            recipient: r.recipient.clone(),
            course: r.course.clone(),
            date: r.issued_on.format(DATE_FORMAT).to_string(),
            display_date: display_date(r.issued_on),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(
            "/certificates",
            get(list_certificates).post(generate_certificate),
        )
        .route("/api/certificates", get(list_records))
        .route("/api/certificates/:certificate_id", get(get_record))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
