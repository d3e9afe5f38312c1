use crate::config::Config;
use crate::ledger::Ledger;
use crate::pdf::FontLibrary;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fonts: Arc<FontLibrary>,
    /// `None` when certificates are issued without being recorded.
    pub ledger: Option<Arc<Ledger>>,
}
