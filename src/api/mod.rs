pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ml::DiagnosisService;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DiagnosisService>,

    /// Home page, rendered once at startup
    pub home_page: Arc<str>,

    /// Whether `/metrics` exports the registry
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(service: Arc<DiagnosisService>) -> Self {
        Self {
            service,
            home_page: Arc::from(crate::ui::render_home()),
            metrics_enabled: true,
        }
    }

    /// Enable or disable the Prometheus endpoint
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}
