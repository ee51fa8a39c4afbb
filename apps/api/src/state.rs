use pixelwall_application::{AccessEventRecorder, ClassificationService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub classification_service: ClassificationService,
    pub event_recorder: AccessEventRecorder,
    pub public_base_url: String,
}
