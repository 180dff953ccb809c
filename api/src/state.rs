use std::sync::Arc;

use common::queue::JobPublisher;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn JobPublisher>,
    /// Proposer override attached to every enqueued message
    pub proposer: Option<String>,
    /// Approver override attached to every enqueued message
    pub approver: Option<String>,
}

impl AppState {
    pub fn new(
        publisher: Arc<dyn JobPublisher>,
        proposer: Option<String>,
        approver: Option<String>,
    ) -> Self {
        Self {
            publisher,
            proposer,
            approver,
        }
    }
}
