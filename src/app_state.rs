use std::sync::Arc;

use crate::services::{queue::JobQueue, submission::Submitter};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub submitter: Arc<Submitter>,
    pub queue: Arc<dyn JobQueue>,
}

impl AppState {
    pub fn new(submitter: Submitter, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            submitter: Arc::new(submitter),
            queue,
        }
    }
}
