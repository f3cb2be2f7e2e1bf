use std::sync::Arc;

use receets_engine::PosEngine;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PosEngine>,
}

impl AppState {
    pub fn new(engine: PosEngine) -> Self {
        AppState {
            engine: Arc::new(engine),
        }
    }
}
