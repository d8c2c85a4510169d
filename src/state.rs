use std::sync::Arc;

use crate::pipeline::RequestHandler;

// app's shared state
pub struct AppState {
    pub handler: RequestHandler,
}

pub type SharedState = Arc<AppState>;
