mod extract;
mod health;
mod metrics;
mod ui;

pub use extract::extract_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use ui::{favicon_handler, index_handler};
