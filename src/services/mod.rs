pub mod collector;
#[cfg(feature = "api")]
pub mod api_service;

pub use collector::{Collector, CollectorState, CollectorStatus};
#[cfg(feature = "api")]
pub use api_service::{ApiService, ApiServiceState};
