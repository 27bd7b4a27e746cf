// Public modules that constitute the API
pub mod ai;
pub mod config;
pub mod error;
pub mod models;
pub mod predictions;
pub mod prompts;
pub mod ratelimit;
pub mod server;
pub mod validation;

// Re-export frequently used types
pub use error::Result;
pub use error::ServiceError;
pub use models::{PredictionResult, PredictionScenario, ScenarioKind};
