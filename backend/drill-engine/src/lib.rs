pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{EngineError, EngineResult, ValidationError, Violation};
pub use services::catalog_service::{Catalog, ContentSource, DirectorySource, StaticSource};
pub use services::session_service::SessionController;
pub use services::AppState;
