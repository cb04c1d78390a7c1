use std::sync::Arc;

use crate::config::Config;
use crate::utils::time::SystemClock;

use catalog_service::{Catalog, DirectorySource};
use notification_service::BroadcastPublisher;
use session_service::SessionController;

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub notifications: Arc<BroadcastPublisher>,
    pub sessions: Arc<SessionController>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        tracing::info!(
            "Loading exercise definitions from {}",
            config.scenarios_dir.display()
        );

        let source = Arc::new(DirectorySource::new(config.scenarios_dir.clone()));
        let (catalog, _) = Catalog::from_source(source).await?;
        let catalog = Arc::new(catalog);

        let notifications = Arc::new(BroadcastPublisher::new(config.notification_capacity));
        let sessions = Arc::new(SessionController::in_memory(
            catalog.clone(),
            notifications.clone(),
            Arc::new(SystemClock),
        ));

        Ok(Self {
            config,
            catalog,
            notifications,
            sessions,
        })
    }
}

pub mod attempt_store;
pub mod catalog_service;
pub mod feedback_service;
pub mod notification_service;
pub mod recorder_service;
pub mod report_service;
pub mod scoring_service;
pub mod session_service;
