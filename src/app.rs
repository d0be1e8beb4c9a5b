//! Shared application state handed to the HTTP layer.

use std::sync::Arc;

use tracing::info;

use crate::directory::UserDirectory;
use crate::models::state::StateCatalog;
use crate::notify::{DeliveryPool, NotificationDispatcher, NotificationInbox};
use crate::persistence::db::Database;
use crate::persistence::notification_repo::NotificationRepo;
use crate::persistence::request_repo::RequestRepo;
use crate::persistence::state_repo::StateRepo;
use crate::persistence::ticket_repo::TicketRepo;
use crate::persistence::user_repo::UserRepo;
use crate::workflow::{ApprovalWorkflow, TimelineService, TransitionEngine};
use crate::Result;

/// Services wired over one database pool and delivery pool.
#[derive(Clone)]
pub struct AppState {
    /// Seeded state catalog.
    pub catalog: Arc<StateCatalog>,
    /// User lookups.
    pub directory: Arc<dyn UserDirectory>,
    /// Technician transitions.
    pub engine: TransitionEngine,
    /// Admin decisions.
    pub approvals: ApprovalWorkflow,
    /// State history.
    pub timeline: TimelineService,
    /// Per-user notification inbox.
    pub inbox: NotificationInbox,
    /// Lifecycle notification fan-out.
    pub dispatcher: NotificationDispatcher,
    /// Background email delivery.
    pub delivery: DeliveryPool,
}

impl AppState {
    /// Load the state catalog and wire every service.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the catalog cannot be loaded and
    /// `AppError::StateNotFound` if it is empty.
    pub async fn build(db: Arc<Database>, delivery: DeliveryPool) -> Result<Self> {
        let catalog = Arc::new(StateRepo::new(Arc::clone(&db)).load_catalog().await?);
        info!(states = catalog.all().len(), "state catalog loaded");

        let directory: Arc<dyn UserDirectory> = Arc::new(UserRepo::new(Arc::clone(&db)));
        let notifications = NotificationRepo::new(Arc::clone(&db));
        let dispatcher = NotificationDispatcher::new(
            notifications.clone(),
            Arc::clone(&directory),
            delivery.clone(),
        );

        Ok(Self {
            engine: TransitionEngine::new(
                Arc::clone(&db),
                Arc::clone(&catalog),
                Arc::clone(&directory),
                dispatcher.clone(),
            ),
            approvals: ApprovalWorkflow::new(
                Arc::clone(&db),
                Arc::clone(&catalog),
                Arc::clone(&directory),
                dispatcher.clone(),
            ),
            timeline: TimelineService::new(
                Arc::clone(&catalog),
                TicketRepo::new(Arc::clone(&db)),
                RequestRepo::new(db),
                Arc::clone(&directory),
            ),
            inbox: NotificationInbox::new(notifications),
            dispatcher,
            delivery,
            directory,
            catalog,
        })
    }
}
