//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::{PortalConfig, WorkflowConfig};
use crate::db;
use crate::services::{Services, Stores};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Absent when the stores are not database-backed.
    pool: Option<PgPool>,
    services: Services,
}

impl AppState {
    /// State backed by `PostgreSQL`.
    #[must_use]
    pub fn new(config: &PortalConfig, pool: PgPool) -> Self {
        let stores = db::postgres_stores(&pool);
        Self::with_stores(config.workflow, &stores, Some(pool))
    }

    /// State over arbitrary stores.
    #[must_use]
    pub fn with_stores(workflow: WorkflowConfig, stores: &Stores, pool: Option<PgPool>) -> Self {
        let services = Services::new(stores, &workflow);
        Self {
            inner: Arc::new(AppStateInner {
                pool,
                services,
            }),
        }
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        &self.inner.services
    }
}
