use std::sync::Arc;

use crate::config::AppConfig;
use crate::notifications::NotificationDispatcher;
use crate::reports::ReportAggregator;
use crate::security::auth::TenantContext;
use crate::security::jwt::{JwtConfig, JwtManager};
use crate::tickets::lifecycle::TicketLifecycle;
use crate::tickets::store::TicketStore;

/// Shared by every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub tenant: TenantContext,
    pub lifecycle: TicketLifecycle,
    pub reports: ReportAggregator,
    pub store: Arc<dyn TicketStore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn TicketStore>,
        dispatcher: NotificationDispatcher,
    ) -> anyhow::Result<Self> {
        let jwt = JwtManager::new(
            JwtConfig {
                validity_hours: config.jwt.validity_hours,
                ..Default::default()
            },
            &config.jwt.secret,
        )?;

        Ok(Self {
            tenant: TenantContext::new(Arc::new(jwt)),
            lifecycle: TicketLifecycle::new(store.clone(), dispatcher, config.tickets.due_hours),
            reports: ReportAggregator::new(store.clone()),
            store,
            config,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("listen_addr", &self.config.listen_addr())
            .finish_non_exhaustive()
    }
}
