//! Shared application state for all routes.

use crate::backend::TableBackend;
use crate::catalog::Catalog;
use crate::service::DataAccess;
use crate::session::{IdentityProvider, Session};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn TableBackend>,
    pub catalog: Arc<Catalog>,
    pub identity: Arc<dyn IdentityProvider>,
    /// Federated providers offered on the login page.
    pub login_providers: Arc<Vec<String>>,
}

impl AppState {
    /// Data access on behalf of one request's session.
    pub fn data_access(&self, session: Session) -> DataAccess {
        DataAccess::new(self.backend.clone(), self.catalog.clone(), session)
    }
}
