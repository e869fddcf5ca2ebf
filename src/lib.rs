//! Bakery console: typed data-access contract and REST service over the bakery tables.

pub mod backend;
pub mod catalog;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod session;
pub mod settings;
pub mod sql;
pub mod state;

pub use backend::{MemoryBackend, PgBackend, TableBackend};
pub use catalog::{Catalog, EntityKind};
pub use error::{AppError, ConfigError};
pub use migration::{apply_migrations, ensure_database_exists};
pub use response::{Envelope, PageMeta};
pub use routes::{app, common_routes, console_routes, entity_routes};
pub use service::{DataAccess, ListQuery, ListState, Patch};
pub use session::{IdentityProvider, JwtIdentity, Session, SessionGate};
pub use settings::{BackendKind, Settings};
pub use state::AppState;
