//! DataAccess: the per-entity contract over a table backend, with validation and list state.

mod access;
mod local;
mod patch;
mod query;
mod validation;

pub use access::DataAccess;
pub use local::ListState;
pub use patch::{merge_fields, Patch};
pub use query::{EmbedSelection, ListQuery};
pub use validation::RequestValidator;
