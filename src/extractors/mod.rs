//! Request extractors.

mod session;
pub use session::{AuthSession, OptionalSession, bearer_token};
