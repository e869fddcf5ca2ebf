pub mod types;
pub mod entities;
pub mod validator;
pub mod registry;

pub use types::*;
pub use validator::*;
pub use registry::*;
