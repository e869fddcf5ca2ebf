//! HTTP handlers for entity CRUD and the console pages.

pub mod console;
pub mod entity;
pub use entity::*;
