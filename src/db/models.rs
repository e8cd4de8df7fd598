//! Database models split into domain-specific modules.

pub mod challenge;
pub mod user;

pub use challenge::*;
pub use user::*;
