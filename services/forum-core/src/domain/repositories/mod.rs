//! Repository traits

mod reaction_repository;
mod session_repository;
mod user_repository;

pub use reaction_repository::*;
pub use session_repository::*;
pub use user_repository::*;
