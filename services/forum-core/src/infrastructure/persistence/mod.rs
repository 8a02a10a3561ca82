//! 持久化实现

mod memory;
mod postgres_reaction_repository;
mod postgres_session_repository;
mod postgres_user_repository;

pub use memory::*;
pub use postgres_reaction_repository::*;
pub use postgres_session_repository::*;
pub use postgres_user_repository::*;
