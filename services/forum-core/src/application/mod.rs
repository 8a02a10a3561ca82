//! 应用服务

mod account_service;
mod identity_resolver;
mod reaction_engine;
mod session_store;

pub use account_service::*;
pub use identity_resolver::*;
pub use reaction_engine::*;
pub use session_store::*;
