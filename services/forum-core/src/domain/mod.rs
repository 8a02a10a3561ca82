//! 领域层

pub mod reaction;
pub mod repositories;
pub mod session;
pub mod user;
pub mod value_objects;

pub use reaction::*;
pub use session::*;
pub use user::*;
pub use value_objects::*;
