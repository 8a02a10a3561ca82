//! 值对象

mod email;
mod password;
mod provider;
mod username;

pub use email::*;
pub use password::*;
pub use provider::*;
pub use username::*;
