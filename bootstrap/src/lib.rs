//! forum-bootstrap - 服务启动骨架
//!
//! 运行时初始化、基础设施资源与关闭信号

mod infrastructure;
mod runtime;
mod shutdown;

pub use infrastructure::*;
pub use runtime::*;
pub use shutdown::*;
