//! 基础设施层

pub mod cleanup;
pub mod migrations;
pub mod persistence;

pub use cleanup::SessionSweepTask;
pub use migrations::run_migrations;
