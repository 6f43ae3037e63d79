//! Churnguard - temporarily pins churning world cells

pub mod core;
pub mod host;
pub mod metrics;
pub mod pinning;
pub mod server;
pub mod sim;
