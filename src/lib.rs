pub mod accounting;
pub mod admin;
pub mod args;
pub mod backend;
pub mod cache;
pub mod config;
pub mod r#const;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod router;
pub mod types;

// 重导出常用组件
pub use accounting::FrontendAccounting;
pub use admin::AdminServer;
pub use args::Args;
pub use backend::{DnsBackend, DohBackend};
pub use cache::ResponseCache;
pub use config::Config;
pub use error::AppError;
pub use handler::RequestHandler;
pub use metrics::CounterRegistry;
pub use r#const::{counter_names, subsystem_names};
pub use router::RuleEngine;
pub use types::{DnsResponse, Frontend, Provenance};
