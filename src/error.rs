use hickory_proto::error::ProtoError;
use std::io;
use std::net::AddrParseError;
use thiserror::Error;

// 统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("DNS resolution error: {0}")]
    DnsProto(#[from] ProtoError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid shutdown timeout")]
    InvalidShutdownTimeout,
}

impl From<AddrParseError> for AppError {
    fn from(err: AddrParseError) -> Self {
        Self::Config(ConfigError::InvalidListenAddress(err.to_string()))
    }
}

// 配置错误类型
// 配置错误在启动时即为致命错误，服务过程中不会出现
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadError(#[from] io::Error),

    #[error("YAML parsing error: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid listen address: {0}")]
    InvalidListenAddress(String),

    #[error("Invalid pool URL: {0}")]
    InvalidPoolUrl(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("Invalid cache configuration: {0}")]
    InvalidCacheConfig(String),

    #[error("Invalid admin configuration: {0}")]
    InvalidAdminConfig(String),

    #[error("Duplicate rule name: {0}")]
    DuplicateRuleName(String),

    #[error("Duplicate pool name: {0}")]
    DuplicatePoolName(String),

    #[error("Rule references non-existent pool: {0}")]
    NonExistentPoolReference(String),
}
