use crate::error::ConfigError;
use crate::r#const::{backend_limits, cache_limits, pool_defaults, router::wildcards};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, net::SocketAddr, path::Path, str::FromStr};
use tracing::debug;
use url::Url;

// 规则匹配类型枚举
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    // 精确匹配
    Exact,
    // 通配符匹配
    Wildcard,
    // 正则表达式匹配
    Regex,
}

// 规则动作枚举
// 合成动作直接产生响应并终止评估；pool动作将查询交给池的后端
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleActionConfig {
    // 合成NXDOMAIN响应
    Nxdomain,
    // 合成REFUSED响应
    Refused,
    // 合成SERVFAIL响应
    Servfail,
    // 路由到池
    Pool,
}

// 规则配置
// 规则按声明顺序评估，第一条命中的规则生效
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RuleConfig {
    // 规则名称，用于 rule-<name> 计数器
    pub name: String,
    // 匹配类型
    #[serde(rename = "match")]
    pub match_type: MatchType,
    // 匹配模式
    pub pattern: String,
    // 规则动作
    pub action: RuleActionConfig,
    // 目标池（当action为pool时必须提供）
    pub pool: Option<String>,
}

// 池配置
// 池是查询可被路由到的命名后端组
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    // 池名称
    pub name: String,
    // 池后端的DoH端点URL
    pub url: String,
    // 该池是否由共享缓存支持
    #[serde(default)]
    pub cache: bool,
}

// 缓存配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    // 是否启用缓存
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    // 最大缓存条目数
    #[serde(default = "default_cache_size")]
    pub max_size: usize,
    // 最小TTL（秒）
    #[serde(default = "default_min_ttl")]
    pub min_ttl: u32,
    // 最大TTL（秒）
    #[serde(default = "default_max_ttl")]
    pub max_ttl: u32,
    // 负面缓存TTL（秒）
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl: u32,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_size() -> usize {
    cache_limits::DEFAULT_SIZE
}

fn default_min_ttl() -> u32 {
    cache_limits::DEFAULT_MIN_TTL
}

fn default_max_ttl() -> u32 {
    cache_limits::MAX_TTL
}

fn default_negative_ttl() -> u32 {
    cache_limits::DEFAULT_NEGATIVE_TTL
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_size: default_cache_size(),
            min_ttl: default_min_ttl(),
            max_ttl: default_max_ttl(),
            negative_ttl: default_negative_ttl(),
        }
    }
}

// 管理服务器配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    // 管理服务器监听地址
    pub listen: String,
    // 统计信息端点的预共享API密钥
    pub api_key: String,
}

// 后端请求配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    // 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_request_timeout() -> u64 {
    backend_limits::DEFAULT_REQUEST_TIMEOUT
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_pool_name() -> String {
    pool_defaults::DEFAULT_POOL_NAME.to_string()
}

// 应用配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    // 管理服务器配置
    pub admin: AdminConfig,
    // 缓存配置
    #[serde(default)]
    pub cache: CacheConfig,
    // 后端请求配置
    #[serde(default)]
    pub backend: BackendConfig,
    // 无规则命中时使用的默认池名称
    #[serde(default = "default_pool_name")]
    pub default_pool: String,
    // 池配置
    pub pools: Vec<PoolConfig>,
    // 规则配置（按评估顺序）
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Config {
    // 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        debug!("Loading configuration file: {:?}", path.as_ref());
        let content = fs::read_to_string(path).map_err(ConfigError::LoadError)?;
        let config: Config = serde_yaml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    // 验证配置有效性
    // 配置错误在启动时即为致命错误，服务过程中不会出现
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证管理服务器配置
        self.validate_admin_config()?;

        // 验证缓存配置
        self.validate_cache_config()?;

        // 验证后端请求配置
        self.validate_backend_config()?;

        // 验证池配置
        self.validate_pools()?;

        // 验证规则配置
        self.validate_rules()?;

        Ok(())
    }

    // 验证管理服务器配置
    fn validate_admin_config(&self) -> Result<(), ConfigError> {
        SocketAddr::from_str(&self.admin.listen)
            .map_err(|_| ConfigError::InvalidListenAddress(self.admin.listen.clone()))?;

        if self.admin.api_key.is_empty() {
            return Err(ConfigError::InvalidAdminConfig(
                "api_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    // 验证缓存配置
    fn validate_cache_config(&self) -> Result<(), ConfigError> {
        if !self.cache.enabled {
            return Ok(());
        }

        if self.cache.max_size < cache_limits::MIN_SIZE
            || self.cache.max_size > cache_limits::MAX_SIZE
        {
            return Err(ConfigError::InvalidCacheConfig(format!(
                "max_size must be between {} and {}",
                cache_limits::MIN_SIZE,
                cache_limits::MAX_SIZE
            )));
        }

        if self.cache.min_ttl > self.cache.max_ttl {
            return Err(ConfigError::InvalidCacheConfig(
                "min_ttl cannot be greater than max_ttl".to_string(),
            ));
        }

        if self.cache.min_ttl < cache_limits::MIN_TTL
            || self.cache.max_ttl > cache_limits::MAX_TTL
        {
            return Err(ConfigError::InvalidCacheConfig(format!(
                "TTL values must be between {} and {} seconds",
                cache_limits::MIN_TTL,
                cache_limits::MAX_TTL
            )));
        }

        if self.cache.negative_ttl < cache_limits::MIN_TTL
            || self.cache.negative_ttl > cache_limits::MAX_TTL
        {
            return Err(ConfigError::InvalidCacheConfig(format!(
                "negative_ttl must be between {} and {} seconds",
                cache_limits::MIN_TTL,
                cache_limits::MAX_TTL
            )));
        }

        Ok(())
    }

    // 验证后端请求配置
    fn validate_backend_config(&self) -> Result<(), ConfigError> {
        if self.backend.request_timeout < backend_limits::MIN_REQUEST_TIMEOUT
            || self.backend.request_timeout > backend_limits::MAX_REQUEST_TIMEOUT
        {
            return Err(ConfigError::InvalidCacheConfig(format!(
                "request_timeout must be between {} and {} seconds",
                backend_limits::MIN_REQUEST_TIMEOUT,
                backend_limits::MAX_REQUEST_TIMEOUT
            )));
        }

        Ok(())
    }

    // 验证池配置
    fn validate_pools(&self) -> Result<(), ConfigError> {
        if self.pools.is_empty() {
            return Err(ConfigError::InvalidRule(
                "at least one pool must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for pool in &self.pools {
            if pool.name.is_empty() {
                return Err(ConfigError::InvalidPoolUrl(
                    "pool name must not be empty".to_string(),
                ));
            }

            if !names.insert(pool.name.as_str()) {
                return Err(ConfigError::DuplicatePoolName(pool.name.clone()));
            }

            // 验证池URL
            let url = Url::parse(&pool.url)
                .map_err(|_| ConfigError::InvalidPoolUrl(pool.url.clone()))?;
            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(ConfigError::InvalidPoolUrl(pool.url.clone()));
            }
        }

        // 默认池必须存在
        if !names.contains(self.default_pool.as_str()) {
            return Err(ConfigError::NonExistentPoolReference(
                self.default_pool.clone(),
            ));
        }

        Ok(())
    }

    // 验证规则配置
    fn validate_rules(&self) -> Result<(), ConfigError> {
        let pool_names: HashSet<&str> = self.pools.iter().map(|p| p.name.as_str()).collect();
        let mut rule_names = HashSet::new();

        for rule in &self.rules {
            if rule.name.is_empty() {
                return Err(ConfigError::InvalidRule(
                    "rule name must not be empty".to_string(),
                ));
            }

            if !rule_names.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateRuleName(rule.name.clone()));
            }

            // 验证匹配模式
            match rule.match_type {
                MatchType::Exact => {
                    if rule.pattern.is_empty() {
                        return Err(ConfigError::InvalidPattern(rule.pattern.clone()));
                    }
                }
                MatchType::Wildcard => {
                    if rule.pattern != wildcards::GLOBAL
                        && !(rule.pattern.starts_with(wildcards::PREFIX)
                            && rule.pattern.len() > wildcards::PREFIX.len())
                    {
                        return Err(ConfigError::InvalidPattern(rule.pattern.clone()));
                    }
                }
                MatchType::Regex => {
                    Regex::new(&rule.pattern)?;
                }
            }

            // 验证动作和池引用
            match rule.action {
                RuleActionConfig::Pool => {
                    let pool = rule.pool.as_deref().ok_or_else(|| {
                        ConfigError::InvalidRule(format!(
                            "rule '{}' with pool action requires a pool target",
                            rule.name
                        ))
                    })?;
                    if !pool_names.contains(pool) {
                        return Err(ConfigError::NonExistentPoolReference(pool.to_string()));
                    }
                }
                _ => {
                    if rule.pool.is_some() {
                        return Err(ConfigError::InvalidRule(format!(
                            "rule '{}' does not take a pool target",
                            rule.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
