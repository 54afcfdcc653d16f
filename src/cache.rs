use crate::error::AppError;
use crate::metrics::CounterRegistry;
use crate::r#const::{cache_limits, counter_names};
use crate::types::{DnsResponse, Provenance};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{DNSClass, RecordType};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

// DNS缓存键
//
// 键只由规范化后的问题部分导出：名称（转小写、全限定）、记录类型和类。
// RD标志和承载传输被有意排除在外，同一逻辑查询无论经由
// UDP/TCP/TLS/HTTPS、无论RD取值，都会产生相同的键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    // 域名（小写）
    name: String,
    // 记录类型
    record_type: RecordType,
    // DNS类
    class: DNSClass,
}

impl CacheKey {
    // 从DNS查询消息创建缓存键
    fn from_message(message: &Message) -> Option<Self> {
        let query = message.queries().first()?;

        Some(Self {
            name: query.name().to_string().to_lowercase(),
            record_type: query.query_type(),
            class: query.query_class(),
        })
    }
}

// DNS缓存条目
// 条目由缓存独占所有，查询方只拿到克隆后的消息
#[derive(Debug, Clone)]
struct CacheEntry {
    // 缓存的响应消息
    message: Message,
    // 插入时间戳
    inserted_at: Instant,
    // 条目TTL（秒）
    ttl_secs: u32,
}

// 共享响应缓存
//
// 所有前端和池共用同一个实例。过期检查基于墙钟时间在读取路径上
// 惰性完成，没有后台清理：已过期但尚未逐出的条目与不存在的条目
// 在读取时表现完全一致
pub struct ResponseCache {
    // 缓存存储
    store: Cache<CacheKey, CacheEntry>,
    // 计数器注册表
    registry: Arc<CounterRegistry>,
    // 最小TTL（秒）
    min_ttl: u32,
    // 最大TTL（秒）
    max_ttl: u32,
    // 负面缓存TTL（秒），用于错误响应和无答案响应
    negative_ttl: u32,
}

impl ResponseCache {
    // 创建新的响应缓存
    // max_size 为外部配置的最大条目数
    pub fn new(
        max_size: usize,
        min_ttl: u32,
        max_ttl: u32,
        negative_ttl: u32,
        registry: Arc<CounterRegistry>,
    ) -> Self {
        // 验证配置
        let max_size = max_size.clamp(cache_limits::MIN_SIZE, cache_limits::MAX_SIZE);
        let min_ttl = min_ttl.clamp(cache_limits::MIN_TTL, cache_limits::MAX_TTL);
        let max_ttl = max_ttl.clamp(min_ttl, cache_limits::MAX_TTL);
        let negative_ttl = negative_ttl.clamp(cache_limits::MIN_TTL, cache_limits::MAX_TTL);

        // 创建缓存，容量上限之外只按TTL逐出
        let store = Cache::builder().max_capacity(max_size as u64).build();

        info!(
            "Creating response cache - Size: {}, TTL range: {}-{}s, Negative TTL: {}s",
            max_size, min_ttl, max_ttl, negative_ttl
        );

        Self {
            store,
            registry,
            min_ttl,
            max_ttl,
            negative_ttl,
        }
    }

    // 从缓存中查找响应
    //
    // 命中时增加 cache-hits 并返回来源改写为 CacheHit 的响应；
    // 逻辑未命中（不存在或已过期）时增加 cache-misses 并返回 None
    pub async fn lookup(&self, query: &Message) -> Option<DnsResponse> {
        let key = match CacheKey::from_message(query) {
            Some(k) => k,
            None => {
                // 无法导出键的查询视为未命中
                self.registry.increment(counter_names::CACHE_MISSES);
                return None;
            }
        };

        let entry = match self.store.get(&key).await {
            Some(e) => e,
            None => {
                self.registry.increment(counter_names::CACHE_MISSES);
                return None;
            }
        };

        // 惰性过期检查：已过期条目与不存在的条目同样处理，
        // 下一个后端响应会覆盖它
        let elapsed_secs = entry.inserted_at.elapsed().as_secs();
        if elapsed_secs >= entry.ttl_secs as u64 {
            debug!(
                "Cache entry expired - {} ({:?})",
                key.name, key.record_type
            );
            self.store.invalidate(&key).await;
            self.registry.increment(counter_names::CACHE_MISSES);
            return None;
        }

        // 克隆响应并将事务ID改写为本次查询的ID
        let mut response = entry.message.clone();
        response.set_id(query.id());

        // 按已缓存时长调整TTL
        self.adjust_message_ttl(&mut response, elapsed_secs as u32);

        self.registry.increment(counter_names::CACHE_HITS);
        debug!("Cache hit - {} ({:?})", key.name, key.record_type);

        Some(DnsResponse::new(response, Provenance::CacheHit))
    }

    // 向缓存写入响应
    //
    // 只有来源为后端的响应会被缓存：规则合成的响应完全绕过缓存，
    // 合成的SERVFAIL/REFUSED/NXDOMAIN永远不会变成陈旧的缓存答案。
    // 对同一键的写入无条件覆盖旧条目（last-writer-wins，不做合并）
    pub async fn store(&self, query: &Message, response: &DnsResponse) -> Result<(), AppError> {
        if response.provenance != Provenance::Backend {
            debug!("Skipping cache store for non-backend response");
            return Ok(());
        }

        let key = match CacheKey::from_message(query) {
            Some(k) => k,
            None => {
                return Err(AppError::Cache(
                    "Cannot create cache key from query".to_string(),
                ));
            }
        };

        // 计算条目TTL
        let ttl_secs = self.calculate_ttl(&response.message);

        let entry = CacheEntry {
            message: response.message.clone(),
            inserted_at: Instant::now(),
            ttl_secs,
        };

        self.store.insert(key.clone(), entry).await;
        debug!(
            "Stored in cache - {} ({:?}), TTL: {}s",
            key.name, key.record_type, ttl_secs
        );

        Ok(())
    }

    // 计算响应的缓存TTL
    // 取响应中所有答案记录的最小TTL并限制在配置范围内；
    // 错误响应或无答案响应使用负面缓存TTL
    fn calculate_ttl(&self, response: &Message) -> u32 {
        if response.response_code() != ResponseCode::NoError || response.answer_count() == 0 {
            debug!(
                "Using negative cache TTL ({}s) for response code {:?}",
                self.negative_ttl,
                response.response_code()
            );
            return self.negative_ttl;
        }

        let mut min_ttl = u32::MAX;
        for record in response.answers() {
            min_ttl = min_ttl.min(record.ttl());
        }

        min_ttl.clamp(self.min_ttl, self.max_ttl)
    }

    // 按已缓存时长下调响应中各记录的TTL
    fn adjust_message_ttl(&self, message: &mut Message, elapsed_secs: u32) {
        for record in message.answers_mut() {
            let original_ttl = record.ttl();
            // 至少保留1秒TTL
            record.set_ttl(original_ttl.saturating_sub(elapsed_secs).max(1));
        }

        for record in message.name_servers_mut() {
            let original_ttl = record.ttl();
            record.set_ttl(original_ttl.saturating_sub(elapsed_secs).max(1));
        }

        for record in message.additionals_mut() {
            // 跳过OPT记录
            if record.record_type() == RecordType::OPT {
                continue;
            }
            let original_ttl = record.ttl();
            record.set_ttl(original_ttl.saturating_sub(elapsed_secs).max(1));
        }
    }

    // 获取缓存条目数量
    pub async fn len(&self) -> usize {
        self.store.run_pending_tasks().await;
        self.store.entry_count() as usize
    }

    // 检查缓存是否为空
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
