use crate::accounting::FrontendAccounting;
use crate::backend::DnsBackend;
use crate::cache::ResponseCache;
use crate::config::PoolConfig;
use crate::error::AppError;
use crate::router::{synthesize_response, RuleEngine, Verdict};
use crate::types::{DnsResponse, Frontend, Provenance};
use hickory_proto::op::{Message, MessageType, ResponseCode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

// DNS事务处理器
//
// 每个查询对应一个逻辑事务，按固定路径推进，不会分支回退：
// Received -> RuleEvaluated -> {Synthesized | CacheChecked} ->
// [BackendCalled] -> Completed。
// 到达Completed时恰好触发一次前端计数，若经过CacheChecked则恰好
// 触发一次缓存命中/未命中计数。所有前端（UDP/TCP/TLS/HTTPS）共用
// 同一个实例，任意交错下安全
pub struct RequestHandler {
    // 共享响应缓存
    cache: Arc<ResponseCache>,
    // 规则引擎
    rules: Arc<RuleEngine>,
    // 后端协作方
    backend: Arc<dyn DnsBackend>,
    // 前端计数组件
    accounting: FrontendAccounting,
    // 池配置，按名称索引
    pools: HashMap<String, PoolConfig>,
}

impl RequestHandler {
    // 创建DNS事务处理器
    pub fn new(
        cache: Arc<ResponseCache>,
        rules: Arc<RuleEngine>,
        backend: Arc<dyn DnsBackend>,
        accounting: FrontendAccounting,
        pools: Vec<PoolConfig>,
    ) -> Self {
        let pools = pools.into_iter().map(|p| (p.name.clone(), p)).collect();

        Self {
            cache,
            rules,
            backend,
            accounting,
            pools,
        }
    }

    // 处理一个查询事务
    //
    // 每个被评估的查询恰好产生一个响应：规则合成、缓存命中或后端
    // 响应。返回前将响应的事务ID改写为查询的ID
    pub async fn handle_query(
        &self,
        request: &Message,
        frontend: Frontend,
    ) -> Result<Message, AppError> {
        // 检查是否为查询请求
        if request.message_type() != MessageType::Query {
            return Err(AppError::Internal("Not a query request".to_string()));
        }

        if request.queries().is_empty() {
            return Err(AppError::Internal("Empty query".to_string()));
        }

        // 按配置顺序评估规则
        let response = match self.rules.evaluate(request, frontend) {
            Verdict::Synthesized(response, rule_name) => {
                debug!("Query synthesized by rule '{}'", rule_name);
                response
            }
            Verdict::Routed(pool_name) => {
                let pool = self
                    .pools
                    .get(&pool_name)
                    .ok_or_else(|| AppError::PoolNotFound(pool_name.clone()))?;

                if pool.cache {
                    // 缓存支持的池先查缓存
                    match self.cache.lookup(request).await {
                        Some(cached) => cached,
                        None => {
                            // 未命中：调用后端并存入缓存。
                            // 即使最终响应没有送达客户端，store也已提交
                            let response = self.resolve_via_backend(request, pool).await;
                            if let Err(e) = self.cache.store(request, &response).await {
                                warn!("Cache store failed: {}", e);
                            }
                            response
                        }
                    }
                } else {
                    self.resolve_via_backend(request, pool).await
                }
            }
        };

        // 完成事务，恰好记录一次
        self.accounting.record_completion(frontend, &response);

        let mut message = response.message;
        message.set_id(request.id());

        Ok(message)
    }

    // 通过后端协作方解析查询
    // 后端失败不会使事务失败：它表现为一个来源为后端的SERVFAIL响应，
    // 核心将其作为普通数据处理
    async fn resolve_via_backend(&self, request: &Message, pool: &PoolConfig) -> DnsResponse {
        match self.backend.resolve(request, pool).await {
            Ok(message) => DnsResponse::new(message, Provenance::Backend),
            Err(e) => {
                warn!("Backend call failed for pool '{}': {}", pool.name, e);
                DnsResponse::new(
                    synthesize_response(request, ResponseCode::ServFail),
                    Provenance::Backend,
                )
            }
        }
    }
}
