use crate::config::PoolConfig;
use crate::error::AppError;
use crate::r#const::http_headers::content_types;
use hickory_proto::op::Message;
use std::time::Duration;
use tracing::debug;

// 后端协作方接口
//
// 规则引擎产出 Routed(pool) 后，由该协作方接收查询和池并返回
// 来源为后端的响应。超时和重试逻辑都属于协作方，对核心唯一可见的
// 效果是返回响应的响应码（例如SERVFAIL）
#[async_trait::async_trait]
pub trait DnsBackend: Send + Sync {
    // 通过指定池解析查询
    async fn resolve(&self, query: &Message, pool: &PoolConfig) -> Result<Message, AppError>;
}

// DoH后端
// 将查询以 application/dns-message POST 请求转发到池的DoH端点
pub struct DohBackend {
    // HTTP客户端
    client: reqwest::Client,
}

impl DohBackend {
    // 创建新的DoH后端
    pub fn new(request_timeout: u64) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl DnsBackend for DohBackend {
    async fn resolve(&self, query: &Message, pool: &PoolConfig) -> Result<Message, AppError> {
        // 将DNS查询编码为二进制数据
        let query_data = query.to_vec()?;

        debug!("Forwarding query to pool '{}' at {}", pool.name, pool.url);

        // 发送POST请求
        let response = self
            .client
            .post(&pool.url)
            .header("Accept", content_types::DNS_MESSAGE)
            .header("Content-Type", content_types::DNS_MESSAGE)
            .body(query_data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Backend(format!(
                "pool '{}' returned HTTP status {}",
                pool.name,
                response.status()
            )));
        }

        let response_data = response.bytes().await?;

        // 解析二进制响应为DNS消息
        let mut message = Message::from_vec(&response_data)?;

        // 复制请求ID
        message.set_id(query.id());

        Ok(message)
    }
}
