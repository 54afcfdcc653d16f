use crate::r#const::{frontend_labels, rcode_labels};
use hickory_proto::op::{Message, ResponseCode};

// 接收查询的监听传输端点
// 传输层的协议细节（帧格式、TLS握手等）由外部监听器负责，
// 核心只使用该标签进行计数归属
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frontend {
    // 明文UDP监听
    Udp,
    // 明文TCP监听
    Tcp,
    // DNS-over-TLS监听
    Tls,
    // DNS-over-HTTPS监听
    Https,
}

impl Frontend {
    // 获取前端标签，用于计数器名称
    pub fn label(&self) -> &'static str {
        match self {
            Frontend::Udp => frontend_labels::UDP,
            Frontend::Tcp => frontend_labels::TCP,
            Frontend::Tls => frontend_labels::TLS,
            Frontend::Https => frontend_labels::HTTPS,
        }
    }

    // 所有前端的列表
    pub fn all() -> [Frontend; 4] {
        [Frontend::Udp, Frontend::Tcp, Frontend::Tls, Frontend::Https]
    }
}

// 响应来源标记
// 决定哪些计数器被触发，永远不会序列化到线上
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    // 来自缓存命中
    CacheHit,
    // 由规则合成
    RuleSynthesized,
    // 来自后端
    Backend,
}

// 带来源标记的DNS响应
#[derive(Debug, Clone)]
pub struct DnsResponse {
    // 响应消息
    pub message: Message,
    // 响应来源
    pub provenance: Provenance,
}

impl DnsResponse {
    // 创建新的响应
    pub fn new(message: Message, provenance: Provenance) -> Self {
        Self {
            message,
            provenance,
        }
    }

    // 获取响应码
    pub fn rcode(&self) -> ResponseCode {
        self.message.response_code()
    }
}

// 将响应码映射为计数器名称中使用的标签
pub fn rcode_label(rcode: ResponseCode) -> &'static str {
    match rcode {
        ResponseCode::NoError => rcode_labels::NOERROR,
        ResponseCode::ServFail => rcode_labels::SERVFAIL,
        ResponseCode::NXDomain => rcode_labels::NXDOMAIN,
        ResponseCode::Refused => rcode_labels::REFUSED,
        ResponseCode::FormErr => rcode_labels::FORMERR,
        ResponseCode::NotImp => rcode_labels::NOTIMP,
        _ => rcode_labels::OTHER,
    }
}
