// 应用常量定义

//
// 配置参数限制常量
//

// 应用关闭等待时间限制
pub mod shutdown_timeout {
    // 默认值
    pub const DEFAULT: u64 = 30;
    // 最小值
    pub const MIN: u64 = 1;
    // 最大值
    pub const MAX: u64 = 120;
}

// 缓存配置限制
pub mod cache_limits {
    // 默认缓存大小
    pub const DEFAULT_SIZE: usize = 10000;
    // 最小缓存大小
    pub const MIN_SIZE: usize = 10;
    // 最大缓存大小
    pub const MAX_SIZE: usize = 1000000;
    // 默认负面缓存TTL值（秒）
    pub const DEFAULT_NEGATIVE_TTL: u32 = 60;
    // 默认最小TTL值（秒）
    pub const DEFAULT_MIN_TTL: u32 = 1;
    // 最小TTL值（秒）
    pub const MIN_TTL: u32 = 1;
    // 最大TTL值（秒）
    pub const MAX_TTL: u32 = 86400;
}

// 后端请求配置限制
pub mod backend_limits {
    // 默认请求超时（秒）
    pub const DEFAULT_REQUEST_TIMEOUT: u64 = 5;
    // 最小请求超时（秒）
    pub const MIN_REQUEST_TIMEOUT: u64 = 1;
    // 最大请求超时（秒）
    pub const MAX_REQUEST_TIMEOUT: u64 = 120;
}

//
// 计数器名称常量
//

// 计数器名称族
// 所有计数器都是进程生命周期内单调递增的64位整数
pub mod counter_names {
    // 已完成事务总数（所有前端）
    pub const RESPONSES: &str = "responses";
    // 后端产生的SERVFAIL响应数（规则合成的SERVFAIL不计入）
    pub const SERVFAIL_RESPONSES: &str = "servfail-responses";
    // 缓存命中数
    pub const CACHE_HITS: &str = "cache-hits";
    // 缓存未命中数
    pub const CACHE_MISSES: &str = "cache-misses";
    // 规则计数器前缀: rule-<ruleName>
    pub const RULE_PREFIX: &str = "rule-";
    // 前端计数器前缀: frontend-<rcode> / frontend-<frontend>-<rcode>
    pub const FRONTEND_PREFIX: &str = "frontend-";
}

// 响应码标签
pub mod rcode_labels {
    // 正常响应
    pub const NOERROR: &str = "noerror";
    // 服务器失败
    pub const SERVFAIL: &str = "servfail";
    // 域名不存在
    pub const NXDOMAIN: &str = "nxdomain";
    // 拒绝响应
    pub const REFUSED: &str = "refused";
    // 格式错误
    pub const FORMERR: &str = "formerr";
    // 未实现
    pub const NOTIMP: &str = "notimp";
    // 其他响应码
    pub const OTHER: &str = "other";
}

// 前端（监听传输）标签
pub mod frontend_labels {
    // UDP监听
    pub const UDP: &str = "udp";
    // TCP监听
    pub const TCP: &str = "tcp";
    // DNS-over-TLS监听
    pub const TLS: &str = "tls";
    // DNS-over-HTTPS监听
    pub const HTTPS: &str = "https";
}

// 路由器常量
pub mod router {
    // 通配符常量
    pub mod wildcards {
        // 全局通配符
        pub const GLOBAL: &str = "*";
        // 前缀通配符
        pub const PREFIX: &str = "*.";
    }
}

// 管理API常量
pub mod admin_api {
    // API密钥请求头
    pub const API_KEY_HEADER: &str = "x-api-key";
    // 统计信息端点路径
    pub const STATISTICS_PATH: &str = "/api/v1/servers/localhost";
}

// HTTP头常量
pub mod http_headers {
    // 内容类型常量
    pub mod content_types {
        // DNS消息内容类型
        pub const DNS_MESSAGE: &str = "application/dns-message";
    }
}

// 子系统名称
pub mod subsystem_names {
    // 管理服务器子系统
    pub const ADMIN_SERVER: &str = "admin_server";
}

// 池默认值
pub mod pool_defaults {
    // 默认池名称
    pub const DEFAULT_POOL_NAME: &str = "default";
}
