use crate::error::AppError;
use crate::r#const::shutdown_timeout;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

// DNS 负载均衡代理核心服务
#[derive(Parser, Debug, Clone)]
#[command(
    name = "loadgate",
    author,
    version,
    about = "A DNS load-balancing proxy core with a shared response cache and exact per-decision counters\n\n\
             Key Features:\n\
             - Response Cache: one consistent keyed store shared by all listening transports and pools\n\
             - Rule Engine: ordered match/action rules, rcode synthesis (NXDOMAIN/REFUSED/SERVFAIL) or pool routing\n\
             - Accounting: per-rule, per-frontend and per-rcode counters for every completed transaction\n\
             - Management API: authenticated read-only counters snapshot plus Prometheus export\n\
             - Usability: simple YAML configuration, configuration validation, command-line interface"
)]
pub struct Args {
    // 配置文件路径
    #[arg(short, long, default_value = "./config.yaml")]
    pub config: PathBuf,

    // 测试配置
    #[arg(
        short = 't',
        long = "test",
        action = ArgAction::SetTrue,
        help = "Test configuration file for validity and exit"
    )]
    pub test_config: bool,

    // 启用调试日志
    #[arg(
        short = 'd',
        long = "debug",
        action = ArgAction::SetTrue,
        help = "Enable debug level logging for detailed output"
    )]
    pub debug: bool,

    // 关闭超时
    #[arg(
        long = "shutdown-timeout",
        help = "Maximum time in seconds to wait for complete shutdown",
        default_value_t = shutdown_timeout::DEFAULT
    )]
    pub shutdown_timeout: u64,
}

impl Args {
    // 解析命令行参数
    pub fn parse_args() -> Self {
        Args::parse()
    }

    // 验证参数
    pub fn validation(&self) -> Result<(), AppError> {
        if self.shutdown_timeout < shutdown_timeout::MIN
            || self.shutdown_timeout > shutdown_timeout::MAX
        {
            return Err(AppError::InvalidShutdownTimeout);
        }
        Ok(())
    }
}
