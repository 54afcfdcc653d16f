use loadgate::{
    subsystem_names, AdminServer, AppError, Args, Config, CounterRegistry, DohBackend,
    FrontendAccounting, RequestHandler, ResponseCache, RuleEngine,
};
use mimalloc::MiMalloc;
use std::process;
use std::sync::Arc;
use tokio_graceful_shutdown::{IntoSubsystem, SubsystemBuilder, Toplevel};
use tracing::{error, info};

// 使用 mimalloc 分配器提高内存效率
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_logging(args: &Args) {
    let builder = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_line_number(false);

    // 如果启用调试模式，输出调试信息，否则只输出 info 及以上级别
    if args.debug {
        builder.with_max_level(tracing::Level::DEBUG)
    } else {
        builder.with_max_level(tracing::Level::INFO)
    }
    .init();
}

// 程序入口
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 解析命令行参数
    let args = Args::parse_args();

    // 初始化日志
    init_logging(&args);

    // 验证参数
    if let Err(e) = args.validation() {
        error!("Invalid command line arguments: {}", e);
        process::exit(1);
    }

    info!("Starting Loadgate DNS load-balancing proxy core");

    // 加载配置
    let config = match Config::from_file(&args.config) {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration file: {}", e);
            process::exit(1);
        }
    };

    // 如果是测试模式，成功验证配置后退出
    if args.test_config {
        info!("Configuration file validation successful");
        return Ok(());
    }

    // 创建应用组件
    let components = match create_components(config) {
        Ok(components) => components,
        Err(e) => {
            error!("Failed to create application components: {}", e);
            process::exit(1);
        }
    };

    // 创建优雅关闭顶层管理器
    let toplevel = Toplevel::new(|s| async move {
        // 启动管理服务器子系统
        let admin_server = components.admin_server;
        s.start(SubsystemBuilder::new(
            subsystem_names::ADMIN_SERVER,
            move |s| async move { admin_server.run(s).await },
        ));
    });

    // 等待关闭
    info!("All services started, waiting for requests...");
    match toplevel
        .catch_signals()
        .handle_shutdown_requests(tokio::time::Duration::from_secs(args.shutdown_timeout))
        .await
    {
        Ok(_) => {
            info!("Application gracefully shut down");
            Ok(())
        }
        Err(e) => {
            error!("Application shutdown error: {}", e);
            process::exit(1);
        }
    }
}

// 应用组件
struct AppComponents {
    // 管理服务器
    admin_server: AdminServer,
    // 事务处理器，交由外部传输监听器调用
    _handler: Arc<RequestHandler>,
}

// 创建应用组件
fn create_components(config: Config) -> Result<AppComponents, AppError> {
    // 创建计数器注册表，注入到所有组件
    let registry = Arc::new(CounterRegistry::new());

    // 创建共享响应缓存
    let cache = Arc::new(ResponseCache::new(
        config.cache.max_size,
        config.cache.min_ttl,
        config.cache.max_ttl,
        config.cache.negative_ttl,
        Arc::clone(&registry),
    ));
    info!(
        "Response cache initialized, size: {}, TTL range: {}-{}s",
        config.cache.max_size, config.cache.min_ttl, config.cache.max_ttl
    );

    // 创建规则引擎
    let rules = Arc::new(
        RuleEngine::new(
            config.rules.clone(),
            config.default_pool.clone(),
            Arc::clone(&registry),
        )
        .map_err(AppError::Config)?,
    );
    info!(
        "Rule engine initialized with {} rules, default pool '{}'",
        config.rules.len(),
        config.default_pool
    );

    // 创建DoH后端
    let backend = Arc::new(DohBackend::new(config.backend.request_timeout)?);

    // 创建前端计数组件
    let accounting = FrontendAccounting::new(Arc::clone(&registry));

    // 缓存被全局禁用时，所有池都直接解析
    let mut pools = config.pools.clone();
    if !config.cache.enabled {
        for pool in &mut pools {
            pool.cache = false;
        }
        info!("Response cache disabled, all pools resolve directly");
    }

    // 创建事务处理器
    let handler = Arc::new(RequestHandler::new(cache, rules, backend, accounting, pools));
    info!("Request handler initialized with {} pools", config.pools.len());

    // 创建管理服务器
    let admin_listen_addr = config.admin.listen.parse()?;
    let admin_server = AdminServer::new(
        admin_listen_addr,
        config.admin.api_key.clone(),
        Arc::clone(&registry),
    );

    // 返回应用组件
    Ok(AppComponents {
        admin_server,
        _handler: handler,
    })
}
