use crate::error::AppError;
use crate::metrics::CounterRegistry;
use crate::r#const::admin_api;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_graceful_shutdown::{IntoSubsystem, SubsystemHandle};
use tracing::{error, info};

// 管理API共享状态
#[derive(Clone)]
struct AdminState {
    // 预共享API密钥
    api_key: Arc<String>,
    // 计数器注册表
    registry: Arc<CounterRegistry>,
}

// 管理服务器
//
// 只读的计数器查询接口：统计信息端点需要预共享密钥认证，
// 没有任何写入/重置端点
pub struct AdminServer {
    // 监听地址
    listen_addr: SocketAddr,
    // API密钥
    api_key: String,
    // 计数器注册表
    registry: Arc<CounterRegistry>,
    // 停止信号接收端
    shutdown_rx: Option<oneshot::Receiver<()>>,
    // 停止信号发送端
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl AdminServer {
    // 创建新的管理服务器
    pub fn new(listen_addr: SocketAddr, api_key: String, registry: Arc<CounterRegistry>) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        Self {
            listen_addr,
            api_key,
            registry,
            shutdown_rx: Some(shutdown_rx),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    // 停止管理服务器
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("Admin server stop signal sent");
        }
    }

    // 启动管理服务器
    pub async fn start(&mut self) -> Result<(), AppError> {
        let app = admin_routes(self.api_key.clone(), Arc::clone(&self.registry));

        let listener = TcpListener::bind(self.listen_addr).await?;
        info!("Admin server listening on {}", self.listen_addr);

        let shutdown_rx = match self.shutdown_rx.take() {
            Some(rx) => rx,
            None => {
                return Err(AppError::Internal(
                    "Admin server already started".to_string(),
                ))
            }
        };

        let server = axum::serve(listener, app);
        let server_with_graceful_shutdown = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
            info!("Admin server received shutdown signal");
        });

        server_with_graceful_shutdown.await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl IntoSubsystem<AppError> for AdminServer {
    async fn run(mut self, subsys: SubsystemHandle) -> Result<(), AppError> {
        tokio::select! {
            res = self.start() => {
                if let Err(err) = res {
                    error!("Admin server error: {}", err);
                    Err(err)
                } else {
                    info!("Admin server stopped");
                    Ok(())
                }
            }
            _ = subsys.on_shutdown_requested() => {
                info!("Received subsystem shutdown request, admin server is stopping");
                self.shutdown();
                Ok(())
            }
        }
    }
}

// 组合管理API路由
pub fn admin_routes(api_key: String, registry: Arc<CounterRegistry>) -> Router {
    let state = AdminState {
        api_key: Arc::new(api_key),
        registry,
    };

    Router::new()
        .route("/health", get(health_handler))
        .route(admin_api::STATISTICS_PATH, get(statistics_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// 健康检查处理程序
async fn health_handler() -> &'static str {
    "OK"
}

// 统计信息处理程序
// 返回所有计数器的扁平 name -> value 快照，需要 x-api-key 认证
async fn statistics_handler(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    let provided = headers
        .get(admin_api::API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == state.api_key.as_str() => {
            let stats = state.registry.snapshot();
            (StatusCode::OK, Json(json!({ "statistics": stats }))).into_response()
        }
        _ => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    }
}

// Prometheus指标导出处理程序
async fn metrics_handler(State(state): State<AdminState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        state.registry.export_metrics(),
    )
        .into_response()
}
