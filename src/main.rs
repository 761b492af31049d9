use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use payout_recon_rust::{
    api, create_pool, ensure_schema, AppConfig, ImportSettings, InMemoryLedgerStore, LedgerStore,
    PayoutImportService, PgLedgerStore,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载配置
    let config = AppConfig::load()?;

    // 初始化日志 - 本地时间格式, RUST_LOG 优先
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.log.level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    info!("Starting server with config: {:?}", config);

    // 账本存储: memory:// 走内存实现, 其余走 PostgreSQL
    let store: Arc<dyn LedgerStore> = if config.database.is_memory() {
        info!("使用内存账本 (数据不落盘)");
        Arc::new(InMemoryLedgerStore::new())
    } else {
        let pool = create_pool(&config.database).await?;
        info!("Database pool created");
        if config.database.auto_migrate {
            ensure_schema(&pool).await?;
        }
        Arc::new(PgLedgerStore::new(
            pool,
            Duration::from_secs(config.database.store_timeout_secs),
        ))
    };

    let service = Arc::new(PayoutImportService::new(
        store,
        ImportSettings::from(&config.import),
    ));

    // 构建路由
    let import_routes = Router::new()
        .route("/api/import/payout", post(api::import_payout))
        .route("/api/import/payout/preview", post(api::preview_payout))
        .with_state(service);

    let app = Router::new()
        .route("/health", get(api::health_check))
        .merge(import_routes)
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(config.import.max_upload_bytes)));

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/import/payout          - 结算单导入 (?format=csv 返回错误清单)");
    info!("  POST /api/import/payout/preview  - 导入预览 (不写库)");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
