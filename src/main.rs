use shop_order_consumer::adapter::driven::{
    init_tracing, InMemoryDeadLetterQueue, InMemoryOrderQueue, MySqlProductRepository,
    MySqlUserRepository, TracingLogger,
};
use shop_order_consumer::adapter::driver::rest_api::{create_router, AppState};
use shop_order_consumer::adapter::{ConsumerConfig, DatabaseConfig, DatabaseMigration, ServerConfig};
use shop_order_consumer::application::consumer::OrderConsumer;
use shop_order_consumer::domain::port::{Logger, ProductRepository, UserRepository};
use shop_order_consumer::domain::service::{OrderValidator, StockReservationEngine};

use sqlx::mysql::MySqlPoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

const COMPONENT: &str = "main";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();
    init_tracing();

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new());

    let database_config = DatabaseConfig::from_env()?;
    let consumer_config = ConsumerConfig::from_env()?;
    let server_config = ServerConfig::from_env()?;

    // ストアに接続できなければ起動しない
    let pool = MySqlPoolOptions::new()
        .max_connections(database_config.max_connections)
        .acquire_timeout(consumer_config.store_timeout)
        .connect(&database_config.connection_string())
        .await
        .map_err(|e| {
            logger.error(
                COMPONENT,
                &format!("Could not connect to the store: {}", e),
                None,
                Some(HashMap::from([(
                    "endpoint".to_string(),
                    database_config.endpoint(),
                )])),
            );
            e
        })?;
    logger.info(
        COMPONENT,
        "Connected to the store",
        None,
        Some(HashMap::from([(
            "endpoint".to_string(),
            database_config.endpoint(),
        )])),
    );

    DatabaseMigration::new(pool.clone(), logger.clone())
        .run()
        .await?;

    let product_repository: Arc<dyn ProductRepository> =
        Arc::new(MySqlProductRepository::new(pool.clone()));
    let user_repository: Arc<dyn UserRepository> = Arc::new(MySqlUserRepository::new(pool));

    // 注文キューとコンシューマー
    let (order_publisher, order_queue) = InMemoryOrderQueue::new();
    let dead_letters = Arc::new(
        InMemoryDeadLetterQueue::new(consumer_config.dead_letter_max_size)
            .with_logger(logger.clone()),
    );
    let consumer = OrderConsumer::new(
        order_queue,
        Arc::new(OrderValidator::new(
            user_repository.clone(),
            consumer_config.store_timeout,
        )),
        Arc::new(StockReservationEngine::new(
            product_repository.clone(),
            consumer_config.reservation_mode,
            consumer_config.store_timeout,
        )),
        dead_letters,
        logger.clone(),
        consumer_config.settings(),
    );
    let consumer_handle = tokio::spawn(consumer.run());

    let app_state = AppState::new(
        product_repository,
        user_repository,
        Arc::new(order_publisher),
        consumer_config.store_timeout,
    );
    let app = create_router()
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(server_config.bind_address()).await?;
    logger.info(
        COMPONENT,
        &format!("HTTP server listening on {}", server_config.bind_address()),
        None,
        None,
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
            }
        })
        .await?;

    // サーバーが止まると送信側が破棄されてキューが閉じる。実行中の予約を待ってから終了する
    match consumer_handle.await? {
        Ok(()) => logger.info(COMPONENT, "Order consumer stopped", None, None),
        Err(e) => {
            logger.error(
                COMPONENT,
                &format!("Order consumer failed: {}", e),
                None,
                None,
            );
            return Err(e.into());
        }
    }

    Ok(())
}
