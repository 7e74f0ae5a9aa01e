use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::driver::request_dto::{
    CreateProductRequest, CreateUserRequest, PlaceOrderRequest, UpdateProductRequest,
    UpdateUserRequest,
};
use crate::adapter::driver::response_dto::{OrderAcceptedResponse, ProductResponse, UserResponse};
use crate::application::service::{
    ProductApplicationService, ProductQueryService, UserApplicationService, UserQueryService,
};
use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::message::OrderMessage;
use crate::domain::model::{ProductId, UserId};
use crate::domain::port::{OrderPublisher, ProductRepository, QueueError, UserRepository};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

fn api_error(status: StatusCode, code: &str, error: String) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error,
            code: code.to_string(),
        }),
    )
}

// アプリケーションサービスを含む状態
#[derive(Clone)]
pub struct AppState {
    pub product_service: Arc<ProductApplicationService>,
    pub product_query_service: Arc<ProductQueryService>,
    pub user_service: Arc<UserApplicationService>,
    pub user_query_service: Arc<UserQueryService>,
    pub order_publisher: Arc<dyn OrderPublisher>,
}

impl AppState {
    /// リポジトリとキューの送信側から状態を組み立てる
    pub fn new(
        product_repository: Arc<dyn ProductRepository>,
        user_repository: Arc<dyn UserRepository>,
        order_publisher: Arc<dyn OrderPublisher>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            product_service: Arc::new(ProductApplicationService::new(
                product_repository.clone(),
                store_timeout,
            )),
            product_query_service: Arc::new(ProductQueryService::new(
                product_repository,
                store_timeout,
            )),
            user_service: Arc::new(UserApplicationService::new(
                user_repository.clone(),
                store_timeout,
            )),
            user_query_service: Arc::new(UserQueryService::new(user_repository, store_timeout)),
            order_publisher,
        }
    }
}

// REST APIルーターを作成
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/users", get(get_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/products", get(get_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/orders", post(place_order))
}

// ヘルスチェックエンドポイント
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn parse_product_id(raw: &str) -> ApiResult<ProductId> {
    ProductId::from_string(raw).map_err(map_domain_error)
}

fn parse_user_id(raw: &str) -> ApiResult<UserId> {
    UserId::from_string(raw).map_err(map_domain_error)
}

// ユーザー一覧取得エンドポイント
async fn get_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state
        .user_query_service
        .get_all_users()
        .await
        .map_err(map_application_error)?;
    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

// ユーザー詳細取得エンドポイント
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user_id = parse_user_id(&id)?;
    match state
        .user_query_service
        .get_user_by_id(user_id)
        .await
        .map_err(map_application_error)?
    {
        Some(user) => Ok(Json(UserResponse::from_user(&user))),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            "USER_NOT_FOUND",
            format!("User not found: {}", user_id),
        )),
    }
}

// ユーザー作成エンドポイント
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = state
        .user_service
        .create_user(request.id.map(UserId::from_uuid), request.name, request.age)
        .await
        .map_err(map_application_error)?;
    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

// ユーザー更新エンドポイント
async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user_id = parse_user_id(&id)?;
    let user = state
        .user_service
        .update_user(user_id, request.name, request.age)
        .await
        .map_err(map_application_error)?;
    Ok(Json(UserResponse::from_user(&user)))
}

// ユーザー削除エンドポイント
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let user_id = parse_user_id(&id)?;
    state
        .user_service
        .delete_user(user_id)
        .await
        .map_err(map_application_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// 商品一覧取得エンドポイント
async fn get_products(State(state): State<AppState>) -> ApiResult<Json<Vec<ProductResponse>>> {
    let products = state
        .product_query_service
        .get_all_products()
        .await
        .map_err(map_application_error)?;
    Ok(Json(
        products.iter().map(ProductResponse::from_product).collect(),
    ))
}

// 商品詳細取得エンドポイント
async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProductResponse>> {
    let product_id = parse_product_id(&id)?;
    match state
        .product_query_service
        .get_product_by_id(product_id)
        .await
        .map_err(map_application_error)?
    {
        Some(product) => Ok(Json(ProductResponse::from_product(&product))),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            "PRODUCT_NOT_FOUND",
            format!("Product not found: {}", product_id),
        )),
    }
}

// 商品作成エンドポイント
async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<ProductResponse>)> {
    let product = state
        .product_service
        .create_product(
            request.id.map(ProductId::from_uuid),
            request.name,
            request.quantity,
        )
        .await
        .map_err(map_application_error)?;
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse::from_product(&product)),
    ))
}

// 商品更新エンドポイント
async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<Json<ProductResponse>> {
    let product_id = parse_product_id(&id)?;
    let product = state
        .product_service
        .update_product(product_id, request.name, request.quantity)
        .await
        .map_err(map_application_error)?;
    Ok(Json(ProductResponse::from_product(&product)))
}

// 商品削除エンドポイント
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let product_id = parse_product_id(&id)?;
    state
        .product_service
        .delete_product(product_id)
        .await
        .map_err(map_application_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// 注文投入エンドポイント
// 注文メッセージをキューに送るだけで、在庫の予約はコンシューマーが非同期に行う
async fn place_order(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderAcceptedResponse>)> {
    let message = OrderMessage::new(request.product_id, request.quantity, request.user_id);
    let body = message.to_vec().map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "SERIALIZATION_ERROR",
            e.to_string(),
        )
    })?;

    state
        .order_publisher
        .publish(body)
        .await
        .map_err(map_queue_error)?;

    Ok((StatusCode::ACCEPTED, Json(OrderAcceptedResponse::queued())))
}

// アプリケーションエラーをHTTPエラーにマッピング
fn map_application_error(err: ApplicationError) -> (StatusCode, Json<ApiError>) {
    match err {
        ApplicationError::DomainError(domain_err) => map_domain_error(domain_err),
        ApplicationError::RepositoryError(repo_err) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "REPOSITORY_ERROR",
            repo_err.to_string(),
        ),
        ApplicationError::NotFound(msg) => api_error(StatusCode::NOT_FOUND, "NOT_FOUND", msg),
    }
}

// ドメインエラーを適切なHTTPステータスコードとエラーコードにマッピング
fn map_domain_error(domain_err: DomainError) -> (StatusCode, Json<ApiError>) {
    let message = domain_err.to_string();
    match domain_err {
        DomainError::InvalidIdentifier(_) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_IDENTIFIER", message)
        }
        DomainError::InvalidQuantity(_) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_QUANTITY", message)
        }
        DomainError::InvalidValue(_) => api_error(StatusCode::BAD_REQUEST, "INVALID_VALUE", message),
        DomainError::InsufficientStock { .. } => {
            api_error(StatusCode::CONFLICT, "INSUFFICIENT_STOCK", message)
        }
    }
}

fn map_queue_error(err: QueueError) -> (StatusCode, Json<ApiError>) {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "QUEUE_UNAVAILABLE",
        err.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::port::RepositoryError;

    #[test]
    fn test_map_application_error_not_found() {
        let (status, Json(api_error)) =
            map_application_error(ApplicationError::NotFound("missing".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(api_error.code, "NOT_FOUND");
        assert_eq!(api_error.error, "missing");
    }

    #[test]
    fn test_map_application_error_repository_failure() {
        let (status, Json(api_error)) = map_application_error(ApplicationError::RepositoryError(
            RepositoryError::TimedOut("product lookup".to_string()),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.code, "REPOSITORY_ERROR");
    }

    #[test]
    fn test_malformed_identifier_is_bad_request() {
        let (status, Json(api_error)) = parse_product_id("65f0c0ffee").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(api_error.code, "INVALID_IDENTIFIER");
    }

    #[test]
    fn test_queue_failure_is_service_unavailable() {
        let (status, Json(api_error)) =
            map_queue_error(QueueError::PublishingFailed("closed".to_string()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api_error.code, "QUEUE_UNAVAILABLE");
    }
}
