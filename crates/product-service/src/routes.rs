//! 商品服务 HTTP 接口
//!
//! - `POST /products`：创建商品
//! - `GET /products/{id}`：订单服务下单前的同步校验
//! - `GET /ledger/{order_id}`：查询订单的扣减结论（审计）

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use shop_shared::contracts::ProductView;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CreatedProduct, LedgerEntry, NewProduct};
use crate::service::ProductService;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProductService>,
}

impl AppState {
    pub fn new(service: Arc<ProductService>) -> Self {
        Self { service }
    }
}

/// 构建商品服务路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/{id}", get(find_product))
        .route("/ledger/{order_id}", get(ledger_entry))
        .route("/health", get(health_check))
}

/// POST /products
async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<NewProduct>,
) -> Result<(StatusCode, Json<CreatedProduct>)> {
    let product = state.service.create_product(req).await?;
    Ok((StatusCode::CREATED, Json(CreatedProduct { id: product.id })))
}

/// GET /products/{id}
async fn find_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductView>> {
    let product = state.service.find_product(id).await?;
    Ok(Json(product.view()))
}

/// GET /ledger/{order_id}
async fn ledger_entry(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<LedgerEntry>> {
    Ok(Json(state.service.ledger_entry(order_id).await?))
}

/// 存活探针
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "product-service"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DecrementOutcome;
    use crate::repository::{InMemoryInventoryStore, InventoryStore};
    use axum::body::Body;
    use axum::http::Request;
    use shop_shared::events::OrderEvent;
    use tower::ServiceExt;

    fn create_test_app() -> (Router, Arc<InMemoryInventoryStore>) {
        let store = Arc::new(InMemoryInventoryStore::new());
        let service = Arc::new(ProductService::new(store.clone()));
        let app = api_routes().with_state(AppState::new(service));
        (app, store)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_find_product() {
        let (app, _store) = create_test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/products",
                serde_json::json!({"name": "机械键盘", "price": 100, "stock": 20}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/products/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let view: ProductView = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(
            view,
            ProductView {
                id,
                name: "机械键盘".to_string(),
                stock: 20,
                price: 100
            }
        );
    }

    #[tokio::test]
    async fn test_create_product_with_negative_stock_rejected() {
        let (app, _store) = create_test_app();

        let response = app
            .oneshot(post_json(
                "/products",
                serde_json::json!({"name": "x", "price": 1, "stock": -1}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_find_unknown_product_returns_404() {
        let (app, _store) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/products/999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["code"], "PRODUCT_NOT_FOUND");
        assert_eq!(json["retryable"], false);
    }

    #[tokio::test]
    async fn test_store_outage_returns_retryable_503() {
        let (app, store) = create_test_app();
        store.set_available(false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/products/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["retryable"], true);
    }

    #[tokio::test]
    async fn test_ledger_lookup() {
        let (app, store) = create_test_app();
        let event = OrderEvent {
            order_id: Uuid::now_v7(),
            product_id: 77,
            user_id: 1,
            quantity: 1,
            price: 100,
        };
        store.apply_order_event(&event).await.unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/ledger/{}", event.order_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let entry: LedgerEntry = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(entry.outcome, DecrementOutcome::RejectedUnknownProduct);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/ledger/{}", Uuid::now_v7()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
