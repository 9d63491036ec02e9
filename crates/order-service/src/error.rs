//! 订单服务错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shop_shared::error::ShopError;
use shop_shared::events::OrderStatus;
use uuid::Uuid;

/// 订单服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    // ==================== 请求错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("商品不存在: {0}")]
    ProductNotFound(i64),

    #[error("订单不存在: {0}")]
    OrderNotFound(Uuid),

    #[error("不允许将订单状态写为 {0}")]
    InvalidStatusTarget(OrderStatus),

    // ==================== 上游错误 ====================
    #[error("商品服务响应超时")]
    ProductServiceTimeout,

    #[error("商品服务不可用: {0}")]
    ProductServiceUnavailable(String),

    // ==================== 存储错误 ====================
    #[error("订单存储不可用: {0}")]
    StoreUnavailable(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Shared(#[from] ShopError),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl OrderError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidStatusTarget(_) => StatusCode::BAD_REQUEST,
            Self::ProductNotFound(_) | Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::ProductServiceTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::ProductServiceUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::StoreUnavailable(_) | Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Shared(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Shared(ShopError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Shared(ShopError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Shared(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::InvalidStatusTarget(_) => "INVALID_STATUS_TARGET",
            Self::ProductServiceTimeout => "PRODUCT_SERVICE_TIMEOUT",
            Self::ProductServiceUnavailable(_) => "PRODUCT_SERVICE_UNAVAILABLE",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Shared(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 客户端可重新提交的瞬时故障
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ProductServiceTimeout
            | Self::ProductServiceUnavailable(_)
            | Self::StoreUnavailable(_)
            | Self::Database(_) => true,
            Self::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "订单服务内部错误");
            "服务暂时不可用，请稍后重试".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "retryable": self.is_retryable(),
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for OrderError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, OrderError>;
