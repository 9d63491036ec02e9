//! 商品服务错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shop_shared::error::ShopError;
use uuid::Uuid;

/// 商品服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("商品不存在: {0}")]
    ProductNotFound(i64),

    #[error("账本中没有订单记录: {0}")]
    LedgerEntryNotFound(Uuid),

    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("库存存储不可用: {0}")]
    StoreUnavailable(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Shared(#[from] ShopError),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ProductError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProductNotFound(_) | Self::LedgerEntryNotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
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
            Self::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            Self::LedgerEntryNotFound(_) => "LEDGER_ENTRY_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Shared(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为瞬时故障
    ///
    /// 消费端据此决定不确认消息、等待重投，且不写入幂等账本。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) | Self::Database(_) => true,
            Self::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "商品服务内部错误");
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

impl From<validator::ValidationErrors> for ProductError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ProductError>;
