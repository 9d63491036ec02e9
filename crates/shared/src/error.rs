//! 基础设施错误
//!
//! 数据库、Kafka 与服务间 HTTP 调用的失败都归到 [`ShopError`]；
//! 两个服务各自的业务错误通过 `#[from]` 包住它，再决定对外的状态码。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("Kafka 错误: {0}")]
    Kafka(String),

    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("{service} 调用失败: {message}")]
    ExternalService { service: String, message: String },

    #[error("{service} 调用超时")]
    ExternalServiceTimeout { service: String },

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ShopError>;

impl ShopError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::ExternalServiceTimeout { .. } => "EXTERNAL_SERVICE_TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 数据存储、消息通道和对端服务的故障是瞬时的，重试可能成功；
    /// 其余错误重试也不会改变结果
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Kafka(_)
                | Self::ExternalService { .. }
                | Self::ExternalServiceTimeout { .. }
        )
    }
}
