//! 订单状态回调客户端
//!
//! 扣减结论落账后，商品服务通过 `POST /orders/{orderId}/status` 把订单推向终态。
//! 订单服务对已处于终态的订单返回 `transitioned = false`，重复回调是安全的。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use shop_shared::contracts::{StatusUpdateResponse, UpdateOrderStatusRequest};
use shop_shared::error::ShopError;
use shop_shared::events::OrderStatus;
use uuid::Uuid;

const ORDER_SERVICE: &str = "order-service";

/// 订单状态回调
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStatusNotifier: Send + Sync {
    async fn notify(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<StatusUpdateResponse, ShopError>;
}

/// 基于 HTTP 的回调实现
pub struct HttpOrderStatusNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderStatusNotifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ShopError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShopError::Internal(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn status_url(&self, order_id: Uuid) -> String {
        format!("{}/orders/{}/status", self.base_url, order_id)
    }
}

#[async_trait]
impl OrderStatusNotifier for HttpOrderStatusNotifier {
    async fn notify(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<StatusUpdateResponse, ShopError> {
        let response = self
            .client
            .post(self.status_url(order_id))
            .json(&UpdateOrderStatusRequest { status })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ShopError::ExternalServiceTimeout {
                        service: ORDER_SERVICE.to_string(),
                    }
                } else {
                    ShopError::ExternalService {
                        service: ORDER_SERVICE.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        match response.status() {
            s if s.is_success() => response.json::<StatusUpdateResponse>().await.map_err(|e| {
                ShopError::ExternalService {
                    service: ORDER_SERVICE.to_string(),
                    message: format!("响应解析失败: {e}"),
                }
            }),
            s if s == StatusCode::NOT_FOUND => Err(ShopError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }),
            s if s.is_client_error() => Err(ShopError::Validation(format!(
                "订单服务拒绝状态回调: HTTP {s}"
            ))),
            s => Err(ShopError::ExternalService {
                service: ORDER_SERVICE.to_string(),
                message: format!("HTTP {s}"),
            }),
        }
    }
}
