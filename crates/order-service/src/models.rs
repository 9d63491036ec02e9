//! 订单数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_shared::events::{OrderEvent, OrderStatus};
use uuid::Uuid;
use validator::Validate;

/// 订单
///
/// 创建后只有 `status` 和投递记录会变化；失败订单保留用于审计，不做物理删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// 下单时快照的单价，之后不再从商品服务重新读取
    pub price: i64,
    pub status: OrderStatus,
    /// 事件投递成功的时间，未投递时为空
    pub published_at: Option<DateTime<Utc>>,
    pub publish_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 以 PENDING 状态创建新订单
    pub fn pending(user_id: i64, product_id: i64, quantity: i64, price: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            product_id,
            quantity,
            price,
            status: OrderStatus::Pending,
            published_at: None,
            publish_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 投影为消息通道上的订单事件
    pub fn to_event(&self) -> OrderEvent {
        OrderEvent {
            order_id: self.id,
            product_id: self.product_id,
            user_id: self.user_id,
            quantity: self.quantity,
            price: self.price,
        }
    }
}

/// 创建订单请求
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub product_id: i64,
    #[validate(range(min = 1, message = "quantity 必须大于 0"))]
    pub quantity: i64,
}

/// 创建订单响应
///
/// 订单已受理并不代表库存已扣减，最终状态需通过 `GET /orders/{id}` 查询。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub http_status: u16,
}

/// 状态写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    /// 写入后的订单状态；未迁移时为订单原有的终态
    pub status: OrderStatus,
    /// 本次是否真正发生了 PENDING -> 终态的迁移
    pub transitioned: bool,
}

/// 补发原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendReason {
    /// 事件从未投递成功
    Unpublished,
    /// 已投递但长时间停留在 PENDING，重新投递触发商品服务重放回调
    Reconcile,
}

impl ResendReason {
    pub fn of(order: &Order) -> Self {
        if order.published_at.is_some() {
            Self::Reconcile
        } else {
            Self::Unpublished
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpublished => "unpublished",
            Self::Reconcile => "reconcile",
        }
    }
}
