//! 订单事件模型
//!
//! 定义订单服务与商品服务之间通过消息通道传递的线上格式，以及两端共用的订单状态枚举。
//! `OrderEvent` 是订单创建时刻的快照，消费端不能假设订单此时仍处于 PENDING。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ShopError;

// ---------------------------------------------------------------------------
// OrderStatus 订单状态
// ---------------------------------------------------------------------------

/// 订单状态
///
/// 只允许 PENDING -> CONFIRMED | FAILED，离开 PENDING 后不可再变更。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 已受理，等待库存扣减结果
    #[default]
    Pending,
    /// 库存扣减成功
    Confirmed,
    /// 库存不足或商品不存在
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "FAILED" => Ok(Self::Failed),
            other => Err(ShopError::Validation(format!("未知的订单状态: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderEvent 消息通道线上格式
// ---------------------------------------------------------------------------

/// 订单创建事件
///
/// JSON 编码为 `{orderId, productId, userId, quantity, price}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub product_id: i64,
    pub user_id: i64,
    pub quantity: i64,
    /// 下单时快照的单价（最小货币单位）
    pub price: i64,
}

impl OrderEvent {
    /// 分区键：同一商品的事件落在同一分区，由同一消费者顺序处理
    pub fn partition_key(&self) -> String {
        self.product_id.to_string()
    }

    /// 结构合法但语义无效的事件同样视为坏消息
    pub fn validate(&self) -> Result<(), ShopError> {
        if self.quantity <= 0 {
            return Err(ShopError::Validation(format!(
                "quantity 必须大于 0，实际为 {}",
                self.quantity
            )));
        }
        Ok(())
    }
}
