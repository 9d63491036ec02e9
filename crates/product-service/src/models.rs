//! 商品服务领域模型
//!
//! 商品、扣减结果与幂等账本条目。所有枚举都支持数据库（sqlx）和 JSON（serde）序列化。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_shared::contracts::ProductView;
use shop_shared::events::OrderStatus;
use uuid::Uuid;
use validator::Validate;

/// 商品
///
/// `stock` 只能经由条件扣减修改，任何时刻都不小于 0。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// 单价（最小货币单位）
    pub price: i64,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// 对外暴露的查询视图
    pub fn view(&self) -> ProductView {
        ProductView {
            id: self.id,
            name: self.name.clone(),
            stock: self.stock,
            price: self.price,
        }
    }
}

/// 创建商品请求
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(length(min = 1, max = 200, message = "商品名称长度须在 1-200 之间"))]
    pub name: String,
    #[validate(range(min = 0, message = "价格不能为负数"))]
    pub price: i64,
    #[validate(range(min = 0, message = "初始库存不能为负数"))]
    pub stock: i64,
}

/// 创建商品响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProduct {
    pub id: i64,
}

/// 条件扣减结果
///
/// 三种结果均为终态：重投同一事件不会改变结论。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecrementOutcome {
    /// 扣减成功
    Decremented,
    /// 库存不足
    RejectedInsufficient,
    /// 商品不存在
    RejectedUnknownProduct,
}

impl DecrementOutcome {
    /// 扣减结果对应的订单终态
    pub fn order_status(&self) -> OrderStatus {
        match self {
            Self::Decremented => OrderStatus::Confirmed,
            Self::RejectedInsufficient | Self::RejectedUnknownProduct => OrderStatus::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decremented => "DECREMENTED",
            Self::RejectedInsufficient => "REJECTED_INSUFFICIENT",
            Self::RejectedUnknownProduct => "REJECTED_UNKNOWN_PRODUCT",
        }
    }
}

impl std::fmt::Display for DecrementOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 幂等账本条目
///
/// 以订单 ID 为主键，与库存变更在同一事务内写入。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub order_id: Uuid,
    pub product_id: i64,
    pub quantity: i64,
    pub outcome: DecrementOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// 一次订单事件处理的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyResult {
    pub outcome: DecrementOutcome,
    /// 账本中已有该订单的结论，本次未产生任何库存变更
    pub replayed: bool,
}

impl ApplyResult {
    pub fn applied(outcome: DecrementOutcome) -> Self {
        Self {
            outcome,
            replayed: false,
        }
    }

    pub fn replayed(outcome: DecrementOutcome) -> Self {
        Self {
            outcome,
            replayed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_maps_to_order_status() {
        assert_eq!(
            DecrementOutcome::Decremented.order_status(),
            OrderStatus::Confirmed
        );
        assert_eq!(
            DecrementOutcome::RejectedInsufficient.order_status(),
            OrderStatus::Failed
        );
        assert_eq!(
            DecrementOutcome::RejectedUnknownProduct.order_status(),
            OrderStatus::Failed
        );
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&DecrementOutcome::RejectedUnknownProduct).unwrap(),
            "\"REJECTED_UNKNOWN_PRODUCT\""
        );
        assert_eq!(
            DecrementOutcome::RejectedInsufficient.to_string(),
            "REJECTED_INSUFFICIENT"
        );
    }

    #[test]
    fn test_new_product_validation() {
        let valid = NewProduct {
            name: "键盘".to_string(),
            price: 100,
            stock: 20,
        };
        assert!(valid.validate().is_ok());

        let empty_name = NewProduct {
            name: String::new(),
            ..valid.clone()
        };
        assert!(empty_name.validate().is_err());

        let negative_stock = NewProduct {
            stock: -1,
            ..valid
        };
        assert!(negative_stock.validate().is_err());
    }
}
