//! 订单服务业务层
//!
//! 下单分两段：同步校验商品并以 PENDING 落库，随后异步投递订单事件；
//! 最终状态由商品服务的状态回调写入。

use std::sync::Arc;

use shop_shared::contracts::StatusUpdateResponse;
use shop_shared::events::OrderStatus;
use shop_shared::observability::metrics;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{OrderError, Result};
use crate::models::{CreateOrderRequest, CreateOrderResponse, Order, ResendReason};
use crate::product_client::ProductCatalog;
use crate::publisher::OrderEventPublisher;
use crate::repository::OrderStore;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn ProductCatalog>,
    publisher: Arc<dyn OrderEventPublisher>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn ProductCatalog>,
        publisher: Arc<dyn OrderEventPublisher>,
    ) -> Self {
        Self {
            store,
            catalog,
            publisher,
        }
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// 创建订单
    ///
    /// 商品校验失败时不落库、不投递。投递失败不影响受理结果，订单保持 PENDING 等待补发。
    #[instrument(
        skip(self, req),
        fields(user_id = req.user_id, product_id = req.product_id, quantity = req.quantity)
    )]
    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<CreateOrderResponse> {
        req.validate()?;

        let product = self.catalog.find_product(req.product_id).await?;

        let order = Order::pending(req.user_id, req.product_id, req.quantity, product.price);
        self.store.insert(&order).await?;
        info!(order_id = %order.id, price = order.price, "订单已受理");

        self.publish_and_record(&order).await;

        Ok(CreateOrderResponse {
            order_id: order.id,
            status: order.status,
            http_status: 201,
        })
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order> {
        self.store
            .get(id)
            .await?
            .ok_or(OrderError::OrderNotFound(id))
    }

    /// 写入订单终态
    ///
    /// 幂等且单调：订单已是终态时不做修改，返回 `transitioned = false`，不产生任何副作用。
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<StatusUpdateResponse> {
        if !status.is_terminal() {
            return Err(OrderError::InvalidStatusTarget(status));
        }

        let transition = self
            .store
            .transition(id, status)
            .await?
            .ok_or(OrderError::OrderNotFound(id))?;

        if transition.transitioned {
            metrics::record_order_status_transition(transition.status.as_str());
            info!(status = %transition.status, "订单状态已更新");
        } else if transition.status != status {
            warn!(
                current = %transition.status,
                requested = %status,
                "订单已处于其他终态，忽略状态回调"
            );
        }

        Ok(StatusUpdateResponse {
            order_id: id,
            status: transition.status,
            transitioned: transition.transitioned,
        })
    }

    /// 投递订单事件并记录结果，返回是否投递成功
    pub async fn publish_and_record(&self, order: &Order) -> bool {
        let event = order.to_event();

        match self.publisher.publish(&event).await {
            Ok(()) => {
                metrics::record_order_event_published(true);
                if let Err(e) = self.store.mark_published(order.id).await {
                    // 投递已成功，仅记录失败；补发扫描最多会多投递一次，由消费端账本去重
                    warn!(order_id = %order.id, error = %e, "记录投递时间失败");
                }
                true
            }
            Err(e) => {
                metrics::record_order_event_published(false);
                warn!(order_id = %order.id, error = %e, "订单事件投递失败，等待补发");
                if let Err(e) = self.store.record_publish_failure(order.id).await {
                    error!(order_id = %order.id, error = %e, "记录投递失败次数失败");
                }
                false
            }
        }
    }

    /// 补发一笔 PENDING 订单
    pub async fn republish(&self, order: &Order) -> bool {
        let reason = ResendReason::of(order);
        metrics::record_order_event_republished(reason.as_str());
        info!(
            order_id = %order.id,
            reason = reason.as_str(),
            attempts = order.publish_attempts,
            "补发订单事件"
        );
        self.publish_and_record(order).await
    }
}
