//! 基础场景：下单成功、库存不足、重复投递、商品不存在

#[cfg(test)]
mod tests {
    use crate::SagaHarness;
    use order_service::error::OrderError;
    use order_service::models::CreateOrderRequest;
    use product_service::models::DecrementOutcome;
    use shop_shared::events::OrderStatus;
    use shop_shared::kafka::Disposition;

    #[tokio::test]
    async fn test_order_confirmed_after_successful_decrement() {
        let h = SagaHarness::new();
        let product_id = h.seed_product(20, 100).await;

        let resp = h
            .orders
            .create_order(CreateOrderRequest {
                user_id: 1,
                product_id,
                quantity: 1,
            })
            .await
            .unwrap();
        assert_eq!(resp.http_status, 201);
        assert_eq!(resp.status, OrderStatus::Pending);
        assert_eq!(h.order_status(resp.order_id).await, OrderStatus::Pending);

        // 事件按商品分区，携带下单时快照的价格
        assert_eq!(h.events.len(), 1);
        assert_eq!(h.events.key(0).unwrap(), product_id.to_string());
        let event = h.events.event(0).unwrap();
        assert_eq!(event.order_id, resp.order_id);
        assert_eq!(event.price, 100);

        assert_eq!(h.pump().await, vec![Disposition::Ack]);

        assert_eq!(h.stock(product_id).await, 19);
        let entry = h.products.ledger_entry(resp.order_id).await.unwrap();
        assert_eq!(entry.outcome, DecrementOutcome::Decremented);
        assert_eq!(h.order_status(resp.order_id).await, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_order_failed_when_stock_insufficient() {
        let h = SagaHarness::new();
        let product_id = h.seed_product(0, 100).await;

        // 下单只校验商品存在，不校验库存
        let order_id = h.place_order(product_id, 1).await;
        assert_eq!(h.order_status(order_id).await, OrderStatus::Pending);

        assert_eq!(h.pump().await, vec![Disposition::Ack]);

        assert_eq!(h.stock(product_id).await, 0);
        let entry = h.products.ledger_entry(order_id).await.unwrap();
        assert_eq!(entry.outcome, DecrementOutcome::RejectedInsufficient);
        assert_eq!(h.order_status(order_id).await, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_redelivery_after_confirmation_is_noop() {
        let h = SagaHarness::new();
        let product_id = h.seed_product(20, 100).await;
        let order_id = h.place_order(product_id, 1).await;
        h.pump().await;
        assert_eq!(h.order_status(order_id).await, OrderStatus::Confirmed);

        // 同一事件再投递两次
        assert_eq!(h.deliver(0).await, Disposition::Ack);
        assert_eq!(h.deliver(0).await, Disposition::Ack);
        assert_eq!(h.flush_callbacks().await, 2);

        assert_eq!(h.stock(product_id).await, 19);
        assert_eq!(h.inventory.ledger_len(), 1);
        assert_eq!(h.order_status(order_id).await, OrderStatus::Confirmed);

        // 第一次回调发生迁移，之后的重放回调都是空操作
        let transitions: Vec<bool> = h.notifier.responses().iter().map(|r| r.transitioned).collect();
        assert_eq!(transitions, vec![true, false, false]);
    }

    #[tokio::test]
    async fn test_unknown_product_rejected_synchronously() {
        let h = SagaHarness::new();

        let err = h
            .orders
            .create_order(CreateOrderRequest {
                user_id: 1,
                product_id: 999,
                quantity: 1,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::ProductNotFound(999)));
        assert_eq!(err.status_code().as_u16(), 404);
        assert!(h.orders_store.is_empty());
        assert!(h.events.is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected_synchronously() {
        let h = SagaHarness::new();
        let product_id = h.seed_product(5, 100).await;

        let err = h
            .orders
            .create_order(CreateOrderRequest {
                user_id: 1,
                product_id,
                quantity: 0,
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code().as_u16(), 400);
        assert!(h.orders_store.is_empty());
        assert!(h.events.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_status_never_changes() {
        let h = SagaHarness::new();
        let product_id = h.seed_product(0, 100).await;
        let order_id = h.place_order(product_id, 1).await;
        h.pump().await;
        assert_eq!(h.order_status(order_id).await, OrderStatus::Failed);

        // 重放旧事件沿用账本结论，订单仍为 FAILED
        h.deliver(0).await;
        h.flush_callbacks().await;

        let resp = h
            .orders
            .update_status(order_id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert!(!resp.transitioned);
        assert_eq!(resp.status, OrderStatus::Failed);
        assert_eq!(h.order_status(order_id).await, OrderStatus::Failed);
        assert_eq!(h.stock(product_id).await, 0);
    }
}
