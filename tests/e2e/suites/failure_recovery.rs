//! 故障恢复：存储瞬时故障、broker 不可达、回调丢失、坏消息

#[cfg(test)]
mod tests {
    use crate::SagaHarness;
    use chrono::{Duration, Utc};
    use order_service::repository::OrderStore;
    use shop_shared::events::OrderStatus;
    use shop_shared::kafka::{ConsumerMessage, Disposition, topics};

    #[tokio::test]
    async fn test_transient_store_failure_is_redelivered() {
        let h = SagaHarness::new();
        let product_id = h.seed_product(20, 100).await;
        let order_id = h.place_order(product_id, 2).await;

        h.inventory.set_available(false);
        assert_eq!(h.deliver(0).await, Disposition::Retry);
        assert_eq!(h.inventory.ledger_len(), 0);
        assert_eq!(h.flush_callbacks().await, 0);
        h.inventory.set_available(true);

        // 消息通道重新投递同一条消息
        assert_eq!(h.deliver(0).await, Disposition::Ack);
        h.flush_callbacks().await;

        assert_eq!(h.stock(product_id).await, 18);
        assert_eq!(h.order_status(order_id).await, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_unpublished_order_is_resent_once_broker_recovers() {
        let h = SagaHarness::new();
        let product_id = h.seed_product(20, 100).await;

        h.events.set_available(false);
        let order_id = h.place_order(product_id, 1).await;
        assert!(h.events.is_empty());

        let order = h.orders.get_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.publish_attempts, 1);
        assert!(order.published_at.is_none());

        h.events.set_available(true);
        let resender = h.resender();

        // 未超过补发阈值
        assert_eq!(resender.run_once().await.unwrap().scanned, 0);

        h.orders_store
            .backdate(order_id, Utc::now() - Duration::minutes(1), None);
        let stats = resender.run_once().await.unwrap();
        assert_eq!(stats.published, 1);
        assert_eq!(h.events.len(), 1);

        h.pump().await;
        assert_eq!(h.stock(product_id).await, 19);
        assert_eq!(h.order_status(order_id).await, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_lost_callback_is_recovered_by_reconciliation() {
        let h = SagaHarness::new();
        let product_id = h.seed_product(20, 100).await;
        let order_id = h.place_order(product_id, 1).await;

        // 订单服务不可达，回调重试耗尽
        h.notifier.set_available(false);
        h.pump().await;
        assert_eq!(h.stock(product_id).await, 19);
        assert_eq!(h.order_status(order_id).await, OrderStatus::Pending);

        h.notifier.set_available(true);
        let published_at = h.orders_store.get(order_id).await.unwrap().unwrap().published_at;
        assert!(published_at.is_some());
        h.orders_store.backdate(
            order_id,
            Utc::now() - Duration::minutes(20),
            Some(Utc::now() - Duration::minutes(10)),
        );

        let stats = h.resender().run_once().await.unwrap();
        assert_eq!(stats.published, 1);

        // 重新投递命中账本，只重放回调，不再扣减
        h.pump().await;
        assert_eq!(h.stock(product_id).await, 19);
        assert_eq!(h.inventory.ledger_len(), 1);
        assert_eq!(h.order_status(order_id).await, OrderStatus::Confirmed);

        // 已有结论的订单不再补发
        assert_eq!(h.resender().run_once().await.unwrap().scanned, 0);
    }

    #[tokio::test]
    async fn test_order_outliving_the_ledger_is_not_decremented_twice() {
        let h = SagaHarness::new();
        let product_id = h.seed_product(20, 100).await;
        let order_id = h.place_order(product_id, 1).await;

        // 回调长期失败，订单停留在 PENDING
        h.notifier.set_available(false);
        h.pump().await;
        assert_eq!(h.stock(product_id).await, 19);
        assert_eq!(h.order_status(order_id).await, OrderStatus::Pending);

        // 超过补发窗口后账本条目被清理
        h.orders_store.backdate(
            order_id,
            Utc::now() - Duration::hours(25),
            Some(Utc::now() - Duration::hours(24)),
        );
        assert_eq!(
            h.products.purge_expired_ledger(Duration::seconds(-1)).await.unwrap(),
            1
        );
        assert_eq!(h.inventory.ledger_len(), 0);

        h.notifier.set_available(true);
        let stats = h.resender().run_once().await.unwrap();
        assert_eq!(stats.scanned, 0);
        assert_eq!(stats.published, 0);
        assert_eq!(stats.stranded, 1);
        assert_eq!(h.events.len(), 1);

        h.pump().await;
        assert_eq!(h.stock(product_id).await, 19);
        assert_eq!(h.order_status(order_id).await, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_malformed_message_is_dead_lettered() {
        let h = SagaHarness::new();

        let disposition = h
            .deliver_raw(ConsumerMessage::from_payload(
                topics::ORDER_EVENTS,
                Some("1"),
                br#"{"orderId":"not-a-uuid"}"#.to_vec(),
            ))
            .await;

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(h.inventory.ledger_len(), 0);
        assert_eq!(h.flush_callbacks().await, 0);

        let letters = h.dead_letters.letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].source_topic, topics::ORDER_EVENTS);
        assert_eq!(letters[0].source_service, "product-service");
    }
}
