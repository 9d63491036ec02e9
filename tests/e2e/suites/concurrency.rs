//! 并发：大量订单争抢同一商品库存

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;

    use crate::SagaHarness;
    use product_service::models::DecrementOutcome;
    use shop_shared::events::OrderStatus;
    use shop_shared::kafka::Disposition;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_never_oversell() {
        let h = Arc::new(SagaHarness::new());
        let product_id = h.seed_product(10, 100).await;

        // 并发下单
        let handles: Vec<_> = (0..30)
            .map(|_| {
                let h = h.clone();
                tokio::spawn(async move { h.place_order(product_id, 1).await })
            })
            .collect();
        let order_ids: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();
        assert_eq!(h.events.len(), 30);

        // 多个消费者并发处理，且每条事件都被投递两次
        let handles: Vec<_> = (0..60)
            .map(|i| {
                let h = h.clone();
                tokio::spawn(async move { h.deliver(i % 30).await })
            })
            .collect();
        for joined in join_all(handles).await {
            assert_eq!(joined.unwrap(), Disposition::Ack);
        }
        h.flush_callbacks().await;

        assert_eq!(h.stock(product_id).await, 0);
        assert_eq!(h.inventory.ledger_len(), 30);

        let mut confirmed = 0;
        let mut failed = 0;
        for order_id in &order_ids {
            let entry = h.products.ledger_entry(*order_id).await.unwrap();
            match h.order_status(*order_id).await {
                OrderStatus::Confirmed => {
                    assert_eq!(entry.outcome, DecrementOutcome::Decremented);
                    confirmed += 1;
                }
                OrderStatus::Failed => {
                    assert_eq!(entry.outcome, DecrementOutcome::RejectedInsufficient);
                    failed += 1;
                }
                OrderStatus::Pending => panic!("订单 {order_id} 未得到结论"),
            }
        }
        assert_eq!(confirmed, 10);
        assert_eq!(failed, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_orders_on_different_products_are_independent() {
        let h = Arc::new(SagaHarness::new());
        let a = h.seed_product(3, 10).await;
        let b = h.seed_product(5, 20).await;

        for _ in 0..4 {
            h.place_order(a, 1).await;
            h.place_order(b, 1).await;
        }

        let handles: Vec<_> = (0..h.events.len())
            .map(|i| {
                let h = h.clone();
                tokio::spawn(async move { h.deliver(i).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        h.flush_callbacks().await;

        assert_eq!(h.stock(a).await, 0);
        assert_eq!(h.stock(b).await, 1);
    }
}
