//! 订单事件投递

use async_trait::async_trait;
use shop_shared::error::ShopError;
use shop_shared::events::OrderEvent;
use shop_shared::kafka::KafkaProducer;
use tracing::debug;

/// 订单事件发布接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderEventPublisher: Send + Sync {
    /// 发布订单事件，返回成功即代表消息通道已持久化该事件
    async fn publish(&self, event: &OrderEvent) -> Result<(), ShopError>;
}

/// Kafka 实现，按商品 ID 分区
pub struct KafkaOrderEventPublisher {
    producer: KafkaProducer,
    topic: String,
}

impl KafkaOrderEventPublisher {
    pub fn new(producer: KafkaProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl OrderEventPublisher for KafkaOrderEventPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<(), ShopError> {
        let (partition, offset) = self
            .producer
            .send_json(&self.topic, &event.partition_key(), event)
            .await?;

        debug!(
            order_id = %event.order_id,
            topic = %self.topic,
            partition,
            offset,
            "订单事件已投递"
        );
        Ok(())
    }
}
