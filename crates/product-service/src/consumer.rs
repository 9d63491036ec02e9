//! 订单事件消费
//!
//! 每条订单事件的处理结论：
//! - 账本已有结论：确认消息，重新回调订单服务（订单侧为空操作）；
//! - 扣减成功 / 库存不足 / 商品不存在：结论与扣减同事务落账，确认消息，回调订单终态；
//! - 数据存储瞬时故障：不确认，由消费循环退避后重新投递，不写账本；
//! - 无法解析或 quantity <= 0：确认并归档到死信 topic，不写账本。

use std::sync::Arc;

use shop_shared::config::AppConfig;
use shop_shared::dlq::{DeadLetterMessage, DeadLetterSink};
use shop_shared::error::ShopError;
use shop_shared::events::OrderEvent;
use shop_shared::kafka::{ConsumerMessage, Disposition, KafkaConsumer};
use shop_shared::observability::metrics;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::callback::StatusNotification;
use crate::service::ProductService;

/// 单条订单事件的处理器
#[derive(Clone)]
pub struct OrderEventHandler {
    service: Arc<ProductService>,
    dead_letters: Arc<dyn DeadLetterSink>,
    callbacks: mpsc::Sender<StatusNotification>,
    service_name: String,
}

impl OrderEventHandler {
    pub fn new(
        service: Arc<ProductService>,
        dead_letters: Arc<dyn DeadLetterSink>,
        callbacks: mpsc::Sender<StatusNotification>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            service,
            dead_letters,
            callbacks,
            service_name: service_name.into(),
        }
    }

    /// 处理一条消息并给出确认结论；任何单条消息都不会让消费循环退出
    pub async fn handle_message(&self, msg: ConsumerMessage) -> Disposition {
        let event = match Self::decode(&msg) {
            Ok(event) => event,
            Err(e) => {
                error!(
                    topic = %msg.topic,
                    partition = msg.partition,
                    offset = msg.offset,
                    error = %e,
                    "订单事件无法解析，永久拒绝"
                );
                metrics::record_order_event_processed("MALFORMED", false);
                self.dead_letter(&msg, e.to_string()).await;
                return Disposition::Ack;
            }
        };

        match self.service.apply_order_event(&event).await {
            Ok(result) => {
                self.enqueue_callback(StatusNotification {
                    order_id: event.order_id,
                    status: result.outcome.order_status(),
                })
                .await;
                Disposition::Ack
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    order_id = %event.order_id,
                    partition = msg.partition,
                    offset = msg.offset,
                    error = %e,
                    "数据存储暂不可用，消息将重新投递"
                );
                metrics::record_order_event_processed("RETRY", false);
                Disposition::Retry
            }
            Err(e) => {
                error!(
                    order_id = %event.order_id,
                    error = %e,
                    "订单事件处理出现永久错误，永久拒绝"
                );
                metrics::record_order_event_processed("MALFORMED", false);
                self.dead_letter(&msg, e.to_string()).await;
                Disposition::Ack
            }
        }
    }

    fn decode(msg: &ConsumerMessage) -> Result<OrderEvent, ShopError> {
        let event: OrderEvent = msg.deserialize_payload()?;
        event.validate()?;
        Ok(event)
    }

    async fn dead_letter(&self, msg: &ConsumerMessage, reason: String) {
        let letter = DeadLetterMessage::from_consumed(msg, reason, &self.service_name);
        if let Err(e) = self.dead_letters.archive(letter).await {
            error!(
                partition = msg.partition,
                offset = msg.offset,
                error = %e,
                "死信归档失败，消息仅保留在日志中"
            );
        }
    }

    async fn enqueue_callback(&self, notification: StatusNotification) {
        if self.callbacks.send(notification).await.is_err() {
            warn!(
                order_id = %notification.order_id,
                status = %notification.status,
                "回调队列已关闭，订单终态将由补发对账送达"
            );
        }
    }
}

/// Kafka 订单事件消费者
pub struct OrderEventConsumer {
    consumer: KafkaConsumer,
    handler: OrderEventHandler,
    config: AppConfig,
}

impl OrderEventConsumer {
    pub fn new(config: &AppConfig, handler: OrderEventHandler) -> Result<Self, ShopError> {
        let consumer = KafkaConsumer::new(&config.kafka)?;
        consumer.subscribe(&[config.kafka.order_events_topic.as_str()])?;

        Ok(Self {
            consumer,
            handler,
            config: config.clone(),
        })
    }

    /// 启动消费循环，直到收到关闭信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), ShopError> {
        let handler = self.handler;

        info!(
            topic = %self.config.kafka.order_events_topic,
            group = %self.config.kafka.consumer_group,
            "订单事件消费者已启动"
        );

        self.consumer
            .start(shutdown, self.config.saga.redelivery_policy(), move |msg| {
                let handler = handler.clone();
                async move { handler.handle_message(msg).await }
            })
            .await?;

        info!("订单事件消费循环已退出");
        Ok(())
    }
}
