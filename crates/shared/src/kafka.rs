//! 订单事件通道
//!
//! 至少一次投递：消费端只有在 handler 明确确认后才提交位点，
//! 瞬时故障时回退位点让同一条消息重新投递。

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::ShopError;
use crate::retry::RetryPolicy;

pub mod topics {
    /// 订单创建后投递的库存扣减事件，按 productId 分区
    pub const ORDER_EVENTS: &str = "shop.order.events";
    /// 无法解析的订单事件归档
    pub const DEAD_LETTER_QUEUE: &str = "shop.order.events.dlq";
}

/// 生产端投递确认的等待上限，超时的订单交由补发扫描
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// 脱离 rdkafka 借用生命周期的消息副本，可跨 await 交给 handler
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl ConsumerMessage {
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        Self {
            topic: msg.topic().to_owned(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg
                .key()
                .and_then(|k| std::str::from_utf8(k).ok())
                .map(str::to_owned),
            payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }
    }

    /// 不经过 broker 的消息，供进程内直接驱动 handler
    pub fn from_payload(topic: &str, key: Option<&str>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.to_owned(),
            partition: 0,
            offset: 0,
            key: key.map(str::to_owned),
            payload: payload.into(),
        }
    }

    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, ShopError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| ShopError::Kafka(format!("订单事件负载无法解析: {e}")))
    }
}

/// handler 对单条消息的处理结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 处理完成（含终态失败与已归档的坏消息），提交位点
    Ack,
    /// 瞬时故障，不提交位点，退避后重新投递
    Retry,
}

/// 幂等生产者，`acks=all`
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self, ShopError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", DELIVERY_TIMEOUT.as_millis().to_string())
            .create::<FutureProducer>()
            .map_err(|e| ShopError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self { producer })
    }

    /// 投递一条消息，返回 broker 确认的 (partition, offset)
    pub async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<(i32, i64), ShopError> {
        let (partition, offset) = self
            .producer
            .send(
                FutureRecord::to(topic).key(key).payload(payload),
                DELIVERY_TIMEOUT,
            )
            .await
            .map(|delivery| (delivery.partition, delivery.offset))
            .map_err(|(e, _)| ShopError::Kafka(format!("投递到 {topic} 失败: {e}")))?;

        debug!(topic, key, partition, offset, "broker 已确认");
        Ok((partition, offset))
    }

    pub async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(i32, i64), ShopError> {
        let payload =
            serde_json::to_vec(value).map_err(|e| ShopError::Kafka(format!("序列化失败: {e}")))?;
        self.send(topic, key, &payload).await
    }
}

/// 手动提交位点的消费者
///
/// 位点提交与否完全由 `start` 中 handler 返回的 [`Disposition`] 决定。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConfig) -> Result<Self, ShopError> {
        let consumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .create::<StreamConsumer>()
            .map_err(|e| ShopError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(
            brokers = %config.brokers,
            group = %config.consumer_group,
            "Kafka 消费者已初始化"
        );
        Ok(Self { consumer })
    }

    pub fn subscribe(&self, topics: &[&str]) -> Result<(), ShopError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| ShopError::Kafka(format!("订阅 {topics:?} 失败: {e}")))?;

        info!(?topics, "已订阅");
        Ok(())
    }

    /// 逐条消费直到关闭信号，同一分区内严格按位点顺序处理
    ///
    /// - `Disposition::Ack`：提交 offset + 1，消息不再投递。
    /// - `Disposition::Retry`：按 `redelivery` 退避后把分区位点回退到该消息，
    ///   由 broker 重新投递；回退失败时返回错误，保证不会越过未处理的消息提交位点。
    /// - 关闭信号变为 `true` 时退出循环，未确认的消息在重启后重新投递。
    pub async fn start<F, Fut>(
        self,
        mut shutdown: watch::Receiver<bool>,
        redelivery: RetryPolicy,
        handler: F,
    ) -> Result<(), ShopError>
    where
        F: Fn(ConsumerMessage) -> Fut,
        Fut: Future<Output = Disposition>,
    {
        use futures::StreamExt;

        let mut stream = std::pin::pin!(self.consumer.stream());
        // (topic, partition, offset) -> 已重投次数
        let mut attempts: HashMap<(String, i32, i64), u32> = HashMap::new();
        let mut poll_failures: u32 = 0;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，停止拉取订单事件");
                        break;
                    }
                }

                next = stream.next() => {
                    let msg = match next {
                        None => {
                            warn!("消息流已关闭");
                            break;
                        }
                        Some(Err(e)) => {
                            let delay = redelivery.delay_for_attempt(poll_failures);
                            poll_failures = poll_failures.saturating_add(1);
                            error!(
                                error = %e,
                                consecutive = poll_failures,
                                delay_ms = delay.as_millis() as u64,
                                "拉取消息失败，退避后重试"
                            );
                            if !pause(&mut shutdown, delay).await {
                                info!("退避期间收到关闭信号，停止拉取订单事件");
                                break;
                            }
                            continue;
                        }
                        Some(Ok(borrowed)) => {
                            poll_failures = 0;
                            ConsumerMessage::from_borrowed(&borrowed)
                        }
                    };

                    let slot = (msg.topic.clone(), msg.partition, msg.offset);

                    match handler(msg).await {
                        Disposition::Ack => {
                            attempts.remove(&slot);
                            self.commit(&slot.0, slot.1, slot.2);
                        }
                        Disposition::Retry => {
                            let attempt = attempts.entry(slot.clone()).or_insert(0);
                            let delay = redelivery.delay_for_attempt(*attempt);
                            *attempt = attempt.saturating_add(1);

                            warn!(
                                topic = %slot.0,
                                partition = slot.1,
                                offset = slot.2,
                                attempt = *attempt,
                                delay_ms = delay.as_millis() as u64,
                                "消息处理遇到瞬时故障，退避后重新投递"
                            );

                            if !pause(&mut shutdown, delay).await {
                                info!("退避期间收到关闭信号，消息将在重启后重新投递");
                                break;
                            }

                            self.consumer
                                .seek(&slot.0, slot.1, Offset::Offset(slot.2), SEEK_TIMEOUT)
                                .map_err(|e| ShopError::Kafka(format!("回退消费位点失败: {e}")))?;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// 提交 offset + 1；提交失败只记录日志，后续提交会覆盖该位点
    fn commit(&self, topic: &str, partition: i32, offset: i64) {
        let mut tpl = TopicPartitionList::new();
        if let Err(e) = tpl.add_partition_offset(topic, partition, Offset::Offset(offset + 1)) {
            error!(topic, partition, offset, error = %e, "构造提交位点失败");
            return;
        }

        if let Err(e) = self.consumer.commit(&tpl, CommitMode::Async) {
            error!(topic, partition, offset, error = %e, "提交消费位点失败");
        }
    }
}

/// 等待 `delay`；期间收到关闭信号（或关闭通道失效）时提前返回 `false`
async fn pause(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.wait_for(|stop| *stop) => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
