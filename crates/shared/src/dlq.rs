//! 死信队列
//!
//! 无法解析或语义无效的订单事件不会重试（重投也无法修复），而是确认后
//! 归档到死信 topic，保留原始负载和失败原因以便人工排查。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ShopError;
use crate::kafka::{ConsumerMessage, KafkaProducer};

/// 死信消息信封
///
/// 包装原始消息并附加来源位点与失败原因。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    /// 原始 topic
    pub source_topic: String,
    pub partition: i32,
    pub offset: i64,
    /// 原始消息 key
    pub key: Option<String>,
    /// 原始负载；非 UTF-8 字节以替换字符保留
    pub payload: String,
    /// 失败原因
    pub error: String,
    pub failed_at: DateTime<Utc>,
    /// 来源服务
    pub source_service: String,
}

impl DeadLetterMessage {
    pub fn from_consumed(
        msg: &ConsumerMessage,
        error: impl Into<String>,
        source_service: impl Into<String>,
    ) -> Self {
        Self {
            source_topic: msg.topic.clone(),
            partition: msg.partition,
            offset: msg.offset,
            key: msg.key.clone(),
            payload: String::from_utf8_lossy(&msg.payload).into_owned(),
            error: error.into(),
            failed_at: Utc::now(),
            source_service: source_service.into(),
        }
    }

    /// 死信消息的 key：沿用原始 key，缺失时使用来源位点
    pub fn routing_key(&self) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| format!("{}-{}-{}", self.source_topic, self.partition, self.offset))
    }
}

/// 死信归档目标
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn archive(&self, message: DeadLetterMessage) -> Result<(), ShopError>;
}

/// 基于 Kafka 的死信生产者
pub struct DlqProducer {
    producer: KafkaProducer,
    topic: String,
}

impl DlqProducer {
    pub fn new(producer: KafkaProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl DeadLetterSink for DlqProducer {
    async fn archive(&self, message: DeadLetterMessage) -> Result<(), ShopError> {
        let key = message.routing_key();
        self.producer.send_json(&self.topic, &key, &message).await?;

        warn!(
            dlq_topic = %self.topic,
            source_topic = %message.source_topic,
            partition = message.partition,
            offset = message.offset,
            error = %message.error,
            "消息已发送到死信队列"
        );
        Ok(())
    }
}
