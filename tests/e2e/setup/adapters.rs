//! 替代 HTTP 与 Kafka 的进程内连接件

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use order_service::{
    error::OrderError, product_client::ProductCatalog, publisher::OrderEventPublisher,
    service::OrderService,
};
use parking_lot::Mutex;
use product_service::{error::ProductError, notifier::OrderStatusNotifier, service::ProductService};
use shop_shared::contracts::{ProductView, StatusUpdateResponse};
use shop_shared::dlq::{DeadLetterMessage, DeadLetterSink};
use shop_shared::error::ShopError;
use shop_shared::events::{OrderEvent, OrderStatus};
use shop_shared::kafka::{ConsumerMessage, topics};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// 商品查询：订单服务 -> 商品服务
// ---------------------------------------------------------------------------

pub struct LocalCatalog {
    products: Arc<ProductService>,
}

impl LocalCatalog {
    pub fn new(products: Arc<ProductService>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl ProductCatalog for LocalCatalog {
    async fn find_product(&self, product_id: i64) -> Result<ProductView, OrderError> {
        match self.products.find_product(product_id).await {
            Ok(product) => Ok(product.view()),
            Err(ProductError::ProductNotFound(id)) => Err(OrderError::ProductNotFound(id)),
            Err(e) => Err(OrderError::ProductServiceUnavailable(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// 消息通道：内存日志
// ---------------------------------------------------------------------------

/// 追加写的事件日志，模拟单分区 topic
///
/// `set_available(false)` 模拟 broker 不可达。
pub struct EventLog {
    records: Mutex<Vec<(String, Vec<u8>)>>,
    consumed: AtomicUsize,
    available: AtomicBool,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            consumed: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        }
    }
}

impl EventLog {
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn message(&self, index: usize) -> Option<ConsumerMessage> {
        self.records
            .lock()
            .get(index)
            .map(|(key, payload)| {
                ConsumerMessage::from_payload(topics::ORDER_EVENTS, Some(key), payload.clone())
            })
    }

    pub fn event(&self, index: usize) -> Option<OrderEvent> {
        self.message(index)
            .and_then(|m| m.deserialize_payload::<OrderEvent>().ok())
    }

    pub fn key(&self, index: usize) -> Option<String> {
        self.records.lock().get(index).map(|(key, _)| key.clone())
    }

    /// 取下一条未消费的消息并前移消费位置
    pub fn next_unconsumed(&self) -> Option<ConsumerMessage> {
        let index = self.consumed.load(Ordering::SeqCst);
        let message = self.message(index)?;
        self.consumed.store(index + 1, Ordering::SeqCst);
        Some(message)
    }
}

#[async_trait]
impl OrderEventPublisher for EventLog {
    async fn publish(&self, event: &OrderEvent) -> Result<(), ShopError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ShopError::Kafka("broker 不可达".to_string()));
        }
        let payload =
            serde_json::to_vec(event).map_err(|e| ShopError::Kafka(format!("序列化失败: {e}")))?;
        self.records.lock().push((event.partition_key(), payload));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 状态回调：商品服务 -> 订单服务
// ---------------------------------------------------------------------------

/// `set_available(false)` 模拟订单服务不可达
pub struct LocalNotifier {
    orders: Arc<OrderService>,
    available: AtomicBool,
    responses: Mutex<Vec<StatusUpdateResponse>>,
}

impl LocalNotifier {
    pub fn new(orders: Arc<OrderService>) -> Self {
        Self {
            orders,
            available: AtomicBool::new(true),
            responses: Mutex::new(Vec::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 已送达回调的响应
    pub fn responses(&self) -> Vec<StatusUpdateResponse> {
        self.responses.lock().clone()
    }
}

#[async_trait]
impl OrderStatusNotifier for LocalNotifier {
    async fn notify(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<StatusUpdateResponse, ShopError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ShopError::ExternalService {
                service: "order-service".to_string(),
                message: "connection refused".to_string(),
            });
        }

        let response = self
            .orders
            .update_status(order_id, status)
            .await
            .map_err(|e| match e {
                OrderError::OrderNotFound(id) => ShopError::NotFound {
                    entity: "Order".to_string(),
                    id: id.to_string(),
                },
                other => ShopError::ExternalService {
                    service: "order-service".to_string(),
                    message: other.to_string(),
                },
            })?;

        self.responses.lock().push(response.clone());
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// 死信
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingDeadLetters {
    letters: Mutex<Vec<DeadLetterMessage>>,
}

impl RecordingDeadLetters {
    pub fn letters(&self) -> Vec<DeadLetterMessage> {
        self.letters.lock().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetters {
    async fn archive(&self, message: DeadLetterMessage) -> Result<(), ShopError> {
        self.letters.lock().push(message);
        Ok(())
    }
}
