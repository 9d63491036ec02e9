//! 测试环境：两个服务的内存装配

mod adapters;

pub use adapters::{EventLog, LocalCatalog, LocalNotifier, RecordingDeadLetters};

use std::sync::Arc;
use std::time::Duration;

use order_service::{
    models::CreateOrderRequest, repository::InMemoryOrderStore, resender::ResendWorker,
    service::OrderService,
};
use product_service::{
    callback::{self, CallbackWorker, StatusNotification},
    consumer::OrderEventHandler,
    models::NewProduct,
    repository::InMemoryInventoryStore,
    service::ProductService,
};
use shop_shared::config::SagaConfig;
use shop_shared::events::OrderStatus;
use shop_shared::kafka::{ConsumerMessage, Disposition};
use shop_shared::retry::RetryPolicy;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

/// 两个服务及其连接件
pub struct SagaHarness {
    pub inventory: Arc<InMemoryInventoryStore>,
    pub products: Arc<ProductService>,
    pub orders_store: Arc<InMemoryOrderStore>,
    pub orders: Arc<OrderService>,
    pub events: Arc<EventLog>,
    pub notifier: Arc<LocalNotifier>,
    pub dead_letters: Arc<RecordingDeadLetters>,
    pub handler: OrderEventHandler,
    callback_worker: CallbackWorker,
    callbacks: Mutex<mpsc::Receiver<StatusNotification>>,
}

impl SagaHarness {
    pub fn new() -> Self {
        let inventory = Arc::new(InMemoryInventoryStore::new());
        let products = Arc::new(ProductService::new(inventory.clone()));

        let orders_store = Arc::new(InMemoryOrderStore::new());
        let events = Arc::new(EventLog::default());
        let orders = Arc::new(OrderService::new(
            orders_store.clone(),
            Arc::new(LocalCatalog::new(products.clone())),
            events.clone(),
        ));

        let notifier = Arc::new(LocalNotifier::new(orders.clone()));
        let dead_letters = Arc::new(RecordingDeadLetters::default());
        let (tx, rx) = callback::channel();
        let handler =
            OrderEventHandler::new(products.clone(), dead_letters.clone(), tx, "product-service");

        let callback_worker = CallbackWorker::new(notifier.clone(), fast_retry_policy());

        Self {
            inventory,
            products,
            orders_store,
            orders,
            events,
            notifier,
            dead_letters,
            handler,
            callback_worker,
            callbacks: Mutex::new(rx),
        }
    }

    /// 创建商品，返回商品 ID
    pub async fn seed_product(&self, stock: i64, price: i64) -> i64 {
        self.products
            .create_product(NewProduct {
                name: format!("商品-{}", Uuid::new_v4().simple()),
                price,
                stock,
            })
            .await
            .expect("创建商品失败")
            .id
    }

    /// 下单，返回订单 ID
    pub async fn place_order(&self, product_id: i64, quantity: i64) -> Uuid {
        self.orders
            .create_order(CreateOrderRequest {
                user_id: 1,
                product_id,
                quantity,
            })
            .await
            .expect("下单失败")
            .order_id
    }

    /// 把第 `index` 条已投递的事件交给消费端
    pub async fn deliver(&self, index: usize) -> Disposition {
        let message = self.events.message(index).expect("事件不存在");
        self.handler.handle_message(message).await
    }

    /// 投递一条任意消息
    pub async fn deliver_raw(&self, message: ConsumerMessage) -> Disposition {
        self.handler.handle_message(message).await
    }

    /// 按顺序投递尚未消费的全部事件，并送达产生的状态回调
    pub async fn pump(&self) -> Vec<Disposition> {
        let mut dispositions = Vec::new();
        while let Some(message) = self.events.next_unconsumed() {
            dispositions.push(self.handler.handle_message(message).await);
        }
        self.flush_callbacks().await;
        dispositions
    }

    /// 送达回调队列中的全部回调，返回成功条数
    pub async fn flush_callbacks(&self) -> usize {
        let mut rx = self.callbacks.lock().await;
        self.callback_worker.drain(&mut rx).await
    }

    pub async fn order_status(&self, order_id: Uuid) -> OrderStatus {
        self.orders
            .get_order(order_id)
            .await
            .expect("订单不存在")
            .status
    }

    pub async fn stock(&self, product_id: i64) -> i64 {
        self.products
            .find_product(product_id)
            .await
            .expect("商品不存在")
            .stock
    }

    /// 使用测试阈值构造补发 worker
    pub fn resender(&self) -> ResendWorker {
        ResendWorker::new(
            self.orders.clone(),
            &SagaConfig {
                resend_batch_size: 100,
                republish_after_secs: 30,
                reconcile_after_secs: 300,
                resend_horizon_hours: 24,
                ..Default::default()
            },
        )
    }
}

impl Default for SagaHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}
