//! 商品服务
//!
//! 维护商品与库存，消费订单事件执行账本保护的条件扣减，并把扣减结论回调给订单服务。

pub mod callback;
pub mod consumer;
pub mod error;
pub mod ledger_gc;
pub mod models;
pub mod notifier;
pub mod repository;
pub mod routes;
pub mod service;

pub use error::{ProductError, Result};
pub use service::ProductService;
