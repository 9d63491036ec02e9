//! 订单服务
//!
//! 受理订单、投递订单事件，并接收商品服务回调的订单终态。

pub mod error;
pub mod models;
pub mod product_client;
pub mod publisher;
pub mod repository;
pub mod resender;
pub mod routes;
pub mod service;

pub use error::{OrderError, Result};
pub use service::OrderService;
