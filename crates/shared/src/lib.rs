//! 共享库
//!
//! 包含商品服务与订单服务共用的配置、错误处理、数据库连接、Kafka、
//! 跨服务消息契约以及可观测性等基础设施代码。

pub mod config;
pub mod contracts;
pub mod database;
pub mod dlq;
pub mod error;
pub mod events;
pub mod kafka;
pub mod observability;
pub mod retry;
pub mod shutdown;
