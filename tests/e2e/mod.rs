//! 订单-库存 Saga 端到端测试
//!
//! 在同一进程内把订单服务和商品服务连起来：
//! - 商品查询直接调用商品服务业务层；
//! - 订单事件写入内存消息日志，由测试按需投递（或重复投递）给消费端；
//! - 状态回调直接调用订单服务业务层。
//!
//! 覆盖下单、扣减、重复投递、瞬时故障、回调丢失后的对账等全链路行为。

pub mod setup;
pub mod suites;

pub use setup::SagaHarness;
