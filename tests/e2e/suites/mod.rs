//! 测试套件

pub mod concurrency;
pub mod failure_recovery;
pub mod scenarios;
