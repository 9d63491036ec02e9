//! 商品服务同步查询客户端
//!
//! 下单前的存在性校验与价格快照。该调用只做提示性校验，不预留库存。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use shop_shared::contracts::ProductView;

use crate::error::{OrderError, Result};

/// 商品目录查询
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// 查询商品；不存在时返回 `ProductNotFound`
    async fn find_product(&self, product_id: i64) -> Result<ProductView>;
}

/// 基于 HTTP 的商品目录客户端
///
/// 每次调用都受客户端超时约束，超时映射为 `ProductServiceTimeout`。
pub struct HttpProductCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProductCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrderError::Internal(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn product_url(&self, product_id: i64) -> String {
        format!("{}/products/{}", self.base_url, product_id)
    }
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    async fn find_product(&self, product_id: i64) -> Result<ProductView> {
        let response = self
            .client
            .get(self.product_url(product_id))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OrderError::ProductServiceTimeout
                } else {
                    OrderError::ProductServiceUnavailable(e.to_string())
                }
            })?;

        match response.status() {
            s if s.is_success() => response.json::<ProductView>().await.map_err(|e| {
                if e.is_timeout() {
                    OrderError::ProductServiceTimeout
                } else {
                    OrderError::ProductServiceUnavailable(format!("响应解析失败: {e}"))
                }
            }),
            s if s == StatusCode::NOT_FOUND => Err(OrderError::ProductNotFound(product_id)),
            s => Err(OrderError::ProductServiceUnavailable(format!("HTTP {s}"))),
        }
    }
}
