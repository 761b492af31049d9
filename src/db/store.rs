use crate::db::queries;
use crate::error::StoreError;
use crate::models::{PayoutLine, SalesLine, StatusSync};
use async_trait::async_trait;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

/// 账本存储协作接口 (销售明细只读 + 状态回写, 结算明细 upsert)
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 按订单号集合查询已有结算明细 (跨店铺校验)
    async fn payout_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<PayoutLine>, StoreError>;

    /// 按订单号集合查询销售明细 (对账匹配)
    async fn sales_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<SalesLine>, StoreError>;

    /// 按 (order_id, sku) 批量 upsert, 返回影响行数
    async fn upsert_payout_lines(&self, lines: &[PayoutLine]) -> Result<u64, StoreError>;

    /// 批量回写销售明细 status, 返回影响行数
    async fn update_sales_statuses(&self, updates: &[StatusSync]) -> Result<u64, StoreError>;
}

/// PostgreSQL 实现
pub struct PgLedgerStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// 每次存储调用都带超时, 超时即整批失败 (不重试)
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!("✗ {} 执行失败: {:?}", operation, e);
                Err(StoreError::Database(e))
            }
            Err(_) => {
                tracing::error!("✗ {} 超时 (>{}秒)!", operation, self.timeout.as_secs());
                Err(StoreError::Timeout {
                    operation,
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn payout_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<PayoutLine>, StoreError> {
        self.bounded(
            "payout_lines_by_order_ids",
            queries::list_payout_lines_by_order_ids(&self.pool, order_ids),
        )
        .await
    }

    async fn sales_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<SalesLine>, StoreError> {
        self.bounded(
            "sales_lines_by_order_ids",
            queries::list_sales_lines_by_order_ids(&self.pool, order_ids),
        )
        .await
    }

    async fn upsert_payout_lines(&self, lines: &[PayoutLine]) -> Result<u64, StoreError> {
        self.bounded(
            "upsert_payout_lines",
            queries::upsert_payout_lines(&self.pool, lines),
        )
        .await
    }

    async fn update_sales_statuses(&self, updates: &[StatusSync]) -> Result<u64, StoreError> {
        self.bounded(
            "update_sales_statuses",
            queries::update_sales_statuses(&self.pool, updates),
        )
        .await
    }
}
