use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 导入中止原因分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Structural,
    Conflict,
    InvalidInput,
    Store,
}

/// 整批导入的致命错误 (任何一种都意味着本批零写入或终止写入)
#[derive(Debug, Error)]
pub enum ImportError {
    /// 文件无法读取 / 找不到表头 / 没有数据区
    #[error("{0}")]
    Structural(String),

    /// 订单号已挂在其他店铺下
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ImportError {
    pub fn unreadable_file() -> Self {
        Self::Structural("unreadable file".to_string())
    }

    pub fn header_not_found() -> Self {
        Self::Structural("header not found".to_string())
    }

    pub fn cross_shop(order_id: &str) -> Self {
        Self::Conflict(format!("order {} exists under a different shop", order_id))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Structural(_) => FailureKind::Structural,
            Self::Conflict(_) => FailureKind::Conflict,
            Self::InvalidInput(_) => FailureKind::InvalidInput,
            Self::Store(_) => FailureKind::Store,
        }
    }
}

/// 存储层错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
}

/// 行级错误: 只跳过当前行, 不影响同批其他行
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("missing order id")]
    MissingOrderId,

    #[error("order/sku not found in sales ledger")]
    NotInSalesLedger,

    #[error("shop mismatch (sales line belongs to shop {ledger_shop})")]
    ShopMismatch { ledger_shop: String },
}
