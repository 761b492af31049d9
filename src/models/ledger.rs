use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 复合唯一键 (order_id, sku)
pub type PayoutKey = (String, String);

/// 销售明细 (sales_lines), 由订单导入流程写入, 本流程只回写 status
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SalesLine {
    pub id: i64,
    pub shop_id: String,
    pub order_id: String,
    pub sku: String,
    pub quantity: i32,
    pub revenue: BigDecimal,
    pub order_date: Option<NaiveDate>,
    pub order_status: String,
    pub status: String, // 回款状态
}

impl SalesLine {
    /// 对账查找键: 订单号 + 小写去空格 SKU
    pub fn match_key(&self) -> PayoutKey {
        (self.order_id.trim().to_string(), normalize_sku(&self.sku))
    }
}

/// 结算明细 (payout_lines)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PayoutLine {
    pub shop_id: String,
    pub order_id: String,
    pub sku: String,
    pub statement_date: Option<NaiveDate>,
    pub settlement_amount: BigDecimal,
    pub quantity: i32,
    pub status: String,
    pub tracking_number: String,
    pub created_at: DateTime<Utc>,
    pub order_created_date: Option<NaiveDate>,
}

impl PayoutLine {
    pub fn key(&self) -> PayoutKey {
        (self.order_id.clone(), self.sku.clone())
    }

    pub fn match_key(&self) -> PayoutKey {
        (self.order_id.clone(), normalize_sku(&self.sku))
    }

    /// 业务字段是否一致 (忽略 created_at)
    pub fn same_content(&self, other: &PayoutLine) -> bool {
        self.shop_id == other.shop_id
            && self.order_id == other.order_id
            && self.sku == other.sku
            && self.statement_date == other.statement_date
            && self.settlement_amount == other.settlement_amount
            && self.quantity == other.quantity
            && self.status == other.status
            && self.tracking_number == other.tracking_number
            && self.order_created_date == other.order_created_date
    }
}

/// 标准化后的结算行, 带原始表格行号 (1 起)
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPayout {
    pub row: usize,
    pub line: PayoutLine,
}

/// 回写销售明细状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSync {
    pub sales_line_id: i64,
    pub new_status: String,
}

pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn payout(amount: &str) -> PayoutLine {
        PayoutLine {
            shop_id: "shop-a".to_string(),
            order_id: "1001".to_string(),
            sku: "SKU-1".to_string(),
            statement_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            settlement_amount: BigDecimal::from_str(amount).unwrap(),
            quantity: 1,
            status: "Settled".to_string(),
            tracking_number: String::new(),
            created_at: Utc::now(),
            order_created_date: None,
        }
    }

    #[test]
    fn same_content_ignores_created_at_and_decimal_scale() {
        let a = payout("100");
        let mut b = payout("100.00");
        b.created_at = a.created_at - chrono::Duration::days(3);
        assert!(a.same_content(&b));

        let c = payout("100.01");
        assert!(!a.same_content(&c));
    }

    #[test]
    fn match_key_lowercases_sku() {
        let mut line = payout("1");
        line.sku = "  Sku-1 ".to_string();
        assert_eq!(line.match_key(), ("1001".to_string(), "sku-1".to_string()));
    }
}
