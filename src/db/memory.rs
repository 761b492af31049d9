use crate::db::LedgerStore;
use crate::error::StoreError;
use crate::models::{PayoutKey, PayoutLine, SalesLine, StatusSync};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// 内存账本 (`memory://`), 本地调试与测试使用
///
/// 与数据库实现保持同样的唯一键语义: (order_id, sku)。
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    payouts: DashMap<PayoutKey, PayoutLine>,
    sales: DashMap<i64, SalesLine>,
    next_sales_id: AtomicI64,
    writes: AtomicU64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一条销售明细, id 为 0 时自动分配; 返回 id
    pub fn insert_sales_line(&self, mut line: SalesLine) -> i64 {
        if line.id == 0 {
            line.id = self.next_sales_id.fetch_add(1, Ordering::SeqCst) + 1;
        } else {
            self.next_sales_id.fetch_max(line.id, Ordering::SeqCst);
        }
        let id = line.id;
        self.sales.insert(id, line);
        id
    }

    /// 直接写入结算明细 (不计入写次数)
    pub fn insert_payout_line(&self, line: PayoutLine) {
        self.payouts.insert(line.key(), line);
    }

    pub fn payout_line(&self, order_id: &str, sku: &str) -> Option<PayoutLine> {
        self.payouts
            .get(&(order_id.to_string(), sku.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn payout_lines(&self) -> Vec<PayoutLine> {
        let mut lines: Vec<PayoutLine> = self.payouts.iter().map(|e| e.value().clone()).collect();
        lines.sort_by(|a, b| a.key().cmp(&b.key()));
        lines
    }

    pub fn sales_line(&self, id: i64) -> Option<SalesLine> {
        self.sales.get(&id).map(|entry| entry.value().clone())
    }

    /// upsert 与状态回写实际改动的行数累计
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn payout_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<PayoutLine>, StoreError> {
        let wanted: HashSet<&str> = order_ids.iter().map(String::as_str).collect();
        let mut lines: Vec<PayoutLine> = self
            .payouts
            .iter()
            .filter(|e| wanted.contains(e.value().order_id.as_str()))
            .map(|e| e.value().clone())
            .collect();
        lines.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(lines)
    }

    async fn sales_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<SalesLine>, StoreError> {
        let wanted: HashSet<&str> = order_ids.iter().map(String::as_str).collect();
        let mut lines: Vec<SalesLine> = self
            .sales
            .iter()
            .filter(|e| wanted.contains(e.value().order_id.as_str()))
            .map(|e| e.value().clone())
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    async fn upsert_payout_lines(&self, lines: &[PayoutLine]) -> Result<u64, StoreError> {
        for line in lines {
            self.payouts
                .entry(line.key())
                .and_modify(|existing| {
                    let created_at = existing.created_at;
                    *existing = line.clone();
                    existing.created_at = created_at;
                })
                .or_insert_with(|| line.clone());
        }
        let affected = lines.len() as u64;
        self.writes.fetch_add(affected, Ordering::SeqCst);
        Ok(affected)
    }

    async fn update_sales_statuses(&self, updates: &[StatusSync]) -> Result<u64, StoreError> {
        let mut affected = 0u64;
        for update in updates {
            if let Some(mut line) = self.sales.get_mut(&update.sales_line_id) {
                if line.status != update.new_status {
                    line.status = update.new_status.clone();
                    affected += 1;
                }
            }
        }
        self.writes.fetch_add(affected, Ordering::SeqCst);
        Ok(affected)
    }
}
