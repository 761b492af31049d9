use crate::db::LedgerStore;
use crate::error::{ImportError, RowError};
use crate::models::{NormalizedPayout, PayoutKey, PayoutLine, RowIssue, SalesLine, StatusSync};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::sync::Arc;

/// 本批出现的订单号 (保序去重)
pub fn distinct_order_ids(records: &[NormalizedPayout]) -> IndexSet<String> {
    records.iter().map(|r| r.line.order_id.clone()).collect()
}

/// 跨店铺校验: 任一订单号已挂在其他店铺下即整批中止, 报告批内第一个冲突订单
pub fn check_cross_shop(
    order_ids: &IndexSet<String>,
    existing: &[PayoutLine],
    shop_id: &str,
) -> Result<(), ImportError> {
    let foreign: HashMap<&str, &str> = existing
        .iter()
        .filter(|line| line.shop_id != shop_id)
        .map(|line| (line.order_id.as_str(), line.shop_id.as_str()))
        .collect();

    match order_ids.iter().find(|id| foreign.contains_key(id.as_str())) {
        Some(order_id) => {
            tracing::warn!(
                "订单 {} 已属于店铺 {}, 目标店铺 {}, 整批中止",
                order_id,
                foreign[order_id.as_str()],
                shop_id
            );
            Err(ImportError::cross_shop(order_id))
        }
        None => Ok(()),
    }
}

/// 销售明细索引: (订单号, 小写 SKU) → 销售明细
#[derive(Debug, Default)]
pub struct SalesIndex {
    lines: HashMap<PayoutKey, SalesLine>,
}

impl SalesIndex {
    pub fn new(lines: Vec<SalesLine>) -> Self {
        let mut index = HashMap::with_capacity(lines.len());
        for line in lines {
            // 同键只保留第一条
            index.entry(line.match_key()).or_insert(line);
        }
        Self { lines: index }
    }

    pub fn get(&self, key: &PayoutKey) -> Option<&SalesLine> {
        self.lines.get(key)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// 逐行匹配结果
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub accepted: Vec<NormalizedPayout>,
    pub status_syncs: Vec<StatusSync>,
    pub errors: Vec<RowIssue>,
}

/// 逐行对账: 行错误只跳过当前行
///
/// 接受的行改用销售明细的 SKU 写入, 大小写/空格不同的重复行落到同一个键上。
/// 状态回写按销售明细取本批最后一个非空状态, 与账本一致的不回写。
pub fn match_records(records: Vec<NormalizedPayout>, index: &SalesIndex) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    // sales_line_id → (账本状态, 本批最后状态)
    let mut latest_status: IndexMap<i64, (String, String)> = IndexMap::new();

    for mut record in records {
        let Some(sales) = index.get(&record.line.match_key()) else {
            outcome
                .errors
                .push(RowIssue::for_line(record.row, &record.line, RowError::NotInSalesLedger));
            continue;
        };

        if sales.shop_id != record.line.shop_id {
            outcome.errors.push(RowIssue::for_line(
                record.row,
                &record.line,
                RowError::ShopMismatch {
                    ledger_shop: sales.shop_id.clone(),
                },
            ));
            continue;
        }

        // 空状态不覆盖账本
        if !record.line.status.is_empty() {
            latest_status.insert(sales.id, (sales.status.clone(), record.line.status.clone()));
        }
        record.line.sku = sales.sku.trim().to_string();
        outcome.accepted.push(record);
    }

    outcome.status_syncs = latest_status
        .into_iter()
        .filter(|(_, (current, latest))| current != latest)
        .map(|(sales_line_id, (_, new_status))| StatusSync {
            sales_line_id,
            new_status,
        })
        .collect();
    outcome
}

/// 对账结果 + 已存在的结算明细 (供提交阶段判断是否需要重写)
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub outcome: MatchOutcome,
    pub existing: HashMap<PayoutKey, PayoutLine>,
}

/// 对账服务: 跨店铺校验 → 查销售明细 → 逐行匹配
pub struct ReconciliationMatcher {
    store: Arc<dyn LedgerStore>,
}

impl ReconciliationMatcher {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(
        &self,
        shop_id: &str,
        records: Vec<NormalizedPayout>,
    ) -> Result<Reconciliation, ImportError> {
        let ordered = distinct_order_ids(&records);
        if ordered.is_empty() {
            return Ok(Reconciliation::default());
        }
        let order_ids: Vec<String> = ordered.iter().cloned().collect();
        tracing::info!("对账开始: {} 行, {} 个订单", records.len(), order_ids.len());

        // A. 跨店铺校验 (任何逐行逻辑之前)
        let existing_lines = self.store.payout_lines_by_order_ids(&order_ids).await?;
        check_cross_shop(&ordered, &existing_lines, shop_id)?;

        // B. 销售明细索引
        let sales_lines = self.store.sales_lines_by_order_ids(&order_ids).await?;
        let index = SalesIndex::new(sales_lines);
        tracing::debug!("销售明细索引: {} 条", index.len());

        // C. 逐行匹配
        let outcome = match_records(records, &index);
        tracing::info!(
            "对账完成: 接受 {} 行, 行错误 {} 行, 待回写状态 {} 条",
            outcome.accepted.len(),
            outcome.errors.len(),
            outcome.status_syncs.len()
        );

        let existing = existing_lines
            .into_iter()
            .map(|line| (line.key(), line))
            .collect();

        Ok(Reconciliation { outcome, existing })
    }
}
