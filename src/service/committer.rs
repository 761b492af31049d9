use crate::db::LedgerStore;
use crate::error::ImportError;
use crate::models::{NormalizedPayout, PayoutKey, PayoutLine, StatusSync};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// 默认每批写入条数
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// 去重后的结算行 + 合并进来的原始行数
#[derive(Debug, Clone)]
pub struct DedupedLine {
    pub line: PayoutLine,
    pub rows: usize,
}

/// 按 (order_id, sku) 去重: 后出现的覆盖先出现的, 位置保持首次出现顺序
pub fn dedupe_by_key(records: Vec<NormalizedPayout>) -> IndexMap<PayoutKey, DedupedLine> {
    let mut deduped: IndexMap<PayoutKey, DedupedLine> = IndexMap::with_capacity(records.len());
    for record in records {
        deduped
            .entry(record.line.key())
            .and_modify(|d| {
                d.line = record.line.clone();
                d.rows += 1;
            })
            .or_insert(DedupedLine {
                line: record.line,
                rows: 1,
            });
    }
    deduped
}

/// 状态回写按目标销售明细去重, 后写覆盖
pub fn dedupe_status_syncs(syncs: Vec<StatusSync>) -> Vec<StatusSync> {
    let mut by_id: IndexMap<i64, String> = IndexMap::with_capacity(syncs.len());
    for sync in syncs {
        by_id.insert(sync.sales_line_id, sync.new_status);
    }
    by_id
        .into_iter()
        .map(|(sales_line_id, new_status)| StatusSync {
            sales_line_id,
            new_status,
        })
        .collect()
}

/// 提交结果 (行数按原始表格行计)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub imported: usize,
    pub unchanged: usize,
    /// 实际写入的去重后记录数
    pub rows_affected: u64,
    pub status_synced: usize,
}

/// 幂等写入: 去重 → 跳过未变化 → 分批 upsert → 状态回写
pub struct UpsertCommitter {
    store: Arc<dyn LedgerStore>,
    chunk_size: usize,
}

impl UpsertCommitter {
    pub fn new(store: Arc<dyn LedgerStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn commit(
        &self,
        accepted: Vec<NormalizedPayout>,
        status_syncs: Vec<StatusSync>,
        existing: &HashMap<PayoutKey, PayoutLine>,
    ) -> Result<CommitSummary, ImportError> {
        let accepted_rows = accepted.len();
        let deduped = dedupe_by_key(accepted);
        tracing::info!("去重: {} 行 → {} 条", accepted_rows, deduped.len());

        let mut summary = CommitSummary::default();
        let mut to_write: Vec<PayoutLine> = Vec::with_capacity(deduped.len());
        for (key, entry) in deduped {
            let same = existing
                .get(&key)
                .map_or(false, |stored| stored.same_content(&entry.line));
            if same {
                summary.unchanged += entry.rows;
            } else {
                summary.imported += entry.rows;
                to_write.push(entry.line);
            }
        }

        let total_chunks = to_write.len().div_ceil(self.chunk_size);
        for (idx, chunk) in to_write.chunks(self.chunk_size).enumerate() {
            let start = Instant::now();
            match self.store.upsert_payout_lines(chunk).await {
                Ok(affected) => {
                    summary.rows_affected += affected;
                    tracing::debug!(
                        "写入第 {}/{} 批, {} 条, 耗时: {:?}",
                        idx + 1,
                        total_chunks,
                        chunk.len(),
                        start.elapsed()
                    );
                }
                Err(e) => {
                    // 已提交的批次不回滚
                    tracing::error!(
                        "✗ 第 {}/{} 批写入失败, 已提交 {} 批 ({} 条): {}",
                        idx + 1,
                        total_chunks,
                        idx,
                        summary.rows_affected,
                        e
                    );
                    return Err(e.into());
                }
            }
        }

        let syncs = dedupe_status_syncs(status_syncs);
        for chunk in syncs.chunks(self.chunk_size) {
            let affected = self.store.update_sales_statuses(chunk).await?;
            summary.status_synced += affected as usize;
        }

        tracing::info!(
            "✓ 提交完成: 写入 {} 行, 未变化 {} 行, 状态回写 {} 条",
            summary.imported,
            summary.unchanged,
            summary.status_synced
        );
        Ok(summary)
    }
}
