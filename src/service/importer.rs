use crate::config::ImportConfig;
use crate::db::LedgerStore;
use crate::error::ImportError;
use crate::models::{ImportPreview, ImportReport, NormalizedPayout, RowIssue};
use crate::service::committer::{UpsertCommitter, DEFAULT_CHUNK_SIZE};
use crate::service::matcher::ReconciliationMatcher;
use crate::service::normalizer::{normalize_rows, RowContext};
use crate::sheet::{locate_header, read_grid, DEFAULT_HEADER_TOKENS, DEFAULT_SCAN_ROWS};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// 导入参数
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub header_tokens: Vec<String>,
    pub header_scan_rows: usize,
    pub commit_chunk_size: usize,
    pub preview_rows: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            header_tokens: DEFAULT_HEADER_TOKENS.iter().map(|t| t.to_string()).collect(),
            header_scan_rows: DEFAULT_SCAN_ROWS,
            commit_chunk_size: DEFAULT_CHUNK_SIZE,
            preview_rows: 10,
        }
    }
}

impl From<&ImportConfig> for ImportSettings {
    fn from(config: &ImportConfig) -> Self {
        Self {
            header_tokens: config.header_tokens.clone(),
            header_scan_rows: config.header_scan_rows,
            commit_chunk_size: config.commit_chunk_size,
            preview_rows: config.preview_rows,
        }
    }
}

/// 单次导入的中间状态, 报告返回后丢弃
#[derive(Debug)]
pub struct ImportBatch {
    pub shop_id: String,
    pub created_at: DateTime<Utc>,
    /// 表头行号 (1 起)
    pub header_row: usize,
    pub mapping: BTreeMap<String, String>,
    /// 表头之后的行数
    pub total: usize,
    pub records: Vec<NormalizedPayout>,
    pub issues: Vec<RowIssue>,
}

/// 结算单导入服务: 读取 → 表头 → 标准化 → 对账 → 写入 → 报告
pub struct PayoutImportService {
    settings: ImportSettings,
    matcher: ReconciliationMatcher,
    committer: UpsertCommitter,
}

impl PayoutImportService {
    pub fn new(store: Arc<dyn LedgerStore>, settings: ImportSettings) -> Self {
        Self {
            matcher: ReconciliationMatcher::new(store.clone()),
            committer: UpsertCommitter::new(store, settings.commit_chunk_size),
            settings,
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// 导入入口: 任何结果都返回报告, 致命错误转为中止报告
    pub async fn import(&self, bytes: &[u8], shop_id: &str) -> ImportReport {
        let started = Instant::now();
        tracing::info!("开始导入: 店铺 {}, 文件 {} 字节", shop_id, bytes.len());

        let batch = match self.prepare(bytes, shop_id) {
            Ok(batch) => batch,
            Err(e) => return abort(0, e),
        };

        let total = batch.total;
        let report = match self.commit_batch(batch).await {
            Ok(report) => report,
            Err(e) => return abort(total, e),
        };

        tracing::info!(
            "导入完成: 共 {} 行, 写入 {} 行, 未变化 {} 行, 跳过 {} 行, 状态回写 {} 条, 耗时: {:?}",
            report.total,
            report.imported,
            report.unchanged,
            report.skipped(),
            report.status_synced,
            started.elapsed()
        );
        report
    }

    /// 与 `import` 相同, 但把致命错误原样返回
    pub async fn try_import(&self, bytes: &[u8], shop_id: &str) -> Result<ImportReport, ImportError> {
        let batch = self.prepare(bytes, shop_id)?;
        self.commit_batch(batch).await
    }

    /// 只解析不写入, 供导入前确认列映射
    pub fn preview(&self, bytes: &[u8], shop_id: &str) -> Result<ImportPreview, ImportError> {
        let batch = self.prepare(bytes, shop_id)?;
        Ok(ImportPreview {
            header_row: batch.header_row,
            mapping: batch.mapping,
            total: batch.total,
            parsed: batch.records.len(),
            skipped: batch.issues.len(),
            errors: batch.issues.iter().map(ToString::to_string).collect(),
            rows: batch
                .records
                .into_iter()
                .take(self.settings.preview_rows)
                .map(|r| r.line)
                .collect(),
        })
    }

    /// 读取、定位表头、逐行标准化 (不访问账本)
    fn prepare(&self, bytes: &[u8], shop_id: &str) -> Result<ImportBatch, ImportError> {
        let shop_id = shop_id.trim();
        if shop_id.is_empty() {
            return Err(ImportError::InvalidInput("shop id is required".to_string()));
        }

        let grid = read_grid(bytes)?;
        let layout = locate_header(&grid, &self.settings.header_tokens, self.settings.header_scan_rows)?;
        if grid.len() <= layout.row_index + 1 {
            return Err(ImportError::Structural(
                "no data rows below header".to_string(),
            ));
        }

        let created_at = Utc::now();
        let ctx = RowContext {
            layout: &layout,
            shop_id,
            created_at,
        };
        let output = normalize_rows(&grid, &ctx);

        Ok(ImportBatch {
            shop_id: shop_id.to_string(),
            created_at,
            header_row: layout.row_index + 1,
            mapping: layout.mapping(&grid[layout.row_index]),
            total: output.scanned,
            records: output.records,
            issues: output.skips,
        })
    }

    async fn commit_batch(&self, batch: ImportBatch) -> Result<ImportReport, ImportError> {
        let ImportBatch {
            shop_id,
            total,
            records,
            mut issues,
            ..
        } = batch;

        let reconciliation = self.matcher.reconcile(&shop_id, records).await?;
        let outcome = reconciliation.outcome;
        let summary = self
            .committer
            .commit(outcome.accepted, outcome.status_syncs, &reconciliation.existing)
            .await?;

        issues.extend(outcome.errors);
        if !issues.is_empty() {
            tracing::warn!("店铺 {}: {} 行未导入", shop_id, issues.len());
        }

        Ok(ImportReport::completed(
            total,
            summary.imported,
            summary.unchanged,
            summary.status_synced,
            issues,
        ))
    }
}

fn abort(total: usize, error: ImportError) -> ImportReport {
    tracing::warn!("导入中止 ({:?}): {}", error.kind(), error);
    ImportReport::aborted(error.kind(), total, error.to_string())
}
