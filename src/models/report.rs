use crate::error::{FailureKind, RowError};
use crate::models::PayoutLine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

/// 单行问题 (跳过原因或对账失败)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub row: usize,
    pub order_id: Option<String>,
    pub sku: Option<String>,
    pub error: RowError,
}

impl RowIssue {
    pub fn missing_order_id(row: usize) -> Self {
        Self {
            row,
            order_id: None,
            sku: None,
            error: RowError::MissingOrderId,
        }
    }

    pub fn for_line(row: usize, line: &PayoutLine, error: RowError) -> Self {
        Self {
            row,
            order_id: Some(line.order_id.clone()),
            sku: Some(line.sku.clone()),
            error,
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.order_id, &self.sku) {
            (Some(order_id), Some(sku)) => write!(
                f,
                "Row {} (order {}, sku {}): {}",
                self.row, order_id, sku, self.error
            ),
            _ => write!(f, "Row {}: {}", self.row, self.error),
        }
    }
}

/// 导入结果汇总, 无论成功/部分成功/中止都会返回给调用方
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total: usize,
    pub imported: usize,
    pub unchanged: usize,
    pub status_synced: usize,
    pub errors: Vec<String>,
    pub aborted: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure: Option<FailureKind>,
    #[serde(skip)]
    pub issues: Vec<RowIssue>,
}

impl ImportReport {
    /// 正常完成 (含部分成功), 行问题按行号排序
    pub fn completed(
        total: usize,
        imported: usize,
        unchanged: usize,
        status_synced: usize,
        mut issues: Vec<RowIssue>,
    ) -> Self {
        issues.sort_by_key(|i| i.row);
        Self {
            total,
            imported,
            unchanged,
            status_synced,
            errors: issues.iter().map(ToString::to_string).collect(),
            aborted: false,
            failure: None,
            issues,
        }
    }

    /// 整批中止: 零导入, 只有一条错误
    pub fn aborted(kind: FailureKind, total: usize, message: impl Into<String>) -> Self {
        Self {
            total,
            imported: 0,
            unchanged: 0,
            status_synced: 0,
            errors: vec![message.into()],
            aborted: true,
            failure: Some(kind),
            issues: Vec::new(),
        }
    }

    pub fn skipped(&self) -> usize {
        self.errors.len()
    }

    /// total = imported + unchanged + errors
    pub fn is_balanced(&self) -> bool {
        self.total == self.imported + self.unchanged + self.errors.len()
    }
}

/// 预览结果 (只解析, 不访问账本)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    pub header_row: usize,
    pub mapping: BTreeMap<String, String>,
    pub total: usize,
    pub parsed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub rows: Vec<PayoutLine>,
}

/// 导出错误清单到 CSV
pub fn export_errors_csv<W: Write>(report: &ImportReport, writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["row", "order_id", "sku", "message"])?;

    if report.issues.is_empty() {
        // 中止的报告没有行信息
        for message in &report.errors {
            writer.write_record(["", "", "", message.as_str()])?;
        }
    } else {
        for issue in &report.issues {
            writer.write_record(&[
                issue.row.to_string(),
                issue.order_id.clone().unwrap_or_default(),
                issue.sku.clone().unwrap_or_default(),
                issue.error.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}
