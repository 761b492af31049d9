use crate::models::{Cell, Grid, NormalizedPayout, PayoutLine, RowIssue};
use crate::sheet::coerce::{cell_to_amount, cell_to_date, cell_to_int, cell_to_string};
use crate::sheet::{Field, HeaderLayout};
use chrono::{DateTime, NaiveDate, Utc};

/// 逐行折叠状态: 上一个订单号与它的结算日期 (合并单元格向下填充)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldState {
    pub last_order_id: Option<String>,
    pub last_statement_date: Option<NaiveDate>,
}

/// 单行处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Record(NormalizedPayout),
    Skipped(RowIssue),
}

/// 行处理上下文 (整批不变)
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub layout: &'a HeaderLayout,
    pub shop_id: &'a str,
    pub created_at: DateTime<Utc>,
}

/// 标准化输出: 记录与跳过原因分开返回
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutput {
    /// 表头之后的行数
    pub scanned: usize,
    pub records: Vec<NormalizedPayout>,
    pub skips: Vec<RowIssue>,
}

/// 单步折叠: 输入上一状态与当前行, 返回新状态和本行结果
///
/// 订单号为空时, 只有金额或 SKU 非空的行才视为续行继承上一订单号;
/// 结算日期为空且订单号与上一行相同时继承上一行日期。
pub fn step(
    state: FoldState,
    row_number: usize,
    row: &[Cell],
    ctx: &RowContext<'_>,
) -> (FoldState, RowOutcome) {
    let layout = ctx.layout;

    let raw_order_id = cell_to_string(layout.cell(row, Field::OrderId));
    let is_continuation = !layout.cell(row, Field::SettlementAmount).is_blank()
        || !layout.cell(row, Field::Sku).is_blank();

    let order_id = if !raw_order_id.is_empty() {
        raw_order_id
    } else if is_continuation {
        match &state.last_order_id {
            Some(last) => last.clone(),
            None => String::new(),
        }
    } else {
        String::new()
    };

    if order_id.is_empty() {
        return (state, RowOutcome::Skipped(RowIssue::missing_order_id(row_number)));
    }

    let same_order = state.last_order_id.as_deref() == Some(order_id.as_str());
    let statement_date = match cell_to_date(layout.cell(row, Field::StatementDate)) {
        Some(date) => Some(date),
        None if same_order => state.last_statement_date,
        None => None,
    };

    let line = PayoutLine {
        shop_id: ctx.shop_id.to_string(),
        order_id: order_id.clone(),
        sku: cell_to_string(layout.cell(row, Field::Sku)),
        statement_date,
        settlement_amount: cell_to_amount(layout.cell(row, Field::SettlementAmount)),
        quantity: cell_to_int(layout.cell(row, Field::Quantity)),
        status: cell_to_string(layout.cell(row, Field::Status)),
        tracking_number: cell_to_string(layout.cell(row, Field::TrackingNumber)),
        created_at: ctx.created_at,
        order_created_date: cell_to_date(layout.cell(row, Field::OrderCreatedDate)),
    };

    let next = FoldState {
        last_order_id: Some(order_id),
        last_statement_date: statement_date,
    };
    (
        next,
        RowOutcome::Record(NormalizedPayout {
            row: row_number,
            line,
        }),
    )
}

/// 表头之后所有行单次正向折叠
pub fn normalize_rows(grid: &Grid, ctx: &RowContext<'_>) -> NormalizeOutput {
    let mut output = NormalizeOutput::default();
    let mut state = FoldState::default();

    for (idx, row) in grid.iter().enumerate().skip(ctx.layout.row_index + 1) {
        output.scanned += 1;
        let (next, outcome) = step(state, idx + 1, row, ctx);
        state = next;
        match outcome {
            RowOutcome::Record(record) => output.records.push(record),
            RowOutcome::Skipped(issue) => output.skips.push(issue),
        }
    }

    tracing::info!(
        "行标准化完成: 扫描 {} 行, 有效 {} 行, 跳过 {} 行",
        output.scanned,
        output.records.len(),
        output.skips.len()
    );
    output
}
