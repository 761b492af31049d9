use crate::error::ImportError;
use crate::models::{cell_at, Cell, Grid};
use std::collections::{BTreeMap, HashMap};

/// 默认表头识别关键字 (小写)
pub const DEFAULT_HEADER_TOKENS: &[&str] = &[
    "order id",
    "order/adjustment id",
    "statement date",
    "total settlement amount",
];

/// 默认只扫描前 50 行
pub const DEFAULT_SCAN_ROWS: usize = 50;

/// 结算表逻辑字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    OrderId,
    Sku,
    StatementDate,
    SettlementAmount,
    Quantity,
    Status,
    TrackingNumber,
    OrderCreatedDate,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::OrderId => "order_id",
            Field::Sku => "sku",
            Field::StatementDate => "statement_date",
            Field::SettlementAmount => "settlement_amount",
            Field::Quantity => "quantity",
            Field::Status => "status",
            Field::TrackingNumber => "tracking_number",
            Field::OrderCreatedDate => "order_created_date",
        }
    }
}

#[derive(Debug)]
struct AliasSpec {
    field: Field,
    aliases: &'static [&'static str],
}

/// 字段别名, 按顺序取第一个出现在表头中的
const ALIAS_SPECS: &[AliasSpec] = &[
    AliasSpec {
        field: Field::OrderId,
        aliases: &["order/adjustment id", "order id", "order_id", "order number"],
    },
    AliasSpec {
        field: Field::Sku,
        aliases: &["seller sku", "sku id", "sku", "sku_id"],
    },
    AliasSpec {
        field: Field::StatementDate,
        aliases: &["statement date", "settlement date", "statement_date"],
    },
    AliasSpec {
        field: Field::SettlementAmount,
        aliases: &[
            "total settlement amount",
            "settlement amount",
            "settlement_amount",
            "amount",
        ],
    },
    AliasSpec {
        field: Field::Quantity,
        aliases: &["quantity", "qty"],
    },
    AliasSpec {
        field: Field::Status,
        aliases: &["status", "order status", "payout status", "type"],
    },
    AliasSpec {
        field: Field::TrackingNumber,
        aliases: &["tracking id", "tracking number", "tracking_number"],
    },
    AliasSpec {
        field: Field::OrderCreatedDate,
        aliases: &[
            "order created time",
            "order created date",
            "order create time",
            "order_created_date",
        ],
    },
];

/// 表头定位结果
#[derive(Debug, Clone)]
pub struct HeaderLayout {
    /// 表头所在行 (0 起)
    pub row_index: usize,
    /// 列名 (小写去空格) → 列号
    pub columns: HashMap<String, usize>,
    fields: BTreeMap<Field, usize>,
}

impl HeaderLayout {
    pub fn column(&self, field: Field) -> Option<usize> {
        self.fields.get(&field).copied()
    }

    pub fn cell<'a>(&self, row: &'a [Cell], field: Field) -> &'a Cell {
        cell_at(row, self.column(field))
    }

    /// 字段名 → 原表头文本, 用于预览展示
    pub fn mapping(&self, header_row: &[Cell]) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter_map(|(field, idx)| {
                header_row
                    .get(*idx)
                    .and_then(Cell::as_text)
                    .map(|text| (field.name().to_string(), text.trim().to_string()))
            })
            .collect()
    }
}

fn normalize_header(text: &str) -> String {
    text.trim().to_lowercase()
}

fn row_signature(row: &[Cell]) -> String {
    row.iter()
        .filter_map(Cell::as_text)
        .map(normalize_header)
        .collect::<Vec<_>>()
        .join(" ")
}

fn column_map(row: &[Cell]) -> HashMap<String, usize> {
    let mut columns = HashMap::new();
    for (idx, cell) in row.iter().enumerate() {
        if let Some(text) = cell.as_text() {
            let key = normalize_header(text);
            if !key.is_empty() {
                columns.entry(key).or_insert(idx);
            }
        }
    }
    columns
}

fn resolve_fields(columns: &HashMap<String, usize>) -> BTreeMap<Field, usize> {
    let mut fields = BTreeMap::new();
    for spec in ALIAS_SPECS {
        if let Some(idx) = spec.aliases.iter().find_map(|alias| columns.get(*alias)) {
            fields.insert(spec.field, *idx);
        }
    }
    fields
}

/// 在前 `scan_rows` 行中寻找包含任一关键字的表头行
pub fn locate_header(
    grid: &Grid,
    tokens: &[String],
    scan_rows: usize,
) -> Result<HeaderLayout, ImportError> {
    let tokens: Vec<String> = tokens
        .iter()
        .map(|t| normalize_header(t))
        .filter(|t| !t.is_empty())
        .collect();

    let window = scan_rows.min(grid.len());
    let found = grid.iter().take(window).enumerate().find(|(_, row)| {
        let signature = row_signature(row);
        tokens.iter().any(|t| signature.contains(t.as_str()))
    });

    let Some((row_index, row)) = found else {
        tracing::warn!("前 {} 行中未找到表头 (关键字: {:?})", window, tokens);
        return Err(ImportError::header_not_found());
    };

    let columns = column_map(row);
    let fields = resolve_fields(&columns);
    if !fields.contains_key(&Field::OrderId) {
        tracing::warn!("第 {} 行表头缺少订单号列: {:?}", row_index + 1, columns.keys());
        return Err(ImportError::Structural(
            "order id column not found".to_string(),
        ));
    }

    tracing::info!(
        "表头位于第 {} 行, 识别字段: {:?}",
        row_index + 1,
        fields.keys().map(|f| f.name()).collect::<Vec<_>>()
    );

    Ok(HeaderLayout {
        row_index,
        columns,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> Vec<String> {
        DEFAULT_HEADER_TOKENS.iter().map(|t| t.to_string()).collect()
    }

    fn text_row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::text(c)).collect()
    }

    #[test]
    fn finds_floating_header_below_title_rows() {
        let grid = vec![
            text_row(&["Settlement report", "", ""]),
            text_row(&["Shop: demo", "", ""]),
            vec![Cell::Empty, Cell::Empty, Cell::Empty],
            text_row(&[" Order/Adjustment ID ", "SKU ID", "Total settlement amount"]),
            text_row(&["1001", "A", "10"]),
        ];

        let layout = locate_header(&grid, &tokens(), DEFAULT_SCAN_ROWS).unwrap();
        assert_eq!(layout.row_index, 3);
        assert_eq!(layout.column(Field::OrderId), Some(0));
        assert_eq!(layout.column(Field::Sku), Some(1));
        assert_eq!(layout.column(Field::SettlementAmount), Some(2));
        assert_eq!(layout.column(Field::StatementDate), None);
        assert_eq!(layout.columns.get("sku id"), Some(&1));

        let mapping = layout.mapping(&grid[3]);
        assert_eq!(mapping.get("order_id").map(String::as_str), Some("Order/Adjustment ID"));
    }

    #[test]
    fn header_outside_scan_window_is_not_found() {
        let mut grid: Grid = (0..5).map(|_| text_row(&["noise"])).collect();
        grid.push(text_row(&["Order ID", "SKU"]));

        let err = locate_header(&grid, &tokens(), 5).unwrap_err();
        assert!(matches!(err, ImportError::Structural(ref m) if m == "header not found"));

        let layout = locate_header(&grid, &tokens(), 6).unwrap();
        assert_eq!(layout.row_index, 5);
    }

    #[test]
    fn empty_grid_has_no_header() {
        let err = locate_header(&Vec::new(), &tokens(), DEFAULT_SCAN_ROWS).unwrap_err();
        assert!(matches!(err, ImportError::Structural(_)));
    }

    #[test]
    fn header_without_order_column_is_rejected() {
        let grid = vec![text_row(&["Statement date", "Amount"])];
        let err = locate_header(&grid, &tokens(), DEFAULT_SCAN_ROWS).unwrap_err();
        assert!(matches!(err, ImportError::Structural(ref m) if m == "order id column not found"));
    }

    #[test]
    fn first_duplicate_column_wins() {
        let grid = vec![text_row(&["Order ID", "Status", "Status"])];
        let layout = locate_header(&grid, &tokens(), DEFAULT_SCAN_ROWS).unwrap();
        assert_eq!(layout.column(Field::Status), Some(1));
    }
}
