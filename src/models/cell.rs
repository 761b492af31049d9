/// 表格单元格 (只保留值, 样式/公式/错误值都已丢弃)
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

/// 按绝对行列坐标展开的矩形表格
pub type Grid = Vec<Vec<Cell>>;

pub static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// 文本单元格, 纯空白视为空
    pub fn text(value: &str) -> Self {
        let trimmed = value.trim().trim_start_matches('\u{feff}').trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => !n.is_finite(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// 越界列返回空单元格
pub fn cell_at(row: &[Cell], col: Option<usize>) -> &Cell {
    col.and_then(|c| row.get(c)).unwrap_or(&EMPTY_CELL)
}
