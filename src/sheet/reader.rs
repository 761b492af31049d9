use crate::error::ImportError;
use crate::models::{Cell, Grid};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

/// 读取工作簿第一个工作表为矩形表格
///
/// 不信任工作表声明的 used-range: 逐个扫描有值的单元格, 用实际出现的最大行/列
/// 重新计算范围, 坐标按工作表绝对位置展开 (前导空行/空列保留为 Empty)。
pub fn read_grid(bytes: &[u8]) -> Result<Grid, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
        tracing::warn!("打开工作簿失败: {}", e);
        ImportError::unreadable_file()
    })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            tracing::warn!("读取工作表失败: {}", e);
            return Err(ImportError::unreadable_file());
        }
        None => {
            tracing::warn!("工作簿中没有工作表");
            return Err(ImportError::unreadable_file());
        }
    };

    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let grid = build_grid(
        range
            .used_cells()
            .map(|(r, c, data)| (r + row_offset, c + col_offset, cell_from_data(data))),
    );

    tracing::debug!(
        "工作表读取完成: {} 行 x {} 列",
        grid.len(),
        grid.first().map(Vec::len).unwrap_or(0)
    );
    Ok(grid)
}

/// 由 (行, 列, 值) 稀疏单元格构建矩形表格, 范围只取决于非空单元格
pub fn build_grid<I>(cells: I) -> Grid
where
    I: IntoIterator<Item = (usize, usize, Cell)>,
{
    let populated: Vec<(usize, usize, Cell)> = cells
        .into_iter()
        .filter(|(_, _, cell)| !cell.is_blank())
        .collect();

    let Some(max_row) = populated.iter().map(|(r, _, _)| *r).max() else {
        return Vec::new();
    };
    let max_col = populated.iter().map(|(_, c, _)| *c).max().unwrap_or(0);

    let mut grid = vec![vec![Cell::Empty; max_col + 1]; max_row + 1];
    for (r, c, cell) in populated {
        if let Some(slot) = grid.get_mut(r).and_then(|row| row.get_mut(c)) {
            *slot = cell;
        }
    }
    grid
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}
