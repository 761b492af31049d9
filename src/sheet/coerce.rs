//! 单元格 → 目标字段类型的显式转换
//!
//! 日期序列号统一采用 1900 日期系统: 序列号 0 = 1899-12-30
//! (等价于 Unix 纪元偏移 25569 天)。

use crate::models::Cell;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use std::str::FromStr;

/// 10000-01-01 对应的序列号, 超出视为非日期
const MAX_SERIAL: f64 = 2_958_466.0;

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%d.%m.%Y", "%d-%m-%Y", "%d %b %Y", "%b %d, %Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// 表格序列号 → 日期 (忽略小数部分的时间)
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial >= MAX_SERIAL {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_days(Days::new(serial.floor() as u64))
}

/// `YYYY-MM-DD` / `YYYY/MM/DD` 前缀 (允许后面跟时间)
fn parse_ymd_prefix(text: &str) -> Option<NaiveDate> {
    let first_token = text.split([' ', 'T']).next()?.trim();
    let parts: Vec<&str> = first_token.split(['-', '/']).collect();
    let [year, month, day] = parts.as_slice() else {
        return None;
    };
    let digits = |s: &str, min: usize, max: usize| {
        (min..=max).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
    };
    if !digits(*year, 4, 4) || !digits(*month, 1, 2) || !digits(*day, 1, 2) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// 文本日期解析, 无法识别返回 None
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(date) = parse_ymd_prefix(text) {
        return Some(date);
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }

    // 以文本形式存储的序列号
    text.parse::<f64>().ok().and_then(serial_to_date)
}

pub fn cell_to_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Number(n) => serial_to_date(*n),
        Cell::Text(s) => parse_date_text(s),
        Cell::Empty => None,
    }
}

/// 去空格字符串; 整数值的数字不带小数点
pub fn cell_to_string(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => s.trim().to_string(),
        Cell::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
            format!("{}", *n as i64)
        }
        Cell::Number(n) if n.is_finite() => n.to_string(),
        Cell::Number(_) | Cell::Empty => String::new(),
    }
}

/// 金额文本: 去掉货币符号/千分位, 括号表示负数
pub fn parse_amount_text(raw: &str) -> Option<BigDecimal> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    // 符号只看首尾: 括号, 货币符号前后的 '-', 或末尾 '-'
    let numeric_start = text.trim_start_matches(|c: char| {
        !(c.is_ascii_digit() || c == '-' || c == '(' || c == '.' || c == ',')
    });
    let negative = (text.starts_with('(') && text.ends_with(')'))
        || numeric_start.starts_with('-')
        || text.ends_with('-');

    // 只有一个逗号且后面是 1~2 位数字, 视为小数逗号
    let decimal_comma = !text.contains('.')
        && text.matches(',').count() == 1
        && text
            .rsplit(',')
            .next()
            .map(|tail| {
                let tail_digits = tail.chars().take_while(char::is_ascii_digit).count();
                (1..=2).contains(&tail_digits)
            })
            .unwrap_or(false);

    let digits: String = text
        .chars()
        .filter_map(|c| match c {
            '0'..='9' | '.' => Some(c),
            ',' if decimal_comma => Some('.'),
            _ => None,
        })
        .collect();
    if digits.is_empty() {
        return None;
    }

    let value = BigDecimal::from_str(&digits).ok()?;
    Some(if negative { -value } else { value })
}

/// 金额, 默认 0
pub fn cell_to_amount(cell: &Cell) -> BigDecimal {
    match cell {
        Cell::Number(n) if n.is_finite() => {
            BigDecimal::from_str(&n.to_string()).unwrap_or_else(|_| BigDecimal::zero())
        }
        Cell::Text(s) => parse_amount_text(s).unwrap_or_else(BigDecimal::zero),
        Cell::Number(_) | Cell::Empty => BigDecimal::zero(),
    }
}

/// 整数 (四舍五入), 默认 0
pub fn cell_to_int(cell: &Cell) -> i32 {
    let value = match cell {
        Cell::Number(n) if n.is_finite() => *n,
        Cell::Text(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().unwrap_or(0.0)
        }
        Cell::Number(_) | Cell::Empty => 0.0,
    };
    value.round() as i32
}
