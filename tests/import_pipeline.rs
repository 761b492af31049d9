use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use payout_recon_rust::models::{PayoutLine, SalesLine, StatusSync};
use payout_recon_rust::{
    FailureKind, ImportSettings, InMemoryLedgerStore, LedgerStore, PayoutImportService, StoreError,
};
use rust_xlsxwriter::Workbook;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

enum V {
    S(&'static str),
    N(f64),
    Blank,
}

const HEADER: [&str; 6] = [
    "Order/adjustment ID",
    "Statement date",
    "SKU ID",
    "Quantity",
    "Total settlement amount",
    "Status",
];

/// 标题行 + 空行 + 表头 (第 3 行) + 数据行 (第 4 行起)
fn payout_workbook(rows: &[Vec<V>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Payout report for January").unwrap();
    for (col, title) in HEADER.iter().enumerate() {
        sheet.write_string(2, col as u16, *title).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        let sheet_row = (r + 3) as u32;
        for (c, value) in row.iter().enumerate() {
            match value {
                V::S(text) => {
                    sheet.write_string(sheet_row, c as u16, *text).unwrap();
                }
                V::N(number) => {
                    sheet.write_number(sheet_row, c as u16, *number).unwrap();
                }
                V::Blank => {}
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

fn sales(shop_id: &str, order_id: &str, sku: &str, status: &str) -> SalesLine {
    SalesLine {
        id: 0,
        shop_id: shop_id.to_string(),
        order_id: order_id.to_string(),
        sku: sku.to_string(),
        quantity: 1,
        revenue: BigDecimal::from(100),
        order_date: NaiveDate::from_ymd_opt(2023, 12, 20),
        order_status: "Delivered".to_string(),
        status: status.to_string(),
    }
}

fn seeded_store() -> Arc<InMemoryLedgerStore> {
    let store = Arc::new(InMemoryLedgerStore::new());
    store.insert_sales_line(sales("shop-a", "1001", "SKU-A", "Pending"));
    store.insert_sales_line(sales("shop-a", "1001", "SKU-B", "Settled"));
    store.insert_sales_line(sales("shop-a", "1002", "SKU-C", ""));
    store.insert_sales_line(sales("shop-b", "2001", "SKU-Z", ""));
    store
}

fn service_for(store: Arc<InMemoryLedgerStore>) -> PayoutImportService {
    PayoutImportService::new(store, ImportSettings::default())
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn january_rows() -> Vec<Vec<V>> {
    vec![
        vec![V::S("1001"), V::N(45292.0), V::S("SKU-A"), V::N(1.0), V::N(100.5), V::S("Settled")],
        // 合并单元格续行
        vec![V::Blank, V::Blank, V::S("SKU-B"), V::N(2.0), V::N(20.0), V::S("Settled")],
        vec![V::S("1002"), V::S("2024/01/03"), V::S("SKU-C"), V::N(1.0), V::S("(5.00)"), V::Blank],
    ]
}

#[tokio::test]
async fn reimporting_the_same_file_writes_nothing() {
    let store = seeded_store();
    let service = service_for(store.clone());
    let bytes = payout_workbook(&january_rows());

    let first = service.import(&bytes, "shop-a").await;
    assert!(!first.aborted, "{:?}", first.errors);
    assert_eq!(first.total, 3);
    assert_eq!(first.imported, 3);
    assert_eq!(first.unchanged, 0);
    assert!(first.errors.is_empty());
    assert_eq!(first.status_synced, 1);
    assert!(first.is_balanced());

    let continuation = store.payout_line("1001", "SKU-B").unwrap();
    assert_eq!(continuation.statement_date, Some(ymd(2024, 1, 1)));
    assert_eq!(continuation.shop_id, "shop-a");
    let refund = store.payout_line("1002", "SKU-C").unwrap();
    assert_eq!(refund.statement_date, Some(ymd(2024, 1, 3)));
    assert_eq!(refund.settlement_amount, BigDecimal::from(-5));
    assert_eq!(
        store.payout_line("1001", "SKU-A").unwrap().settlement_amount,
        BigDecimal::from_str("100.5").unwrap()
    );

    let writes_after_first = store.write_count();
    let second = service.import(&bytes, "shop-a").await;
    assert_eq!(second.total, first.total);
    assert_eq!(second.imported, 0);
    assert_eq!(second.unchanged, first.imported);
    assert_eq!(second.status_synced, 0);
    assert!(second.errors.is_empty());
    assert!(second.is_balanced());
    assert_eq!(store.write_count(), writes_after_first);
    assert_eq!(store.payout_lines().len(), 3);
}

#[tokio::test]
async fn cross_shop_order_aborts_whole_batch() {
    let store = seeded_store();
    store.insert_sales_line(sales("shop-b", "X", "SKU-X", ""));
    store.insert_payout_line(PayoutLine {
        shop_id: "shop-a".to_string(),
        order_id: "X".to_string(),
        sku: "SKU-X".to_string(),
        statement_date: None,
        settlement_amount: BigDecimal::from(1),
        quantity: 1,
        status: String::new(),
        tracking_number: String::new(),
        created_at: Utc::now(),
        order_created_date: None,
    });
    let service = service_for(store.clone());

    let bytes = payout_workbook(&[
        vec![V::S("2001"), V::N(45292.0), V::S("SKU-Z"), V::N(1.0), V::N(3.0), V::Blank],
        vec![V::S("X"), V::N(45292.0), V::S("SKU-X"), V::N(1.0), V::N(9.0), V::Blank],
    ]);
    let report = service.import(&bytes, "shop-b").await;

    assert!(report.aborted);
    assert_eq!(report.failure, Some(FailureKind::Conflict));
    assert_eq!(report.imported, 0);
    assert_eq!(
        report.errors,
        vec!["order X exists under a different shop".to_string()]
    );
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.payout_line("X", "SKU-X").unwrap().shop_id, "shop-a");
    assert!(store.payout_line("2001", "SKU-Z").is_none());
}

#[tokio::test]
async fn row_errors_are_reported_and_other_rows_commit() {
    let store = seeded_store();
    let service = service_for(store.clone());

    let bytes = payout_workbook(&[
        vec![V::S("1001"), V::N(45292.0), V::S("SKU-A"), V::N(1.0), V::N(10.0), V::Blank],
        vec![V::S("2001"), V::N(45292.0), V::S("SKU-Z"), V::N(1.0), V::N(3.0), V::Blank],
        vec![V::Blank, V::Blank, V::Blank, V::Blank, V::Blank, V::S("note")],
        vec![V::S("9999"), V::N(45292.0), V::S("SKU-Q"), V::N(1.0), V::N(1.0), V::Blank],
    ]);
    let report = service.import(&bytes, "shop-a").await;

    assert!(!report.aborted);
    assert_eq!(report.total, 4);
    assert_eq!(report.imported, 1);
    assert_eq!(
        report.errors,
        vec![
            "Row 5 (order 2001, sku SKU-Z): shop mismatch (sales line belongs to shop shop-b)"
                .to_string(),
            "Row 6: missing order id".to_string(),
            "Row 7 (order 9999, sku SKU-Q): order/sku not found in sales ledger".to_string(),
        ]
    );
    assert!(report.is_balanced());
    assert!(store.payout_line("1001", "SKU-A").is_some());
    assert!(store.payout_line("2001", "SKU-Z").is_none());
}

#[tokio::test]
async fn duplicate_keys_collapse_to_last_value() {
    let store = seeded_store();
    let service = service_for(store.clone());

    let bytes = payout_workbook(&[
        vec![V::S("1001"), V::N(45292.0), V::S("SKU-A"), V::N(1.0), V::N(10.0), V::Blank],
        vec![V::S("1001"), V::N(45293.0), V::S("SKU-A"), V::N(1.0), V::N(30.0), V::Blank],
    ]);
    let report = service.import(&bytes, "shop-a").await;

    assert_eq!(report.total, 2);
    assert_eq!(report.imported, 2);
    assert!(report.is_balanced());
    let lines = store.payout_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].settlement_amount, BigDecimal::from(30));
    assert_eq!(lines[0].statement_date, Some(ymd(2024, 1, 2)));
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn status_sync_updates_sales_ledger() {
    let store = seeded_store();
    let service = service_for(store.clone());

    let bytes = payout_workbook(&[vec![
        V::S("1002"),
        V::N(45292.0),
        V::S("sku-c "),
        V::N(1.0),
        V::N(8.0),
        V::S("Refunded"),
    ]]);
    let report = service.import(&bytes, "shop-a").await;

    assert_eq!(report.imported, 1);
    assert_eq!(report.status_synced, 1);
    let ids = vec!["1002".to_string()];
    let sales_lines = store.sales_lines_by_order_ids(&ids).await.unwrap();
    assert_eq!(sales_lines[0].status, "Refunded");
}

#[tokio::test]
async fn missing_header_is_a_structural_abort() {
    let store = seeded_store();
    let service = service_for(store.clone());

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "nothing to see").unwrap();
    sheet.write_string(1, 0, "1001").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let report = service.import(&bytes, "shop-a").await;
    assert!(report.aborted);
    assert_eq!(report.failure, Some(FailureKind::Structural));
    assert_eq!(report.errors, vec!["header not found".to_string()]);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn header_below_scan_window_needs_wider_window() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "preamble").unwrap();
    sheet.write_string(60, 0, "Order ID").unwrap();
    sheet.write_string(60, 1, "SKU ID").unwrap();
    sheet.write_string(61, 0, "1001").unwrap();
    sheet.write_string(61, 1, "SKU-A").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let narrow = service_for(seeded_store());
    let report = narrow.import(&bytes, "shop-a").await;
    assert_eq!(report.errors, vec!["header not found".to_string()]);

    let settings = ImportSettings {
        header_scan_rows: 100,
        ..ImportSettings::default()
    };
    let wide = PayoutImportService::new(seeded_store(), settings);
    let report = wide.import(&bytes, "shop-a").await;
    assert!(!report.aborted, "{:?}", report.errors);
    assert_eq!(report.imported, 1);
}

#[tokio::test]
async fn header_without_rows_is_rejected() {
    let service = service_for(seeded_store());
    let bytes = payout_workbook(&[]);

    let report = service.import(&bytes, "shop-a").await;
    assert!(report.aborted);
    assert_eq!(report.errors, vec!["no data rows below header".to_string()]);
}

#[tokio::test]
async fn preview_parses_without_writing() {
    let store = seeded_store();
    let settings = ImportSettings {
        preview_rows: 2,
        ..ImportSettings::default()
    };
    let service = PayoutImportService::new(store.clone(), settings);
    let bytes = payout_workbook(&january_rows());

    let preview = service.preview(&bytes, "shop-a").unwrap();
    assert_eq!(preview.header_row, 3);
    assert_eq!(preview.total, 3);
    assert_eq!(preview.parsed, 3);
    assert_eq!(preview.skipped, 0);
    assert_eq!(preview.rows.len(), 2);
    assert_eq!(preview.rows[1].order_id, "1001");
    assert_eq!(
        preview.mapping.get("order_id").map(String::as_str),
        Some("Order/adjustment ID")
    );
    assert_eq!(
        preview.mapping.get("settlement_amount").map(String::as_str),
        Some("Total settlement amount")
    );
    assert_eq!(store.write_count(), 0);
    assert!(store.payout_lines().is_empty());
}

/// 读取正常, 写入一律超时
struct TimeoutOnWrite {
    inner: Arc<InMemoryLedgerStore>,
}

#[async_trait]
impl LedgerStore for TimeoutOnWrite {
    async fn payout_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<PayoutLine>, StoreError> {
        self.inner.payout_lines_by_order_ids(order_ids).await
    }

    async fn sales_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<SalesLine>, StoreError> {
        self.inner.sales_lines_by_order_ids(order_ids).await
    }

    async fn upsert_payout_lines(&self, _lines: &[PayoutLine]) -> Result<u64, StoreError> {
        Err(StoreError::Timeout {
            operation: "upsert_payout_lines",
            secs: 30,
        })
    }

    async fn update_sales_statuses(&self, _updates: &[StatusSync]) -> Result<u64, StoreError> {
        Err(StoreError::Timeout {
            operation: "update_sales_statuses",
            secs: 30,
        })
    }
}

#[tokio::test]
async fn store_failure_aborts_with_store_error() {
    let inner = seeded_store();
    let store = Arc::new(TimeoutOnWrite {
        inner: inner.clone(),
    });
    let service = PayoutImportService::new(store, ImportSettings::default());
    let bytes = payout_workbook(&january_rows());

    let report = service.import(&bytes, "shop-a").await;
    assert!(report.aborted);
    assert_eq!(report.failure, Some(FailureKind::Store));
    assert_eq!(report.imported, 0);
    assert_eq!(
        report.errors,
        vec!["store error: upsert_payout_lines timed out after 30s".to_string()]
    );
    assert!(inner.payout_lines().is_empty());

    let err = service.try_import(&bytes, "shop-a").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Store);
}

#[tokio::test]
async fn later_duplicate_row_decides_sales_status() {
    let store = seeded_store();
    let service = service_for(store.clone());

    let bytes = payout_workbook(&[
        vec![V::S("1001"), V::N(45292.0), V::S("SKU-B"), V::N(1.0), V::N(20.0), V::S("Pending")],
        vec![V::S("1001"), V::N(45292.0), V::S("SKU-B"), V::N(1.0), V::N(20.0), V::S("Settled")],
    ]);
    let report = service.import(&bytes, "shop-a").await;

    assert_eq!(report.imported, 2);
    assert_eq!(report.status_synced, 0);
    assert_eq!(store.payout_line("1001", "SKU-B").unwrap().status, "Settled");
    let ids = vec!["1001".to_string()];
    let sku_b = store
        .sales_lines_by_order_ids(&ids)
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.sku == "SKU-B")
        .unwrap();
    assert_eq!(sku_b.status, "Settled");
}

#[tokio::test]
async fn sku_case_variants_land_on_one_ledger_row() {
    let store = seeded_store();
    let service = service_for(store.clone());

    let bytes = payout_workbook(&[
        vec![V::S("1001"), V::N(45292.0), V::S("SKU-A"), V::N(1.0), V::N(10.0), V::Blank],
        vec![V::S("1001"), V::N(45292.0), V::S("sku-a"), V::N(1.0), V::N(30.0), V::Blank],
    ]);
    let report = service.import(&bytes, "shop-a").await;

    assert_eq!(report.imported, 2);
    assert!(report.errors.is_empty());
    let lines = store.payout_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].sku, "SKU-A");
    assert_eq!(lines[0].settlement_amount, BigDecimal::from(30));

    let again = service.import(&bytes, "shop-a").await;
    assert_eq!(again.imported, 0);
    assert_eq!(again.unchanged, 2);
    assert_eq!(store.payout_lines().len(), 1);
}

/// 第 N 次 upsert 调用失败, 其余照常写入
struct FailOnUpsertCall {
    inner: Arc<InMemoryLedgerStore>,
    fail_on: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl LedgerStore for FailOnUpsertCall {
    async fn payout_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<PayoutLine>, StoreError> {
        self.inner.payout_lines_by_order_ids(order_ids).await
    }

    async fn sales_lines_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<SalesLine>, StoreError> {
        self.inner.sales_lines_by_order_ids(order_ids).await
    }

    async fn upsert_payout_lines(&self, lines: &[PayoutLine]) -> Result<u64, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(StoreError::Timeout {
                operation: "upsert_payout_lines",
                secs: 30,
            });
        }
        self.inner.upsert_payout_lines(lines).await
    }

    async fn update_sales_statuses(&self, updates: &[StatusSync]) -> Result<u64, StoreError> {
        self.inner.update_sales_statuses(updates).await
    }
}

#[tokio::test]
async fn committed_chunks_survive_a_later_write_failure() {
    let inner = seeded_store();
    let failing = Arc::new(FailOnUpsertCall {
        inner: inner.clone(),
        fail_on: 2,
        calls: AtomicUsize::new(0),
    });
    let settings = ImportSettings {
        commit_chunk_size: 1,
        ..ImportSettings::default()
    };
    let service = PayoutImportService::new(failing, settings.clone());
    let bytes = payout_workbook(&january_rows());

    let report = service.import(&bytes, "shop-a").await;
    assert!(report.aborted);
    assert_eq!(report.failure, Some(FailureKind::Store));
    assert_eq!(report.imported, 0);
    let kept = inner.payout_lines();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].key(), ("1001".to_string(), "SKU-A".to_string()));
    // 状态回写在全部写入之后, 中途失败时不执行
    let ids = vec!["1001".to_string()];
    let sales_lines = inner.sales_lines_by_order_ids(&ids).await.unwrap();
    assert!(sales_lines.iter().any(|l| l.sku == "SKU-A" && l.status == "Pending"));

    let rerun = PayoutImportService::new(inner.clone(), settings);
    let report = rerun.import(&bytes, "shop-a").await;
    assert!(!report.aborted, "{:?}", report.errors);
    assert_eq!(report.total, 3);
    assert_eq!(report.imported, 2);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.status_synced, 1);
    assert!(report.is_balanced());
    assert_eq!(inner.payout_lines().len(), 3);
}
