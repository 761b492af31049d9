use crate::models::{PayoutLine, SalesLine, StatusSync};
use sqlx::PgPool;

/// 按订单号查询已有结算明细
pub async fn list_payout_lines_by_order_ids(
    pool: &PgPool,
    order_ids: &[String],
) -> Result<Vec<PayoutLine>, sqlx::Error> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, PayoutLine>(
        r#"
        SELECT shop_id, order_id, sku, statement_date, settlement_amount,
               quantity, status, tracking_number, created_at, order_created_date
        FROM payout_lines
        WHERE order_id = ANY($1)
        ORDER BY order_id, sku
        "#,
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await
}

/// 按订单号查询销售明细
pub async fn list_sales_lines_by_order_ids(
    pool: &PgPool,
    order_ids: &[String],
) -> Result<Vec<SalesLine>, sqlx::Error> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, SalesLine>(
        r#"
        SELECT id, shop_id, order_id, sku, quantity, revenue,
               order_date, order_status, status
        FROM sales_lines
        WHERE order_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await
}

/// 批量 upsert 结算明细
///
/// 冲突键 (order_id, sku); 已存在的行保留原 created_at。
/// 调用方需保证同一批内没有重复键 (PostgreSQL 不允许一条语句两次更新同一行)。
pub async fn upsert_payout_lines(
    pool: &PgPool,
    lines: &[PayoutLine],
) -> Result<u64, sqlx::Error> {
    if lines.is_empty() {
        return Ok(0);
    }

    tracing::debug!("开始构建批量 upsert 语句, {} 条记录", lines.len());
    let start_time = std::time::Instant::now();

    let mut query_builder = sqlx::QueryBuilder::new(
        "INSERT INTO payout_lines (
            shop_id, order_id, sku, statement_date, settlement_amount,
            quantity, status, tracking_number, created_at, order_created_date
        ) ",
    );

    query_builder.push_values(lines, |mut b, line| {
        b.push_bind(&line.shop_id)
            .push_bind(&line.order_id)
            .push_bind(&line.sku)
            .push_bind(line.statement_date)
            .push_bind(line.settlement_amount.clone())
            .push_bind(line.quantity)
            .push_bind(&line.status)
            .push_bind(&line.tracking_number)
            .push_bind(line.created_at)
            .push_bind(line.order_created_date);
    });

    query_builder.push(
        " ON CONFLICT (order_id, sku) DO UPDATE SET
            shop_id = EXCLUDED.shop_id,
            statement_date = EXCLUDED.statement_date,
            settlement_amount = EXCLUDED.settlement_amount,
            quantity = EXCLUDED.quantity,
            status = EXCLUDED.status,
            tracking_number = EXCLUDED.tracking_number,
            order_created_date = EXCLUDED.order_created_date,
            updated_at = now()",
    );

    tracing::debug!("SQL构建完成, 耗时: {:?}", start_time.elapsed());

    let execute_start = std::time::Instant::now();
    let result = query_builder.build().execute(pool).await?;
    tracing::info!(
        "✓ UPSERT执行成功, 影响 {} 行, 耗时: {:?}",
        result.rows_affected(),
        execute_start.elapsed()
    );
    Ok(result.rows_affected())
}

/// 批量回写销售明细 status (状态相同的行不更新)
pub async fn update_sales_statuses(
    pool: &PgPool,
    updates: &[StatusSync],
) -> Result<u64, sqlx::Error> {
    if updates.is_empty() {
        return Ok(0);
    }

    let ids: Vec<i64> = updates.iter().map(|u| u.sales_line_id).collect();
    let statuses: Vec<String> = updates.iter().map(|u| u.new_status.clone()).collect();

    let result = sqlx::query(
        r#"
        UPDATE sales_lines AS s
        SET status = u.status,
            updated_at = now()
        FROM UNNEST($1::bigint[], $2::text[]) AS u(id, status)
        WHERE s.id = u.id
          AND s.status IS DISTINCT FROM u.status
        "#,
    )
    .bind(&ids)
    .bind(&statuses)
    .execute(pool)
    .await?;

    tracing::info!("✓ 销售明细状态回写 {} 行", result.rows_affected());
    Ok(result.rows_affected())
}
