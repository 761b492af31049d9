use sqlx::PgPool;

/// 账本表结构, 可重复执行
const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS shops (
        id          TEXT PRIMARY KEY,
        owner_id    TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sales_lines (
        id            BIGSERIAL PRIMARY KEY,
        shop_id       TEXT NOT NULL,
        order_id      TEXT NOT NULL,
        sku           TEXT NOT NULL,
        quantity      INTEGER NOT NULL DEFAULT 0,
        revenue       NUMERIC NOT NULL DEFAULT 0,
        order_date    DATE,
        order_status  TEXT NOT NULL DEFAULT '',
        status        TEXT NOT NULL DEFAULT '',
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT uq_sales_lines_order_sku UNIQUE (order_id, sku)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payout_lines (
        shop_id             TEXT NOT NULL,
        order_id            TEXT NOT NULL,
        sku                 TEXT NOT NULL,
        statement_date      DATE,
        settlement_amount   NUMERIC NOT NULL DEFAULT 0,
        quantity            INTEGER NOT NULL DEFAULT 0,
        status              TEXT NOT NULL DEFAULT '',
        tracking_number     TEXT NOT NULL DEFAULT '',
        created_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
        order_created_date  DATE,
        updated_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT uq_payout_lines_order_sku UNIQUE (order_id, sku)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_payout_lines_shop ON payout_lines (shop_id)",
    "CREATE INDEX IF NOT EXISTS idx_sales_lines_shop ON sales_lines (shop_id)",
];

/// 建表 (auto_migrate 开启时启动执行)
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("账本表结构已就绪");
    Ok(())
}
