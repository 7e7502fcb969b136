use anyhow::Result;
use sqlx::SqlitePool;

/// Create the metrics schema. Safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Company reference data
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stocks (
            symbol TEXT PRIMARY KEY,
            company_name TEXT,
            sector TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per (symbol, timeframe, calculation run)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stock_metrics (
            symbol TEXT NOT NULL,
            timeframe TEXT NOT NULL,
            calculated_at TEXT NOT NULL,
            beta REAL,
            volatility REAL,
            sharpe_ratio REAL,
            sortino_ratio REAL,
            max_drawdown REAL,
            total_return REAL,
            annualized_return REAL,
            momentum REAL,
            win_rate REAL,
            rsi_14 REAL,
            rsi_20 REAL,
            rsi_30 REAL,
            bb_position REAL,
            macd REAL,
            macd_signal REAL,
            macd_histogram REAL,
            atr REAL,
            atr_percent REAL,
            PRIMARY KEY (symbol, timeframe, calculated_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_stock_metrics_latest ON stock_metrics(symbol, timeframe, calculated_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
