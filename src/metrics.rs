//! Technical metrics lookup.
//!
//! The core treats metrics as an opaque JSON object and never interprets
//! the values; it only needs to know whether a symbol exists and, if the
//! store knows it, the company name (used to derive filename aliases).
//! Screener consumers additionally get symbol search and a metrics screen.

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::MetricsConfig;
use crate::db;
use crate::error::StoreError;

/// Metrics passed through to callers untouched.
pub type TechnicalMetrics = serde_json::Map<String, Value>;

/// Analysis windows the screener computes metrics for.
pub const TIMEFRAMES: &[&str] = &["short", "medium", "long"];

/// Read-only source of per-symbol technical metrics.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Latest metrics for `symbol`. `timeframe` overrides the store's default.
    async fn get_metrics(
        &self,
        symbol: &str,
        timeframe: Option<&str>,
    ) -> Result<TechnicalMetrics, StoreError>;

    async fn resolve_company_name(&self, symbol: &str) -> Result<String, StoreError>;

    /// Stocks whose symbol or company name contains `pattern`, by symbol.
    async fn search_stocks(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<StockListing>, StoreError>;

    /// Latest metrics rows that pass every filter in `criteria`, best Sharpe ratio first.
    async fn screen_stocks(
        &self,
        criteria: &ScreenCriteria,
    ) -> Result<Vec<ScreenedStock>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockListing {
    pub symbol: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
}

/// Filters for [`MetricsStore::screen_stocks`]. Unset bounds do not filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenCriteria {
    /// Exact sector name, case-insensitive.
    pub sector: Option<String>,
    /// Defaults to the store's configured timeframe.
    pub timeframe: Option<String>,
    pub min_sharpe_ratio: Option<f64>,
    pub max_volatility: Option<f64>,
    /// Bounds on 14-period RSI.
    pub min_rsi: Option<f64>,
    pub max_rsi: Option<f64>,
    pub limit: usize,
}

impl Default for ScreenCriteria {
    fn default() -> Self {
        Self {
            sector: None,
            timeframe: None,
            min_sharpe_ratio: None,
            max_volatility: None,
            min_rsi: None,
            max_rsi: None,
            limit: 20,
        }
    }
}

impl ScreenCriteria {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.limit == 0 {
            bail!("invalid criteria: limit must be >= 1");
        }
        if let Some(tf) = &self.timeframe {
            if !TIMEFRAMES.contains(&tf.as_str()) {
                bail!(
                    "invalid criteria: timeframe '{}' must be short, medium, or long",
                    tf
                );
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_rsi, self.max_rsi) {
            if lo > hi {
                bail!("invalid criteria: min_rsi {} is above max_rsi {}", lo, hi);
            }
        }
        Ok(())
    }
}

/// One row of screen output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenedStock {
    pub symbol: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub timeframe: String,
    pub calculated_at: String,
    pub sharpe_ratio: Option<f64>,
    pub volatility: Option<f64>,
    pub total_return: Option<f64>,
    pub rsi_14: Option<f64>,
    pub beta: Option<f64>,
    pub max_drawdown: Option<f64>,
}

/// Numeric columns of `stock_metrics`, in schema order.
const METRIC_COLUMNS: &[&str] = &[
    "beta",
    "volatility",
    "sharpe_ratio",
    "sortino_ratio",
    "max_drawdown",
    "total_return",
    "annualized_return",
    "momentum",
    "win_rate",
    "rsi_14",
    "rsi_20",
    "rsi_30",
    "bb_position",
    "macd",
    "macd_signal",
    "macd_histogram",
    "atr",
    "atr_percent",
];

/// Store backed by the screener's SQLite database.
pub struct SqliteMetricsStore {
    pool: SqlitePool,
    timeframe: String,
}

impl SqliteMetricsStore {
    pub fn new(pool: SqlitePool, timeframe: impl Into<String>) -> Self {
        Self {
            pool,
            timeframe: timeframe.into(),
        }
    }

    /// Connect to an existing database at `db_path`.
    ///
    /// A missing file is an error rather than a fresh empty store; the
    /// schema is created only by `stx init`.
    pub async fn open(config: &MetricsConfig) -> anyhow::Result<Self> {
        let pool = db::connect_existing(&config.db_path).await?;
        Ok(Self::new(pool, config.timeframe.clone()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn optional_string(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

/// `%pattern%` for a LIKE clause with `\` as the escape character.
fn like_pattern(pattern: &str) -> String {
    let mut out = String::from("%");
    for c in pattern.trim().to_uppercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn screened_from_row(row: &SqliteRow) -> Result<ScreenedStock, sqlx::Error> {
    Ok(ScreenedStock {
        symbol: row.try_get("symbol")?,
        company_name: row.try_get("company_name")?,
        sector: row.try_get("sector")?,
        timeframe: row.try_get("timeframe")?,
        calculated_at: row.try_get("calculated_at")?,
        sharpe_ratio: row.try_get("sharpe_ratio")?,
        volatility: row.try_get("volatility")?,
        total_return: row.try_get("total_return")?,
        rsi_14: row.try_get("rsi_14")?,
        beta: row.try_get("beta")?,
        max_drawdown: row.try_get("max_drawdown")?,
    })
}

#[async_trait]
impl MetricsStore for SqliteMetricsStore {
    async fn get_metrics(
        &self,
        symbol: &str,
        timeframe: Option<&str>,
    ) -> Result<TechnicalMetrics, StoreError> {
        let symbol = symbol.trim().to_uppercase();
        let timeframe = timeframe.unwrap_or(&self.timeframe);

        let row = sqlx::query(
            r#"
            SELECT m.*, s.company_name, s.sector
            FROM stock_metrics m
            LEFT JOIN stocks s ON s.symbol = m.symbol
            WHERE m.symbol = ? AND m.timeframe = ?
            ORDER BY m.calculated_at DESC
            LIMIT 1
            "#,
        )
        .bind(&symbol)
        .bind(timeframe)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        let row = row.ok_or_else(|| StoreError::NotFound(symbol.clone()))?;

        let mut metrics = TechnicalMetrics::new();
        metrics.insert("symbol".to_string(), Value::String(symbol));
        metrics.insert(
            "company_name".to_string(),
            optional_string(row.try_get("company_name").map_err(unavailable)?),
        );
        metrics.insert(
            "sector".to_string(),
            optional_string(row.try_get("sector").map_err(unavailable)?),
        );
        metrics.insert(
            "timeframe".to_string(),
            Value::String(row.try_get("timeframe").map_err(unavailable)?),
        );
        metrics.insert(
            "calculated_at".to_string(),
            Value::String(row.try_get("calculated_at").map_err(unavailable)?),
        );
        for column in METRIC_COLUMNS {
            let value: Option<f64> = row.try_get(*column).map_err(unavailable)?;
            let value = value
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null);
            metrics.insert(column.to_string(), value);
        }

        Ok(metrics)
    }

    async fn resolve_company_name(&self, symbol: &str) -> Result<String, StoreError> {
        let symbol = symbol.trim().to_uppercase();

        let name: Option<Option<String>> =
            sqlx::query_scalar("SELECT company_name FROM stocks WHERE symbol = ?")
                .bind(&symbol)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        name.flatten()
            .filter(|n| !n.trim().is_empty())
            .ok_or(StoreError::NotFound(symbol))
    }

    async fn search_stocks(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<StockListing>, StoreError> {
        let like = like_pattern(pattern);

        let rows = sqlx::query(
            r#"
            SELECT symbol, company_name, sector
            FROM stocks
            WHERE UPPER(symbol) LIKE ?1 ESCAPE '\'
               OR UPPER(COALESCE(company_name, '')) LIKE ?1 ESCAPE '\'
            ORDER BY symbol
            LIMIT ?2
            "#,
        )
        .bind(&like)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.iter()
            .map(|row| -> Result<StockListing, sqlx::Error> {
                Ok(StockListing {
                    symbol: row.try_get("symbol")?,
                    company_name: row.try_get("company_name")?,
                    sector: row.try_get("sector")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)
    }

    async fn screen_stocks(
        &self,
        criteria: &ScreenCriteria,
    ) -> Result<Vec<ScreenedStock>, StoreError> {
        let timeframe = criteria.timeframe.as_deref().unwrap_or(&self.timeframe);

        // Only each symbol's latest calculation for the timeframe is screened.
        let rows = sqlx::query(
            r#"
            SELECT m.symbol, s.company_name, s.sector, m.timeframe, m.calculated_at,
                   m.sharpe_ratio, m.volatility, m.total_return, m.rsi_14, m.beta, m.max_drawdown
            FROM stock_metrics m
            LEFT JOIN stocks s ON s.symbol = m.symbol
            WHERE m.timeframe = ?1
              AND m.calculated_at = (
                  SELECT MAX(x.calculated_at) FROM stock_metrics x
                  WHERE x.symbol = m.symbol AND x.timeframe = m.timeframe
              )
              AND (?2 IS NULL OR s.sector = ?2 COLLATE NOCASE)
              AND (?3 IS NULL OR m.sharpe_ratio >= ?3)
              AND (?4 IS NULL OR m.volatility <= ?4)
              AND (?5 IS NULL OR m.rsi_14 >= ?5)
              AND (?6 IS NULL OR m.rsi_14 <= ?6)
            ORDER BY m.sharpe_ratio DESC, m.symbol
            LIMIT ?7
            "#,
        )
        .bind(timeframe)
        .bind(criteria.sector.as_deref())
        .bind(criteria.min_sharpe_ratio)
        .bind(criteria.max_volatility)
        .bind(criteria.min_rsi)
        .bind(criteria.max_rsi)
        .bind(criteria.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.iter()
            .map(screened_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)
    }
}

/// Stand-in for a configured store that could not be opened at startup.
///
/// Every lookup reports the original failure, so requests degrade the same
/// way they would if the database went away later.
#[derive(Debug, Clone)]
pub struct UnavailableMetricsStore {
    reason: String,
}

impl UnavailableMetricsStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn err(&self) -> StoreError {
        StoreError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl MetricsStore for UnavailableMetricsStore {
    async fn get_metrics(
        &self,
        _symbol: &str,
        _timeframe: Option<&str>,
    ) -> Result<TechnicalMetrics, StoreError> {
        Err(self.err())
    }

    async fn resolve_company_name(&self, _symbol: &str) -> Result<String, StoreError> {
        Err(self.err())
    }

    async fn search_stocks(
        &self,
        _pattern: &str,
        _limit: usize,
    ) -> Result<Vec<StockListing>, StoreError> {
        Err(self.err())
    }

    async fn screen_stocks(
        &self,
        _criteria: &ScreenCriteria,
    ) -> Result<Vec<ScreenedStock>, StoreError> {
        Err(self.err())
    }
}

/// Fixed in-process store, for tests and library embedding.
///
/// Holds one metrics snapshot per symbol, so timeframes are ignored. The
/// sector and screen columns are read from the snapshot's keys.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMetricsStore {
    stocks: HashMap<String, (Option<String>, TechnicalMetrics)>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stock(
        mut self,
        symbol: &str,
        company_name: Option<&str>,
        metrics: TechnicalMetrics,
    ) -> Self {
        self.stocks.insert(
            symbol.to_uppercase(),
            (company_name.map(str::to_string), metrics),
        );
        self
    }
}

fn number(metrics: &TechnicalMetrics, key: &str) -> Option<f64> {
    metrics.get(key).and_then(Value::as_f64)
}

fn text(metrics: &TechnicalMetrics, key: &str) -> Option<String> {
    metrics.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Unset bounds pass; a set bound fails when the value is missing.
fn within(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    match value {
        Some(v) => min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi),
        None => min.is_none() && max.is_none(),
    }
}

/// Sharpe ratio descending with missing values last, then symbol.
fn by_sharpe(a: &ScreenedStock, b: &ScreenedStock) -> Ordering {
    match (a.sharpe_ratio, b.sharpe_ratio) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.symbol.cmp(&b.symbol))
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn get_metrics(
        &self,
        symbol: &str,
        _timeframe: Option<&str>,
    ) -> Result<TechnicalMetrics, StoreError> {
        let symbol = symbol.trim().to_uppercase();
        self.stocks
            .get(&symbol)
            .map(|(_, m)| m.clone())
            .ok_or(StoreError::NotFound(symbol))
    }

    async fn resolve_company_name(&self, symbol: &str) -> Result<String, StoreError> {
        let symbol = symbol.trim().to_uppercase();
        self.stocks
            .get(&symbol)
            .and_then(|(name, _)| name.clone())
            .ok_or(StoreError::NotFound(symbol))
    }

    async fn search_stocks(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<StockListing>, StoreError> {
        let needle = pattern.trim().to_uppercase();
        let mut out: Vec<StockListing> = self
            .stocks
            .iter()
            .filter(|(symbol, (name, _))| {
                symbol.contains(&needle)
                    || name
                        .as_deref()
                        .is_some_and(|n| n.to_uppercase().contains(&needle))
            })
            .map(|(symbol, (name, metrics))| StockListing {
                symbol: symbol.clone(),
                company_name: name.clone(),
                sector: text(metrics, "sector"),
            })
            .collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        out.truncate(limit);
        Ok(out)
    }

    async fn screen_stocks(
        &self,
        criteria: &ScreenCriteria,
    ) -> Result<Vec<ScreenedStock>, StoreError> {
        let timeframe = criteria.timeframe.clone().unwrap_or_else(|| "medium".to_string());
        let mut out: Vec<ScreenedStock> = self
            .stocks
            .iter()
            .filter(|(_, (_, m))| {
                criteria.sector.as_ref().map_or(true, |wanted| {
                    text(m, "sector").is_some_and(|s| s.eq_ignore_ascii_case(wanted))
                })
            })
            .filter(|(_, (_, m))| within(number(m, "sharpe_ratio"), criteria.min_sharpe_ratio, None))
            .filter(|(_, (_, m))| within(number(m, "volatility"), None, criteria.max_volatility))
            .filter(|(_, (_, m))| within(number(m, "rsi_14"), criteria.min_rsi, criteria.max_rsi))
            .map(|(symbol, (name, m))| ScreenedStock {
                symbol: symbol.clone(),
                company_name: name.clone(),
                sector: text(m, "sector"),
                timeframe: timeframe.clone(),
                calculated_at: text(m, "calculated_at").unwrap_or_default(),
                sharpe_ratio: number(m, "sharpe_ratio"),
                volatility: number(m, "volatility"),
                total_return: number(m, "total_return"),
                rsi_14: number(m, "rsi_14"),
                beta: number(m, "beta"),
                max_drawdown: number(m, "max_drawdown"),
            })
            .collect();
        out.sort_by(by_sharpe);
        out.truncate(criteria.limit);
        Ok(out)
    }
}
