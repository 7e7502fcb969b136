//! Tool-calling surface.
//!
//! Every operation an agent may call is a [`Tool`]: a name, a description,
//! a JSON Schema for its parameters, and an async `execute`. The HTTP
//! dispatcher and the MCP bridge both serve the same [`ToolRegistry`], and
//! both validate parameters with [`validate_params`] before executing.
//!
//! | Tool | Parameters |
//! |------|------------|
//! | `list_documents` | none |
//! | `find_company_documents` | `symbol` |
//! | `analyze_document` | `filename`, `analysis_type`, `output_format` |
//! | `get_company_fundamentals` | `symbol`, `document_pattern` |
//! | `get_stock_metrics` | `symbol`, `timeframe` |
//! | `search_stocks` | `pattern`, `limit` |
//! | `screen_stocks_by_metrics` | `criteria` |

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::engine::{is_valid_symbol, Engine};
use crate::metrics::{ScreenCriteria, TIMEFRAMES};
use crate::models::{AnalysisMode, OutputFormat};

/// An operation callable by name with JSON parameters.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Shipped with the crate (as opposed to registered by an embedder).
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Run with already-validated parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// What a tool can reach while executing.
#[derive(Clone)]
pub struct ToolContext {
    engine: Arc<Engine>,
}

impl ToolContext {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// Listing entry for `GET /tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

fn symbol_param(params: &Value) -> Result<&str> {
    let symbol = params["symbol"].as_str().unwrap_or("").trim();
    if symbol.is_empty() {
        bail!("symbol must not be empty");
    }
    if !is_valid_symbol(symbol) {
        bail!("invalid symbol: '{}'", symbol);
    }
    Ok(symbol)
}

fn symbol_schema() -> Value {
    json!({ "type": "string", "description": "Stock ticker symbol, e.g. AARTIIND" })
}

fn timeframe_schema() -> Value {
    json!({
        "type": "string",
        "enum": TIMEFRAMES,
        "description": "Metrics window; defaults to the configured timeframe"
    })
}

// ── Built-in tools ──────────────────────────────────────────────────────

pub struct ListDocumentsTool;

#[async_trait]
impl Tool for ListDocumentsTool {
    fn name(&self) -> &str {
        "list_documents"
    }

    fn description(&self) -> &str {
        "List the company documents available for analysis"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let documents = ctx.engine().list_documents();
        Ok(json!({ "count": documents.len(), "documents": documents }))
    }
}

pub struct FindCompanyDocumentsTool;

#[async_trait]
impl Tool for FindCompanyDocumentsTool {
    fn name(&self) -> &str {
        "find_company_documents"
    }

    fn description(&self) -> &str {
        "Rank the documents most relevant to a stock symbol and explain the match"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "symbol": symbol_schema() },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let symbol = symbol_param(&params)?;
        let matches = ctx.engine().find_company_documents(symbol).await;
        Ok(serde_json::to_value(&matches)?)
    }
}

pub struct AnalyzeDocumentTool;

#[async_trait]
impl Tool for AnalyzeDocumentTool {
    fn name(&self) -> &str {
        "analyze_document"
    }

    fn description(&self) -> &str {
        "Extract a summary, financial highlights, key metrics or the full text from one document"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Document name relative to the document directory"
                },
                "analysis_type": {
                    "type": "string",
                    "enum": ["summary", "financial_highlights", "key_metrics", "full_text"],
                    "default": "financial_highlights"
                },
                "output_format": {
                    "type": "string",
                    "enum": ["text", "json", "structured"],
                    "default": "json"
                }
            },
            "required": ["filename"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let filename = params["filename"].as_str().unwrap_or("");
        if filename.trim().is_empty() {
            bail!("filename must not be empty");
        }
        let mode: AnalysisMode = params["analysis_type"]
            .as_str()
            .unwrap_or("financial_highlights")
            .parse()
            .map_err(anyhow::Error::msg)?;
        let format: OutputFormat = params["output_format"]
            .as_str()
            .unwrap_or("json")
            .parse()
            .map_err(anyhow::Error::msg)?;

        let analysis = ctx
            .engine()
            .analyze_document(filename, mode, format)
            .await?;

        Ok(json!({
            "filename": filename,
            "analysis_type": mode,
            "output_format": format,
            "analysis": analysis,
        }))
    }
}

pub struct GetCompanyFundamentalsTool;

#[async_trait]
impl Tool for GetCompanyFundamentalsTool {
    fn name(&self) -> &str {
        "get_company_fundamentals"
    }

    fn description(&self) -> &str {
        "Combine a stock's technical metrics with highlights from its most relevant documents"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": symbol_schema(),
                "document_pattern": {
                    "type": "string",
                    "description": "Optional filename glob or substring; bypasses relevance ranking"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let symbol = symbol_param(&params)?;
        let pattern = params["document_pattern"].as_str();
        let result = ctx
            .engine()
            .get_company_fundamentals(symbol, pattern)
            .await;
        Ok(serde_json::to_value(&result)?)
    }
}

pub struct GetStockMetricsTool;

#[async_trait]
impl Tool for GetStockMetricsTool {
    fn name(&self) -> &str {
        "get_stock_metrics"
    }

    fn description(&self) -> &str {
        "Latest technical and risk metrics for a stock symbol"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": symbol_schema(),
                "timeframe": timeframe_schema()
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let symbol = symbol_param(&params)?;
        let timeframe = params["timeframe"].as_str();
        let metrics = ctx.engine().get_metrics(symbol, timeframe).await?;
        Ok(json!({ "symbol": symbol.to_uppercase(), "metrics": metrics }))
    }
}

pub struct SearchStocksTool;

#[async_trait]
impl Tool for SearchStocksTool {
    fn name(&self) -> &str {
        "search_stocks"
    }

    fn description(&self) -> &str {
        "Search stocks by part of the symbol or company name"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text contained in the symbol or company name"
                },
                "limit": { "type": "integer", "default": 10 }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let pattern = params["pattern"].as_str().unwrap_or("").trim();
        if pattern.is_empty() {
            bail!("pattern must not be empty");
        }
        let limit = params["limit"].as_u64().unwrap_or(10) as usize;
        if limit == 0 {
            bail!("invalid limit: must be >= 1");
        }

        let stocks = ctx.engine().search_stocks(pattern, limit).await?;
        Ok(json!({ "pattern": pattern, "count": stocks.len(), "stocks": stocks }))
    }
}

pub struct ScreenStocksTool;

#[async_trait]
impl Tool for ScreenStocksTool {
    fn name(&self) -> &str {
        "screen_stocks_by_metrics"
    }

    fn description(&self) -> &str {
        "Screen stocks by sector, Sharpe ratio, volatility and RSI band"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "criteria": {
                    "type": "object",
                    "description": "Filters; unset bounds do not filter",
                    "properties": {
                        "sector": { "type": "string" },
                        "timeframe": timeframe_schema(),
                        "min_sharpe_ratio": { "type": "number" },
                        "max_volatility": { "type": "number" },
                        "min_rsi": { "type": "number" },
                        "max_rsi": { "type": "number" },
                        "limit": { "type": "integer", "default": 20 }
                    }
                }
            },
            "required": ["criteria"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let criteria: ScreenCriteria = serde_json::from_value(params["criteria"].clone())
            .map_err(|e| anyhow::anyhow!("invalid criteria: {}", e))?;
        criteria.validate()?;

        let stocks = ctx.engine().screen_stocks(&criteria).await?;
        Ok(json!({ "criteria": criteria, "count": stocks.len(), "stocks": stocks }))
    }
}

// ── Registry ────────────────────────────────────────────────────────────

/// Ordered set of tools, looked up by name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with every built-in tool.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ListDocumentsTool));
        registry.register(Box::new(FindCompanyDocumentsTool));
        registry.register(Box::new(AnalyzeDocumentTool));
        registry.register(Box::new(GetCompanyFundamentalsTool));
        registry.register(Box::new(GetStockMetricsTool));
        registry.register(Box::new(SearchStocksTool));
        registry.register(Box::new(ScreenStocksTool));
        registry
    }

    /// Add a tool. A later tool with the same name is shadowed by the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(|t| ToolInfo::from_tool(t.as_ref())).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Parameter validation ────────────────────────────────────────────────

/// Check `params` against a tool schema and fill in defaults.
///
/// Enforces required fields, primitive `type`s and `enum` membership.
/// Properties not named in the schema are passed through untouched.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("parameters must be an object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !params_obj.contains_key(*field) {
            bail!("missing required parameter: {}", field);
        }
    }

    let mut result = params_obj.clone();

    for (prop_name, prop_schema) in &properties {
        let Some(value) = params_obj.get(prop_name) else {
            if let Some(default) = prop_schema.get("default") {
                result.insert(prop_name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "parameter '{}' must be of type '{}', got {}",
                    prop_name,
                    expected,
                    json_type_name(value)
                );
            }
        }

        if let Some(allowed) = prop_schema.get("enum").and_then(|e| e.as_array()) {
            if !allowed.contains(value) {
                let allowed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                bail!(
                    "parameter '{}' must be one of [{}], got {}",
                    prop_name,
                    allowed.join(", "),
                    value
                );
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_in_order() {
        let registry = ToolRegistry::with_builtins();
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "list_documents",
                "find_company_documents",
                "analyze_document",
                "get_company_fundamentals",
                "get_stock_metrics",
                "search_stocks",
                "screen_stocks_by_metrics"
            ]
        );
        assert!(registry.find("analyze_document").unwrap().is_builtin());
        assert!(registry.find("search").is_none());
    }

    #[test]
    fn schemas_are_objects() {
        for info in ToolRegistry::with_builtins().infos() {
            assert_eq!(info.parameters["type"], "object", "{}", info.name);
        }
    }

    #[test]
    fn validate_injects_defaults() {
        let schema = AnalyzeDocumentTool.parameters_schema();
        let v = validate_params(&schema, &json!({ "filename": "TCS.pdf" })).unwrap();
        assert_eq!(v["analysis_type"], "financial_highlights");
        assert_eq!(v["output_format"], "json");
    }

    #[test]
    fn validate_rejects_missing_wrong_type_and_bad_enum() {
        let schema = AnalyzeDocumentTool.parameters_schema();

        let err = validate_params(&schema, &json!({})).unwrap_err();
        assert!(err.to_string().contains("missing required parameter: filename"));

        let err = validate_params(&schema, &json!({ "filename": 3 })).unwrap_err();
        assert!(err.to_string().contains("must be of type 'string', got number"));

        let err = validate_params(
            &schema,
            &json!({ "filename": "a.pdf", "analysis_type": "ocr" }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }

    #[test]
    fn validate_accepts_null_for_parameterless_tools() {
        let schema = ListDocumentsTool.parameters_schema();
        assert_eq!(validate_params(&schema, &Value::Null).unwrap(), json!({}));
        assert!(validate_params(&schema, &json!([1])).is_err());
    }

    #[test]
    fn timeframe_is_an_enum_on_metrics_and_screen() {
        let schema = GetStockMetricsTool.parameters_schema();
        let err = validate_params(&schema, &json!({ "symbol": "TCS", "timeframe": "weekly" }))
            .unwrap_err();
        assert!(err.to_string().contains("must be one of"));
        assert!(validate_params(&schema, &json!({ "symbol": "TCS", "timeframe": "long" })).is_ok());

        let screen = ScreenStocksTool.parameters_schema();
        assert_eq!(
            screen["properties"]["criteria"]["properties"]["timeframe"]["enum"],
            json!(["short", "medium", "long"])
        );
    }

    #[test]
    fn symbol_param_is_checked() {
        assert!(symbol_param(&json!({ "symbol": "  " })).is_err());
        assert!(symbol_param(&json!({ "symbol": "a b" })).is_err());
        assert_eq!(symbol_param(&json!({ "symbol": " tcs " })).unwrap(), "tcs");
    }
}
