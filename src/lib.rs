//! # Stock Context
//!
//! Finds the company documents (earnings transcripts, results, annual
//! reports) that belong to a stock symbol, extracts financial highlights
//! from them, and joins those with precomputed technical metrics.
//!
//! ## Architecture
//!
//! ```text
//! symbol ──▶ DocumentSelector ──▶ DocumentAnalyzer ──┐
//!              │ (index, score)      (extract, scan)  ├──▶ FundamentalsResult
//! symbol ──▶ MetricsStore ───────────────────────────┘
//!                                          │
//!                      ┌───────────────────┼──────────────┐
//!                      ▼                   ▼              ▼
//!                 ┌──────────┐       ┌──────────┐   ┌──────────┐
//!                 │   CLI    │       │   HTTP   │   │   MCP    │
//!                 │  (stx)   │       │   API    │   │  /mcp    │
//!                 └──────────┘       └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`error`] | Per-request error types |
//! | [`models`] | Core data types |
//! | [`classify`] | Filename tokenizing and document-type inference |
//! | [`score`] | Relevance scoring |
//! | [`index`] | Cached view of the document directory |
//! | [`select`] | Ranked candidate selection with fallback |
//! | [`extract`] | PDF page extraction with cache and timeout |
//! | [`analyze`] | Analysis modes and output formats |
//! | [`metrics`] | Technical metrics stores |
//! | [`db`] | Database connection |
//! | [`migrate`] | Metrics schema |
//! | [`fundamentals`] | Metrics + documents aggregation |
//! | [`engine`] | Operations shared by every transport |
//! | [`tools`] | Tool trait, registry, parameter validation |
//! | [`server`] | HTTP API |
//! | [`mcp`] | MCP bridge |
//! | [`commands`] | CLI output |

pub mod analyze;
pub mod classify;
pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fundamentals;
pub mod index;
pub mod logging;
pub mod mcp;
pub mod metrics;
pub mod migrate;
pub mod models;
pub mod score;
pub mod select;
pub mod server;
pub mod tools;
