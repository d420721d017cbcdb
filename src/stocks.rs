//! Ticker symbol table.
//!
//! Filings are stored under their ticker; the upserter needs the company
//! name. A built-in table ships with the crate and `[stocks] path` may
//! point at a JSON array of `{"symbol", "name"}` objects to replace it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::config::StocksConfig;

const BUILTIN_STOCKS: &str = include_str!("../data/stocks.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    pub name: String,
}

/// Case-insensitive ticker lookup.
#[derive(Debug, Clone, Default)]
pub struct StockDirectory {
    by_symbol: HashMap<String, Stock>,
}

impl StockDirectory {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_STOCKS).context("built-in stock table is invalid")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read stock table {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("failed to parse stock table {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let stocks: Vec<Stock> = serde_json::from_str(content)?;
        Ok(Self::from_stocks(stocks))
    }

    /// Later entries win when two share a symbol.
    pub fn from_stocks(stocks: impl IntoIterator<Item = Stock>) -> Self {
        let by_symbol = stocks
            .into_iter()
            .map(|s| (s.symbol.to_uppercase(), s))
            .collect();
        Self { by_symbol }
    }

    /// The configured table, or the built-in one.
    pub fn load(config: &StocksConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn lookup(&self, symbol: &str) -> Option<&Stock> {
        self.by_symbol.get(&symbol.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}
