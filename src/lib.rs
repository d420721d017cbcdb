//! # SEC Insights
//!
//! Backend for question answering over SEC filings. Downloaded 10-K and
//! 10-Q filings are registered as documents in Postgres, their text is
//! chunked and embedded, and the vectors are stored in a pgvector table
//! for the answering engine to search. A small HTTP API lists the
//! documents for the frontend.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐
//! │  filings   │──▶│   upsert   │──▶│   document   │
//! │ (on disk)  │   │ (by URL)   │   │    table     │
//! └────────────┘   └────────────┘   └──────┬───────┘
//!                                          │
//!                  ┌───────────────────────┼────────────┐
//!                  ▼                       │            ▼
//!            ┌──────────┐   ┌─────────┐    │      ┌──────────┐
//!            │   seed   │──▶│   llm   │    │      │  server  │
//!            │load+chunk│   │ embed   │    │      │  (HTTP)  │
//!            └────┬─────┘   └─────────┘    │      └──────────┘
//!                 ▼                        │
//!        ┌──────────────────────┐          │
//!        │ data_pg_vector_store │◀─────────┘ document_id
//!        └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! secctl migrate up
//! secctl upsert --dir ./data
//! secctl seed --skip-indexed
//! secctl serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Core data types |
//! | [`filings`] | Locate downloaded filings on disk |
//! | [`stocks`] | Ticker symbol table |
//! | [`upsert`] | Filings → document rows |
//! | [`llm`] | Embedding and completion providers (Ollama, OpenAI) |
//! | [`loader`] | Fetch documents and extract text |
//! | [`chunk`] | Text chunking |
//! | [`seed`] | Build the vector store from documents |
//! | [`store`] | Storage trait, Postgres and in-memory backends |
//! | [`server`] | Read-only document HTTP API |
//! | [`migrate`] | Versioned schema migrations |
//! | [`check`] | Database diagnostics |
//! | [`db`] | Database connection pool |

pub mod check;
pub mod chunk;
pub mod config;
pub mod db;
pub mod filings;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod seed;
pub mod server;
pub mod stocks;
pub mod store;
pub mod upsert;
