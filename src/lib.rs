//! # opensift
//!
//! AI augmentation layer in front of arbitrary search backends.
//!
//! A caller submits a natural-language question; opensift asks an LLM to
//! turn it into keyword search queries plus weighted screening criteria,
//! fans the queries out across pluggable search adapters, assesses every
//! retrieved result against each criterion, and aggregates the judgments
//! into a final perfect/partial/reject label with a weighted score. Results
//! are delivered as one completed response or incrementally over SSE.
//!
//! ## Modules
//!
//! - [`engine`] - pipeline orchestrator (plan, search, stream, batch)
//! - [`planner`] - query decomposition with heuristic fallback
//! - [`verifier`] - per-result criterion assessment with bounded concurrency
//! - [`classifier`] - perfect/partial/reject rules and weighted scoring
//! - [`llm`] - OpenAI-compatible gateway with JSON repair and retry
//! - [`adapters`] - search backend connectors and registry
//! - [`server`] - axum HTTP API with SSE streaming
//! - [`config`] - YAML + environment configuration
//! - [`error`] - custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use opensift::config::Settings;
//! use opensift::engine::SiftEngine;
//! use opensift::models::SearchRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Arc::new(Settings::load(None)?);
//!     let engine = Arc::new(SiftEngine::new(settings));
//!     engine.initialize().await;
//!
//!     let request = SearchRequest {
//!         query: "transformer models for solar nowcasting".into(),
//!         options: Default::default(),
//!         context: Default::default(),
//!     };
//!     let response = engine.search(&request).await?;
//!     println!("{} results scanned", response.total_scanned);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod models;
pub mod planner;
pub mod prompts;
pub mod server;
pub mod sse;
pub mod verifier;

pub use error::{Result, SiftError};
