//! Tabletalk: answer natural-language questions about a relational database.
//!
//! The crate wires a discovered schema catalog, a generation backend
//! ([`tabletalk_llm::LlmProvider`]) and a relational store
//! ([`tabletalk_db::QueryStore`]) into a per-question pipeline:
//!
//! 1. [`catalog`]: introspect tables, columns and enum-like values once
//! 2. [`router`]: classify the question (`SQL_QUERY`, `DATA_EXPLAIN`, `OTHER`)
//! 3. [`synthesizer`]: generate and sanitize a query
//! 4. [`executor`]: run it under the read-only policy; failures become data
//! 5. [`explainer`]: turn the outcome into prose
//!
//! [`orchestrator::Orchestrator`] drives the stages and the operator loop.

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod explainer;
pub mod orchestrator;
pub mod output;
pub mod prompts;
pub mod provider;
pub mod router;
pub mod synthesizer;

pub use catalog::{CatalogBuilder, ColumnInfo, EnumHint, SchemaCatalog, TableInfo};
pub use config::{AppConfig, ConfigError};
pub use error::{CatalogError, HelpfulError, TurnError};
pub use executor::{ExecutionPolicy, QueryResult};
pub use orchestrator::{
    Answer, Orchestrator, PipelineSettings, SessionOptions, SessionSummary, Stage,
};
pub use router::{parse_route, Route};
pub use synthesizer::{sanitize, CandidateQuery};
