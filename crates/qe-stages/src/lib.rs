//! QE Stages: the six pipeline stages and the engine that wires them.
//!
//! # Pipeline Flow
//!
//! ```text
//! sql_generator → cache_checker ─hit──────────────────────────────→ cache_manager
//!                       │miss                                           ↑
//!                       ↓                                               │
//!                 query_executor ─ok──────────→ data_formatter ─────────┘
//!                       │error                        ↑
//!                       ↓                             │
//!                 error_handler ──────────────────────┘
//! ```

mod cache_checker;
mod cache_manager;
mod data_formatter;
mod engine;
mod error_handler;
pub mod fallback;
mod query_executor;
mod sql_generator;

pub use cache_checker::CacheCheckerStage;
pub use cache_manager::CacheManagerStage;
pub use data_formatter::DataFormatterStage;
pub use engine::QueryEngine;
pub use error_handler::ErrorHandlerStage;
pub use fallback::fallback_rows;
pub use query_executor::QueryExecutorStage;
pub use sql_generator::SqlGeneratorStage;

use qe_cache::ResultCache;
use qe_core::Stage;
use qe_quality::ResultValidator;
use qe_store::QueryStore;
use qe_translator::QueryTranslator;
use std::sync::Arc;

/// One instance of every stage, sharing the given collaborators
pub fn standard_stages(
    translator: Arc<QueryTranslator>,
    store: Arc<dyn QueryStore>,
    cache: Arc<ResultCache>,
    validator: ResultValidator,
) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(SqlGeneratorStage::new(translator)),
        Box::new(CacheCheckerStage::new(cache.clone())),
        Box::new(QueryExecutorStage::new(store)),
        Box::new(ErrorHandlerStage),
        Box::new(DataFormatterStage::new(validator)),
        Box::new(CacheManagerStage::new(cache)),
    ]
}
