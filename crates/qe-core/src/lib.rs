//! Query Engine Core: request state, stage contract and runner
//!
//! A request flows through a fixed set of stages driven by an explicit state
//! machine. Stages mutate a `RequestState` owned by the runner; the runner
//! decides how stage failures are recovered and assembles the output envelope.

pub mod config;
pub mod context;
pub mod data_model;
pub mod error;
pub mod runner;
pub mod stage;

pub use config::EngineConfig;
pub use context::RequestState;
pub use data_model::{IntentType, Metadata, QueryInput, QueryOutput, QuerySignature, Record};
pub use error::QueryEngineError;
pub use runner::PipelineRunner;
pub use stage::{Stage, StageError, StageName};

/// Engine version reported by the service
pub const QE_VERSION: &str = "1.0.0";
