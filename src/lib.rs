pub mod abis;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rpc;
pub mod scheduler;
pub mod store;
pub mod utils;
pub mod worker;

pub use config::Settings;
pub use error::EngineError;
pub use metrics::GraduationEvent;
pub use store::models::OracleBook;
pub use worker::{ChainManager, ChainWorker};
