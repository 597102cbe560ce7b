pub mod chain;
pub mod settings;

pub use chain::{ChainAddresses, ChainConfig, OracleFeedSettings, SharedAddresses};
pub use settings::{EngineSettings, Settings};
