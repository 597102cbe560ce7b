pub mod asset;
pub mod checkpoint;
pub mod oracle;
pub mod pool;
pub mod watched;

pub use asset::AssetData;
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use oracle::{OracleBook, OracleSample};
pub use pool::{BondingCurve, Pool, PoolState, ProtocolVersion};
pub use watched::WatchedAddress;
