pub mod asset_fetcher;
pub mod chains;
pub mod parser;
pub mod resolver;
pub mod token_fetcher;
pub mod worker;

pub use asset_fetcher::AssetFetcher;
pub use chains::ChainManager;
pub use parser::{decode, PoolEvent};
pub use resolver::{AddressResolver, Discovery};
pub use token_fetcher::TokenFetcher;
pub use worker::{ChainWorker, Mode};
