pub mod market_cap_refresh;
pub mod metric_refresh;
pub mod oracle_sample;
