//! Samples the chain's oracle feed and appends the observation to the
//! oracle book, normalized from feed decimals to a wad rate.

use std::time::Duration;

use alloy::primitives::Bytes;
use alloy::sol_types::SolCall;
use log::debug;

use crate::{
    abis::latestRoundDataCall,
    error::EngineError,
    rpc::retry_with_backoff,
    scheduler::JobContext,
    store::models::OracleSample,
    utils::pow10,
};

pub async fn run(ctx: &mut JobContext<'_>) -> Result<(), EngineError> {
    let rpc = ctx.rpc;
    let chain_id = ctx.chain.chain_id;
    let feed = ctx.chain.oracle.feed.as_str();
    let block = ctx.block;
    let calldata = Bytes::from(latestRoundDataCall {}.abi_encode());

    let raw = retry_with_backoff(
        "oracle latestRoundData",
        ctx.settings.rpc_retry_limit,
        Duration::from_millis(ctx.settings.rpc_retry_base_ms),
        || {
            let calldata = calldata.clone();
            async move { rpc.call_contract(chain_id, feed, calldata, block).await }
        },
    )
    .await?;

    let round = latestRoundDataCall::abi_decode_returns(&raw).map_err(|e| {
        EngineError::DecodeAnomaly {
            block,
            log_index: 0,
            reason: format!("oracle feed {feed} returned undecodable data: {e}"),
        }
    })?;

    if round.answer.is_negative() || round.answer.is_zero() {
        return Err(EngineError::OracleDataUnavailable {
            chain_id,
            oracle_id: feed.to_string(),
            block,
        });
    }
    let answer = round.answer.into_raw();

    let decimals = ctx.chain.oracle.decimals;
    let rate_usd = if decimals <= 18 {
        answer.saturating_mul(pow10(18 - decimals))
    } else {
        answer / pow10(decimals - 18)
    };

    ctx.oracle.append(OracleSample {
        oracle_id: feed.to_string(),
        chain_id,
        block_number: block,
        rate_usd,
        timestamp: ctx.timestamp,
    });
    debug!(
        "chain {}: oracle {} sampled at block {}: rate {} wad",
        chain_id, feed, block, rate_usd
    );
    Ok(())
}
