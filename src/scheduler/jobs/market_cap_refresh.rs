//! Recomputes market caps for launched assets on a slower cadence than the
//! touched-pool refresh, so caps track oracle drift even for quiet pools.

use log::debug;

use crate::{error::EngineError, scheduler::JobContext};

pub async fn run(ctx: &mut JobContext<'_>) -> Result<(), EngineError> {
    let store = ctx.store;
    let launched: Vec<String> = {
        let guard = store.read().await;
        guard
            .pools()
            .filter(|p| p.bonding.is_some())
            .map(|p| p.address.clone())
            .collect()
    };
    if launched.is_empty() {
        return Ok(());
    }

    let count = launched.len();
    let mut guard = store.write().await;
    for address in launched {
        let Some(mut pool) = guard.checkout_pool(&address) else {
            continue;
        };
        ctx.aggregator.refresh(&mut pool, ctx.block, ctx.timestamp);
        guard.commit_pool(pool);
    }
    drop(guard);

    debug!(
        "chain {}: recomputed market caps for {} launched pools",
        ctx.chain.chain_id, count
    );
    Ok(())
}
